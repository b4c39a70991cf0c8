//! Session lifecycle state.
//!
//! This module provides:
//! - `Session`, `Snapshot`: the canonical state and what observers receive
//! - `SessionStore`, `SessionWatcher`: the subscribable state cell
//! - `SessionMachine`: login, register, update-profile, check-auth, logout
//! - `Action`: the dispatch surface for UI code
//! - `SessionError` and the message extraction rules for `Session::error`
//!
//! Overlapping invocations of the same operation are resolved by sequence
//! number: only the most recently started one may commit its result.

pub mod dispatch;
pub mod error;
pub mod machine;
pub mod state;
pub mod store;

pub use dispatch::Action;
pub use error::{ExtractionStrategy, MessagePolicy, SessionError};
pub use machine::{SessionMachine, Settled};
pub use state::{Operation, Phase, Session, Snapshot, Transition};
pub use store::{SessionStore, SessionWatcher, Ticket};
