//! Data models exchanged with the backend.
//!
//! - `User`: the profile record owned by the session once fetched
//! - `Credentials`, `NewAccount`: request bodies for login and registration
//! - `TokenPair`: access + refresh tokens issued on login
//! - `ProfileUpdate`, `Avatar`: sparse profile update payload

pub mod user;

pub use user::{Avatar, AvatarFile, Credentials, NewAccount, ProfileUpdate, TokenPair, User};
