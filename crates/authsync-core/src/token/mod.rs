//! Bearer token decoding.
//!
//! This module provides a structural decoder for the access tokens issued by
//! the backend. Signatures are never verified here; the server is the trust
//! boundary. Claims are derived on demand from the stored token string and are
//! never persisted on their own.

pub mod codec;

pub use codec::{decode, is_expired, TokenClaims, TokenError};
