use std::collections::BTreeMap;

use serde::Serialize;

#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::models::User;

/// The canonical in-memory session.
///
/// `authenticated` implies `user` and `token` are both present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<User>,
    pub token: Option<String>,
    pub pending: bool,
    /// Latest failure message, cleared when any operation starts
    pub error: Option<String>,
    /// Field-level validation messages from the last rejected profile update
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl Session {
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_anonymous(&self) -> bool {
        !self.authenticated
    }
}

/// Lifecycle operations that drive the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Login,
    Register,
    UpdateProfile,
    CheckAuth,
    Logout,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Login => write!(f, "login"),
            Operation::Register => write!(f, "register"),
            Operation::UpdateProfile => write!(f, "updateProfile"),
            Operation::CheckAuth => write!(f, "checkAuth"),
            Operation::Logout => write!(f, "logout"),
        }
    }
}

/// Observable phase of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Pending,
    Fulfilled,
    Rejected,
}

/// The most recent committed phase change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub operation: Operation,
    pub phase: Phase,
    /// Invocation sequence number within `operation`
    pub seq: u64,
}

/// What observers receive: the session plus commit bookkeeping
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Increments on every commit
    pub version: u64,
    pub session: Session,
    pub last: Option<Transition>,
}
