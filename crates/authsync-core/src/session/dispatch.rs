//! Fire-and-forget entry point for UI code.

use tokio::task::JoinHandle;

use crate::models::{Credentials, NewAccount, ProfileUpdate};

use super::machine::{SessionMachine, Settled};
use super::state::Operation;

/// A request to run one lifecycle operation
#[derive(Debug, Clone)]
pub enum Action {
    Login(Credentials),
    Register(NewAccount),
    UpdateProfile(ProfileUpdate),
    CheckAuth,
    Logout,
}

impl Action {
    pub fn operation(&self) -> Operation {
        match self {
            Action::Login(_) => Operation::Login,
            Action::Register(_) => Operation::Register,
            Action::UpdateProfile(_) => Operation::UpdateProfile,
            Action::CheckAuth => Operation::CheckAuth,
            Action::Logout => Operation::Logout,
        }
    }
}

impl SessionMachine {
    /// Start `action` and run it on the tokio runtime.
    ///
    /// The pending phase (or, for logout, the whole transition) is committed
    /// before this returns. Must be called from within a runtime.
    pub fn dispatch(&self, action: Action) -> JoinHandle<Settled> {
        match action {
            Action::Login(credentials) => tokio::spawn(self.login(credentials)),
            Action::Register(account) => tokio::spawn(self.register(account)),
            Action::UpdateProfile(update) => tokio::spawn(self.update_profile(update)),
            Action::CheckAuth => tokio::spawn(self.check_auth()),
            Action::Logout => {
                let settled = self.logout();
                tokio::spawn(async move { settled })
            }
        }
    }
}
