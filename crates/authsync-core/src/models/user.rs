use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

/// A user profile as returned by the backend.
/// Replaced wholesale whenever the server returns a newer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    /// URL of the uploaded avatar image
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Login body for `POST /api/token/`. The backend identifies users by email.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Manual impl so passwords never reach logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration body for `POST /api/user/`
#[derive(Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

/// Binary avatar upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    /// Sent as a plain text part
    Url(String),
    File(AvatarFile),
}

impl Avatar {
    fn is_empty(&self) -> bool {
        match self {
            Avatar::Url(url) => url.is_empty(),
            Avatar::File(file) => file.bytes.is_empty(),
        }
    }
}

/// Sparse profile update for `PATCH /api/user/{id}/`.
///
/// Only fields that are present and non-empty are sent; everything else is
/// left untouched on the server.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<Avatar>,
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn avatar(mut self, avatar: Avatar) -> Self {
        self.avatar = Some(avatar);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Text fields that will actually be sent, in wire order
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::new();
        if let Some(username) = non_empty(&self.username) {
            fields.push(("username", username));
        }
        if let Some(email) = non_empty(&self.email) {
            fields.push(("email", email));
        }
        if let Some(Avatar::Url(url)) = self.supplied_avatar() {
            fields.push(("avatar", url.as_str()));
        }
        if let Some(password) = non_empty(&self.password) {
            fields.push(("password", password));
        }
        fields
    }

    /// The avatar, if one was supplied and is non-empty
    pub fn supplied_avatar(&self) -> Option<&Avatar> {
        self.avatar.as_ref().filter(|a| !a.is_empty())
    }

    /// True when nothing would be sent
    pub fn is_empty(&self) -> bool {
        self.text_fields().is_empty() && self.supplied_avatar().is_none()
    }
}

impl std::fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("avatar", &self.avatar.as_ref().map(|a| match a {
                Avatar::Url(url) => url.clone(),
                Avatar::File(file) => format!("<{} bytes: {}>", file.bytes.len(), file.file_name),
            }))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
