use authsync_core::session::{Session, Snapshot};
use authsync_core::token::TokenClaims;
use chrono::Utc;

/// One-line summary of a session. Never prints the token itself.
pub fn session_line(session: &Session) -> String {
    let status = match (&session.user, session.authenticated) {
        (Some(user), true) => format!("authenticated as {} <{}> (id {})", user.username, user.email, user.id),
        (Some(user), false) => format!("anonymous (stale user {})", user.id),
        (None, _) => "anonymous".to_string(),
    };

    let mut line = status;
    if session.pending {
        line.push_str(" [pending]");
    }
    if let Some(ref error) = session.error {
        line.push_str(&format!(" [error: {}]", error));
    }
    line
}

pub fn snapshot_line(snapshot: &Snapshot) -> String {
    match &snapshot.last {
        Some(t) => format!(
            "v{} {}#{} {:?}: {}",
            snapshot.version,
            t.operation,
            t.seq,
            t.phase,
            session_line(&snapshot.session)
        ),
        None => format!("v{} {}", snapshot.version, session_line(&snapshot.session)),
    }
}

pub fn field_errors(session: &Session) -> Vec<String> {
    session
        .field_errors
        .iter()
        .flat_map(|(field, messages)| messages.iter().map(move |m| format!("  {}: {}", field, m)))
        .collect()
}

pub fn claims(claims: &TokenClaims) -> String {
    let now = Utc::now();
    let state = if authsync_core::token::is_expired(claims, now) {
        "expired".to_string()
    } else {
        format!("expires in {}m", claims.minutes_until_expiry(now))
    };
    format!(
        "subject:    {}\nissued at:  {}\nexpires at: {} ({})\ntoken id:   {}",
        claims.subject_id,
        claims.issued_at.to_rfc3339(),
        claims.expires_at.to_rfc3339(),
        state,
        claims.unique_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use authsync_core::User;

    fn user() -> User {
        User {
            id: 7,
            email: "a@b.com".into(),
            username: "a".into(),
            avatar: None,
        }
    }

    #[test]
    fn test_session_line_anonymous() {
        assert_eq!(session_line(&Session::default()), "anonymous");
    }

    #[test]
    fn test_session_line_authenticated_hides_token() {
        let session = Session {
            authenticated: true,
            user: Some(user()),
            token: Some("secret.token.value".into()),
            ..Session::default()
        };
        let line = session_line(&session);
        assert_eq!(line, "authenticated as a <a@b.com> (id 7)");
        assert!(!line.contains("secret"));
    }

    #[test]
    fn test_session_line_flags() {
        let session = Session {
            pending: true,
            error: Some("boom".into()),
            ..Session::default()
        };
        assert_eq!(session_line(&session), "anonymous [pending] [error: boom]");
    }

    #[test]
    fn test_field_errors_lines() {
        let mut session = Session::default();
        session
            .field_errors
            .insert("email".into(), vec!["bad".into(), "worse".into()]);
        assert_eq!(field_errors(&session), vec!["  email: bad", "  email: worse"]);
    }
}
