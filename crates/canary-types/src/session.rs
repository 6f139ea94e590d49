//! Authenticated session of one test cycle.

use std::fmt;

/// Token pair acquired at cycle start and released at cycle end.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub refresh_token: String,
}

impl Session {
    pub fn new(token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Tokens never end up in logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let session = Session::new("secret-token", "secret-refresh");
        let printed = format!("{:?}", session);
        assert!(!printed.contains("secret"));
        assert_eq!(session.bearer(), "Bearer secret-token");
    }
}
