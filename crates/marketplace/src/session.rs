use reqwest::header::{HeaderValue, InvalidHeaderValue};

use crate::UserId;

/// Opaque bearer credential issued by the authentication service.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn authorization_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl From<String> for BearerToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let skip = self.0.chars().count().saturating_sub(4);
        let visible: String = self.0.chars().skip(skip).collect();
        write!(f, "BearerToken(...{visible})")
    }
}

/// Authenticated principal, passed explicitly to whatever talks to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub token: BearerToken,
}

impl Session {
    pub fn new(user_id: UserId, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: BearerToken::new(token),
        }
    }
}
