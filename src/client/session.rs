use crate::token::decode_payload;
use tracing::debug;

/// Login state shared by the order screens. Created at login and cleared at
/// logout; components borrow it instead of reaching for globals.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub api_url: String,
    pub currency: String,
    token: Option<String>,
}

impl Session {
    pub fn new(api_url: impl Into<String>, currency: impl Into<String>) -> Self {
        Session {
            api_url: api_url.into(),
            currency: currency.into(),
            token: None,
        }
    }

    pub fn login(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// User id read from the token payload without checking the signature.
    /// Only good for deciding what to show; the server re-checks every action.
    pub fn user_id(&self) -> Option<String> {
        let token = self.token.as_deref()?;
        match decode_payload(token) {
            Ok(payload) => Some(payload.id),
            Err(e) => {
                debug!(error = %e, "token payload unreadable, treating viewer as anonymous");
                None
            }
        }
    }
}
