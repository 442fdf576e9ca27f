use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::Secret;

/// Resolved user name, domain and password used to acquire outbound credentials.
///
/// Empty fields are allowed and stand for the anonymous or default identity.
/// The password is never printed and every field is wiped by [`AuthIdentity::clear`] or on drop.
#[derive(Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub username: String,
    pub domain: String,
    pub password: Secret<String>,
}

impl AuthIdentity {
    pub fn new(username: impl Into<String>, domain: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: domain.into(),
            password: Secret::new(password.into()),
        }
    }

    /// Returns `true` when no user name was supplied.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Wipes and releases all three fields.
    pub fn clear(&mut self) {
        self.username.zeroize();
        self.domain.zeroize();
        self.password.zeroize();
    }
}

impl Drop for AuthIdentity {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for AuthIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthIdentity")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &self.password)
            .finish()
    }
}
