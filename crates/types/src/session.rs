//! Account credentials and storefront sessions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account credentials for one authentication call.
///
/// Held only for the duration of the call and never persisted. The
/// `Debug` impl redacts the secret so credentials cannot leak through
/// logging.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub account: String,
    pub secret: String,
    /// One-time second-factor code, when the storefront asked for one.
    pub code: Option<String>,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .field("code", &self.code.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Opaque account identity returned by a successful authentication.
///
/// Authorizes entitlement resolution for the rest of one job. Cookie
/// affinity with the authenticate call is owned by the `StoreClient`
/// that produced this session.
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Storefront person identifier (dsid).
    pub ds_person_id: String,
    /// Per-session password token used to authorize entitlement calls.
    pub password_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("ds_person_id", &self.ds_person_id)
            .field("password_token", &"<redacted>")
            .finish()
    }
}

/// Result of an authentication attempt.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Credentials accepted; the session authorizes entitlement calls.
    Authenticated(Session),
    /// The account requires a second factor; no session was issued.
    /// The caller resubmits the same credentials with a code attached.
    SecondFactorRequired,
    /// Credentials rejected with the upstream message.
    Failed { message: String },
}

impl AuthOutcome {
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}
