//! Storefront protocol error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StoreError {
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("second factor required")]
    SecondFactorRequired,

    #[error("account has no license for this package")]
    NotOwned,

    #[error("storefront rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },

    #[error("malformed storefront response: {0}")]
    MalformedResponse(String),

    #[error("storefront request failed: {message}")]
    RequestFailed { message: String },
}

impl StoreError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed { .. } => "AUTH_FAILED",
            Self::SecondFactorRequired => "AUTH_2FA_REQUIRED",
            Self::NotOwned => "NOT_OWNED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::MalformedResponse(_) | Self::RequestFailed { .. } => "STORE_FAILED",
        }
    }
}
