//! Abuse-prevention ticket and rate-limit error types
//!
//! Each rejection is a distinct variant so the ingress layer can report
//! exactly why a ticket was refused.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuardError {
    #[error("ticket not found")]
    TicketNotFound,

    #[error("ticket signature mismatch")]
    BadSignature,

    #[error("ticket expired")]
    Expired,

    #[error("ticket bound to a different client")]
    ClientMismatch,

    #[error("ticket already used")]
    AlreadyUsed,

    #[error("no ticket secret configured; issuance disabled")]
    MissingSecret,

    #[error("rate limit exceeded: {limit} requests per {window_secs} seconds")]
    RateLimited { limit: u32, window_secs: u64 },
}

impl GuardError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TicketNotFound => "TICKET_NOT_FOUND",
            Self::BadSignature => "TICKET_BAD_SIGNATURE",
            Self::Expired => "TICKET_EXPIRED",
            Self::ClientMismatch => "TICKET_CLIENT_MISMATCH",
            Self::AlreadyUsed => "TICKET_ALREADY_USED",
            Self::MissingSecret => "TICKET_NO_SECRET",
            Self::RateLimited { .. } => "RATE_LIMITED",
        }
    }
}
