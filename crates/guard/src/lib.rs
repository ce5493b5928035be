#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Abuse prevention
//!
//! Two independent gates in front of job admission: single-use
//! keyed-hash tickets bound to the requesting client, and a coarse
//! fixed-window rate limit per client address. A ticket proves the
//! request came through the issuing surface moments ago; the rate
//! limit caps how often any one address may start jobs.

mod rate;
mod ticket;

pub use rate::RateLimiter;
pub use ticket::{Ticket, TicketGuard};

use ipaforge_config::GuardConfig;
use ipaforge_errors::GuardError;

/// Combined admission gate: rate limit first, then ticket issuance.
pub struct AbuseGuard {
    tickets: TicketGuard,
    rate: RateLimiter,
}

impl AbuseGuard {
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            tickets: TicketGuard::new(config),
            rate: RateLimiter::new(config),
        }
    }

    /// Issue a ticket for a job-initiating request, counting it
    /// against the client's rate window.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when the window is exhausted, or
    /// `MissingSecret` when no signing secret is configured.
    pub fn issue(&self, ip: &str, user_agent: &str) -> Result<Ticket, GuardError> {
        self.rate.check(ip)?;
        self.tickets.issue(ip, user_agent)
    }

    /// Redeem a previously issued ticket. Consumes it on success.
    ///
    /// # Errors
    ///
    /// Returns the specific rejection when the ticket is unknown,
    /// forged, expired, bound to another client, or already used.
    pub fn redeem(&self, token: &str, ip: &str, user_agent: &str) -> Result<(), GuardError> {
        self.tickets.verify(token, ip, user_agent)
    }

    /// Drop stale tickets and rate windows.
    pub fn sweep(&self) {
        self.tickets.purge_stale();
        self.rate.prune();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_counts_toward_rate_limit() {
        let guard = AbuseGuard::new(&GuardConfig {
            secret: Some("s".to_string()),
            ticket_ttl_secs: 60,
            rate_limit: 2,
            ..GuardConfig::default()
        });

        let first = guard.issue("10.0.0.1", "agent/1.0").unwrap();
        guard.issue("10.0.0.1", "agent/1.0").unwrap();
        let err = guard.issue("10.0.0.1", "agent/1.0").unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");

        guard.redeem(&first.token, "10.0.0.1", "agent/1.0").unwrap();
    }
}
