//! Single-use keyed-hash admission tickets

use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ipaforge_config::GuardConfig;
use ipaforge_errors::GuardError;
use sha2::{Digest, Sha256};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// An issued ticket, handed to the client and presented back on the
/// job-initiating request.
#[derive(Clone, Debug)]
pub struct Ticket {
    /// Opaque token carrying the nonce and signature.
    pub token: String,
    /// Unix-second expiry, for surfacing to the client.
    pub expires_at: u64,
}

struct TicketEntry {
    ip_hash: String,
    ua_hash: String,
    issued_at: u64,
    expires_at: u64,
    used_at: Option<u64>,
}

/// Issues and redeems single-use tickets bound to the requesting
/// client's address and user agent.
pub struct TicketGuard {
    secret: Option<String>,
    ttl_secs: u64,
    purge_after_secs: u64,
    entries: DashMap<String, TicketEntry>,
}

impl TicketGuard {
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            ttl_secs: config.ticket_ttl_secs,
            purge_after_secs: config.purge_after_secs,
            entries: DashMap::new(),
        }
    }

    /// Issue a fresh ticket bound to `ip` and `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns `MissingSecret` when no signing secret is configured.
    pub fn issue(&self, ip: &str, user_agent: &str) -> Result<Ticket, GuardError> {
        let secret = self.secret.as_deref().ok_or(GuardError::MissingSecret)?;
        self.purge_stale();

        let nonce = Uuid::new_v4().simple().to_string();
        let issued_at = unix_now();
        let expires_at = issued_at + self.ttl_secs;
        let ip_hash = client_hash(ip);
        let ua_hash = client_hash(user_agent);

        let signature = sign(
            secret, &ip_hash, &ua_hash, issued_at, expires_at, &nonce,
        )?;
        self.entries.insert(
            nonce.clone(),
            TicketEntry {
                ip_hash,
                ua_hash,
                issued_at,
                expires_at,
                used_at: None,
            },
        );

        Ok(Ticket {
            token: format!("{nonce}.{signature}"),
            expires_at,
        })
    }

    /// Redeem a ticket, consuming it on success.
    ///
    /// Rejections are checked in a fixed order so each failure mode
    /// reports its own code: unknown ticket, forged signature, expiry,
    /// client mismatch, reuse.
    ///
    /// # Errors
    ///
    /// Returns the matching `GuardError` variant for each rejection.
    pub fn verify(&self, token: &str, ip: &str, user_agent: &str) -> Result<(), GuardError> {
        let secret = self.secret.as_deref().ok_or(GuardError::MissingSecret)?;
        let (nonce, signature) = token.split_once('.').ok_or(GuardError::TicketNotFound)?;

        let mut entry = self
            .entries
            .get_mut(nonce)
            .ok_or(GuardError::TicketNotFound)?;

        verify_signature(
            secret,
            &entry.ip_hash,
            &entry.ua_hash,
            entry.issued_at,
            entry.expires_at,
            nonce,
            signature,
        )?;

        let now = unix_now();
        if now >= entry.expires_at {
            return Err(GuardError::Expired);
        }
        if entry.ip_hash != client_hash(ip) || entry.ua_hash != client_hash(user_agent) {
            return Err(GuardError::ClientMismatch);
        }
        if entry.used_at.is_some() {
            return Err(GuardError::AlreadyUsed);
        }

        entry.used_at = Some(now);
        Ok(())
    }

    /// Remove entries past their purge deadline. Used tickets linger
    /// briefly so reuse still reports `AlreadyUsed` rather than
    /// `TicketNotFound`.
    pub fn purge_stale(&self) {
        let now = unix_now();
        let grace = self.purge_after_secs;
        self.entries.retain(|_, entry| {
            let deadline = match entry.used_at {
                Some(used_at) => used_at + grace,
                None => entry.expires_at + grace,
            };
            now < deadline
        });
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn client_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn sign(
    secret: &str,
    ip_hash: &str,
    ua_hash: &str,
    issued_at: u64,
    expires_at: u64,
    nonce: &str,
) -> Result<String, GuardError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GuardError::MissingSecret)?;
    mac.update(payload(ip_hash, ua_hash, issued_at, expires_at, nonce).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[allow(clippy::too_many_arguments)]
fn verify_signature(
    secret: &str,
    ip_hash: &str,
    ua_hash: &str,
    issued_at: u64,
    expires_at: u64,
    nonce: &str,
    signature: &str,
) -> Result<(), GuardError> {
    let raw = hex::decode(signature).map_err(|_| GuardError::BadSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GuardError::MissingSecret)?;
    mac.update(payload(ip_hash, ua_hash, issued_at, expires_at, nonce).as_bytes());
    mac.verify_slice(&raw).map_err(|_| GuardError::BadSignature)
}

fn payload(ip_hash: &str, ua_hash: &str, issued_at: u64, expires_at: u64, nonce: &str) -> String {
    format!("{ip_hash}|{ua_hash}|{issued_at}|{expires_at}|{nonce}")
}
