//! Upstream message classification
//!
//! The storefront reports failures through human-readable message
//! fields, so outcome classification substring-matches a fixed marker
//! vocabulary. The table lives here and nowhere else; upstream wording
//! is not a stable contract, and any wording change should only ever
//! require touching this module.

/// Markers indicating the account needs a second factor.
const SECOND_FACTOR_MARKERS: &[&str] = &["mfa", "two-factor", "code", "hsa"];

/// Markers indicating the account holds no license for the package.
const NOT_OWNED_MARKERS: &[&str] = &["not found", "client not found"];

/// Classified failure kind for a storefront response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The caller must resubmit with a second-factor code.
    SecondFactor,
    /// The account has no purchase record for this package.
    NotOwned,
    /// Anything else; surfaced with the upstream message.
    Other,
}

/// Classify the message/authType fields of a failed storefront response.
///
/// Matching is case-insensitive. Not-owned markers are checked first:
/// "client not found" must not fall into the second-factor bucket via
/// its unrelated wording.
#[must_use]
pub fn classify_failure(fields: &[&str]) -> FailureKind {
    let lowered: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();

    if lowered
        .iter()
        .any(|f| NOT_OWNED_MARKERS.iter().any(|m| f.contains(m)))
    {
        return FailureKind::NotOwned;
    }

    if lowered
        .iter()
        .any(|f| SECOND_FACTOR_MARKERS.iter().any(|m| f.contains(m)))
    {
        return FailureKind::SecondFactor;
    }

    FailureKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_factor_markers_match_case_insensitively() {
        assert_eq!(
            classify_failure(&["Please enter your Two-Factor code"]),
            FailureKind::SecondFactor
        );
        assert_eq!(classify_failure(&["", "HSA"]), FailureKind::SecondFactor);
        assert_eq!(classify_failure(&["MFA required"]), FailureKind::SecondFactor);
    }

    #[test]
    fn not_owned_wins_over_second_factor() {
        // "client not found" also contains no 2FA marker, but guard the
        // priority anyway for messages carrying both vocabularies.
        assert_eq!(
            classify_failure(&["Client not found; enter code"]),
            FailureKind::NotOwned
        );
        assert_eq!(classify_failure(&["Item not found"]), FailureKind::NotOwned);
    }

    #[test]
    fn unknown_messages_are_other() {
        assert_eq!(classify_failure(&["internal error"]), FailureKind::Other);
        assert_eq!(classify_failure(&[]), FailureKind::Other);
    }
}
