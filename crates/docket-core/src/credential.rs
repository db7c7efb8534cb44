//! Upstream credential records.
//!
//! A credential is the auth/session token pair obtained from the upstream
//! login endpoint. Exactly one persisted credential per subject is
//! authoritative at a time; older rows are superseded on save, never merged.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A persisted upstream credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Upstream account the credential belongs to.
    pub subject: String,
    /// Static secret used for the login call. Stored alongside the tokens
    /// so renewal does not need external configuration at read time.
    pub secret: String,
    /// Auth token returned by the login endpoint.
    pub auth_key: String,
    /// Session token returned by the login endpoint.
    pub session_id: String,
    /// Instant after which the credential is no longer usable.
    pub expires_at: OffsetDateTime,
}

impl Credential {
    /// Whether the credential is still usable at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }

    /// Hours remaining until expiry at `now`, rounded to two decimals.
    /// Negative once the credential has expired.
    #[must_use]
    pub fn remaining_hours(&self, now: OffsetDateTime) -> f64 {
        let remaining = self.expires_at - now;
        (remaining.as_seconds_f64() / 3600.0 * 100.0).round() / 100.0
    }
}

/// Read-only login state report, derived from persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginStatus {
    /// Subject the report covers.
    pub subject: String,
    /// Whether a non-expired credential is persisted for the subject.
    pub logged_in: bool,
    /// Whether the running process currently holds a credential in memory.
    pub has_valid_session: bool,
    /// Expiry of the persisted credential, when one exists.
    pub expires_at: Option<OffsetDateTime>,
    /// Hours until the persisted credential expires; zero when none exists.
    pub remaining_hours: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn credential(expires_at: OffsetDateTime) -> Credential {
        Credential {
            subject: "worker".into(),
            secret: "s3cret".into(),
            auth_key: "ak".into(),
            session_id: "sid".into(),
            expires_at,
        }
    }

    #[test]
    fn validity_is_strict() {
        let now = datetime!(2025-06-01 12:00 UTC);
        assert!(credential(datetime!(2025-06-01 12:00:01 UTC)).is_valid_at(now));
        assert!(!credential(now).is_valid_at(now));
        assert!(!credential(datetime!(2025-06-01 11:59 UTC)).is_valid_at(now));
    }

    #[test]
    fn remaining_hours_rounds_to_two_decimals() {
        let now = datetime!(2025-06-01 12:00 UTC);
        let cred = credential(now + time::Duration::minutes(90));
        assert_eq!(cred.remaining_hours(now), 1.5);

        let cred = credential(now + time::Duration::seconds(10 * 3600 + 18));
        assert_eq!(cred.remaining_hours(now), 10.01);
    }
}
