//! Key/value backend contract.
//!
//! Values live under a hierarchical path plus a key, for example
//! `["authorities", "host"]` / `"example.com"`. A value may carry a TTL,
//! after which the backend treats it as absent.

use std::time::Duration;

use bastion_types::CertAuthType;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::BackendError;

/// Path segment under which authorities are stored.
pub const AUTHORITIES_PREFIX: &str = "authorities";

/// Path segment that separates deactivated authorities from active ones.
pub const DEACTIVATED_PREFIX: &str = "deactivated";

/// Storage operations the trust layer depends on.
pub trait Backend: Send + Sync {
    /// Returns the value stored under `path`/`key`.
    fn get_val(&self, path: &[&str], key: &str) -> Result<Bytes, BackendError>;

    /// Returns the live keys directly under `path`, sorted.
    fn get_keys(&self, path: &[&str]) -> Result<Vec<String>, BackendError>;

    /// Creates or replaces a value. `None` keeps it forever.
    fn upsert_val(
        &self,
        path: &[&str],
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError>;

    /// Removes a value. Fails with `NotFound` if nothing is stored.
    fn delete_key(&self, path: &[&str], key: &str) -> Result<(), BackendError>;
}

/// Path of active authorities of one type.
pub fn active_path(auth_type: CertAuthType) -> [&'static str; 2] {
    [AUTHORITIES_PREFIX, auth_type.as_str()]
}

/// Path of deactivated authorities of one type.
pub fn deactivated_path(auth_type: CertAuthType) -> [&'static str; 3] {
    [AUTHORITIES_PREFIX, DEACTIVATED_PREFIX, auth_type.as_str()]
}

/// Time left until `expires`.
///
/// `None` (keep forever) when no expiry is set or it has already passed.
pub fn ttl<C: Clock + ?Sized>(clock: &C, expires: Option<DateTime<Utc>>) -> Option<Duration> {
    let expires = expires?;
    let now = clock.now();
    if expires <= now {
        return None;
    }
    (expires - now).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeDelta, TimeZone};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_ttl_unset_is_forever() {
        assert_eq!(ttl(&FixedClock::new(start()), None), None);
    }

    #[test]
    fn test_ttl_in_past_is_forever() {
        let clock = FixedClock::new(start());
        assert_eq!(ttl(&clock, Some(start() - TimeDelta::seconds(1))), None);
        assert_eq!(ttl(&clock, Some(start())), None);
    }

    #[test]
    fn test_paths() {
        assert_eq!(active_path(CertAuthType::Host), ["authorities", "host"]);
        assert_eq!(
            deactivated_path(CertAuthType::User),
            ["authorities", "deactivated", "user"]
        );
    }

    proptest! {
        #[test]
        fn prop_ttl_matches_remaining_time(secs in 1i64..10_000_000) {
            let clock = FixedClock::new(start());
            let expires = start() + TimeDelta::seconds(secs);
            prop_assert_eq!(
                ttl(&clock, Some(expires)),
                Some(Duration::from_secs(secs.unsigned_abs()))
            );
        }
    }
}
