//! Wall-clock access for request timestamps and expiry.

use chrono::{DateTime, Duration, Utc};

/// Source of the current time. Every timestamp a command records comes from
/// here, so tests pin it with a fixed implementation.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// The submission time at or before which a request of age `max_age`
    /// counts as stale. Saturates at the earliest representable instant.
    fn cutoff(&self, max_age: Duration) -> DateTime<Utc> {
        self.now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Pinned(DateTime<Utc>);

    impl Clock for Pinned {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_cutoff_subtracts_max_age() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let clock = Pinned(now);

        assert_eq!(
            clock.cutoff(Duration::hours(1)),
            Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
        );
        assert_eq!(clock.cutoff(Duration::zero()), now);
    }

    #[test]
    fn test_cutoff_saturates_for_huge_ages() {
        let clock = Pinned(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());

        assert_eq!(clock.cutoff(Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
