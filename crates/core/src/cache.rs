use chrono::{DateTime, Duration, Utc};

/// A value paired with an explicit expiry instant.
///
/// Replaces module-level caches: the owner holds the `Cached` value and asks
/// `is_valid(now)` with its own clock, so expiry stays deterministic in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    /// Wrap a value that expires at the given instant.
    #[must_use]
    pub fn new(value: T, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// Wrap a value valid for `ttl` from `now`.
    #[must_use]
    pub fn with_ttl(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::new(value, now + ttl)
    }

    /// Returns true while the value has not expired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Returns the value if it is still valid at `now`.
    #[must_use]
    pub fn get(&self, now: DateTime<Utc>) -> Option<&T> {
        self.is_valid(now).then_some(&self.value)
    }

    /// Returns the value regardless of expiry.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn valid_until_expiry() {
        let now = fixed_now();
        let cached = Cached::with_ttl(42, now, Duration::minutes(5));

        assert!(cached.is_valid(now));
        assert!(cached.is_valid(now + Duration::minutes(4)));
        assert!(!cached.is_valid(now + Duration::minutes(5)));
        assert_eq!(cached.get(now), Some(&42));
        assert_eq!(cached.get(now + Duration::minutes(6)), None);
    }
}
