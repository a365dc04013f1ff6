// 1.0: the primitives. ids, timestamps and exposure classes.
// each is a newtype so the compiler catches type mixups.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProviderId(pub u32);

// Exposure classes. makers back takers; longs and shorts net against each other first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Maker,
    Long,
    Short,
}

impl Side {
    pub fn is_taker(&self) -> bool {
        !matches!(self, Side::Maker)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Maker => Side::Maker,
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

// 1.1: oracle timestamp in seconds. versions are keyed by it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    // seconds elapsed since `earlier`, zero if `earlier` is later
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(self.0 as i64, 0) {
            Some(dt) if self.0 > 1_000_000_000 => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            _ => write!(f, "t={}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_since_saturates() {
        let a = Timestamp::from_secs(100);
        let b = Timestamp::from_secs(160);
        assert_eq!(b.since(a), 60);
        assert_eq!(a.since(b), 0);
    }

    #[test]
    fn side_opposites() {
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert_eq!(Side::Short.opposite(), Side::Long);
        assert!(!Side::Maker.is_taker());
        assert!(Side::Short.is_taker());
    }

    #[test]
    fn small_timestamps_display_raw() {
        assert_eq!(Timestamp::from_secs(1000).to_string(), "t=1000");
    }
}
