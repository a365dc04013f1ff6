// 9.2: what the engine needs from a price provider. adapters for specific oracle networks
// implement this; the engine never sees their wire formats.

use super::version::{OracleReceipt, OracleVersion};
use crate::fixed::Fixed6;
use crate::types::{AccountId, ProviderId, Timestamp};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle out of sync: previous provider has not reached its handoff point")]
    OutOfSync,

    #[error("oracle has no provider")]
    NotInitialized,

    #[error("provider clock has not started")]
    ClockNotStarted,

    #[error("version at {0} was never requested")]
    NotRequested(Timestamp),

    #[error("version at {timestamp} must wait for outstanding request at {outstanding}")]
    OutOfOrder {
        timestamp: Timestamp,
        outstanding: Timestamp,
    },

    #[error("version at {timestamp} is not newer than latest {latest}")]
    NotNewer {
        timestamp: Timestamp,
        latest: Timestamp,
    },

    #[error("version at {0} cannot be committed before its timestamp")]
    NotFinal(Timestamp),

    #[error("request at {0} has not timed out")]
    NotExpired(Timestamp),

    #[error("invalid price {0}")]
    InvalidPrice(Fixed6),
}

/// Price provider capability set.
///
/// `request` takes `&self`: providers are shared with the keepers that commit to them, so
/// implementations keep their state behind a lock.
pub trait OracleProvider: fmt::Debug + Send + Sync {
    fn id(&self) -> ProviderId;

    /// Latest committed valid version and the timestamp the next request would land on.
    fn status(&self) -> (OracleVersion, Timestamp);

    fn latest(&self) -> OracleVersion {
        self.status().0
    }

    fn current(&self) -> Timestamp {
        self.status().1
    }

    /// Version and receipt at exactly `timestamp`; invalid and zero-fee when nothing was
    /// committed there.
    fn at(&self, timestamp: Timestamp) -> (OracleVersion, OracleReceipt);

    /// Ask for a version at the current timestamp.
    fn request(&self, account: AccountId) -> Result<(), OracleError>;
}
