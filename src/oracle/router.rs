// 9.4 router.rs: the market's single oracle. holds a list of provider epochs and hands
// authority from the old provider to the new one once the new one has produced a version
// past the handoff point. until then reads are served by the old provider, so the latest
// version never moves backward across a switch.

use super::provider::{OracleError, OracleProvider};
use super::version::{OracleReceipt, OracleVersion};
use crate::types::{AccountId, Timestamp};
use std::sync::Arc;
use tracing::info;

// one provider's term. `timestamp` is the last timestamp the provider is authoritative for,
// refreshed on every request it serves.
#[derive(Debug, Clone)]
struct Epoch {
    provider: Arc<dyn OracleProvider>,
    timestamp: Timestamp,
}

/// Oracle router. Epochs are numbered from 1; `current` is the newest epoch and `latest`
/// the newest one whose versions the engine may read as latest.
#[derive(Debug)]
pub struct Oracle {
    epochs: Vec<Epoch>,
    latest: usize,
}

impl Oracle {
    /// Router whose first epoch is `provider`, authoritative from the start.
    pub fn new(provider: Arc<dyn OracleProvider>) -> Self {
        let timestamp = provider.current();
        info!(provider = provider.id().0, handoff = %timestamp, "oracle provider installed");
        Self {
            epochs: vec![Epoch {
                provider,
                timestamp,
            }],
            latest: 1,
        }
    }

    fn current(&self) -> usize {
        self.epochs.len()
    }

    fn epoch(&self, index: usize) -> &Epoch {
        &self.epochs[index - 1]
    }

    pub fn is_initialized(&self) -> bool {
        !self.epochs.is_empty()
    }

    /// Switch to a new provider. Fails if the previous handoff has not completed.
    pub fn update(&mut self, provider: Arc<dyn OracleProvider>) -> Result<(), OracleError> {
        let current = self.current();
        if current != self.latest {
            return Err(OracleError::OutOfSync);
        }

        // the outgoing provider stays authoritative through its latest version
        if current != 0 {
            let outgoing = self.epochs[current - 1].provider.latest();
            let epoch = &mut self.epochs[current - 1];
            if outgoing.timestamp > epoch.timestamp {
                epoch.timestamp = outgoing.timestamp;
            }
        }

        let timestamp = provider.current();
        let id = provider.id();
        self.epochs.push(Epoch {
            provider,
            timestamp,
        });
        let incoming = self.epoch(self.current()).provider.latest();
        self.update_latest(&incoming);

        info!(
            provider = id.0,
            epoch = self.current(),
            handoff = %timestamp,
            "oracle provider updated"
        );
        Ok(())
    }

    /// Latest version the engine may settle against and the timestamp new orders land on.
    pub fn status(&self) -> (OracleVersion, Timestamp) {
        if !self.is_initialized() {
            return (OracleVersion::default(), Timestamp::ZERO);
        }
        let (latest, current) = self.epoch(self.current()).provider.status();
        (self.handle_latest(latest), current)
    }

    pub fn latest(&self) -> OracleVersion {
        self.status().0
    }

    pub fn current_timestamp(&self) -> Timestamp {
        self.status().1
    }

    /// Route a request to whichever provider owns the current timestamp.
    pub fn request(&mut self, account: AccountId) -> Result<(), OracleError> {
        if !self.is_initialized() {
            return Err(OracleError::NotInitialized);
        }
        let current = self.current();
        let (latest_version, current_timestamp) = self.epoch(current).provider.status();

        let target = if current_timestamp > self.epoch(self.latest).timestamp {
            current
        } else {
            self.latest
        };
        self.epoch(target).provider.request(account)?;

        self.epochs[current - 1].timestamp = current_timestamp;
        self.update_latest(&latest_version);
        Ok(())
    }

    /// Version at exactly `timestamp`, served by the provider whose epoch covers it.
    pub fn at(&self, timestamp: Timestamp) -> (OracleVersion, OracleReceipt) {
        if timestamp.is_zero() || !self.is_initialized() {
            return (OracleVersion::default(), OracleReceipt::default());
        }
        let mut provider = &self.epoch(self.current()).provider;
        for index in (1..self.current()).rev() {
            let epoch = self.epoch(index);
            if timestamp > epoch.timestamp {
                break;
            }
            provider = &epoch.provider;
        }
        provider.at(timestamp)
    }

    fn update_latest(&mut self, current_latest: &OracleVersion) {
        if self.latest_stale(current_latest) {
            self.latest = self.current();
        }
    }

    // hand off once the outgoing provider reached its epoch end and the incoming one has a
    // version past it
    fn latest_stale(&self, current_latest: &OracleVersion) -> bool {
        if self.current() == self.latest {
            return false;
        }
        if self.latest == 0 {
            return true;
        }
        let outgoing = self.epoch(self.latest);
        if outgoing.timestamp > outgoing.provider.latest().timestamp {
            return false;
        }
        if outgoing.timestamp >= current_latest.timestamp {
            return false;
        }
        true
    }

    fn handle_latest(&self, current_latest: OracleVersion) -> OracleVersion {
        if self.current() == self.latest {
            return current_latest;
        }
        if self.latest_stale(&current_latest) {
            return current_latest;
        }

        let outgoing = self.epoch(self.latest);
        let version = outgoing.provider.latest();
        if version.timestamp > outgoing.timestamp {
            return self.at(outgoing.timestamp).0;
        }
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::Fixed6;
    use crate::oracle::{KeeperConfig, KeeperProvider};
    use crate::types::ProviderId;

    fn keeper(id: u32) -> KeeperProvider {
        KeeperProvider::new(ProviderId(id), KeeperConfig::default())
    }

    #[test]
    fn single_provider_passes_through() {
        let a = keeper(1);
        a.set_time(Timestamp::from_secs(995));
        let mut oracle = Oracle::new(Arc::new(a.clone()));

        oracle.request(AccountId(1)).unwrap();
        a.set_time(Timestamp::from_secs(1001));
        a.commit(Timestamp::from_secs(1000), Fixed6::from_int(999)).unwrap();

        let (latest, current) = oracle.status();
        assert_eq!(latest, OracleVersion::valid(Timestamp::from_secs(1000), Fixed6::from_int(999)));
        assert_eq!(current, Timestamp::from_secs(1010));
    }

    #[test]
    fn fresh_router_accepts_a_switch() {
        let a = keeper(1);
        a.set_time(Timestamp::from_secs(995));
        let mut oracle = Oracle::new(Arc::new(a.clone()));
        assert!(oracle.is_initialized());
        assert_eq!(oracle.latest(), a.latest());
        assert_eq!(oracle.current_timestamp(), Timestamp::from_secs(1000));

        let b = keeper(2);
        b.set_time(Timestamp::from_secs(995));
        assert!(oracle.update(Arc::new(b)).is_ok());
    }

    #[test]
    fn at_zero_is_invalid() {
        let oracle = Oracle::new(Arc::new(keeper(1)));
        let (version, receipt) = oracle.at(Timestamp::ZERO);
        assert!(!version.valid);
        assert_eq!(receipt, OracleReceipt::default());
    }

    #[test]
    fn handoff_keeps_old_latest_until_new_provider_is_requested() {
        let a = keeper(1);
        a.set_time(Timestamp::from_secs(995));
        let mut oracle = Oracle::new(Arc::new(a.clone()));
        oracle.request(AccountId(1)).unwrap();
        a.set_time(Timestamp::from_secs(1001));
        a.commit(Timestamp::from_secs(1000), Fixed6::from_int(999)).unwrap();

        // B's clock has not started
        let b = keeper(2);
        oracle.update(Arc::new(b.clone())).unwrap();

        let (latest, current) = oracle.status();
        assert_eq!(latest, OracleVersion::valid(Timestamp::from_secs(1000), Fixed6::from_int(999)));
        assert_eq!(current, Timestamp::ZERO);

        // a second switch before the handoff completes is rejected
        assert_eq!(oracle.update(Arc::new(keeper(3))), Err(OracleError::OutOfSync));
    }

    #[test]
    fn handoff_completes_once_new_provider_commits_past_boundary() {
        let a = keeper(1);
        a.set_time(Timestamp::from_secs(995));
        let mut oracle = Oracle::new(Arc::new(a.clone()));
        oracle.request(AccountId(1)).unwrap();
        a.set_time(Timestamp::from_secs(1001));
        a.commit(Timestamp::from_secs(1000), Fixed6::from_int(999)).unwrap();

        let b = keeper(2);
        b.set_time(Timestamp::from_secs(1001));
        oracle.update(Arc::new(b.clone())).unwrap();

        // request lands on B at 1010
        oracle.request(AccountId(1)).unwrap();
        assert_eq!(b.outstanding(), vec![Timestamp::from_secs(1010)]);

        // old versions still route to A
        assert_eq!(oracle.at(Timestamp::from_secs(1000)).0.price, Fixed6::from_int(999));

        b.set_time(Timestamp::from_secs(1011));
        b.commit(Timestamp::from_secs(1010), Fixed6::from_int(1001)).unwrap();
        assert_eq!(oracle.latest().price, Fixed6::from_int(1001));

        // next request promotes B to latest; a further switch is allowed
        oracle.request(AccountId(1)).unwrap();
        assert!(oracle.update(Arc::new(keeper(3))).is_ok());
    }

    #[test]
    fn latest_never_regresses_across_handoff() {
        let a = keeper(1);
        a.set_time(Timestamp::from_secs(995));
        let mut oracle = Oracle::new(Arc::new(a.clone()));
        oracle.request(AccountId(1)).unwrap();
        a.set_time(Timestamp::from_secs(1001));
        a.commit(Timestamp::from_secs(1000), Fixed6::from_int(999)).unwrap();
        let before = oracle.latest().timestamp;

        let b = keeper(2);
        b.set_time(Timestamp::from_secs(1001));
        oracle.update(Arc::new(b)).unwrap();
        assert!(oracle.latest().timestamp >= before);
    }
}
