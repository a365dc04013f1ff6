// 9.3 keeper.rs: in-memory keeper-fed provider. requests land on granularity boundaries,
// keepers commit prices for them in order, and requests nobody fulfilled before the timeout
// are expired into invalid versions.

use super::provider::{OracleError, OracleProvider};
use super::version::{OracleReceipt, OracleVersion};
use crate::fixed::{Fixed6, UFixed6};
use crate::types::{AccountId, ProviderId, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Seconds between request slots.
    pub granularity: u64,
    /// Seconds after which an unfulfilled request may be expired.
    pub timeout: u64,
    /// Keeper fee per requested version, split across the orders settling there.
    pub settlement_fee: UFixed6,
    /// Fraction of the market fee routed to the oracle.
    pub oracle_fee: UFixed6,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            granularity: 10,
            timeout: 60,
            settlement_fee: UFixed6::ZERO,
            oracle_fee: UFixed6::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    now: Timestamp,
    // requested and not yet committed or expired
    outstanding: BTreeSet<Timestamp>,
    // every timestamp ever requested, for receipts
    requested: BTreeMap<Timestamp, Vec<AccountId>>,
    versions: BTreeMap<Timestamp, OracleVersion>,
    latest: OracleVersion,
}

/// Cloning shares the feed: the router holds one handle, keepers and tests another.
#[derive(Debug, Clone)]
pub struct KeeperProvider {
    id: ProviderId,
    config: KeeperConfig,
    state: Arc<RwLock<FeedState>>,
}

impl KeeperProvider {
    pub fn new(id: ProviderId, config: KeeperConfig) -> Self {
        Self {
            id,
            config,
            state: Arc::new(RwLock::new(FeedState::default())),
        }
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Advance the provider clock. The clock never moves backward.
    pub fn set_time(&self, now: Timestamp) {
        let mut state = self.state.write();
        if now > state.now {
            state.now = now;
        }
    }

    pub fn time(&self) -> Timestamp {
        self.state.read().now
    }

    // next granularity boundary strictly after now; zero until the clock starts
    fn current_of(&self, state: &FeedState) -> Timestamp {
        if state.now.is_zero() {
            return Timestamp::ZERO;
        }
        let g = self.config.granularity.max(1);
        Timestamp::from_secs((state.now.as_secs() / g + 1) * g)
    }

    pub fn outstanding(&self) -> Vec<Timestamp> {
        self.state.read().outstanding.iter().copied().collect()
    }

    /// Accounts that asked for a version at `timestamp`, in request order.
    pub fn requesters(&self, timestamp: Timestamp) -> Vec<AccountId> {
        self.state
            .read()
            .requested
            .get(&timestamp)
            .cloned()
            .unwrap_or_default()
    }

    /// Commit a valid price at `timestamp`. Requested timestamps are committed strictly in
    /// order; an unrequested timestamp may be committed once no earlier request is open.
    pub fn commit(&self, timestamp: Timestamp, price: Fixed6) -> Result<(), OracleError> {
        if !price.is_positive() {
            return Err(OracleError::InvalidPrice(price));
        }
        let mut state = self.state.write();
        self.check_commit(&state, timestamp)?;

        let version = OracleVersion::valid(timestamp, price);
        state.outstanding.remove(&timestamp);
        state.versions.insert(timestamp, version);
        state.latest = version;
        debug!(provider = self.id.0, %timestamp, %price, "version committed");
        Ok(())
    }

    /// Resolve a request nobody fulfilled in time as an invalid version.
    pub fn expire(&self, timestamp: Timestamp) -> Result<(), OracleError> {
        let mut state = self.state.write();
        if !state.outstanding.contains(&timestamp) {
            return Err(OracleError::NotRequested(timestamp));
        }
        self.check_commit(&state, timestamp)?;
        if state.now < timestamp.add_secs(self.config.timeout) {
            return Err(OracleError::NotExpired(timestamp));
        }

        let carried = state.latest.price;
        state.outstanding.remove(&timestamp);
        state
            .versions
            .insert(timestamp, OracleVersion::new(timestamp, carried, false));
        warn!(provider = self.id.0, %timestamp, "request expired without a price");
        Ok(())
    }

    fn check_commit(&self, state: &FeedState, timestamp: Timestamp) -> Result<(), OracleError> {
        if timestamp > state.now {
            return Err(OracleError::NotFinal(timestamp));
        }
        let resolved = state.versions.keys().next_back().copied().unwrap_or_default();
        if timestamp <= resolved.max(state.latest.timestamp) {
            return Err(OracleError::NotNewer {
                timestamp,
                latest: resolved.max(state.latest.timestamp),
            });
        }
        if let Some(&outstanding) = state.outstanding.iter().next() {
            if outstanding < timestamp {
                return Err(OracleError::OutOfOrder {
                    timestamp,
                    outstanding,
                });
            }
        }
        Ok(())
    }
}

impl OracleProvider for KeeperProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn status(&self) -> (OracleVersion, Timestamp) {
        let state = self.state.read();
        (state.latest, self.current_of(&state))
    }

    fn at(&self, timestamp: Timestamp) -> (OracleVersion, OracleReceipt) {
        let state = self.state.read();
        let Some(version) = state.versions.get(&timestamp).copied() else {
            return (OracleVersion::invalid(timestamp), OracleReceipt::default());
        };
        let receipt = if version.valid && state.requested.contains_key(&timestamp) {
            OracleReceipt {
                settlement_fee: self.config.settlement_fee,
                oracle_fee: self.config.oracle_fee,
            }
        } else {
            OracleReceipt::default()
        };
        (version, receipt)
    }

    fn request(&self, account: AccountId) -> Result<(), OracleError> {
        let mut state = self.state.write();
        let current = self.current_of(&state);
        if current.is_zero() {
            return Err(OracleError::ClockNotStarted);
        }
        state.outstanding.insert(current);
        state.requested.entry(current).or_default().push(account);
        debug!(provider = self.id.0, %current, %account, "version requested");
        Ok(())
    }
}
