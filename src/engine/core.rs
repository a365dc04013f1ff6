// 12.1 engine/core.rs: the market. all settled and pending state lives here; every mutating
// call stages its changes in a Context (context.rs) and commits them at the end.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::checkpoint::Checkpoint;
use crate::events::{
    Event, EventId, EventPayload, OracleUpdatedEvent, ParameterKind, ParameterUpdatedEvent,
};
use crate::global::{Global, Local};
use crate::guarantee::Guarantee;
use crate::oracle::{Oracle, OracleProvider, OracleVersion};
use crate::order::Order;
use crate::params::{MarketParameter, RiskParameter};
use crate::position::Position;
use crate::registry::Registry;
use crate::storage::Stored;
use crate::types::{AccountId, Timestamp};
use crate::version::Version;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// One pending version for one scope. Referrer fields are only set on account entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingEntry {
    pub order: Order,
    pub guarantee: Guarantee,
    /// Earns the order's referral share.
    pub referrer: Option<AccountId>,
    /// Earns the solver share of an intent's referral.
    pub solver: Option<AccountId>,
    /// Earns the liquidation fee of a protected order.
    pub liquidator: Option<AccountId>,
}

impl PendingEntry {
    pub fn fresh(timestamp: Timestamp) -> Self {
        Self {
            order: Order::fresh(timestamp),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountState {
    pub local: Local,
    pub position: Position,
    /// Latest checkpoint; older ones are kept in the market's history.
    pub checkpoint: Checkpoint,
    pub pending: BTreeMap<u64, PendingEntry>,
}

/** 12.1.1: the market. one oracle, one parameter set, any number of accounts */
#[derive(Debug)]
pub struct Market {
    pub(super) config: EngineConfig,
    pub(super) registry: Arc<Registry>,
    pub(super) oracle: Oracle,
    pub(super) parameter: MarketParameter,
    pub(super) risk: RiskParameter,
    pub(super) global: Global,
    pub(super) position: Position,
    pub(super) pending: BTreeMap<u64, PendingEntry>,
    pub(super) versions: BTreeMap<Timestamp, Version>,
    pub(super) accounts: HashMap<AccountId, AccountState>,
    pub(super) checkpoints: HashMap<AccountId, BTreeMap<Timestamp, Checkpoint>>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl Market {
    pub fn new(
        config: EngineConfig,
        registry: Arc<Registry>,
        provider: Arc<dyn OracleProvider>,
        parameter: MarketParameter,
        risk: RiskParameter,
    ) -> Result<Self, EngineError> {
        parameter.validate()?;
        Stored::validate(&parameter)?;
        risk.validate()?;

        let mut versions = BTreeMap::new();
        versions.insert(Timestamp::ZERO, Version::default());

        info!(provider = provider.id().0, "market created");
        Ok(Self {
            config,
            registry,
            oracle: Oracle::new(provider),
            parameter,
            risk,
            global: Global::default(),
            position: Position::default(),
            pending: BTreeMap::new(),
            versions,
            accounts: HashMap::new(),
            checkpoints: HashMap::new(),
            events: Vec::new(),
            next_event_id: 1,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    pub fn parameter(&self) -> &MarketParameter {
        &self.parameter
    }

    pub fn risk(&self) -> &RiskParameter {
        &self.risk
    }

    pub fn global(&self) -> &Global {
        &self.global
    }

    /// Settled market position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn local(&self, account: AccountId) -> Local {
        self.accounts
            .get(&account)
            .map(|state| state.local)
            .unwrap_or_default()
    }

    /// Settled position of one account.
    pub fn position_of(&self, account: AccountId) -> Position {
        self.accounts
            .get(&account)
            .map(|state| state.position)
            .unwrap_or_default()
    }

    pub fn pending_order(&self, id: u64) -> Option<Order> {
        self.pending.get(&id).map(|entry| entry.order)
    }

    pub fn pending_guarantee(&self, id: u64) -> Option<Guarantee> {
        self.pending.get(&id).map(|entry| entry.guarantee)
    }

    pub fn pending_order_of(&self, account: AccountId, id: u64) -> Option<Order> {
        self.pending_entry_of(account, id).map(|entry| entry.order)
    }

    pub fn pending_guarantee_of(&self, account: AccountId, id: u64) -> Option<Guarantee> {
        self.pending_entry_of(account, id).map(|entry| entry.guarantee)
    }

    pub fn pending_entry_of(&self, account: AccountId, id: u64) -> Option<PendingEntry> {
        self.accounts
            .get(&account)
            .and_then(|state| state.pending.get(&id))
            .copied()
    }

    pub fn version_at(&self, timestamp: Timestamp) -> Option<Version> {
        self.versions.get(&timestamp).copied()
    }

    pub fn checkpoint_at(&self, account: AccountId, timestamp: Timestamp) -> Option<Checkpoint> {
        self.checkpoints
            .get(&account)
            .and_then(|history| history.get(&timestamp))
            .copied()
    }

    /// Market version and account checkpoint at `timestamp`, zero where nothing settled.
    pub fn at(&self, account: AccountId, timestamp: Timestamp) -> (Version, Checkpoint) {
        (
            self.version_at(timestamp).unwrap_or_default(),
            self.checkpoint_at(account, timestamp).unwrap_or_default(),
        )
    }

    pub fn latest(&self) -> OracleVersion {
        self.oracle.latest()
    }

    pub fn accounts(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.accounts.keys().copied()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    // 12.1.2: admin. changes apply from the next call on
    pub fn update_parameter(
        &mut self,
        sender: AccountId,
        parameter: MarketParameter,
    ) -> Result<(), EngineError> {
        self.registry.only_coordinator(sender)?;
        parameter.validate()?;
        Stored::validate(&parameter)?;

        info!(closed = parameter.closed, settle = parameter.settle, "market parameter updated");
        self.parameter = parameter;
        self.emit_event(EventPayload::ParameterUpdated(ParameterUpdatedEvent {
            kind: ParameterKind::Market,
            sender,
        }));
        Ok(())
    }

    pub fn update_risk(&mut self, sender: AccountId, risk: RiskParameter) -> Result<(), EngineError> {
        self.registry.only_coordinator(sender)?;
        risk.validate()?;

        info!("risk parameter updated");
        self.risk = risk;
        self.emit_event(EventPayload::ParameterUpdated(ParameterUpdatedEvent {
            kind: ParameterKind::Risk,
            sender,
        }));
        Ok(())
    }

    pub fn update_oracle(
        &mut self,
        sender: AccountId,
        provider: Arc<dyn OracleProvider>,
    ) -> Result<(), EngineError> {
        self.registry.only_owner(sender)?;
        let id = provider.id();
        self.oracle.update(provider)?;
        self.emit_event(EventPayload::OracleUpdated(OracleUpdatedEvent { provider: id }));
        Ok(())
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(
            EventId(self.next_event_id),
            self.oracle.current_timestamp(),
            payload,
        );
        self.next_event_id += 1;
        if self.config.log_events {
            debug!(id = event.id.0, payload = ?event.payload, "event");
        }
        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let excess = self.events.len() - self.config.max_events;
            self.events.drain(0..excess);
        }
    }
}
