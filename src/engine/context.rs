// 12.2 engine/context.rs: staging for one call. a call loads the state it touches into a
// Context, mutates only the context, and commits once every write has been validated.
// nothing reaches the market if any step fails.

use super::core::{AccountState, Market, PendingEntry};
use super::results::EngineError;
use crate::checkpoint::Checkpoint;
use crate::events::EventPayload;
use crate::fixed::UFixed6;
use crate::global::Global;
use crate::oracle::OracleVersion;
use crate::position::Position;
use crate::storage::Stored;
use crate::types::{AccountId, Timestamp};
use crate::version::Version;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
pub(super) struct Context {
    pub latest: OracleVersion,
    pub current: Timestamp,
    pub global: Global,
    pub position: Position,
    pub pending: BTreeMap<u64, PendingEntry>,
    /// Versions settled during this call.
    pub versions: BTreeMap<Timestamp, Version>,
    pub accounts: BTreeMap<AccountId, AccountState>,
    pub checkpoints: Vec<(AccountId, Timestamp, Checkpoint)>,
    /// First account whose order needs an oracle version at `current`. Every order in a
    /// call lands on the same timestamp, so one request covers them all.
    pub request: Option<AccountId>,
    pub events: Vec<EventPayload>,
}

impl Context {
    pub fn account_mut(&mut self, account: AccountId) -> &mut AccountState {
        self.accounts.entry(account).or_default()
    }
}

impl Market {
    pub(super) fn load(&self) -> Context {
        let (latest, current) = self.oracle.status();
        Context {
            latest,
            current,
            global: self.global,
            position: self.position,
            pending: self.pending.clone(),
            versions: BTreeMap::new(),
            accounts: BTreeMap::new(),
            checkpoints: Vec::new(),
            request: None,
            events: Vec::new(),
        }
    }

    pub(super) fn load_account(&self, ctx: &mut Context, account: AccountId) {
        if !ctx.accounts.contains_key(&account) {
            let state = self.accounts.get(&account).cloned().unwrap_or_default();
            ctx.accounts.insert(account, state);
        }
    }

    // staged versions shadow stored ones
    pub(super) fn version(&self, ctx: &Context, timestamp: Timestamp) -> Result<Version, EngineError> {
        ctx.versions
            .get(&timestamp)
            .or_else(|| self.versions.get(&timestamp))
            .copied()
            .ok_or(EngineError::VersionNotFound(timestamp))
    }

    /// The newest version strictly before `timestamp`.
    pub(super) fn version_before(&self, ctx: &Context, timestamp: Timestamp) -> Version {
        let staged = ctx.versions.range(..timestamp).next_back();
        let stored = self.versions.range(..timestamp).next_back();
        match (staged, stored) {
            (Some((a, staged)), Some((b, stored))) => {
                if a >= b {
                    *staged
                } else {
                    *stored
                }
            }
            (Some((_, version)), None) | (None, Some((_, version))) => *version,
            (None, None) => Version::default(),
        }
    }

    pub(super) fn credit(ctx: &mut Context, account: Option<AccountId>, amount: UFixed6) {
        if let Some(account) = account {
            if !amount.is_zero() {
                ctx.account_mut(account).local.credit(amount);
            }
        }
    }

    fn validate(ctx: &Context) -> Result<(), EngineError> {
        ctx.global.validate()?;
        ctx.position.validate()?;
        for entry in ctx.pending.values() {
            entry.order.validate()?;
            entry.guarantee.validate()?;
        }
        for version in ctx.versions.values() {
            version.validate()?;
        }
        for state in ctx.accounts.values() {
            state.local.validate()?;
            state.position.validate()?;
            state.checkpoint.validate()?;
            for entry in state.pending.values() {
                entry.order.validate()?;
                entry.guarantee.validate()?;
            }
        }
        for (_, _, checkpoint) in &ctx.checkpoints {
            checkpoint.validate()?;
        }
        Ok(())
    }

    pub(super) fn commit(&mut self, ctx: Context) -> Result<(), EngineError> {
        Self::validate(&ctx)?;
        // the only fallible step after validation, taken before anything is written
        if let Some(account) = ctx.request {
            self.oracle.request(account)?;
        }

        let Context {
            global,
            position,
            pending,
            versions,
            accounts,
            checkpoints,
            events,
            ..
        } = ctx;

        debug!(
            latest_id = global.latest_id,
            current_id = global.current_id,
            versions = versions.len(),
            accounts = accounts.len(),
            "committing"
        );
        self.global = global;
        self.position = position;
        self.pending = pending;
        self.versions.extend(versions);
        for (account, state) in accounts {
            self.accounts.insert(account, state);
        }
        for (account, timestamp, checkpoint) in checkpoints {
            self.checkpoints
                .entry(account)
                .or_default()
                .insert(timestamp, checkpoint);
        }
        for payload in events {
            self.emit_event(payload);
        }
        Ok(())
    }
}
