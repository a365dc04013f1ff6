// 12.3 engine/settle.rs: settlement. pending entries are processed oldest id first, once the
// oracle's latest version has reached their timestamp. the market is always settled before
// any account, so every account entry finds its market version already stored.
// 12.3.1 market side, 12.3.2 account side.

use super::context::Context;
use super::core::{Market, PendingEntry};
use super::results::EngineError;
use crate::checkpoint::{Checkpoint, CheckpointContext};
use crate::events::{AccountPositionProcessedEvent, EventPayload, PositionProcessedEvent};
use crate::guarantee::Guarantee;
use crate::types::AccountId;
use crate::version::VersionContext;
use tracing::debug;

impl Market {
    /// Settle the market and `account` up to the oracle's latest version. Anyone may settle
    /// anyone; with no new versions the call changes nothing.
    pub fn settle(&mut self, account: AccountId) -> Result<(), EngineError> {
        let mut ctx = self.load();
        self.settle_account(&mut ctx, account)?;
        self.commit(ctx)
    }

    pub(super) fn settle_account(
        &self,
        ctx: &mut Context,
        account: AccountId,
    ) -> Result<(), EngineError> {
        self.settle_global(ctx)?;
        self.load_account(ctx, account);
        self.settle_local(ctx, account)
    }

    // 12.3.1
    fn settle_global(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let latest = ctx.latest;
        while let Some((id, entry)) = ctx
            .pending
            .first_key_value()
            .map(|(&id, &entry)| (id, entry))
        {
            if !entry.order.ready(&latest) {
                break;
            }
            ctx.pending.remove(&id);
            self.process_global(ctx, id, entry)?;
        }

        // carry accruals up to the latest price
        if !self.parameter.settle && latest.timestamp > ctx.position.timestamp {
            let id = ctx.global.latest_id;
            self.process_global(ctx, id, PendingEntry::fresh(latest.timestamp))?;
        }
        Ok(())
    }

    fn process_global(
        &self,
        ctx: &mut Context,
        id: u64,
        entry: PendingEntry,
    ) -> Result<(), EngineError> {
        let timestamp = entry.order.timestamp;
        let (oracle_version, receipt) = self.oracle.at(timestamp);
        let (mut order, mut guarantee) = (entry.order, entry.guarantee);
        if !oracle_version.valid {
            order.invalidate();
            guarantee = Guarantee::default();
        }

        let from_position = ctx.position;
        let from_version = self.version(ctx, from_position.timestamp)?;
        let version_ctx = VersionContext {
            from_timestamp: from_position.timestamp,
            from_position: &from_position,
            order: &order,
            guarantee: &guarantee,
            oracle_version: &oracle_version,
            receipt: &receipt,
            parameter: &self.parameter,
            risk: &self.risk,
        };
        let (version, response) = from_version.accumulate(&mut ctx.global, &version_ctx)?;

        ctx.position = from_position.apply(&order)?;
        ctx.global
            .update(id, &response, version.price, &self.parameter, &receipt);
        ctx.versions.insert(timestamp, version);

        debug!(
            id,
            %timestamp,
            valid = version.valid,
            price = %version.price,
            market_fee = %response.market_fee,
            "market version settled"
        );
        ctx.events
            .push(EventPayload::PositionProcessed(PositionProcessedEvent {
                order_id: id,
                timestamp,
                valid: version.valid,
                market_fee: response.market_fee,
                settlement_fee: response.settlement_fee,
            }));
        Ok(())
    }

    // 12.3.2
    fn settle_local(&self, ctx: &mut Context, account: AccountId) -> Result<(), EngineError> {
        let latest = ctx.latest;
        loop {
            let next = ctx
                .account_mut(account)
                .pending
                .iter()
                .next()
                .map(|(&id, &entry)| (id, entry));
            let Some((id, entry)) = next else {
                break;
            };
            if !entry.order.ready(&latest) {
                break;
            }
            ctx.account_mut(account).pending.remove(&id);
            self.process_local(ctx, account, id, entry)?;
        }

        let state = ctx.account_mut(account);
        if !self.parameter.settle && latest.timestamp > state.position.timestamp {
            let id = state.local.latest_id;
            self.process_local(ctx, account, id, PendingEntry::fresh(latest.timestamp))?;
        }
        Ok(())
    }

    fn process_local(
        &self,
        ctx: &mut Context,
        account: AccountId,
        id: u64,
        entry: PendingEntry,
    ) -> Result<(), EngineError> {
        let timestamp = entry.order.timestamp;
        let to_version = self.version(ctx, timestamp)?;
        let (mut order, mut guarantee) = (entry.order, entry.guarantee);
        if !to_version.valid {
            order.invalidate();
            guarantee = Guarantee::default();
        }

        let (from_position, prev_checkpoint) = {
            let state = ctx.account_mut(account);
            (state.position, state.checkpoint)
        };
        let from_version = self.version(ctx, from_position.timestamp)?;
        let prev_version = self.version_before(ctx, timestamp);
        let checkpoint_ctx = CheckpointContext {
            from_position: &from_position,
            order: &order,
            guarantee: &guarantee,
            from_version: &from_version,
            prev_version: &prev_version,
            to_version: &to_version,
            risk: &self.risk,
        };
        let (checkpoint, response) = Checkpoint::accumulate(&prev_checkpoint, &checkpoint_ctx)?;

        let state = ctx.account_mut(account);
        state.position = from_position.apply(&order)?;
        state.local.update(id, response.realized());
        state.checkpoint = checkpoint;
        ctx.checkpoints.push((account, timestamp, checkpoint));

        Self::credit(ctx, entry.referrer, response.subtractive_fee);
        Self::credit(ctx, entry.solver, response.solver_fee);
        if !response.liquidation_fee.is_zero() {
            let risk_share = match entry.liquidator {
                Some(_) => response.liquidation_fee.mul(self.parameter.risk_fee),
                None => response.liquidation_fee,
            };
            ctx.global.risk_fee = ctx.global.risk_fee.add(risk_share);
            Self::credit(
                ctx,
                entry.liquidator,
                response.liquidation_fee.sub(risk_share),
            );
        }

        debug!(
            %account,
            id,
            %timestamp,
            collateral = %checkpoint.collateral,
            realized = %response.realized(),
            "account settled"
        );
        ctx.events.push(EventPayload::AccountPositionProcessed(
            AccountPositionProcessedEvent {
                account,
                order_id: id,
                timestamp,
                collateral: checkpoint.collateral,
                trade_fee: response.trade_fee,
                settlement_fee: response.settlement_fee,
                liquidation_fee: response.liquidation_fee,
            },
        ));
        Ok(())
    }
}
