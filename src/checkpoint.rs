// 10.0 checkpoint.rs: per-account ledger. each settled version leaves a checkpoint whose
// collateral is the previous one plus transfers, minus fees, plus what the account's
// exposure accrued between the two versions.
// 10.1 has the accrual (pre values on the old position, close/post values split at the
// version before the settling one), 10.2 the fees and credits.

use crate::fixed::{Fixed6, UFixed6};
use crate::guarantee::Guarantee;
use crate::order::Order;
use crate::params::RiskParameter;
use crate::position::{Position, PositionError};
use crate::storage::{self, StorageError, Stored};
use crate::version::Version;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub trade_fee: Fixed6,
    pub settlement_fee: UFixed6,
    pub transfer: Fixed6,
    pub collateral: Fixed6,
}

/// Inputs for settling one account order at `to_version`.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointContext<'a> {
    /// The account's settled position going into the version.
    pub from_position: &'a Position,
    pub order: &'a Order,
    pub guarantee: &'a Guarantee,
    /// Version at the account's previous checkpoint.
    pub from_version: &'a Version,
    /// Latest stored version strictly before `to_version`; `from_version` if none between.
    pub prev_version: &'a Version,
    pub to_version: &'a Version,
    pub risk: &'a RiskParameter,
}

/// What one settlement produced beyond the checkpoint itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointAccumulationResponse {
    /// Exposure accrual including the guarantee price adjustment.
    pub collateral: Fixed6,
    pub price_adjustment: Fixed6,
    pub trade_fee: Fixed6,
    pub settlement_fee: UFixed6,
    pub liquidation_fee: UFixed6,
    /// Share of the trade fee credited to the order's referrer.
    pub subtractive_fee: UFixed6,
    /// Share of the trade fee credited to the intent's solver.
    pub solver_fee: UFixed6,
}

impl CheckpointAccumulationResponse {
    /// Net change to the account's collateral. Transfers are not included.
    pub fn realized(&self) -> Fixed6 {
        self.collateral
            .sub(self.trade_fee)
            .sub(self.settlement_fee.signed())
            .sub(self.liquidation_fee.signed())
    }
}

impl Checkpoint {
    /// Start the next period: collateral carries forward, period fields reset.
    pub fn next(prev: &Checkpoint) -> Self {
        Self {
            collateral: prev.collateral,
            ..Self::default()
        }
    }

    pub fn update(&mut self, order: &Order, trade_fee: Fixed6, settlement_fee: UFixed6) {
        self.transfer = self.transfer.add(order.collateral);
        self.trade_fee = self.trade_fee.add(trade_fee);
        self.settlement_fee = self.settlement_fee.add(settlement_fee);
    }

    /// Settle `ctx.order` on top of `prev`.
    pub fn accumulate(
        prev: &Checkpoint,
        ctx: &CheckpointContext<'_>,
    ) -> Result<(Checkpoint, CheckpointAccumulationResponse), PositionError> {
        let mut response = accrue(ctx)?;
        charge(ctx, &mut response);

        let mut next = Checkpoint::next(prev);
        next.update(
            ctx.order,
            response.trade_fee,
            response.settlement_fee.add(response.liquidation_fee),
        );
        next.collateral = prev
            .collateral
            .add(next.transfer)
            .sub(next.trade_fee)
            .sub(next.settlement_fee.signed())
            .add(response.collateral);
        Ok((next, response))
    }

    /// An insolvent share class: outstanding shares with nothing behind them.
    pub fn unhealthy(shares: UFixed6, assets: Fixed6) -> bool {
        !shares.is_zero() && assets <= Fixed6::ZERO
    }
}

// 10.1
fn accrue(ctx: &CheckpointContext<'_>) -> Result<CheckpointAccumulationResponse, PositionError> {
    let from = ctx.from_position;
    let closed = from.closed(ctx.order)?;
    let to = from.apply(ctx.order)?;
    let (v0, prev, v1) = (ctx.from_version, ctx.prev_version, ctx.to_version);

    let pre = v1
        .maker_pre_value
        .accumulated(&v0.maker_pre_value, from.maker)
        .add(v1.long_pre_value.accumulated(&v0.long_pre_value, from.long))
        .add(v1.short_pre_value.accumulated(&v0.short_pre_value, from.short));

    // intermediate versions credit the old position, the settling one the new
    let close = prev
        .maker_close_value
        .accumulated(&v0.maker_close_value, from.maker)
        .add(v1.maker_close_value.accumulated(&prev.maker_close_value, closed.maker));
    let post = prev
        .long_post_value
        .accumulated(&v0.long_post_value, from.long)
        .add(v1.long_post_value.accumulated(&prev.long_post_value, to.long))
        .add(prev.short_post_value.accumulated(&v0.short_post_value, from.short))
        .add(v1.short_post_value.accumulated(&prev.short_post_value, to.short));

    let price_adjustment = if v1.valid {
        ctx.guarantee.price_adjustment(v1.price)
    } else {
        Fixed6::ZERO
    };

    Ok(CheckpointAccumulationResponse {
        collateral: pre.add(close).add(post).add(price_adjustment),
        price_adjustment,
        ..CheckpointAccumulationResponse::default()
    })
}

// 10.2: charges round up, credits round down
fn charge(ctx: &CheckpointContext<'_>, response: &mut CheckpointAccumulationResponse) {
    let (order, guarantee, version) = (ctx.order, ctx.guarantee, ctx.to_version);

    let maker_fee = order.maker_total().mul_out(version.maker_fee);
    let taker_fee = order
        .taker_total()
        .sub(guarantee.taker_fee)
        .mul_out(version.taker_fee);
    let spread = order
        .taker_pos()
        .sub(guarantee.taker_pos())
        .mul_out(version.spread_pos)
        .add(
            order
                .taker_neg()
                .sub(guarantee.taker_neg())
                .mul_out(version.spread_neg),
        );
    response.trade_fee = maker_fee.add(taker_fee).add(spread).signed();

    response.subtractive_fee = order
        .maker_referral
        .mul(version.maker_fee)
        .add(
            order
                .taker_referral
                .sub(guarantee.solver_referral)
                .mul(version.taker_fee),
        );
    response.solver_fee = guarantee.solver_referral.mul(version.taker_fee);

    let chargeable = order.orders.saturating_sub(guarantee.orders);
    response.settlement_fee = UFixed6::from_int(chargeable).mul_out(version.settlement_fee);

    if order.protected() {
        response.liquidation_fee = ctx
            .from_position
            .maintenance(version.price, ctx.risk)
            .mul(version.liquidation_fee);
    }
}

impl Stored for Checkpoint {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_signed("checkpoint.trade_fee", self.trade_fee, storage::FEE_BITS)?;
        storage::check_unsigned(
            "checkpoint.settlement_fee",
            self.settlement_fee,
            storage::FEE_BITS,
        )?;
        storage::check_signed("checkpoint.transfer", self.transfer, storage::VALUE_BITS)?;
        storage::check_signed("checkpoint.collateral", self.collateral, storage::VALUE_BITS)?;
        Ok(())
    }
}
