// 8.0 version.rs: the per-version accumulator. turns one oracle transition into per-unit
// value deltas for every exposure class, so any account can later compute its own accrual
// as (value after - value before) * its size, in any order.
// 8.1 fees and price impact, 8.2 funding and interest, 8.3 price pnl.

use crate::fixed::{Accumulator, Fixed6, UFixed6};
use crate::funding::{accrue_interest, split_funding};
use crate::global::Global;
use crate::guarantee::Guarantee;
use crate::oracle::{OracleReceipt, OracleVersion};
use crate::order::Order;
use crate::params::{MarketParameter, RiskParameter};
use crate::position::{Position, PositionError};
use crate::storage::{self, StorageError, Stored};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Accumulated state at one oracle timestamp.
///
/// The `*_value` accumulators are cumulative since genesis. The fee fields are per-unit
/// charges for the orders settling at this version only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub valid: bool,
    pub price: Fixed6,
    pub maker_exposure: UFixed6,
    pub long_exposure: UFixed6,
    pub short_exposure: UFixed6,
    /// Accrues to positions held going into the version: pnl, funding, interest.
    pub maker_pre_value: Accumulator,
    pub long_pre_value: Accumulator,
    pub short_pre_value: Accumulator,
    /// Price impact credited to makers still open after the version's closes.
    pub maker_close_value: Accumulator,
    /// Price impact credited to takers open after the version's orders.
    pub long_post_value: Accumulator,
    pub short_post_value: Accumulator,
    pub spread_pos: UFixed6,
    pub spread_neg: UFixed6,
    pub maker_fee: UFixed6,
    pub taker_fee: UFixed6,
    pub settlement_fee: UFixed6,
    pub liquidation_fee: UFixed6,
}

/// Market-level amounts produced by one accumulation, booked by `Global::update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionAccumulationResponse {
    pub market_fee: UFixed6,
    pub settlement_fee: UFixed6,
}

/// Inputs for accumulating the version at `oracle_version.timestamp`.
#[derive(Debug, Clone, Copy)]
pub struct VersionContext<'a> {
    pub from_timestamp: Timestamp,
    pub from_position: &'a Position,
    /// The market's aggregate order at this version, already invalidated if the version is.
    pub order: &'a Order,
    pub guarantee: &'a Guarantee,
    pub oracle_version: &'a OracleVersion,
    pub receipt: &'a OracleReceipt,
    pub parameter: &'a MarketParameter,
    pub risk: &'a RiskParameter,
}

impl Version {
    /// Build the next version from this one. Invalid versions take the last settled price
    /// and so accrue no pnl; funding and interest still run at that price.
    pub fn accumulate(
        &self,
        global: &mut Global,
        ctx: &VersionContext<'_>,
    ) -> Result<(Version, VersionAccumulationResponse), VersionError> {
        let valid = ctx.oracle_version.valid;
        let price = if valid {
            ctx.oracle_version.price
        } else {
            global.latest_price
        };
        let from = ctx.from_position;
        let closed = from.closed(ctx.order)?;
        let to = from.apply(ctx.order)?;

        let mut next = Version {
            valid,
            price,
            maker_exposure: to.net().min(to.maker),
            long_exposure: to.long_socialized(),
            short_exposure: to.short_socialized(),
            maker_pre_value: self.maker_pre_value,
            long_pre_value: self.long_pre_value,
            short_pre_value: self.short_pre_value,
            maker_close_value: self.maker_close_value,
            long_post_value: self.long_post_value,
            short_post_value: self.short_post_value,
            ..Version::default()
        };
        let mut response = VersionAccumulationResponse::default();

        next.accumulate_settlement_fee(ctx, &mut response);
        if valid {
            next.liquidation_fee = ctx.risk.liquidation_fee;
        }
        next.accumulate_linear_fees(ctx, price, &mut response);
        next.accumulate_spread(ctx, price, &closed, &to, &mut response)?;

        if !ctx.parameter.closed {
            next.accumulate_funding(global, ctx, price, &mut response);
            next.accumulate_interest(ctx, price, &mut response);
        }
        next.accumulate_pnl(from, self.price, price);

        Ok((next, response))
    }

    // 8.1: keeper fee split over the orders that pay it
    fn accumulate_settlement_fee(
        &mut self,
        ctx: &VersionContext<'_>,
        response: &mut VersionAccumulationResponse,
    ) {
        let chargeable = ctx.order.orders.saturating_sub(ctx.guarantee.orders);
        if chargeable == 0 || ctx.receipt.settlement_fee.is_zero() {
            return;
        }
        self.settlement_fee = ctx
            .receipt
            .settlement_fee
            .div_out(UFixed6::from_int(chargeable))
            .unwrap_or(UFixed6::ZERO);
        response.settlement_fee = ctx.receipt.settlement_fee;
    }

    fn accumulate_linear_fees(
        &mut self,
        ctx: &VersionContext<'_>,
        price: Fixed6,
        response: &mut VersionAccumulationResponse,
    ) {
        self.maker_fee = price.abs().mul(ctx.parameter.maker_fee);
        self.taker_fee = price.abs().mul(ctx.parameter.taker_fee);

        let maker_volume = ctx.order.maker_total();
        let taker_volume = ctx.order.taker_total().sub(ctx.guarantee.taker_fee);
        let collected = maker_volume
            .mul(self.maker_fee)
            .add(taker_volume.mul(self.taker_fee));
        // the referrers' share leaves through account credits
        let referred = ctx
            .order
            .maker_referral
            .mul(self.maker_fee)
            .add(ctx.order.taker_referral.mul(self.taker_fee));
        response.market_fee = response.market_fee.add(collected.sub(referred));
    }

    fn accumulate_spread(
        &mut self,
        ctx: &VersionContext<'_>,
        price: Fixed6,
        closed: &Position,
        to: &Position,
        response: &mut VersionAccumulationResponse,
    ) -> Result<(), StorageError> {
        let (volume_pos, volume_neg) = impact_volume(ctx.order, ctx.guarantee);
        let (spread_pos, spread_neg) =
            price_impact(ctx.from_position, ctx.order, ctx.guarantee, ctx.risk, price)?;
        // per-unit charges round up so payers cover every credit
        self.spread_pos = spread_pos.div_out(volume_pos).unwrap_or(UFixed6::ZERO);
        self.spread_neg = spread_neg.div_out(volume_neg).unwrap_or(UFixed6::ZERO);

        let spread = spread_pos.add(spread_neg);
        if spread.is_zero() {
            return Ok(());
        }
        let takers = to.long.add(to.short);
        if !closed.maker.is_zero() {
            self.maker_close_value.increment(spread.signed(), closed.maker);
        } else if !takers.is_zero() {
            let long = spread.mul_div(to.long, takers).unwrap_or(UFixed6::ZERO);
            self.long_post_value.increment(long.signed(), to.long);
            self.short_post_value
                .increment(spread.sub(long).signed(), to.short);
        } else {
            response.market_fee = response.market_fee.add(spread);
        }
        Ok(())
    }

    // 8.2
    fn accumulate_funding(
        &mut self,
        global: &mut Global,
        ctx: &VersionContext<'_>,
        price: Fixed6,
        response: &mut VersionAccumulationResponse,
    ) {
        let from = ctx.from_position;
        let funding = global.p_accumulator.accumulate(
            &ctx.risk.p_controller,
            from,
            ctx.from_timestamp,
            ctx.oracle_version.timestamp,
            price,
        );
        let split = split_funding(funding, ctx.parameter.funding_fee, from);

        self.long_pre_value.decrement(split.long, from.long);
        self.short_pre_value.increment(split.short, from.short);
        self.maker_pre_value.increment(split.maker, from.maker);
        response.market_fee = response.market_fee.add(split.fee);
    }

    fn accumulate_interest(
        &mut self,
        ctx: &VersionContext<'_>,
        price: Fixed6,
        response: &mut VersionAccumulationResponse,
    ) {
        let from = ctx.from_position;
        let interest = accrue_interest(
            &ctx.risk.utilization_curve,
            ctx.parameter.interest_fee,
            from,
            ctx.from_timestamp,
            ctx.oracle_version.timestamp,
            price,
        );

        self.long_pre_value.decrement(interest.long.signed(), from.long);
        self.short_pre_value.decrement(interest.short.signed(), from.short);
        self.maker_pre_value.increment(interest.maker.signed(), from.maker);
        response.market_fee = response.market_fee.add(interest.fee);
    }

    // 8.3: takers gain the price move on their backed size, makers take the other side
    fn accumulate_pnl(&mut self, from: &Position, from_price: Fixed6, price: Fixed6) {
        let delta = price.sub(from_price);
        if delta.is_zero() {
            return;
        }
        let pnl_long = delta.mul(from.long_socialized().signed());
        let pnl_short = delta.mul(from.short_socialized().signed()).neg();
        let pnl_maker = pnl_long.add(pnl_short).neg();

        self.long_pre_value.increment(pnl_long, from.long);
        self.short_pre_value.increment(pnl_short, from.short);
        self.maker_pre_value.increment(pnl_maker, from.maker);
    }
}

// taker volume that pays price impact: guaranteed fills are priced by their intent
fn impact_volume(order: &Order, guarantee: &Guarantee) -> (UFixed6, UFixed6) {
    (
        order.taker_pos().sub(guarantee.taker_pos()),
        order.taker_neg().sub(guarantee.taker_neg()),
    )
}

/// Price impact of `order` entered from position `from` at `price`, split into what the
/// buying and the selling volume pay.
pub fn price_impact(
    from: &Position,
    order: &Order,
    guarantee: &Guarantee,
    risk: &RiskParameter,
    price: Fixed6,
) -> Result<(UFixed6, UFixed6), StorageError> {
    let skew = from.long.signed().sub(from.short.signed());
    let (volume_pos, volume_neg) = impact_volume(order, guarantee);
    Ok((
        risk.synbook.compute(skew, volume_pos.signed(), price)?,
        risk.synbook.compute(skew, volume_neg.signed().neg(), price)?,
    ))
}

impl Stored for Version {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_signed("version.price", self.price, storage::VALUE_BITS)?;
        for (field, value) in [
            ("version.maker_pre_value", self.maker_pre_value.value),
            ("version.long_pre_value", self.long_pre_value.value),
            ("version.short_pre_value", self.short_pre_value.value),
            ("version.maker_close_value", self.maker_close_value.value),
            ("version.long_post_value", self.long_post_value.value),
            ("version.short_post_value", self.short_post_value.value),
        ] {
            storage::check_signed(field, value, storage::VALUE_BITS)?;
        }
        for (field, value) in [
            ("version.maker_exposure", self.maker_exposure),
            ("version.long_exposure", self.long_exposure),
            ("version.short_exposure", self.short_exposure),
            ("version.spread_pos", self.spread_pos),
            ("version.spread_neg", self.spread_neg),
            ("version.maker_fee", self.maker_fee),
            ("version.taker_fee", self.taker_fee),
            ("version.settlement_fee", self.settlement_fee),
            ("version.liquidation_fee", self.liquidation_fee),
        ] {
            storage::check_unsigned(field, value, storage::MAGNITUDE_BITS)?;
        }
        Ok(())
    }
}
