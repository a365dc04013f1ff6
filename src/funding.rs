// 5.0 funding.rs: rate models. the utilization curve prices interest, the proportional
// controller drives funding toward balancing the skew.
// 5.0 has the parameter structs, 5.1 the controller integral, 5.2 the per-version amounts.

use crate::fixed::{Fixed6, UFixed6};
use crate::position::Position;
use crate::storage::{self, StorageError, Stored};
use crate::types::Timestamp;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

pub const YEAR_SECS: u64 = 365 * 24 * 60 * 60;

/// Piecewise-linear annual rate: `min_rate` at zero utilization, `target_rate` at
/// `target_utilization`, `max_rate` at full utilization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationCurve {
    pub min_rate: UFixed6,
    pub max_rate: UFixed6,
    pub target_rate: UFixed6,
    pub target_utilization: UFixed6,
}

impl UtilizationCurve {
    pub fn compute(&self, utilization: UFixed6) -> UFixed6 {
        let utilization = utilization.min(UFixed6::ONE);
        if utilization < self.target_utilization {
            return interpolate(
                UFixed6::ZERO,
                self.min_rate,
                self.target_utilization,
                self.target_rate,
                utilization,
            );
        }
        if self.target_utilization == UFixed6::ONE {
            return self.target_rate;
        }
        interpolate(
            self.target_utilization,
            self.target_rate,
            UFixed6::ONE,
            self.max_rate,
            utilization,
        )
    }
}

// linear between (x0, y0) and (x1, y1), evaluated at x
fn interpolate(x0: UFixed6, y0: UFixed6, x1: UFixed6, y1: UFixed6, x: UFixed6) -> UFixed6 {
    let span = x1.signed().sub(x0.signed());
    let rise = y1.signed().sub(y0.signed());
    let step = rise
        .mul_div(x.signed().sub(x0.signed()), span)
        .unwrap_or(Fixed6::ZERO);
    y0.signed().add(step).positive_part()
}

/// Proportional controller. The funding rate moves by `skew / k` per second and is held
/// within `[min, max]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PController {
    pub k: UFixed6,
    pub min: Fixed6,
    pub max: Fixed6,
}

impl PController {
    // 5.1: returns the new rate and the time it hit a bound (or `to` if it never did)
    pub fn compute(
        &self,
        value: Fixed6,
        skew: Fixed6,
        from: Timestamp,
        to: Timestamp,
    ) -> (Fixed6, Timestamp) {
        let elapsed = Fixed6::from_int(to.since(from) as i64);
        let unbounded = value.add(
            elapsed
                .mul_div(skew, self.k.signed())
                .unwrap_or(Fixed6::ZERO),
        );

        let bound = if unbounded > self.max {
            self.max
        } else if unbounded < self.min {
            self.min
        } else {
            return (unbounded, to);
        };

        // time at which the rate reached the bound
        let to_bound = bound
            .sub(value)
            .mul_div(self.k.signed(), skew)
            .unwrap_or(Fixed6::ZERO)
            .positive_part();
        let intercept = from.add_secs(to_bound.value().trunc().to_u64().unwrap_or(0));
        (bound, intercept.min(to))
    }
}

/// Controller state carried in the market's global record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PAccumulator {
    /// Current annualized funding rate.
    pub value: Fixed6,
    /// Skew observed at the last accumulation.
    pub skew: Fixed6,
}

impl PAccumulator {
    /// Advance the controller over `[from, to]` and return the signed funding owed for the
    /// interval. Positive means longs pay.
    pub fn accumulate(
        &mut self,
        controller: &PController,
        position: &Position,
        from: Timestamp,
        to: Timestamp,
        price: Fixed6,
    ) -> Fixed6 {
        let (next, intercept) = controller.compute(self.value, self.skew, from, to);

        // trapezoid up to the bound, flat after it
        let before = self
            .value
            .add(next)
            .mul(Fixed6::from_int(intercept.since(from) as i64))
            .mul_div(Fixed6::ONE, Fixed6::from_int(2))
            .unwrap_or(Fixed6::ZERO);
        let after = next.mul(Fixed6::from_int(to.since(intercept) as i64));

        self.value = next;
        self.skew = position.skew();

        before
            .add(after)
            .mul(price.abs().signed())
            .mul(position.taker_socialized().signed())
            .mul_div(Fixed6::ONE, Fixed6::from_int(YEAR_SECS as i64))
            .unwrap_or(Fixed6::ZERO)
    }
}

impl Stored for PAccumulator {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_signed("p_accumulator.value", self.value, storage::RATE_BITS)?;
        storage::check_signed("p_accumulator.skew", self.skew, storage::SKEW_BITS)?;
        Ok(())
    }
}

// 5.2: how one interval's funding and interest split between classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FundingSplit {
    /// Debited per long unit (negative credits).
    pub long: Fixed6,
    /// Credited per short unit (negative debits).
    pub short: Fixed6,
    /// Credited to makers.
    pub maker: Fixed6,
    pub fee: UFixed6,
}

/// Split signed funding between the sides. The fee is skimmed as a spread between what
/// longs pay and shorts receive; the minor side's flow is shared with makers in
/// proportion to the skew. With no makers the minor side keeps all of it.
pub fn split_funding(funding: Fixed6, fee_rate: UFixed6, position: &Position) -> FundingSplit {
    let spread = funding
        .abs()
        .mul(fee_rate)
        .mul_div(UFixed6::ONE, UFixed6::from_int(2))
        .unwrap_or(UFixed6::ZERO);
    let mut long = funding.add(spread.signed());
    let mut short = funding.sub(spread.signed());
    let mut maker = Fixed6::ZERO;

    let skew = position.skew().abs().signed();
    if !position.maker.is_zero() {
        if position.long > position.short {
            maker = short.mul(skew);
            short = short.sub(maker);
        }
        if position.short > position.long {
            let shared = long.mul(skew);
            long = long.sub(shared);
            maker = shared.neg();
        }
    }

    FundingSplit {
        long,
        short,
        maker,
        fee: spread.add(spread),
    }
}

/// Interest charged to takers over an interval, split pro rata by side, and what makers
/// receive after the fee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterestSplit {
    pub long: UFixed6,
    pub short: UFixed6,
    pub maker: UFixed6,
    pub fee: UFixed6,
}

pub fn accrue_interest(
    curve: &UtilizationCurve,
    fee_rate: UFixed6,
    position: &Position,
    from: Timestamp,
    to: Timestamp,
    price: Fixed6,
) -> InterestSplit {
    let takers = position.long.add(position.short);
    let notional = takers.min(position.maker).mul(price.abs());
    let rate = curve.compute(position.utilization());
    let interest = notional
        .mul(rate)
        .mul_div(UFixed6::from_int(to.since(from)), UFixed6::from_int(YEAR_SECS))
        .unwrap_or(UFixed6::ZERO);
    if interest.is_zero() {
        return InterestSplit::default();
    }

    let fee = interest.mul(fee_rate);
    let long = interest.mul_div(position.long, takers).unwrap_or(UFixed6::ZERO);
    InterestSplit {
        long,
        short: interest.sub(long),
        maker: interest.sub(fee),
        fee,
    }
}
