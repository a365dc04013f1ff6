// 3.0 position.rs: settled exposure per class. one for the market, one per account.
// 3.1 has the socialization views, 3.2 margin and maintenance, 3.3 order application.

use crate::fixed::{Fixed6, UFixed6};
use crate::order::Order;
use crate::params::RiskParameter;
use crate::storage::{self, StorageError, Stored};
use crate::types::{Side, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("{side:?} close of {amount} exceeds position of {size}")]
    OverClose {
        side: Side,
        amount: UFixed6,
        size: UFixed6,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub timestamp: Timestamp,
    pub maker: UFixed6,
    pub long: UFixed6,
    pub short: UFixed6,
}

impl Position {
    pub fn size(&self, side: Side) -> UFixed6 {
        match side {
            Side::Maker => self.maker,
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    /// Total size across classes. For an account at most one class is non-zero.
    pub fn magnitude(&self) -> UFixed6 {
        self.maker.add(self.long).add(self.short)
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude().is_zero()
    }

    /// The one class an account holds, if any.
    pub fn side(&self) -> Option<Side> {
        if !self.maker.is_zero() {
            Some(Side::Maker)
        } else if !self.long.is_zero() {
            Some(Side::Long)
        } else if !self.short.is_zero() {
            Some(Side::Short)
        } else {
            None
        }
    }

    pub fn single_sided(&self) -> bool {
        [self.maker, self.long, self.short]
            .iter()
            .filter(|size| !size.is_zero())
            .count()
            <= 1
    }

    pub fn major(&self) -> UFixed6 {
        self.long.max(self.short)
    }

    pub fn minor(&self) -> UFixed6 {
        self.long.min(self.short)
    }

    pub fn net(&self) -> UFixed6 {
        self.major().sub(self.minor())
    }

    /// `(long - short) / major`, in [-1, 1].
    pub fn skew(&self) -> Fixed6 {
        let major = self.major();
        if major.is_zero() {
            return Fixed6::ZERO;
        }
        self.long
            .signed()
            .sub(self.short.signed())
            .checked_div(major.signed())
            .unwrap_or(Fixed6::ZERO)
    }

    /// `(long + short) / maker`, clipped to [0, 1].
    pub fn utilization(&self) -> UFixed6 {
        self.long
            .add(self.short)
            .unsafe_div(self.maker)
            .min(UFixed6::ONE)
    }

    // 3.1: socialization. the major side can only be backed by the minor side plus makers;
    // exposure beyond that earns nothing and pays nothing.
    pub fn taker_socialized(&self) -> UFixed6 {
        self.major().min(self.minor().add(self.maker))
    }

    pub fn long_socialized(&self) -> UFixed6 {
        self.long.min(self.short.add(self.maker))
    }

    pub fn short_socialized(&self) -> UFixed6 {
        self.short.min(self.long.add(self.maker))
    }

    // 3.2: requirements. zero for an empty position, floored at the minimum otherwise.
    pub fn maintenance(&self, price: Fixed6, risk: &RiskParameter) -> UFixed6 {
        requirement(self.magnitude(), price, risk.maintenance, risk.min_maintenance)
    }

    pub fn margin(&self, price: Fixed6, risk: &RiskParameter) -> UFixed6 {
        requirement(self.magnitude(), price, risk.margin, risk.min_margin)
    }

    pub fn maintained(&self, collateral: Fixed6, price: Fixed6, risk: &RiskParameter) -> bool {
        collateral >= self.maintenance(price, risk).signed()
    }

    pub fn margined(&self, collateral: Fixed6, price: Fixed6, risk: &RiskParameter) -> bool {
        collateral >= self.margin(price, risk).signed()
    }

    // 3.3: apply an order. closes may not exceed what is held.
    pub fn apply(&self, order: &Order) -> Result<Position, PositionError> {
        Ok(Position {
            timestamp: order.timestamp,
            maker: apply_side(Side::Maker, self.maker, order.maker_pos, order.maker_neg)?,
            long: apply_side(Side::Long, self.long, order.long_pos, order.long_neg)?,
            short: apply_side(Side::Short, self.short, order.short_pos, order.short_neg)?,
        })
    }

    /// Position after only the closing legs of `order`.
    pub fn closed(&self, order: &Order) -> Result<Position, PositionError> {
        self.apply(&order.close_only())
    }
}

fn requirement(magnitude: UFixed6, price: Fixed6, ratio: UFixed6, minimum: UFixed6) -> UFixed6 {
    if magnitude.is_zero() {
        return UFixed6::ZERO;
    }
    magnitude.mul(price.abs()).mul(ratio).max(minimum)
}

fn apply_side(
    side: Side,
    size: UFixed6,
    open: UFixed6,
    close: UFixed6,
) -> Result<UFixed6, PositionError> {
    size.add(open)
        .checked_sub(close)
        .ok_or(PositionError::OverClose {
            side,
            amount: close,
            size: size.add(open),
        })
}

impl Stored for Position {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_unsigned("position.maker", self.maker, storage::MAGNITUDE_BITS)?;
        storage::check_unsigned("position.long", self.long, storage::MAGNITUDE_BITS)?;
        storage::check_unsigned("position.short", self.short, storage::MAGNITUDE_BITS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(maker: u64, long: u64, short: u64) -> Position {
        Position {
            timestamp: Timestamp::from_secs(1000),
            maker: UFixed6::from_int(maker),
            long: UFixed6::from_int(long),
            short: UFixed6::from_int(short),
        }
    }

    #[test]
    fn skew_and_utilization() {
        let p = position(10, 6, 2);
        assert_eq!(p.skew(), Fixed6::new(dec!(0.666666)));
        assert_eq!(p.utilization(), UFixed6::new(dec!(0.8)));
        assert_eq!(position(0, 6, 2).utilization(), UFixed6::ONE);
        assert_eq!(position(0, 0, 0).skew(), Fixed6::ZERO);
    }

    #[test]
    fn major_side_socialized_by_capacity() {
        // 12 long against 2 short and 5 maker: only 7 is backed
        let p = position(5, 12, 2);
        assert_eq!(p.taker_socialized(), UFixed6::from_int(7));
        assert_eq!(p.long_socialized(), UFixed6::from_int(7));
        assert_eq!(p.short_socialized(), UFixed6::from_int(2));
    }

    #[test]
    fn apply_rejects_over_close() {
        let p = position(0, 5, 0);
        let close = Order {
            long_neg: UFixed6::from_int(6),
            ..Order::default()
        };
        assert!(matches!(
            p.apply(&close),
            Err(PositionError::OverClose { side: Side::Long, .. })
        ));

        let partial = Order {
            long_neg: UFixed6::from_int(2),
            long_pos: UFixed6::from_int(1),
            ..Order::default()
        };
        assert_eq!(p.apply(&partial).unwrap().long, UFixed6::from_int(4));
        assert_eq!(p.closed(&partial).unwrap().long, UFixed6::from_int(3));
    }

    #[test]
    fn requirements_floor_at_minimum() {
        let risk = RiskParameter {
            margin: UFixed6::new(dec!(0.1)),
            maintenance: UFixed6::new(dec!(0.05)),
            min_margin: UFixed6::from_int(20),
            min_maintenance: UFixed6::from_int(10),
            ..RiskParameter::default()
        };
        let p = position(0, 1, 0);
        assert_eq!(p.margin(Fixed6::from_int(100), &risk), UFixed6::from_int(20));
        assert_eq!(p.maintenance(Fixed6::from_int(1000), &risk), UFixed6::from_int(50));
        assert_eq!(position(0, 0, 0).margin(Fixed6::from_int(100), &risk), UFixed6::ZERO);
        assert!(p.maintained(Fixed6::from_int(50), Fixed6::from_int(1000), &risk));
        assert!(!p.margined(Fixed6::from_int(99), Fixed6::from_int(1000), &risk));
    }

    #[test]
    fn single_sided_check() {
        assert!(position(0, 5, 0).single_sided());
        assert!(!position(1, 5, 0).single_sided());
        assert_eq!(position(0, 0, 3).side(), Some(Side::Short));
    }
}
