// 2.3 guarantee.rs: intent-priced fills. the fill price is fixed off-book; at settlement the
// difference against the realized oracle price is paid through the price adjustment.
// guaranteed volume never pays price impact.

use crate::fixed::{Fixed6, UFixed6};
use crate::order::Order;
use crate::storage::{self, StorageError, Stored};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarantee {
    /// Orders exempt from the settlement fee.
    pub orders: u64,
    pub long_pos: UFixed6,
    pub long_neg: UFixed6,
    pub short_pos: UFixed6,
    pub short_neg: UFixed6,
    /// Signed taker size times the fill price.
    pub notional: Fixed6,
    /// Taker volume exempt from the linear trade fee.
    pub taker_fee: UFixed6,
    pub order_referral: UFixed6,
    pub solver_referral: UFixed6,
}

impl Guarantee {
    pub fn from(
        order: &Order,
        price: Fixed6,
        solver_referral_fraction: UFixed6,
        charge_trade_fee: bool,
    ) -> Self {
        let solver_referral = order.taker_referral.mul(solver_referral_fraction);
        Self {
            orders: if charge_trade_fee { order.orders } else { 0 },
            long_pos: order.long_pos,
            long_neg: order.long_neg,
            short_pos: order.short_pos,
            short_neg: order.short_neg,
            notional: order.taker().mul(price),
            taker_fee: if charge_trade_fee {
                UFixed6::ZERO
            } else {
                order.taker_total()
            },
            order_referral: order.taker_referral.sub(solver_referral),
            solver_referral,
        }
    }

    pub fn add(&mut self, other: &Guarantee) {
        self.orders = self.orders.saturating_add(other.orders);
        self.long_pos = self.long_pos.add(other.long_pos);
        self.long_neg = self.long_neg.add(other.long_neg);
        self.short_pos = self.short_pos.add(other.short_pos);
        self.short_neg = self.short_neg.add(other.short_neg);
        self.notional = self.notional.add(other.notional);
        self.taker_fee = self.taker_fee.add(other.taker_fee);
        self.order_referral = self.order_referral.add(other.order_referral);
        self.solver_referral = self.solver_referral.add(other.solver_referral);
    }

    /// What the holder gains from having been filled at the guarantee price instead of the
    /// realized one. Positive when a long fill settles at a higher price.
    pub fn price_adjustment(&self, price: Fixed6) -> Fixed6 {
        self.taker().mul(price).sub(self.notional)
    }

    /// `|adjustment| / |notional|`; `MAX` when a non-empty fill has no notional.
    pub fn price_deviation(&self, price: Fixed6) -> UFixed6 {
        if self.is_empty() {
            return UFixed6::ZERO;
        }
        self.price_adjustment(price)
            .abs()
            .unsafe_div(self.notional.abs())
    }

    pub fn taker_pos(&self) -> UFixed6 {
        self.long_pos.add(self.short_neg)
    }

    pub fn taker_neg(&self) -> UFixed6 {
        self.long_neg.add(self.short_pos)
    }

    pub fn taker(&self) -> Fixed6 {
        self.taker_pos().signed().sub(self.taker_neg().signed())
    }

    pub fn taker_total(&self) -> UFixed6 {
        self.taker_pos().add(self.taker_neg())
    }

    pub fn is_empty(&self) -> bool {
        self.taker_total().is_zero()
    }
}

impl Stored for Guarantee {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_count("guarantee.orders", self.orders, storage::COUNT_BITS)?;
        storage::check_signed("guarantee.notional", self.notional, storage::VALUE_BITS)?;
        for (field, value) in [
            ("guarantee.long_pos", self.long_pos),
            ("guarantee.long_neg", self.long_neg),
            ("guarantee.short_pos", self.short_pos),
            ("guarantee.short_neg", self.short_neg),
            ("guarantee.taker_fee", self.taker_fee),
            ("guarantee.order_referral", self.order_referral),
            ("guarantee.solver_referral", self.solver_referral),
        ] {
            storage::check_unsigned(field, value, storage::MAGNITUDE_BITS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use rust_decimal_macros::dec;

    #[test]
    fn from_order_without_trade_fee() {
        let order = Order {
            timestamp: Timestamp::from_secs(1000),
            orders: 1,
            long_pos: UFixed6::from_int(10),
            ..Order::default()
        };
        let guarantee = Guarantee::from(&order, Fixed6::from_int(123), UFixed6::ZERO, false);
        assert_eq!(
            guarantee,
            Guarantee {
                long_pos: UFixed6::from_int(10),
                notional: Fixed6::from_int(1230),
                taker_fee: UFixed6::from_int(10),
                ..Guarantee::default()
            }
        );
    }

    #[test]
    fn charged_fill_keeps_orders_and_no_exemption() {
        let order = Order {
            orders: 1,
            short_pos: UFixed6::from_int(4),
            taker_referral: UFixed6::from_int(2),
            ..Order::default()
        };
        let guarantee = Guarantee::from(&order, Fixed6::from_int(50), UFixed6::new(dec!(0.25)), true);
        assert_eq!(guarantee.orders, 1);
        assert!(guarantee.taker_fee.is_zero());
        assert_eq!(guarantee.notional, Fixed6::from_int(-200));
        assert_eq!(guarantee.solver_referral, UFixed6::new(dec!(0.5)));
        assert_eq!(guarantee.order_referral, UFixed6::new(dec!(1.5)));
    }

    #[test]
    fn adjustment_pays_long_when_price_rises() {
        let guarantee = Guarantee {
            notional: Fixed6::from_int(1230),
            long_pos: UFixed6::from_int(10),
            ..Guarantee::default()
        };
        assert_eq!(guarantee.price_adjustment(Fixed6::from_int(125)), Fixed6::from_int(20));
        assert_eq!(
            guarantee.price_deviation(Fixed6::from_int(125)),
            UFixed6::new(dec!(0.016260))
        );
    }

    #[test]
    fn deviation_without_notional_is_max() {
        let guarantee = Guarantee {
            short_pos: UFixed6::from_int(10),
            ..Guarantee::default()
        };
        assert_eq!(guarantee.price_deviation(Fixed6::from_int(121)), UFixed6::MAX);
        assert_eq!(Guarantee::default().price_deviation(Fixed6::from_int(121)), UFixed6::ZERO);
    }
}
