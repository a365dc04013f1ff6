// 2.0 order.rs: the pending order. one aggregate per (scope, version): every update landing
// on the same oracle timestamp folds into it. opens and closes are kept apart so fees and
// price impact can charge each leg.
// 2.1 has the derived taker accessors, 2.2 the storage contract.

use crate::fixed::{Fixed6, UFixed6};
use crate::oracle::OracleVersion;
use crate::storage::{self, StorageError, Stored};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub timestamp: Timestamp,
    pub orders: u64,
    pub collateral: Fixed6,
    pub maker_pos: UFixed6,
    pub maker_neg: UFixed6,
    pub long_pos: UFixed6,
    pub long_neg: UFixed6,
    pub short_pos: UFixed6,
    pub short_neg: UFixed6,
    pub protection: u64,
    pub maker_referral: UFixed6,
    pub taker_referral: UFixed6,
}

// splits a signed delta into (open, close) legs
fn legs(delta: Fixed6) -> (UFixed6, UFixed6) {
    (delta.positive_part(), delta.neg().positive_part())
}

impl Order {
    pub fn fresh(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Order from signed maker/long/short deltas. Referral fees are charged on the volume
    /// the order moves.
    pub fn from_deltas(
        timestamp: Timestamp,
        maker: Fixed6,
        long: Fixed6,
        short: Fixed6,
        collateral: Fixed6,
        protect: bool,
        referral_fee: UFixed6,
    ) -> Self {
        let (maker_pos, maker_neg) = legs(maker);
        let (long_pos, long_neg) = legs(long);
        let (short_pos, short_neg) = legs(short);

        let mut order = Self {
            timestamp,
            orders: 0,
            collateral,
            maker_pos,
            maker_neg,
            long_pos,
            long_neg,
            short_pos,
            short_neg,
            protection: u64::from(protect),
            maker_referral: UFixed6::ZERO,
            taker_referral: UFixed6::ZERO,
        };
        if !order.is_empty() {
            order.orders = 1;
        }
        order.maker_referral = order.maker_total().mul(referral_fee);
        order.taker_referral = order.taker_total().mul(referral_fee);
        order
    }

    /// Order from a signed taker amount against the account's pending position: a buy first
    /// closes any short, a sell first closes any long.
    pub fn from_taker(
        timestamp: Timestamp,
        long: UFixed6,
        short: UFixed6,
        amount: Fixed6,
        collateral: Fixed6,
        referral_fee: UFixed6,
    ) -> Self {
        let size = amount.abs();
        let (long_delta, short_delta) = if amount.is_positive() {
            let close = size.min(short);
            (size.sub(close).signed(), close.signed().neg())
        } else {
            let close = size.min(long);
            (close.signed().neg(), size.sub(close).signed())
        };
        Self::from_deltas(
            timestamp,
            Fixed6::ZERO,
            long_delta,
            short_delta,
            collateral,
            false,
            referral_fee,
        )
    }

    /// Fold another order for the same version into this aggregate.
    pub fn add(&mut self, other: &Order) {
        self.orders = self.orders.saturating_add(other.orders);
        self.collateral = self.collateral.add(other.collateral);
        self.maker_pos = self.maker_pos.add(other.maker_pos);
        self.maker_neg = self.maker_neg.add(other.maker_neg);
        self.long_pos = self.long_pos.add(other.long_pos);
        self.long_neg = self.long_neg.add(other.long_neg);
        self.short_pos = self.short_pos.add(other.short_pos);
        self.short_neg = self.short_neg.add(other.short_neg);
        self.protection = self.protection.saturating_add(other.protection);
        self.maker_referral = self.maker_referral.add(other.maker_referral);
        self.taker_referral = self.taker_referral.add(other.taker_referral);
    }

    /// Drop everything but the collateral transfer. Used when the order's version came back
    /// invalid.
    pub fn invalidate(&mut self) {
        *self = Self {
            timestamp: self.timestamp,
            collateral: self.collateral,
            ..Self::default()
        };
    }

    /// The order's version is final once the oracle's latest version has reached it.
    pub fn ready(&self, latest: &OracleVersion) -> bool {
        latest.timestamp >= self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.maker_total().is_zero() && self.taker_total().is_zero()
    }

    pub fn protected(&self) -> bool {
        self.protection > 0
    }

    pub fn maker(&self) -> Fixed6 {
        self.maker_pos.signed().sub(self.maker_neg.signed())
    }

    pub fn long(&self) -> Fixed6 {
        self.long_pos.signed().sub(self.long_neg.signed())
    }

    pub fn short(&self) -> Fixed6 {
        self.short_pos.signed().sub(self.short_neg.signed())
    }

    pub fn maker_total(&self) -> UFixed6 {
        self.maker_pos.add(self.maker_neg)
    }

    // 2.1: taker views. a long open and a short close both push skew up.
    // for one fill at most one term of each pair is set, so the sum equals the max.
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

    pub fn closes(&self) -> UFixed6 {
        self.maker_neg.add(self.long_neg).add(self.short_neg)
    }

    pub fn opens(&self) -> UFixed6 {
        self.maker_pos.add(self.long_pos).add(self.short_pos)
    }

    /// Only the close legs, applied before opens when splitting a version.
    pub fn close_only(&self) -> Order {
        Order {
            timestamp: self.timestamp,
            maker_neg: self.maker_neg,
            long_neg: self.long_neg,
            short_neg: self.short_neg,
            ..Order::default()
        }
    }
}

// 2.2
impl Stored for Order {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_count("order.orders", self.orders, storage::COUNT_BITS)?;
        storage::check_count("order.protection", self.protection, storage::PROTECTION_BITS)?;
        storage::check_signed("order.collateral", self.collateral, storage::VALUE_BITS)?;
        for (field, value) in [
            ("order.maker_pos", self.maker_pos),
            ("order.maker_neg", self.maker_neg),
            ("order.long_pos", self.long_pos),
            ("order.long_neg", self.long_neg),
            ("order.short_pos", self.short_pos),
            ("order.short_neg", self.short_neg),
            ("order.maker_referral", self.maker_referral),
            ("order.taker_referral", self.taker_referral),
        ] {
            storage::check_unsigned(field, value, storage::MAGNITUDE_BITS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts() -> Timestamp {
        Timestamp::from_secs(1000)
    }

    #[test]
    fn deltas_split_into_legs() {
        let order = Order::from_deltas(
            ts(),
            Fixed6::ZERO,
            Fixed6::from_int(5),
            Fixed6::from_int(-2),
            Fixed6::from_int(100),
            false,
            UFixed6::ZERO,
        );
        assert_eq!(order.orders, 1);
        assert_eq!(order.long_pos, UFixed6::from_int(5));
        assert_eq!(order.short_neg, UFixed6::from_int(2));
        assert_eq!(order.taker_pos(), UFixed6::from_int(7));
        assert_eq!(order.taker(), Fixed6::from_int(7));
        assert_eq!(order.taker_total(), UFixed6::from_int(7));
    }

    #[test]
    fn collateral_only_order_counts_nothing() {
        let order = Order::from_deltas(
            ts(),
            Fixed6::ZERO,
            Fixed6::ZERO,
            Fixed6::ZERO,
            Fixed6::from_int(100),
            false,
            UFixed6::new(dec!(0.1)),
        );
        assert!(order.is_empty());
        assert_eq!(order.orders, 0);
        assert!(order.taker_referral.is_zero());
    }

    #[test]
    fn referral_charged_on_volume() {
        let order = Order::from_deltas(
            ts(),
            Fixed6::from_int(-4),
            Fixed6::ZERO,
            Fixed6::ZERO,
            Fixed6::ZERO,
            false,
            UFixed6::new(dec!(0.25)),
        );
        assert_eq!(order.maker_referral, UFixed6::ONE);
        assert!(order.taker_referral.is_zero());
    }

    #[test]
    fn taker_buy_closes_short_first() {
        let order = Order::from_taker(
            ts(),
            UFixed6::ZERO,
            UFixed6::from_int(3),
            Fixed6::from_int(5),
            Fixed6::ZERO,
            UFixed6::ZERO,
        );
        assert_eq!(order.short_neg, UFixed6::from_int(3));
        assert_eq!(order.long_pos, UFixed6::from_int(2));
        assert_eq!(order.taker(), Fixed6::from_int(5));
    }

    #[test]
    fn aggregation_and_invalidation() {
        let mut order = Order::from_deltas(
            ts(),
            Fixed6::ZERO,
            Fixed6::from_int(1),
            Fixed6::ZERO,
            Fixed6::from_int(10),
            false,
            UFixed6::ZERO,
        );
        order.add(&Order::from_deltas(
            ts(),
            Fixed6::ZERO,
            Fixed6::from_int(2),
            Fixed6::ZERO,
            Fixed6::from_int(-3),
            false,
            UFixed6::ZERO,
        ));
        assert_eq!(order.orders, 2);
        assert_eq!(order.long_pos, UFixed6::from_int(3));
        assert_eq!(order.collateral, Fixed6::from_int(7));

        order.invalidate();
        assert!(order.is_empty());
        assert_eq!(order.orders, 0);
        assert_eq!(order.collateral, Fixed6::from_int(7));
        assert_eq!(order.timestamp, ts());
    }

    #[test]
    fn ready_once_latest_reaches_timestamp() {
        let order = Order::fresh(ts());
        assert!(!order.ready(&OracleVersion::valid(Timestamp::from_secs(999), Fixed6::ONE)));
        assert!(order.ready(&OracleVersion::invalid(ts())));
    }

    #[test]
    fn orders_count_range() {
        let mut order = Order::fresh(ts());
        order.orders = (1u64 << 32) - 1;
        assert!(order.validate().is_ok());
        order.orders = 1u64 << 32;
        assert!(order.validate().is_err());
    }
}
