// 1.2 fixed.rs: 6-decimal fixed point on top of rust_decimal.
// Fixed6 is signed, UFixed6 unsigned. every multiply and divide truncates toward zero
// unless the name says otherwise: `_floor` rounds toward negative infinity, `_out` away
// from zero. add/sub/mul saturate instead of panicking; the storage range checks reject
// anything that saturated.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DECIMALS: u32 = 6;

fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMALS, RoundingStrategy::ToZero)
}

fn floor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMALS, RoundingStrategy::ToNegativeInfinity)
}

fn away(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMALS, RoundingStrategy::AwayFromZero)
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Fixed6(Decimal);

impl Fixed6 {
    pub const ZERO: Fixed6 = Fixed6(Decimal::ZERO);
    pub const ONE: Fixed6 = Fixed6(Decimal::ONE);
    pub const NEG_ONE: Fixed6 = Fixed6(Decimal::NEGATIVE_ONE);

    pub fn new(value: Decimal) -> Self {
        Self(truncate(value))
    }

    pub fn from_int(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_units(units: i64) -> Self {
        Self(Decimal::new(units, DECIMALS))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn sign(&self) -> i8 {
        if self.is_positive() {
            1
        } else if self.is_negative() {
            -1
        } else {
            0
        }
    }

    pub fn abs(&self) -> UFixed6 {
        UFixed6(self.0.abs())
    }

    pub fn neg(&self) -> Self {
        Self(-self.0)
    }

    pub fn add(&self, other: Fixed6) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn sub(&self, other: Fixed6) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn mul(&self, other: Fixed6) -> Self {
        Self(truncate(self.0.saturating_mul(other.0)))
    }

    pub fn mul_floor(&self, other: Fixed6) -> Self {
        Self(floor(self.0.saturating_mul(other.0)))
    }

    pub fn checked_div(&self, other: Fixed6) -> Option<Self> {
        self.0.checked_div(other.0).map(|q| Self(truncate(q)))
    }

    pub fn div_floor(&self, other: Fixed6) -> Option<Self> {
        self.0.checked_div(other.0).map(|q| Self(floor(q)))
    }

    // self * num / den at full precision, truncated once
    pub fn mul_div(&self, num: Fixed6, den: Fixed6) -> Option<Self> {
        self.0.saturating_mul(num.0).checked_div(den.0).map(|q| Self(truncate(q)))
    }

    pub fn min(self, other: Fixed6) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Fixed6) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Positive part as an unsigned value, zero when negative.
    pub fn positive_part(&self) -> UFixed6 {
        UFixed6(self.0.max(Decimal::ZERO))
    }
}

impl From<UFixed6> for Fixed6 {
    fn from(value: UFixed6) -> Self {
        Fixed6(value.0)
    }
}

impl fmt::Display for Fixed6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UFixed6(Decimal);

impl UFixed6 {
    pub const ZERO: UFixed6 = UFixed6(Decimal::ZERO);
    pub const ONE: UFixed6 = UFixed6(Decimal::ONE);
    // sentinel for undefined ratios (x / 0)
    pub const MAX: UFixed6 = UFixed6(Decimal::MAX);

    pub fn new(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO, "negative unsigned value {value}");
        Self(truncate(value.max(Decimal::ZERO)))
    }

    #[must_use]
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(truncate(value)))
        } else {
            None
        }
    }

    pub fn from_int(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_units(units: u64) -> Self {
        Self(Decimal::from_i128_with_scale(units as i128, DECIMALS))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: UFixed6) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    // saturates at zero. use checked_sub where an underflow is an error
    pub fn sub(&self, other: UFixed6) -> Self {
        Self(self.0.saturating_sub(other.0).max(Decimal::ZERO))
    }

    #[must_use]
    pub fn checked_sub(&self, other: UFixed6) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }

    pub fn mul(&self, other: UFixed6) -> Self {
        Self(truncate(self.0.saturating_mul(other.0)))
    }

    pub fn mul_out(&self, other: UFixed6) -> Self {
        Self(away(self.0.saturating_mul(other.0)))
    }

    pub fn checked_div(&self, other: UFixed6) -> Option<Self> {
        self.0.checked_div(other.0).map(|q| Self(truncate(q)))
    }

    pub fn div_out(&self, other: UFixed6) -> Option<Self> {
        self.0.checked_div(other.0).map(|q| Self(away(q)))
    }

    /// `self / other` with the `x / 0 = MAX`, `0 / 0 = 0` convention.
    pub fn unsafe_div(&self, other: UFixed6) -> Self {
        if other.is_zero() {
            if self.is_zero() {
                UFixed6::ZERO
            } else {
                UFixed6::MAX
            }
        } else {
            self.checked_div(other).unwrap_or(UFixed6::MAX)
        }
    }

    pub fn mul_div(&self, num: UFixed6, den: UFixed6) -> Option<Self> {
        self.0.saturating_mul(num.0).checked_div(den.0).map(|q| Self(truncate(q)))
    }

    pub fn min(self, other: UFixed6) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: UFixed6) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn signed(&self) -> Fixed6 {
        Fixed6(self.0)
    }
}

impl fmt::Display for UFixed6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

// 1.3: per-unit accumulator. value grows by amount/total at each version; a holder of
// `total'` units between two snapshots accrues (after - before) * total'.
// increments floor, so the sum over holders never exceeds what was distributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub value: Fixed6,
}

impl Accumulator {
    pub fn new(value: Fixed6) -> Self {
        Self { value }
    }

    pub fn increment(&mut self, amount: Fixed6, total: UFixed6) {
        if total.is_zero() {
            return;
        }
        if let Some(per_unit) = amount.div_floor(total.signed()) {
            self.value = self.value.add(per_unit);
        }
    }

    pub fn decrement(&mut self, amount: Fixed6, total: UFixed6) {
        self.increment(amount.neg(), total);
    }

    pub fn accumulated(&self, from: &Accumulator, total: UFixed6) -> Fixed6 {
        self.value.sub(from.value).mul_floor(total.signed())
    }
}
