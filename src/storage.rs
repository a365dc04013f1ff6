//! Storage range contract.
//!
//! Every persisted field has a declared width. Writes are validated before a call commits;
//! a value one unit past its bound rejects the whole call, a value at the bound is stored.
//! Nothing is clamped or truncated on the way in.

use crate::fixed::{Fixed6, UFixed6, DECIMALS};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{field} out of range: {value} does not fit {bits} bits")]
    OutOfRange {
        field: &'static str,
        value: String,
        bits: u32,
    },
}

/// Anything the engine persists. `validate` checks every field against its width.
pub trait Stored {
    fn validate(&self) -> Result<(), StorageError>;
}

fn unsigned_bound(bits: u32) -> Decimal {
    Decimal::from_i128_with_scale(((1u128 << bits) - 1) as i128, DECIMALS)
}

fn signed_bounds(bits: u32) -> (Decimal, Decimal) {
    let half = 1i128 << (bits - 1);
    (
        Decimal::from_i128_with_scale(-half, DECIMALS),
        Decimal::from_i128_with_scale(half - 1, DECIMALS),
    )
}

pub fn check_unsigned(field: &'static str, value: UFixed6, bits: u32) -> Result<(), StorageError> {
    if value.value() > unsigned_bound(bits) {
        return Err(StorageError::OutOfRange {
            field,
            value: value.to_string(),
            bits,
        });
    }
    Ok(())
}

pub fn check_signed(field: &'static str, value: Fixed6, bits: u32) -> Result<(), StorageError> {
    let (min, max) = signed_bounds(bits);
    if value.value() < min || value.value() > max {
        return Err(StorageError::OutOfRange {
            field,
            value: value.to_string(),
            bits,
        });
    }
    Ok(())
}

pub fn check_count(field: &'static str, value: u64, bits: u32) -> Result<(), StorageError> {
    if bits < 64 && value > (1u64 << bits) - 1 {
        return Err(StorageError::OutOfRange {
            field,
            value: value.to_string(),
            bits,
        });
    }
    Ok(())
}

// widths shared by the stored types
pub const COUNT_BITS: u32 = 32;
pub const ID_BITS: u32 = 32;
pub const MAGNITUDE_BITS: u32 = 64;
pub const VALUE_BITS: u32 = 64;
pub const FEE_BITS: u32 = 48;
pub const FRACTION_BITS: u32 = 24;
pub const RATE_BITS: u32 = 32;
pub const SKEW_BITS: u32 = 24;
pub const PROTECTION_BITS: u32 = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn count_at_bound_fits() {
        assert!(check_count("orders", (1u64 << 32) - 1, 32).is_ok());
        assert!(matches!(
            check_count("orders", 1u64 << 32, 32),
            Err(StorageError::OutOfRange { field: "orders", .. })
        ));
    }

    #[test]
    fn unsigned_bound_in_base_units() {
        // 2^24 - 1 base units = 16.777215
        assert!(check_unsigned("fee", UFixed6::new(dec!(16.777215)), 24).is_ok());
        assert!(check_unsigned("fee", UFixed6::new(dec!(16.777216)), 24).is_err());
    }

    #[test]
    fn signed_bounds_are_asymmetric() {
        // 24 bits: [-8.388608, 8.388607]
        assert!(check_signed("skew", Fixed6::new(dec!(-8.388608)), 24).is_ok());
        assert!(check_signed("skew", Fixed6::new(dec!(8.388607)), 24).is_ok());
        assert!(check_signed("skew", Fixed6::new(dec!(8.388608)), 24).is_err());
        assert!(check_signed("skew", Fixed6::new(dec!(-8.388609)), 24).is_err());
    }

    #[test]
    fn saturated_values_are_rejected() {
        assert!(check_unsigned("maker", UFixed6::MAX, 64).is_err());
    }
}
