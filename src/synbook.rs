// 6.0 synbook.rs: synthetic order book. price impact of a taker trade is the area under
// d0 + d1 x + d2 x^2 + d3 x^3 over the skew it traverses, with x = skew / scale taken in
// the trade's direction. trades that pull skew back toward zero traverse negative x and
// pay less.

use crate::fixed::{Fixed6, UFixed6};
use crate::storage::{StorageError, VALUE_BITS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynBook {
    pub d0: UFixed6,
    pub d1: UFixed6,
    pub d2: UFixed6,
    pub d3: UFixed6,
    pub scale: UFixed6,
}

impl SynBook {
    /// Spread paid by a trade of `amount` (positive buys, negative sells) starting from
    /// `skew`, priced at `price`. Never negative. A trade too large for the curve to price
    /// is out of range.
    pub fn compute(&self, skew: Fixed6, amount: Fixed6, price: Fixed6) -> Result<UFixed6, StorageError> {
        if amount.is_zero() || self.scale.is_zero() {
            return Ok(UFixed6::ZERO);
        }
        let scale = self.scale.signed();
        // direction-adjusted: a sell is a buy in the mirrored book
        let (from, to) = if amount.is_positive() {
            (skew, skew.add(amount))
        } else {
            (skew.neg(), skew.neg().add(amount.abs().signed()))
        };

        let (Some(from), Some(to)) = (from.checked_div(scale), to.checked_div(scale)) else {
            return Ok(UFixed6::ZERO);
        };
        // evaluated at full precision, truncated once
        let spread = self
            .integral(to)
            .zip(self.integral(from))
            .and_then(|(to, from)| to.checked_sub(from))
            .and_then(|area| area.checked_mul(price.abs().value()))
            .and_then(|area| area.checked_mul(scale.value()))
            .ok_or_else(|| StorageError::OutOfRange {
                field: "synbook.spread",
                value: format!("{amount} from skew {skew}"),
                bits: VALUE_BITS,
            })?;
        Ok(Fixed6::new(spread).positive_part())
    }

    // antiderivative of the curve: d0 x + d1 x^2/2 + d2 x^3/3 + d3 x^4/4
    fn integral(&self, x: Fixed6) -> Option<Decimal> {
        let x = x.value();
        let x2 = x.checked_mul(x)?;
        let x3 = x2.checked_mul(x)?;
        let x4 = x3.checked_mul(x)?;
        let terms = [
            self.d0.value().checked_mul(x)?,
            self.d1.value().checked_mul(x2)?.checked_div(Decimal::TWO)?,
            self.d2.value().checked_mul(x3)?.checked_div(Decimal::from(3))?,
            self.d3.value().checked_mul(x4)?.checked_div(Decimal::from(4))?,
        ];
        terms
            .into_iter()
            .try_fold(Decimal::ZERO, |sum, term| sum.checked_add(term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> SynBook {
        SynBook {
            d0: UFixed6::new(dec!(0.001)),
            d1: UFixed6::new(dec!(0.002)),
            d2: UFixed6::new(dec!(0.004)),
            d3: UFixed6::new(dec!(0.008)),
            scale: UFixed6::from_int(100),
        }
    }

    #[test]
    fn linear_term_only_is_flat_fee() {
        let linear = SynBook {
            d0: UFixed6::new(dec!(0.001)),
            scale: UFixed6::from_int(100),
            ..SynBook::default()
        };
        // 10 units at 50, 0.1% each way
        let buy = linear.compute(Fixed6::ZERO, Fixed6::from_int(10), Fixed6::from_int(50)).unwrap();
        let sell = linear.compute(Fixed6::ZERO, Fixed6::from_int(-10), Fixed6::from_int(50)).unwrap();
        assert_eq!(buy, UFixed6::new(dec!(0.5)));
        assert_eq!(sell, buy);
    }

    #[test]
    fn impact_grows_with_skew() {
        let b = book();
        let price = Fixed6::from_int(100);
        let first = b.compute(Fixed6::ZERO, Fixed6::from_int(10), price).unwrap();
        let second = b.compute(Fixed6::from_int(10), Fixed6::from_int(10), price).unwrap();
        assert!(second > first);
    }

    #[test]
    fn reducing_skew_pays_less() {
        let b = book();
        let price = Fixed6::from_int(100);
        let adding = b.compute(Fixed6::from_int(50), Fixed6::from_int(10), price).unwrap();
        let reducing = b.compute(Fixed6::from_int(50), Fixed6::from_int(-10), price).unwrap();
        assert!(reducing < adding);
    }

    #[test]
    fn empty_trade_or_book_is_free() {
        let b = book();
        assert!(b.compute(Fixed6::ZERO, Fixed6::ZERO, Fixed6::from_int(100)).unwrap().is_zero());
        assert!(SynBook::default()
            .compute(Fixed6::ZERO, Fixed6::from_int(5), Fixed6::from_int(100))
            .unwrap()
            .is_zero());
    }

    fn wide() -> SynBook {
        SynBook {
            scale: UFixed6::from_int(10_000),
            ..book()
        }
    }

    #[test]
    fn oversized_trade_is_out_of_range() {
        let price = Fixed6::new(dec!(0.01));
        // x = 1e8, x^4 does not fit a decimal
        let result = wide().compute(Fixed6::ZERO, Fixed6::from_int(1_000_000_000_000), price);
        assert!(matches!(
            result,
            Err(StorageError::OutOfRange { field: "synbook.spread", .. })
        ));
        let result = wide().compute(Fixed6::ZERO, Fixed6::from_int(-1_000_000_000_000), price);
        assert!(result.is_err());
    }

    #[test]
    fn largest_priced_trade_still_fits() {
        let price = Fixed6::new(dec!(0.01));
        // x = 1e7, x^4 = 1e28
        let spread = wide()
            .compute(Fixed6::ZERO, Fixed6::from_int(100_000_000_000), price)
            .unwrap();
        assert!(spread > UFixed6::ZERO);
    }
}
