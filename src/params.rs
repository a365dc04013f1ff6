// 7.0 params.rs: market and risk parameters. the coordinator can change them between
// calls; every change is validated before it lands.

use crate::fixed::{Fixed6, UFixed6};
use crate::funding::{PController, UtilizationCurve};
use crate::storage::{self, Stored};
use crate::synbook::SynBook;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("invalid fee: {reason}")]
    InvalidFee { reason: String },

    #[error("invalid margin: {reason}")]
    InvalidMargin { reason: String },

    #[error("invalid rate model: {reason}")]
    InvalidRate { reason: String },

    #[error("invalid limit: {reason}")]
    InvalidLimit { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParameter {
    /// Fraction of funding skimmed as a market fee.
    pub funding_fee: UFixed6,
    /// Fraction of interest skimmed as a market fee.
    pub interest_fee: UFixed6,
    /// Fraction of the market fee (after the oracle's cut) routed to the risk fund.
    pub risk_fee: UFixed6,
    /// Linear fee per unit of maker volume, as a fraction of notional.
    pub maker_fee: UFixed6,
    /// Linear fee per unit of taker volume, as a fraction of notional.
    pub taker_fee: UFixed6,
    /// Fraction of an order's trade fee credited to its referrer.
    pub referral_fee: UFixed6,
    pub max_pending_global: u64,
    pub max_pending_local: u64,
    /// Largest relative gap between an intent's fill price and the oracle price.
    pub max_price_deviation: UFixed6,
    /// Reduce-only. No funding or interest accrues.
    pub closed: bool,
    /// Settle-only. No new orders, no syncing past pending versions.
    pub settle: bool,
}

impl Default for MarketParameter {
    fn default() -> Self {
        Self {
            funding_fee: UFixed6::new(dec!(0.1)),
            interest_fee: UFixed6::new(dec!(0.1)),
            risk_fee: UFixed6::new(dec!(0.5)),
            maker_fee: UFixed6::new(dec!(0.0002)),
            taker_fee: UFixed6::new(dec!(0.0005)),
            referral_fee: UFixed6::new(dec!(0.1)),
            max_pending_global: 12,
            max_pending_local: 6,
            max_price_deviation: UFixed6::new(dec!(0.1)),
            closed: false,
            settle: false,
        }
    }
}

fn fraction(name: &str, value: UFixed6) -> Result<(), ParameterError> {
    if value > UFixed6::ONE {
        return Err(ParameterError::InvalidFee {
            reason: format!("{name} of {value} exceeds 1"),
        });
    }
    Ok(())
}

impl MarketParameter {
    pub fn validate(&self) -> Result<(), ParameterError> {
        fraction("funding_fee", self.funding_fee)?;
        fraction("interest_fee", self.interest_fee)?;
        fraction("risk_fee", self.risk_fee)?;
        fraction("maker_fee", self.maker_fee)?;
        fraction("taker_fee", self.taker_fee)?;
        fraction("referral_fee", self.referral_fee)?;

        if self.max_pending_global == 0 || self.max_pending_local == 0 {
            return Err(ParameterError::InvalidLimit {
                reason: "pending limits must allow at least one order".to_string(),
            });
        }
        if self.max_pending_local > self.max_pending_global {
            return Err(ParameterError::InvalidLimit {
                reason: "local pending limit exceeds global limit".to_string(),
            });
        }
        for (name, value) in [
            ("max_pending_global", self.max_pending_global),
            ("max_pending_local", self.max_pending_local),
        ] {
            storage::check_count("market.max_pending", value, storage::COUNT_BITS).map_err(|_| {
                ParameterError::InvalidLimit {
                    reason: format!("{name} of {value} out of range"),
                }
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParameter {
    /// Collateral required to open, as a fraction of notional.
    pub margin: UFixed6,
    /// Collateral below which an account may be liquidated.
    pub maintenance: UFixed6,
    pub min_margin: UFixed6,
    pub min_maintenance: UFixed6,
    /// Liquidation fee as a multiple of the maintenance requirement.
    pub liquidation_fee: UFixed6,
    /// Cap on total maker size.
    pub maker_limit: UFixed6,
    /// Seconds after which the latest price is too old to trade against.
    pub stale_after: u64,
    pub synbook: SynBook,
    pub utilization_curve: UtilizationCurve,
    pub p_controller: PController,
}

impl Default for RiskParameter {
    fn default() -> Self {
        Self {
            margin: UFixed6::new(dec!(0.1)),
            maintenance: UFixed6::new(dec!(0.05)),
            min_margin: UFixed6::from_int(10),
            min_maintenance: UFixed6::from_int(5),
            liquidation_fee: UFixed6::new(dec!(0.5)),
            maker_limit: UFixed6::from_int(1_000_000),
            stale_after: 7200,
            synbook: SynBook {
                d0: UFixed6::new(dec!(0.001)),
                d1: UFixed6::new(dec!(0.002)),
                d2: UFixed6::new(dec!(0.004)),
                d3: UFixed6::new(dec!(0.008)),
                scale: UFixed6::from_int(10_000),
            },
            utilization_curve: UtilizationCurve {
                min_rate: UFixed6::new(dec!(0.01)),
                max_rate: UFixed6::new(dec!(0.60)),
                target_rate: UFixed6::new(dec!(0.05)),
                target_utilization: UFixed6::new(dec!(0.8)),
            },
            p_controller: PController {
                k: UFixed6::from_int(40_000),
                min: Fixed6::new(dec!(-1.2)),
                max: Fixed6::new(dec!(1.2)),
            },
        }
    }
}

impl RiskParameter {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.maintenance.is_zero() {
            return Err(ParameterError::InvalidMargin {
                reason: "maintenance must be positive".to_string(),
            });
        }
        if self.margin < self.maintenance {
            return Err(ParameterError::InvalidMargin {
                reason: "margin below maintenance".to_string(),
            });
        }
        if self.min_margin < self.min_maintenance {
            return Err(ParameterError::InvalidMargin {
                reason: "min_margin below min_maintenance".to_string(),
            });
        }
        fraction("liquidation_fee", self.liquidation_fee)?;

        let curve = &self.utilization_curve;
        if curve.target_utilization > UFixed6::ONE {
            return Err(ParameterError::InvalidRate {
                reason: "target utilization exceeds 1".to_string(),
            });
        }
        if curve.min_rate > curve.target_rate || curve.target_rate > curve.max_rate {
            return Err(ParameterError::InvalidRate {
                reason: "utilization curve must be non-decreasing".to_string(),
            });
        }
        let controller = &self.p_controller;
        if controller.k.is_zero() {
            return Err(ParameterError::InvalidRate {
                reason: "controller k must be positive".to_string(),
            });
        }
        if controller.min > controller.max {
            return Err(ParameterError::InvalidRate {
                reason: "controller min above max".to_string(),
            });
        }
        if self.synbook.scale.is_zero() {
            return Err(ParameterError::InvalidRate {
                reason: "synbook scale must be positive".to_string(),
            });
        }
        if self.stale_after == 0 {
            return Err(ParameterError::InvalidLimit {
                reason: "stale_after must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// parameters are stored too; an out-of-range fraction never reaches the market
impl Stored for MarketParameter {
    fn validate(&self) -> Result<(), storage::StorageError> {
        for (field, value) in [
            ("market.funding_fee", self.funding_fee),
            ("market.interest_fee", self.interest_fee),
            ("market.risk_fee", self.risk_fee),
            ("market.maker_fee", self.maker_fee),
            ("market.taker_fee", self.taker_fee),
            ("market.referral_fee", self.referral_fee),
            ("market.max_price_deviation", self.max_price_deviation),
        ] {
            storage::check_unsigned(field, value, storage::FRACTION_BITS)?;
        }
        Ok(())
    }
}
