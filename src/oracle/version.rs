// 9.1: one price sample and the fee schedule that rides along with it.

use crate::fixed::{Fixed6, UFixed6};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// A timestamped price. Invalid versions still advance the clock but their price is never
/// used for settlement math.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleVersion {
    pub timestamp: Timestamp,
    pub price: Fixed6,
    pub valid: bool,
}

impl OracleVersion {
    pub fn new(timestamp: Timestamp, price: Fixed6, valid: bool) -> Self {
        Self {
            timestamp,
            price,
            valid,
        }
    }

    pub fn valid(timestamp: Timestamp, price: Fixed6) -> Self {
        Self::new(timestamp, price, true)
    }

    pub fn invalid(timestamp: Timestamp) -> Self {
        Self::new(timestamp, Fixed6::ZERO, false)
    }
}

/// Fees attached to a version. `settlement_fee` is the total keeper fee for the version,
/// split across every order settling there; `oracle_fee` is the fraction of the market fee
/// routed to the oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReceipt {
    pub settlement_fee: UFixed6,
    pub oracle_fee: UFixed6,
}
