//! Market-wide and per-account ledgers.
//!
//! `Global` tracks version ids, accrued fees and the funding controller for the market.
//! `Local` tracks the same ids for one account plus its collateral and claimable credits.

use crate::fixed::{Fixed6, UFixed6};
use crate::funding::PAccumulator;
use crate::oracle::OracleReceipt;
use crate::params::MarketParameter;
use crate::storage::{self, StorageError, Stored};
use crate::version::VersionAccumulationResponse;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    pub current_id: u64,
    pub latest_id: u64,
    pub protocol_fee: UFixed6,
    pub oracle_fee: UFixed6,
    pub risk_fee: UFixed6,
    pub latest_price: Fixed6,
    pub p_accumulator: PAccumulator,
}

impl Global {
    /// Book a settled version: split its market fee between oracle, risk fund and protocol,
    /// hand the keeper fee to the oracle, and advance the latest id and price.
    pub fn update(
        &mut self,
        latest_id: u64,
        accumulation: &VersionAccumulationResponse,
        price: Fixed6,
        parameter: &MarketParameter,
        receipt: &OracleReceipt,
    ) {
        let market_fee = accumulation.market_fee;
        let oracle_fee = market_fee.mul(receipt.oracle_fee);
        let remaining = market_fee.sub(oracle_fee);
        let risk_fee = remaining.mul(parameter.risk_fee);

        self.protocol_fee = self.protocol_fee.add(remaining.sub(risk_fee));
        self.risk_fee = self.risk_fee.add(risk_fee);
        self.oracle_fee = self
            .oracle_fee
            .add(oracle_fee)
            .add(accumulation.settlement_fee);

        self.latest_id = latest_id;
        self.latest_price = price;
    }

    pub fn total_fees(&self) -> UFixed6 {
        self.protocol_fee.add(self.oracle_fee).add(self.risk_fee)
    }
}

impl Stored for Global {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_count("global.current_id", self.current_id, storage::ID_BITS)?;
        storage::check_count("global.latest_id", self.latest_id, storage::ID_BITS)?;
        storage::check_unsigned("global.protocol_fee", self.protocol_fee, storage::FEE_BITS)?;
        storage::check_unsigned("global.oracle_fee", self.oracle_fee, storage::FEE_BITS)?;
        storage::check_unsigned("global.risk_fee", self.risk_fee, storage::FEE_BITS)?;
        storage::check_signed("global.latest_price", self.latest_price, storage::VALUE_BITS)?;
        self.p_accumulator.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    pub current_id: u64,
    pub latest_id: u64,
    pub collateral: Fixed6,
    pub claimable: UFixed6,
}

impl Local {
    /// Fold a settled checkpoint's realized change into collateral. Transfers were applied
    /// when the order was placed.
    pub fn update(&mut self, latest_id: u64, realized: Fixed6) {
        self.latest_id = latest_id;
        self.collateral = self.collateral.add(realized);
    }

    pub fn credit(&mut self, amount: UFixed6) {
        self.claimable = self.claimable.add(amount);
    }
}

impl Stored for Local {
    fn validate(&self) -> Result<(), StorageError> {
        storage::check_count("local.current_id", self.current_id, storage::ID_BITS)?;
        storage::check_count("local.latest_id", self.latest_id, storage::ID_BITS)?;
        storage::check_signed("local.collateral", self.collateral, storage::VALUE_BITS)?;
        storage::check_unsigned("local.claimable", self.claimable, storage::MAGNITUDE_BITS)?;
        Ok(())
    }
}
