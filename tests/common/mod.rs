//! Shared market harness for the integration tests.
//!
//! The keeper clock starts at 1000 with a valid price of 100 committed there, so the first
//! orders land on 1010.

#![allow(dead_code)]

use perps_settlement::funding::{PController, UtilizationCurve};
use perps_settlement::synbook::SynBook;
use perps_settlement::*;
use std::sync::Arc;

pub const OWNER: AccountId = AccountId(1);
pub const START: u64 = 1000;

pub fn fx(value: i64) -> Fixed6 {
    Fixed6::from_int(value)
}

pub fn ts(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

/// No linear fees, no funding, no interest, no price impact. Only price moves and
/// explicitly configured charges touch collateral.
pub fn quiet_parameter() -> MarketParameter {
    MarketParameter {
        funding_fee: UFixed6::ZERO,
        interest_fee: UFixed6::ZERO,
        maker_fee: UFixed6::ZERO,
        taker_fee: UFixed6::ZERO,
        referral_fee: UFixed6::ZERO,
        ..MarketParameter::default()
    }
}

pub fn quiet_risk() -> RiskParameter {
    RiskParameter {
        synbook: SynBook {
            scale: UFixed6::ONE,
            ..SynBook::default()
        },
        utilization_curve: UtilizationCurve::default(),
        p_controller: PController {
            k: UFixed6::from_int(1_000_000),
            min: Fixed6::ZERO,
            max: Fixed6::ZERO,
        },
        ..RiskParameter::default()
    }
}

pub struct Harness {
    pub market: Market,
    pub keeper: KeeperProvider,
}

impl Harness {
    pub fn new(parameter: MarketParameter, risk: RiskParameter, keeper: KeeperConfig) -> Self {
        let keeper = KeeperProvider::new(ProviderId(1), keeper);
        keeper.set_time(ts(START));
        keeper.commit(ts(START), fx(100)).unwrap();

        let market = Market::new(
            EngineConfig::default(),
            Arc::new(Registry::new(OWNER)),
            Arc::new(keeper.clone()),
            parameter,
            risk,
        )
        .unwrap();
        Self { market, keeper }
    }

    pub fn quiet() -> Self {
        Self::new(quiet_parameter(), quiet_risk(), KeeperConfig::default())
    }

    /// Move the clock to the pending timestamp and commit `price` for every open request,
    /// or for that timestamp alone when nothing was requested.
    pub fn tick(&self, price: i64) -> Timestamp {
        let next = self.keeper.current();
        self.keeper.set_time(next);
        let outstanding = self.keeper.outstanding();
        if outstanding.is_empty() {
            self.keeper.commit(next, fx(price)).unwrap();
        }
        for timestamp in outstanding {
            self.keeper.commit(timestamp, fx(price)).unwrap();
        }
        next
    }

    /// Move the clock `secs` forward (at least to the pending timestamp) and commit `price`
    /// for every open request and for the new time itself.
    pub fn advance(&self, secs: u64, price: i64) -> Timestamp {
        let next = self.keeper.time().add_secs(secs).max(self.keeper.current());
        self.keeper.set_time(next);
        for timestamp in self.keeper.outstanding() {
            self.keeper.commit(timestamp, fx(price)).unwrap();
        }
        if self.keeper.latest().timestamp < next {
            self.keeper.commit(next, fx(price)).unwrap();
        }
        next
    }

    pub fn settle(&mut self, accounts: &[AccountId]) {
        for account in accounts {
            self.market.settle(*account).unwrap();
        }
    }

    pub fn deposit(&mut self, account: AccountId, amount: i64) {
        self.market
            .update(account, UpdateRequest::new(account).collateral(fx(amount)))
            .unwrap();
    }

    pub fn collateral(&self, account: AccountId) -> Fixed6 {
        self.market.local(account).collateral
    }

    pub fn claimable(&self, account: AccountId) -> UFixed6 {
        self.market.local(account).claimable
    }
}
