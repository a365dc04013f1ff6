//! Settlement simulation.
//!
//! Walks one market through its lifecycle: makers and takers opening against a keeper-fed
//! oracle, price moves settling into checkpoints, an intent fill with referral credits, a
//! liquidation and an oracle provider handoff. Set `RUST_LOG=debug` to follow every version.

use perps_settlement::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const OWNER: AccountId = AccountId(1);
const MAKER: AccountId = AccountId(10);
const TAKER: AccountId = AccountId(11);
const SOLVER: AccountId = AccountId(20);
const TRADER: AccountId = AccountId(21);
const ORIGINATOR: AccountId = AccountId(30);
const LIQUIDATOR: AccountId = AccountId(40);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Perpetual Settlement Simulation");
    println!("Single Market, Keeper Oracle, Versioned Settlement\n");

    if let Err(err) = run() {
        eprintln!("simulation failed: {err}");
        std::process::exit(1);
    }
    println!("\nAll simulations completed successfully.");
}

fn run() -> Result<(), EngineError> {
    let mut config = Environment::Development.config();
    config.keeper.settlement_fee = UFixed6::ONE;

    let mut sim = Sim::new(&config)?;
    scenario_1_open_and_settle(&mut sim)?;
    scenario_2_intent_fill(&mut sim)?;
    scenario_3_liquidation(&mut sim)?;
    scenario_4_oracle_handoff(&mut sim)?;
    summary(&sim);
    Ok(())
}

fn fx(value: i64) -> Fixed6 {
    Fixed6::from_int(value)
}

struct Sim {
    market: Market,
    keeper: KeeperProvider,
}

impl Sim {
    fn new(config: &SettlementConfig) -> Result<Self, EngineError> {
        let registry = Arc::new(Registry::new(OWNER));
        registry.update_referral_fee(OWNER, ORIGINATOR, UFixed6::new(dec!(0.2)))?;

        let keeper = KeeperProvider::new(ProviderId(1), config.keeper.clone());
        let start = Timestamp::now();
        keeper.set_time(start);
        keeper.commit(start, fx(100))?;

        let market = Market::new(
            EngineConfig::default(),
            registry,
            Arc::new(keeper.clone()),
            config.market.clone(),
            config.risk.clone(),
        )?;
        Ok(Self { market, keeper })
    }

    // advance to the pending timestamp and commit every outstanding request at `price`
    fn tick(&mut self, price: Fixed6) -> Result<Timestamp, EngineError> {
        let next = self.keeper.current();
        self.keeper.set_time(next);
        let outstanding = self.keeper.outstanding();
        if outstanding.is_empty() {
            self.keeper.commit(next, price)?;
        }
        for timestamp in outstanding {
            self.keeper.commit(timestamp, price)?;
        }
        Ok(next)
    }

    fn settle(&mut self, accounts: &[AccountId]) -> Result<(), EngineError> {
        for account in accounts {
            self.market.settle(*account)?;
        }
        Ok(())
    }

    fn print_account(&self, label: &str, account: AccountId) {
        let local = self.market.local(account);
        let position = self.market.position_of(account);
        println!(
            "  {label} {account}: maker {}, long {}, short {}, collateral ${}, claimable ${}",
            position.maker, position.long, position.short, local.collateral, local.claimable
        );
    }
}

/// Maker backs a long taker; the price moves and both settle.
fn scenario_1_open_and_settle(sim: &mut Sim) -> Result<(), EngineError> {
    println!("Scenario 1: Open and Settle\n");

    sim.market.update(
        MAKER,
        UpdateRequest::new(MAKER).collateral(fx(10_000)).maker(fx(100)),
    )?;
    sim.market.update(
        TAKER,
        UpdateRequest::new(TAKER).collateral(fx(2_000)).long(fx(50)),
    )?;
    println!("  Maker deposits $10,000 and makes 100, taker deposits $2,000 and goes long 50");

    let t = sim.tick(fx(100))?;
    sim.settle(&[MAKER, TAKER])?;
    println!("  Keeper commits $100 at {t}");
    sim.print_account("Maker", MAKER);
    sim.print_account("Taker", TAKER);

    let t = sim.tick(fx(110))?;
    sim.settle(&[MAKER, TAKER])?;
    println!("\n  Keeper commits $110 at {t}");
    sim.print_account("Maker", MAKER);
    sim.print_account("Taker", TAKER);

    let position = sim.market.position();
    println!(
        "  Market: maker {}, long {}, short {}\n",
        position.maker, position.long, position.short
    );
    Ok(())
}

/// A trader's intent filled by a solver at a locked price.
fn scenario_2_intent_fill(sim: &mut Sim) -> Result<(), EngineError> {
    println!("Scenario 2: Intent Fill\n");

    sim.market.update(SOLVER, UpdateRequest::new(SOLVER).collateral(fx(5_000)))?;
    sim.market.update(TRADER, UpdateRequest::new(TRADER).collateral(fx(5_000)))?;

    let intent = Intent {
        account: TRADER,
        signer: TRADER,
        amount: fx(10),
        price: fx(110),
        fee: UFixed6::new(dec!(0.5)),
        originator: Some(ORIGINATOR),
        solver: Some(SOLVER),
    };
    let result = sim.market.update_intent(SOLVER, SOLVER, intent)?;
    println!(
        "  Trader buys {} at $110 from the solver (solver side {})",
        result.order.taker(),
        result.counterparty.taker()
    );

    sim.tick(fx(112))?;
    sim.settle(&[SOLVER, TRADER, MAKER, TAKER])?;
    println!("  Keeper commits $112; the trader gains the $2 gap on 10 units");
    sim.print_account("Trader", TRADER);
    sim.print_account("Solver", SOLVER);
    sim.print_account("Originator", ORIGINATOR);
    println!();
    Ok(())
}

/// The taker's collateral runs out and a liquidator closes it.
fn scenario_3_liquidation(sim: &mut Sim) -> Result<(), EngineError> {
    println!("Scenario 3: Liquidation\n");

    sim.tick(fx(62))?;
    sim.settle(&[MAKER, TAKER, SOLVER, TRADER])?;
    println!("  Price crashes to $62");
    sim.print_account("Taker", TAKER);

    let order = sim.market.protect(LIQUIDATOR, TAKER)?;
    println!("  Liquidator closes {} long", order.long_neg);

    sim.tick(fx(62))?;
    sim.settle(&[TAKER, LIQUIDATOR])?;
    sim.print_account("Taker", TAKER);
    sim.print_account("Liquidator", LIQUIDATOR);
    println!();
    Ok(())
}

/// Authority moves to a second provider without the latest version going backward.
fn scenario_4_oracle_handoff(sim: &mut Sim) -> Result<(), EngineError> {
    println!("Scenario 4: Oracle Handoff\n");

    let before = sim.market.latest();
    let next = KeeperProvider::new(ProviderId(2), sim.keeper.config().clone());
    next.set_time(sim.keeper.time());
    sim.market.update_oracle(OWNER, Arc::new(next.clone()))?;

    let after = sim.market.latest();
    println!("  Latest before handoff: ${} at {}", before.price, before.timestamp);
    println!("  Latest after handoff:  ${} at {}", after.price, after.timestamp);

    sim.keeper = next;
    sim.market.update(MAKER, UpdateRequest::new(MAKER).maker(fx(-10)))?;
    let t = sim.tick(fx(63))?;
    sim.settle(&[MAKER])?;
    println!("  New provider commits $63 at {t}, latest now at {}", sim.market.latest().timestamp);
    sim.print_account("Maker", MAKER);
    Ok(())
}

fn summary(sim: &Sim) {
    let global = sim.market.global();
    println!("\nFees");
    println!("  Protocol: ${}", global.protocol_fee);
    println!("  Oracle:   ${}", global.oracle_fee);
    println!("  Risk:     ${}", global.risk_fee);
    println!("  Events recorded: {}", sim.market.events().len());
}
