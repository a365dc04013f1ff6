//! Property-based tests for settlement invariants.
//!
//! Random books and price paths are run through a full market with default fees, funding,
//! interest and price impact switched on. Books may have no makers, versions may be days
//! apart, and some open with an intent fill.

mod common;

use common::*;
use perps_settlement::*;
use proptest::prelude::*;
use rust_decimal_macros::dec;

const MAKER: AccountId = AccountId(10);
const FILLER: AccountId = AccountId(20);
const TRADER: AccountId = AccountId(21);
const ORIGINATOR: AccountId = AccountId(30);
const SOLVER: AccountId = AccountId(31);
const MAKER_DEPOSIT: i64 = 1_000_000;
const TAKER_DEPOSIT: i64 = 100_000;

#[derive(Debug, Clone)]
struct Fill {
    long: bool,
    size: i64,
    // guaranteed price relative to 100
    offset: i64,
    solver: bool,
}

#[derive(Debug, Clone)]
struct Book {
    maker: i64,
    // (long?, size) per taker account
    takers: Vec<(bool, i64)>,
    fill: Option<Fill>,
    // (price, seconds since the previous version)
    path: Vec<(i64, u64)>,
}

fn fill_strategy() -> impl Strategy<Value = Fill> {
    (any::<bool>(), 1i64..20, -5i64..5, any::<bool>()).prop_map(|(long, size, offset, solver)| {
        Fill {
            long,
            size,
            offset,
            solver,
        }
    })
}

fn book_strategy() -> impl Strategy<Value = Book> {
    (
        prop_oneof![Just(0i64), 10i64..200],
        proptest::collection::vec((any::<bool>(), 1i64..50), 1..6),
        proptest::option::of(fill_strategy()),
        proptest::collection::vec((50i64..150, 10u64..86_400), 1..6),
    )
        .prop_map(|(maker, takers, fill, path)| Book {
            maker,
            takers,
            fill,
            path,
        })
}

fn taker(index: usize) -> AccountId {
    AccountId(100 + index as u64)
}

fn accounts(book: &Book) -> Vec<AccountId> {
    let fill = [FILLER, TRADER, ORIGINATOR, SOLVER];
    std::iter::once(MAKER)
        .chain((0..book.takers.len()).map(taker))
        .chain(fill.into_iter().filter(|_| book.fill.is_some()))
        .collect()
}

fn default_market() -> Harness {
    let keeper = KeeperConfig {
        settlement_fee: UFixed6::new(dec!(0.3)),
        oracle_fee: UFixed6::new(dec!(0.1)),
        ..KeeperConfig::default()
    };
    Harness::new(MarketParameter::default(), RiskParameter::default(), keeper)
}

// opens the book at 1010, then walks the price path one version per step
fn run(book: &Book, settle_order: &[AccountId]) -> Harness {
    let mut h = default_market();
    let mut request = UpdateRequest::new(MAKER).collateral(fx(MAKER_DEPOSIT));
    if book.maker > 0 {
        request = request.maker(fx(book.maker));
    }
    h.market.update(MAKER, request).unwrap();
    for (i, &(long, size)) in book.takers.iter().enumerate() {
        let account = taker(i);
        let mut request = UpdateRequest::new(account).collateral(fx(TAKER_DEPOSIT));
        request = if long {
            request.long(fx(size))
        } else {
            request.short(fx(size))
        };
        h.market.update(account, request).unwrap();
    }

    if let Some(fill) = &book.fill {
        h.deposit(FILLER, TAKER_DEPOSIT);
        h.deposit(TRADER, TAKER_DEPOSIT);
        let size = if fill.long { fx(fill.size) } else { fx(-fill.size) };
        let intent = Intent {
            account: TRADER,
            signer: TRADER,
            amount: size,
            price: fx(100 + fill.offset),
            fee: UFixed6::new(dec!(0.5)),
            originator: Some(ORIGINATOR),
            solver: fill.solver.then_some(SOLVER),
        };
        h.market.update_intent(FILLER, FILLER, intent).unwrap();
    }

    for (step, &(price, gap)) in book.path.iter().enumerate() {
        if step == 0 {
            h.tick(price);
        } else {
            h.advance(gap, price);
        }
        h.settle(settle_order);
    }
    h
}

fn deposits(book: &Book) -> Fixed6 {
    let fill = if book.fill.is_some() { 2 } else { 0 };
    fx(MAKER_DEPOSIT + TAKER_DEPOSIT * (book.takers.len() as i64 + fill))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Settlement only moves value between accounts and the fee pools. Rounding always
    /// favors the market, by dust.
    #[test]
    fn value_is_conserved(book in book_strategy()) {
        let order = accounts(&book);
        let h = run(&book, &order);

        let held = order.iter().fold(Fixed6::ZERO, |acc, account| {
            let local = h.market.local(*account);
            acc.add(local.collateral).add(local.claimable.signed())
        });
        let total = held.add(h.market.global().total_fees().signed());
        let dust = deposits(&book).sub(total);

        prop_assert!(!dust.is_negative(), "settlement created {}", dust.neg());
        prop_assert!(dust < Fixed6::new(dec!(0.1)), "settlement lost {}", dust);
    }

    /// Which account settles first never changes what any account ends up with.
    #[test]
    fn settlement_order_is_irrelevant(book in book_strategy()) {
        let forward = accounts(&book);
        let mut backward = forward.clone();
        backward.reverse();

        let a = run(&book, &forward);
        let b = run(&book, &backward);
        for account in &forward {
            prop_assert_eq!(a.market.local(*account), b.market.local(*account));
            prop_assert_eq!(a.market.position_of(*account), b.market.position_of(*account));
        }
        prop_assert_eq!(a.market.global(), b.market.global());
    }

    /// Settling twice is settling once.
    #[test]
    fn settle_is_idempotent(book in book_strategy()) {
        let order = accounts(&book);
        let mut h = run(&book, &order);

        let before: Vec<_> = order.iter().map(|a| h.market.local(*a)).collect();
        let global = *h.market.global();
        h.settle(&order);
        let after: Vec<_> = order.iter().map(|a| h.market.local(*a)).collect();

        prop_assert_eq!(before, after);
        prop_assert_eq!(global, *h.market.global());
    }

    /// Every settled account's collateral equals its latest checkpoint, and the account
    /// positions sum to the market position.
    #[test]
    fn checkpoints_match_ledgers(book in book_strategy()) {
        let order = accounts(&book);
        let h = run(&book, &order);
        let latest = h.market.latest().timestamp;

        let mut sum = Position::default();
        for account in &order {
            let checkpoint = h.market.checkpoint_at(*account, latest).unwrap();
            prop_assert_eq!(checkpoint.collateral, h.market.local(*account).collateral);

            let position = h.market.position_of(*account);
            prop_assert_eq!(position.timestamp, latest);
            prop_assert!(position.single_sided());
            sum.maker = sum.maker.add(position.maker);
            sum.long = sum.long.add(position.long);
            sum.short = sum.short.add(position.short);
        }
        let market = h.market.position();
        prop_assert_eq!((sum.maker, sum.long, sum.short), (market.maker, market.long, market.short));
    }

    /// Ids only move forward and nothing stays pending once the oracle has passed it.
    #[test]
    fn ids_advance_monotonically(book in book_strategy()) {
        let order = accounts(&book);
        let h = run(&book, &order);

        let global = h.market.global();
        prop_assert!(global.latest_id <= global.current_id);
        prop_assert_eq!(h.market.pending_order(global.current_id), None);
        for account in &order {
            let local = h.market.local(*account);
            prop_assert_eq!(local.latest_id, local.current_id);
            prop_assert_eq!(h.market.pending_order_of(*account, local.current_id), None);
        }
    }
}
