// 12.4 engine/update.rs: placing orders. every entry point settles the accounts it touches
// first, then folds the new order into the pending entry at the oracle's current timestamp
// and checks the result against the market's limits.
// 12.4.1 entry points, 12.4.2 placement, 12.4.3 checks.

use super::context::Context;
use super::core::{Market, PendingEntry};
use super::results::{EngineError, Intent, IntentResult, UpdateRequest};
use crate::events::{EventPayload, OrderCreatedEvent};
use crate::fixed::{Fixed6, UFixed6};
use crate::guarantee::Guarantee;
use crate::order::Order;
use crate::params::ParameterError;
use crate::position::Position;
use crate::types::{AccountId, Timestamp};
use crate::version::price_impact;
use std::collections::BTreeMap;
use tracing::{debug, info};

struct Placement {
    account: AccountId,
    order: Order,
    guarantee: Guarantee,
    referrer: Option<AccountId>,
    solver: Option<AccountId>,
    liquidator: Option<AccountId>,
}

impl Placement {
    fn new(account: AccountId, order: Order) -> Self {
        Self {
            account,
            order,
            guarantee: Guarantee::default(),
            referrer: None,
            solver: None,
            liquidator: None,
        }
    }
}

impl Market {
    // 12.4.1
    /// Change `request.account`'s position and collateral. A request with no deltas only
    /// settles the account.
    pub fn update(&mut self, sender: AccountId, request: UpdateRequest) -> Result<Order, EngineError> {
        let account = request.account;
        let mut ctx = self.load();
        self.settle_account(&mut ctx, account)?;

        let order = Order::from_deltas(
            ctx.current,
            request.maker,
            request.long,
            request.short,
            request.collateral,
            false,
            self.referral_fee(request.referrer),
        );
        let placement = Placement {
            referrer: request.referrer,
            ..Placement::new(account, order)
        };
        self.place(&mut ctx, sender, placement)?;
        self.commit(ctx)?;
        Ok(order)
    }

    /// Fill `intent` with `account` as the counterparty. Both sides get a guarantee at the
    /// intent price; the intent side pays the trade fee, the filler pays the settlement fee.
    pub fn update_intent(
        &mut self,
        sender: AccountId,
        account: AccountId,
        intent: Intent,
    ) -> Result<IntentResult, EngineError> {
        if intent.fee > UFixed6::ONE {
            return Err(ParameterError::InvalidFee {
                reason: format!("solver fee of {} exceeds 1", intent.fee),
            }
            .into());
        }
        let mut ctx = self.load();
        self.settle_account(&mut ctx, account)?;
        self.settle_account(&mut ctx, intent.account)?;

        let closable = self.closable(&mut ctx, account);
        let counterparty = Order::from_taker(
            ctx.current,
            closable.long,
            closable.short,
            intent.amount.neg(),
            Fixed6::ZERO,
            UFixed6::ZERO,
        );
        let counterparty_guarantee =
            Guarantee::from(&counterparty, intent.price, UFixed6::ZERO, false);

        let closable = self.closable(&mut ctx, intent.account);
        let order = Order::from_taker(
            ctx.current,
            closable.long,
            closable.short,
            intent.amount,
            Fixed6::ZERO,
            self.referral_fee(intent.originator),
        );
        // with no solver to pay, the originator keeps the whole referral
        let solver_fraction = match intent.solver {
            Some(_) => intent.fee,
            None => UFixed6::ZERO,
        };
        let guarantee = Guarantee::from(&order, intent.price, solver_fraction, true);

        let filler = Placement {
            guarantee: counterparty_guarantee,
            ..Placement::new(account, counterparty)
        };
        self.place(&mut ctx, sender, filler)?;
        let taker = Placement {
            guarantee,
            referrer: intent.originator,
            solver: intent.solver,
            ..Placement::new(intent.account, order)
        };
        self.place(&mut ctx, intent.signer, taker)?;
        self.commit(ctx)?;

        info!(
            account = %intent.account,
            filler = %account,
            amount = %intent.amount,
            price = %intent.price,
            "intent filled"
        );
        Ok(IntentResult {
            order,
            counterparty,
        })
    }

    /// Liquidate `account`: close everything it can still close. Only valid below
    /// maintenance; `liquidator` earns the liquidation fee once the order settles.
    pub fn protect(&mut self, liquidator: AccountId, account: AccountId) -> Result<Order, EngineError> {
        let mut ctx = self.load();
        self.settle_account(&mut ctx, account)?;

        let closable = self.closable(&mut ctx, account);
        let order = Order::from_deltas(
            ctx.current,
            closable.maker.signed().neg(),
            closable.long.signed().neg(),
            closable.short.signed().neg(),
            Fixed6::ZERO,
            true,
            UFixed6::ZERO,
        );
        if order.is_empty() {
            return Err(EngineError::InvalidProtection(account));
        }
        let placement = Placement {
            liquidator: Some(liquidator),
            ..Placement::new(account, order)
        };
        self.place(&mut ctx, liquidator, placement)?;
        self.commit(ctx)?;

        info!(%account, %liquidator, "liquidation placed");
        Ok(order)
    }

    fn referral_fee(&self, referrer: Option<AccountId>) -> UFixed6 {
        match referrer {
            Some(referrer) => self
                .registry
                .referral_fee(referrer)
                .unwrap_or(self.parameter.referral_fee),
            None => UFixed6::ZERO,
        }
    }

    // settled position less what pending orders already close
    fn closable(&self, ctx: &mut Context, account: AccountId) -> Position {
        self.load_account(ctx, account);
        let state = ctx.account_mut(account);
        let closes = pending_closes(&state.pending);
        Position {
            timestamp: state.position.timestamp,
            maker: state.position.maker.sub(closes.maker),
            long: state.position.long.sub(closes.long),
            short: state.position.short.sub(closes.short),
        }
    }

    // 12.4.2
    fn place(&self, ctx: &mut Context, sender: AccountId, placement: Placement) -> Result<(), EngineError> {
        let Placement {
            account,
            order,
            guarantee,
            referrer,
            solver,
            liquidator,
        } = placement;
        self.load_account(ctx, account);
        if order.is_empty() && order.collateral.is_zero() {
            return Ok(());
        }

        self.check_mode(ctx, sender, account, &order)?;
        if referrer == Some(account) {
            return Err(EngineError::InvalidReferrer(account));
        }

        let current = ctx.current;
        let state = ctx.account_mut(account);
        let protected_pending = state.pending.values().any(|entry| entry.order.protected());

        let local_id = next_id(&state.pending, state.local.current_id, current);
        let entry = state
            .pending
            .entry(local_id)
            .or_insert_with(|| PendingEntry::fresh(current));
        if conflicts(entry.referrer, referrer) || conflicts(entry.solver, solver) {
            return Err(EngineError::InvalidReferrer(account));
        }
        entry.order.add(&order);
        entry.guarantee.add(&guarantee);
        entry.referrer = entry.referrer.or(referrer);
        entry.solver = entry.solver.or(solver);
        entry.liquidator = entry.liquidator.or(liquidator);
        state.local.current_id = local_id;
        state.local.collateral = state.local.collateral.add(order.collateral);

        let global_id = next_id(&ctx.pending, ctx.global.current_id, current);
        let entry = ctx
            .pending
            .entry(global_id)
            .or_insert_with(|| PendingEntry::fresh(current));
        entry.order.add(&order);
        entry.guarantee.add(&guarantee);
        ctx.global.current_id = global_id;

        if order.protected() {
            self.check_protection(ctx, account, &order, protected_pending)?;
        } else {
            if protected_pending {
                return Err(EngineError::ProtectedPending(account));
            }
            self.check_invariants(ctx, account, &order, &guarantee)?;
        }
        self.check_price_impact(ctx, global_id)?;

        if !order.is_empty() {
            ctx.request.get_or_insert(account);
        }
        debug!(
            %account,
            %sender,
            id = local_id,
            timestamp = %current,
            maker = %order.maker(),
            long = %order.long(),
            short = %order.short(),
            collateral = %order.collateral,
            "order placed"
        );
        ctx.events.push(EventPayload::OrderCreated(OrderCreatedEvent {
            account,
            order,
            guarantee,
            referrer,
            solver,
        }));
        Ok(())
    }

    // 12.4.3: checks that only need the request and the market state
    fn check_mode(
        &self,
        ctx: &Context,
        sender: AccountId,
        account: AccountId,
        order: &Order,
    ) -> Result<(), EngineError> {
        if self.parameter.settle && !order.is_empty() {
            return Err(EngineError::SettleOnly);
        }
        if self.parameter.closed && !order.opens().is_zero() {
            return Err(EngineError::Closed);
        }

        // anyone may deposit or liquidate
        let deposit = order.is_empty() && !order.collateral.is_negative();
        if !order.protected() && !deposit && !self.registry.authorized(account, sender) {
            return Err(EngineError::Unauthorized { sender, account });
        }

        if ctx.current <= ctx.position.timestamp {
            return Err(EngineError::InvalidTimestamp {
                current: ctx.current,
                settled: ctx.position.timestamp,
            });
        }
        let risky = !order.is_empty() || order.collateral.is_negative();
        if risky && ctx.current.since(ctx.latest.timestamp) >= self.risk.stale_after {
            return Err(EngineError::StalePrice {
                latest: ctx.latest.timestamp,
                current: ctx.current,
            });
        }
        Ok(())
    }

    // the aggregate must stay priceable or its version could never settle
    fn check_price_impact(&self, ctx: &Context, id: u64) -> Result<(), EngineError> {
        let mut from = ctx.position;
        for entry in ctx.pending.range(..id).map(|(_, entry)| entry) {
            from = from.apply(&entry.order)?;
        }
        if let Some(entry) = ctx.pending.get(&id) {
            price_impact(&from, &entry.order, &entry.guarantee, &self.risk, ctx.latest.price)?;
        }
        Ok(())
    }

    fn check_protection(
        &self,
        ctx: &mut Context,
        account: AccountId,
        order: &Order,
        protected_pending: bool,
    ) -> Result<(), EngineError> {
        let price = ctx.latest.price;
        let state = ctx.account_mut(account);
        let closes = pending_closes(&state.pending);
        let settled = state.position;

        let invalid = protected_pending
            || !order.collateral.is_zero()
            || !order.opens().is_zero()
            || closes.magnitude() != settled.magnitude()
            || settled.maintained(state.local.collateral, price, &self.risk);
        if invalid {
            return Err(EngineError::InvalidProtection(account));
        }
        Ok(())
    }

    fn check_invariants(
        &self,
        ctx: &mut Context,
        account: AccountId,
        order: &Order,
        guarantee: &Guarantee,
    ) -> Result<(), EngineError> {
        let price = ctx.latest.price;
        let parameter = &self.parameter;

        if ctx.global.current_id > ctx.global.latest_id + parameter.max_pending_global {
            return Err(EngineError::ExceedsPendingGlobal);
        }
        if !order.maker_pos.is_zero() {
            let mut pending = ctx.position;
            for entry in ctx.pending.values() {
                pending = pending.apply(&entry.order)?;
            }
            if pending.maker > self.risk.maker_limit {
                return Err(EngineError::MakerLimit {
                    maker: pending.maker,
                    limit: self.risk.maker_limit,
                });
            }
        }

        let state = ctx.account_mut(account);
        if state.local.current_id > state.local.latest_id + parameter.max_pending_local {
            return Err(EngineError::ExceedsPendingLocal(account));
        }

        let settled = state.position;
        let closes = pending_closes(&state.pending);
        if closes.maker > settled.maker || closes.long > settled.long || closes.short > settled.short {
            return Err(EngineError::OverClose { account });
        }
        let mut pending = settled;
        for entry in state.pending.values() {
            pending = pending.apply(&entry.order)?;
        }
        if !pending.single_sided() {
            return Err(EngineError::NotSingleSided(account));
        }

        let collateral = state.local.collateral;
        if order.collateral.is_negative() && collateral.is_negative() {
            return Err(EngineError::InsufficientCollateral(account));
        }
        if !order.opens().is_zero() || order.collateral.is_negative() {
            // a pending close may still come back invalid
            let worst = if pending.magnitude() > settled.magnitude() {
                pending
            } else {
                settled
            };
            let required = worst.margin(price, &self.risk);
            if collateral < required.signed() {
                return Err(EngineError::InsufficientMargin {
                    account,
                    collateral,
                    required,
                });
            }
        }

        if !guarantee.is_empty() {
            let deviation = guarantee.price_deviation(price);
            if deviation > parameter.max_price_deviation {
                return Err(EngineError::PriceDeviation {
                    deviation,
                    max: parameter.max_price_deviation,
                });
            }
        }
        Ok(())
    }
}

// entries at the current timestamp aggregate, anything else opens the next id
fn next_id(pending: &BTreeMap<u64, PendingEntry>, current_id: u64, timestamp: Timestamp) -> u64 {
    match pending.get(&current_id) {
        Some(entry) if entry.order.timestamp == timestamp => current_id,
        _ => current_id + 1,
    }
}

fn conflicts(existing: Option<AccountId>, incoming: Option<AccountId>) -> bool {
    matches!((existing, incoming), (Some(a), Some(b)) if a != b)
}

// close legs summed per class across pending entries
fn pending_closes(pending: &BTreeMap<u64, PendingEntry>) -> Position {
    pending.values().fold(Position::default(), |acc, entry| Position {
        timestamp: acc.timestamp,
        maker: acc.maker.add(entry.order.maker_neg),
        long: acc.long.add(entry.order.long_neg),
        short: acc.short.add(entry.order.short_neg),
    })
}
