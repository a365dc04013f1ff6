// 11.0: every committed state change produces an event. used for audit trails and for
// following settlement from outside. the EventPayload enum lists all event types.

use crate::fixed::{Fixed6, UFixed6};
use crate::guarantee::Guarantee;
use crate::order::Order;
use crate::types::{AccountId, ProviderId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Oracle timestamp current when the event was committed.
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Order events
    OrderCreated(OrderCreatedEvent),

    // Settlement events
    PositionProcessed(PositionProcessedEvent),
    AccountPositionProcessed(AccountPositionProcessedEvent),

    // Admin events
    ParameterUpdated(ParameterUpdatedEvent),
    OracleUpdated(OracleUpdatedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub account: AccountId,
    pub order: Order,
    pub guarantee: Guarantee,
    pub referrer: Option<AccountId>,
    pub solver: Option<AccountId>,
}

/// A market version was settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionProcessedEvent {
    pub order_id: u64,
    pub timestamp: Timestamp,
    pub valid: bool,
    pub market_fee: UFixed6,
    pub settlement_fee: UFixed6,
}

/// An account order was settled into a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPositionProcessedEvent {
    pub account: AccountId,
    pub order_id: u64,
    pub timestamp: Timestamp,
    pub collateral: Fixed6,
    pub trade_fee: Fixed6,
    pub settlement_fee: UFixed6,
    pub liquidation_fee: UFixed6,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParameterKind {
    Market,
    Risk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterUpdatedEvent {
    pub kind: ParameterKind,
    pub sender: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleUpdatedEvent {
    pub provider: ProviderId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize() {
        let event = Event::new(
            EventId(7),
            Timestamp::from_secs(1000),
            EventPayload::AccountPositionProcessed(AccountPositionProcessedEvent {
                account: AccountId(1),
                order_id: 2,
                timestamp: Timestamp::from_secs(1000),
                collateral: Fixed6::from_int(5),
                trade_fee: Fixed6::ZERO,
                settlement_fee: UFixed6::ZERO,
                liquidation_fee: UFixed6::ZERO,
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, EventId(7));
        assert!(matches!(back.payload, EventPayload::AccountPositionProcessed(_)));
    }
}
