// 12.0.2: request types, results and errors for market operations.

use crate::fixed::{Fixed6, UFixed6};
use crate::oracle::OracleError;
use crate::order::Order;
use crate::params::ParameterError;
use crate::position::PositionError;
use crate::registry::RegistryError;
use crate::storage::StorageError;
use crate::types::{AccountId, Timestamp};
use crate::version::VersionError;

/// A direct position change. Deltas are signed: positive opens, negative closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateRequest {
    pub account: AccountId,
    pub maker: Fixed6,
    pub long: Fixed6,
    pub short: Fixed6,
    /// Deposit when positive, withdrawal when negative.
    pub collateral: Fixed6,
    pub referrer: Option<AccountId>,
}

impl UpdateRequest {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }

    pub fn maker(mut self, delta: Fixed6) -> Self {
        self.maker = delta;
        self
    }

    pub fn long(mut self, delta: Fixed6) -> Self {
        self.long = delta;
        self
    }

    pub fn short(mut self, delta: Fixed6) -> Self {
        self.short = delta;
        self
    }

    pub fn collateral(mut self, delta: Fixed6) -> Self {
        self.collateral = delta;
        self
    }

    pub fn referrer(mut self, referrer: AccountId) -> Self {
        self.referrer = Some(referrer);
        self
    }
}

/// A price-locked taker fill, filled by whoever submits it.
#[derive(Debug, Clone, Copy)]
pub struct Intent {
    pub account: AccountId,
    /// Who approved the intent: the account itself or one of its operators.
    pub signer: AccountId,
    /// Signed taker size for `account`; the filler takes the opposite side.
    pub amount: Fixed6,
    pub price: Fixed6,
    /// Share of the intent's taker referral paid to `solver`.
    pub fee: UFixed6,
    pub originator: Option<AccountId>,
    pub solver: Option<AccountId>,
}

#[derive(Debug, Clone, Copy)]
pub struct IntentResult {
    pub order: Order,
    pub counterparty: Order,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("{sender} may not update {account}")]
    Unauthorized { sender: AccountId, account: AccountId },

    #[error("market is settle-only")]
    SettleOnly,

    #[error("market is closed to new exposure")]
    Closed,

    #[error("latest price at {latest} is stale at {current}")]
    StalePrice { latest: Timestamp, current: Timestamp },

    #[error("oracle timestamp {current} is not past settled {settled}")]
    InvalidTimestamp { current: Timestamp, settled: Timestamp },

    #[error("too many pending market versions")]
    ExceedsPendingGlobal,

    #[error("too many pending versions for {0}")]
    ExceedsPendingLocal(AccountId),

    #[error("{account} closes more than its settled position")]
    OverClose { account: AccountId },

    #[error("{0} would hold more than one side")]
    NotSingleSided(AccountId),

    #[error("maker total {maker} exceeds limit {limit}")]
    MakerLimit { maker: UFixed6, limit: UFixed6 },

    #[error("{account} collateral {collateral} below margin {required}")]
    InsufficientMargin {
        account: AccountId,
        collateral: Fixed6,
        required: UFixed6,
    },

    #[error("{0} cannot withdraw into negative collateral")]
    InsufficientCollateral(AccountId),

    #[error("{0} has a pending liquidation")]
    ProtectedPending(AccountId),

    #[error("invalid liquidation of {0}")]
    InvalidProtection(AccountId),

    #[error("invalid referrer for {0}")]
    InvalidReferrer(AccountId),

    #[error("fill price deviates {deviation} from oracle, max {max}")]
    PriceDeviation { deviation: UFixed6, max: UFixed6 },

    #[error("no version settled at {0}")]
    VersionNotFound(Timestamp),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
