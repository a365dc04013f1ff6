// perps-settlement: versioned settlement engine for perpetual markets.
// positions are settled against discrete oracle versions; every account's balance can be
// rebuilt from the versions it lived through.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs, fixed.rs: ids, timestamps, 6-decimal fixed point
//   1.3  storage.rs: field widths and range checks
//   2.x  order.rs, guarantee.rs: pending orders and intent-priced fills
//   3.x  position.rs: settled exposure, socialization, margin
//   4.x  global.rs: market and account ledgers
//   5.x  funding.rs: utilization curve, proportional funding controller
//   6.x  synbook.rs: price impact curve
//   7.x  params.rs, config.rs: parameters, presets, json loading
//   8.x  version.rs: per-version accumulator
//   9.x  oracle/: providers, keeper feed, router
//   10.x checkpoint.rs: per-account ledger
//   11.x events.rs: state transition events for audit
//   12.x engine/: the market. update, settle, intents, liquidation
//   13.x registry.rs: owner, coordinator, operators, referral fees

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod events;
pub mod fixed;
pub mod funding;
pub mod global;
pub mod guarantee;
pub mod oracle;
pub mod order;
pub mod params;
pub mod position;
pub mod registry;
pub mod storage;
pub mod synbook;
pub mod types;
pub mod version;

// re exports for convenience
pub use checkpoint::Checkpoint;
pub use config::{ConfigError, Environment, SettlementConfig};
pub use engine::*;
pub use events::*;
pub use fixed::{Accumulator, Fixed6, UFixed6};
pub use global::{Global, Local};
pub use guarantee::Guarantee;
pub use oracle::{
    KeeperConfig, KeeperProvider, Oracle, OracleError, OracleProvider, OracleReceipt,
    OracleVersion,
};
pub use order::Order;
pub use params::{MarketParameter, ParameterError, RiskParameter};
pub use position::{Position, PositionError};
pub use registry::{Registry, RegistryError};
pub use storage::{StorageError, Stored};
pub use types::*;
pub use version::{Version, VersionError};
