// 12.0: the settlement market. orders go in through update/update_intent/protect, settle
// folds finalized oracle versions into market versions and account checkpoints.
// deterministic, single-threaded and transactional: a failed call leaves no trace.

mod config;
mod context;
mod core;
mod results;
mod settle;
mod update;

pub use config::EngineConfig;
pub use core::{AccountState, Market, PendingEntry};
pub use results::{EngineError, Intent, IntentResult, UpdateRequest};
