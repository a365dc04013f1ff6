// 9.0 oracle/: versioned price authority.
// providers produce an append-only stream of (timestamp, price, valid) versions; the router
// hands authority between providers without ever presenting an older version.

mod keeper;
mod provider;
mod router;
mod version;

pub use keeper::{KeeperConfig, KeeperProvider};
pub use provider::{OracleError, OracleProvider};
pub use router::Oracle;
pub use version::{OracleReceipt, OracleVersion};
