//! Market runtime options. Economic parameters live in [`crate::params`].

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Audit events kept in memory; the oldest are dropped past this.
    pub max_events: usize,
    /// Log every committed event at debug level.
    pub log_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            log_events: false,
        }
    }
}
