use log::{debug, info, warn};

/// Thin wrapper over the `log` facade that prefixes every line with the
/// emitting component.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Stage-level summary.
    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    /// Per-line or per-iteration detail.
    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }

    /// Recovered condition that degraded part of a result.
    pub fn degraded(&self, message: &str) {
        warn!("[{}] {}", self.component, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("xrfcore")
    }
}
