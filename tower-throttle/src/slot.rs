use std::sync::Arc;

use parking_lot::RwLock;
use throttle_limit::Strategy;

/// Holds the limiter currently guarding an endpoint.
///
/// Swapping is a single reference write. Readers clone the `Arc` and drop the
/// lock before running their check, so checks already in flight finish
/// against the instance they loaded.
#[derive(Debug, Default)]
pub struct LimiterSlot {
    current: RwLock<Option<Arc<dyn Strategy>>>,
}

impl LimiterSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configured limiter, if any.
    pub fn load(&self) -> Option<Arc<dyn Strategy>> {
        self.current.read().clone()
    }

    /// Install `limiter`, returning the one it replaced.
    pub fn store(&self, limiter: Arc<dyn Strategy>) -> Option<Arc<dyn Strategy>> {
        self.current.write().replace(limiter)
    }

    pub fn is_configured(&self) -> bool {
        self.current.read().is_some()
    }
}
