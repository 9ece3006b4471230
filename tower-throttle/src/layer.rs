use std::sync::Arc;

use tower::Layer;

use crate::BucketKind;
use crate::LimiterSlot;
use crate::service::AdmissionService;

/// Applies admission control to requests.
#[derive(Debug, Clone)]
pub struct AdmissionLayer {
    slot: Arc<LimiterSlot>,
    kind: BucketKind,
}

impl AdmissionLayer {
    /// Create an AdmissionLayer checking the limiter held in `slot`.
    pub fn new(slot: Arc<LimiterSlot>, kind: BucketKind) -> Self {
        AdmissionLayer { slot, kind }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AdmissionService::new(service, Arc::clone(&self.slot), self.kind)
    }
}
