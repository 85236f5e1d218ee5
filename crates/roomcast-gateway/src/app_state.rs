//! Shared application state for the reference gateway.
//!
//! One `Hub` per process, owned here and handed to handlers by reference.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::obs::HubMetrics;
use crate::realtime::Hub;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<GatewayConfig>,
    hub: Arc<Hub>,
}

impl AppState {
    pub fn new(cfg: GatewayConfig) -> Self {
        let metrics = Arc::new(HubMetrics::default());
        Self {
            cfg: Arc::new(cfg),
            hub: Arc::new(Hub::with_metrics(metrics)),
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.cfg
    }

    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    pub fn metrics(&self) -> &HubMetrics {
        self.hub.metrics()
    }
}
