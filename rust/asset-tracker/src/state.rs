use crate::{
    config::AppConfig, probe::Prober, recorders::LogRecorder, registry::AssetRegistry,
};
use std::sync::Arc;

/// Everything a handler needs, built once at startup and shared by clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: AssetRegistry,
    pub recorder: LogRecorder,
    pub prober: Arc<dyn Prober>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        registry: AssetRegistry,
        recorder: LogRecorder,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            config,
            registry,
            recorder,
            prober,
        }
    }
}
