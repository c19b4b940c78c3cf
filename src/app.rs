use std::sync::Arc;

use crate::config::EcoCfg;
use crate::metrics::AppMetrics;
use crate::readiness::Readiness;
use crate::store::MetricStore;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<EcoCfg>,
    pub ready: Arc<Readiness>,
    pub store: Arc<dyn MetricStore>,
    pub metrics: Arc<AppMetrics>,
}

impl AppState {
    pub fn new(cfg: EcoCfg, store: Arc<dyn MetricStore>) -> anyhow::Result<Self> {
        Ok(Self {
            cfg: Arc::new(cfg),
            ready: Arc::new(Readiness::new()),
            store,
            metrics: Arc::new(AppMetrics::new()?),
        })
    }
}
