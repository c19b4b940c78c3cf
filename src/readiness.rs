use nix::sys::statvfs::statvfs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{EcoCfg, HealthCfg};
use crate::store::MetricStore;

pub struct Readiness {
    pub disk_ok: AtomicBool,
    pub store_ok: AtomicBool,
    draining: AtomicBool,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            disk_ok: AtomicBool::new(false),
            store_ok: AtomicBool::new(false),
            draining: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self, cfg: &HealthCfg) -> bool {
        if self.is_draining() {
            return false;
        }
        let store = !cfg.require_store || self.store_ok.load(Ordering::Relaxed);
        let disk = !cfg.require_disk || self.disk_ok.load(Ordering::Relaxed);
        store && disk
    }

    /// Marks the process as shutting down; readiness stays false from here on.
    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }
}

pub fn start_readiness_probes(
    cfg: Arc<EcoCfg>,
    store: Arc<dyn MetricStore>,
    ready: Arc<Readiness>,
) -> Vec<JoinHandle<()>> {
    let interval = Duration::from_millis(cfg.health.probe_interval_ms);
    let db_path = cfg.storage.db_path();
    let min = cfg.storage.min_free_bytes;

    // disk probe
    let disk = {
        let ready = ready.clone();
        tokio::spawn(async move {
            loop {
                let ok = match &db_path {
                    Some(path) => free_bytes_for(path).map(|b| b >= min).unwrap_or(false),
                    None => true,
                };
                ready.disk_ok.store(ok, Ordering::Relaxed);
                tokio::time::sleep(interval).await;
            }
        })
    };

    // store probe
    let store = {
        let ready = ready.clone();
        tokio::spawn(async move {
            loop {
                let ok = matches!(tokio::time::timeout(interval, store.ping()).await, Ok(Ok(())));
                if !ok && ready.store_ok.load(Ordering::Relaxed) {
                    tracing::warn!("store ping failed");
                }
                ready.store_ok.store(ok, Ordering::Relaxed);
                tokio::time::sleep(interval).await;
            }
        })
    };

    vec![disk, store]
}

fn free_bytes_for(path: &Path) -> anyhow::Result<u64> {
    let p = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stats = statvfs(p)?;
    Ok((stats.blocks_available() as u64) * (stats.fragment_size() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn readiness_respects_requirements() {
        let ready = Readiness::new();
        let mut health = HealthCfg {
            require_store: true,
            require_disk: false,
            probe_interval_ms: 10,
        };
        assert!(!ready.is_ready(&health));

        ready.store_ok.store(true, Ordering::Relaxed);
        assert!(ready.is_ready(&health));

        health.require_disk = true;
        assert!(!ready.is_ready(&health));

        ready.disk_ok.store(true, Ordering::Relaxed);
        assert!(ready.is_ready(&health));
    }

    #[test]
    fn draining_overrides_probes() {
        let ready = Readiness::new();
        ready.store_ok.store(true, Ordering::Relaxed);
        ready.disk_ok.store(true, Ordering::Relaxed);

        ready.begin_drain();
        assert!(!ready.is_ready(&HealthCfg::default()));
    }

    #[test]
    fn free_bytes_of_current_dir() {
        assert!(free_bytes_for(Path::new("data.db")).unwrap() > 0);
    }

    #[tokio::test]
    async fn store_probe_tracks_pool_state() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store: Arc<dyn MetricStore> =
            Arc::new(SqliteStore::with_pool(pool, "metrics").await.unwrap());

        let mut cfg = EcoCfg::default();
        cfg.storage.db_url = "sqlite::memory:".into();
        cfg.health.probe_interval_ms = 10;

        let ready = Arc::new(Readiness::new());
        let probes = start_readiness_probes(Arc::new(cfg), store.clone(), ready.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(ready.store_ok.load(Ordering::Relaxed));
        assert!(ready.disk_ok.load(Ordering::Relaxed));

        store.close().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!ready.store_ok.load(Ordering::Relaxed));

        for p in probes {
            p.abort();
        }
    }
}
