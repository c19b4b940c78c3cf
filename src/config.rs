use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

pub const ENV_PREFIX: &str = "ECOPULSE";
pub const DEFAULT_FILE: &str = "ecopulse";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EcoCfg {
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub health: HealthCfg,
    #[serde(default)]
    pub ingest: IngestCfg,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct HttpCfg {
    pub bind: SocketAddr,
    /// How long `/readyz` reports 503 before the listener stops accepting.
    pub drain_grace_ms: u64,
}
impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            drain_grace_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct StorageCfg {
    pub db_url: String,
    pub collection: String,
    pub max_connections: u32,
    pub min_free_bytes: u64,
}
impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            db_url: "sqlite://ecopulse.db".into(),
            collection: "metrics".into(),
            max_connections: 5,
            min_free_bytes: 1,
        }
    }
}

impl StorageCfg {
    /// Filesystem location of the database, or `None` for in-memory databases.
    pub fn db_path(&self) -> Option<PathBuf> {
        let rest = self
            .db_url
            .strip_prefix("sqlite://")
            .or_else(|| self.db_url.strip_prefix("sqlite:"))
            .unwrap_or(&self.db_url);
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, q),
            None => (rest, ""),
        };
        if path.is_empty() || path == ":memory:" || query.contains("mode=memory") {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct HealthCfg {
    pub require_store: bool,
    pub require_disk: bool,
    pub probe_interval_ms: u64,
}
impl Default for HealthCfg {
    fn default() -> Self {
        Self {
            require_store: true,
            require_disk: false,
            probe_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct IngestCfg {
    pub max_fields: usize,
    /// Opt-in request body cap; unset means bodies of any size are read.
    pub max_payload_bytes: Option<usize>,
}
impl Default for IngestCfg {
    fn default() -> Self {
        Self {
            max_fields: 20,
            max_payload_bytes: None,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
}

impl EcoCfg {
    pub fn load(path: Option<String>) -> anyhow::Result<Self> {
        Self::load_with_overrides(path, &[])
    }

    /// Loads defaults < `ecopulse.toml` < `ECOPULSE__*` env < `path` < `overrides`.
    ///
    /// Override keys use dotted config paths, e.g. `("http.bind", "127.0.0.1:6000")`.
    pub fn load_with_overrides(
        path: Option<String>,
        overrides: &[(&str, String)],
    ) -> anyhow::Result<Self> {
        let cfg = Self::from_builder(build_config(path, overrides)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.storage.db_url.trim().is_empty(),
            "storage.db_url cannot be empty"
        );
        anyhow::ensure!(
            is_identifier(&self.storage.collection),
            "storage.collection must be a plain identifier, got {:?}",
            self.storage.collection
        );
        anyhow::ensure!(
            self.storage.max_connections >= 1,
            "storage.max_connections must be at least 1"
        );
        anyhow::ensure!(
            self.ingest.max_fields >= 1,
            "ingest.max_fields must be at least 1"
        );
        anyhow::ensure!(
            self.health.probe_interval_ms >= 1,
            "health.probe_interval_ms must be at least 1"
        );
        Ok(())
    }

    fn from_builder(cfg: config::Config) -> anyhow::Result<Self> {
        Ok(cfg.try_deserialize()?)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn build_config(
    path: Option<String>,
    overrides: &[(&str, String)],
) -> anyhow::Result<config::Config> {
    use config::{Config, Environment, File};
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_FILE).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));
    if let Some(path) = path {
        builder = builder.add_source(File::with_name(&path));
    }
    for (key, value) in overrides {
        builder = builder.set_override(*key, value.as_str())?;
    }
    Ok(builder.build()?)
}
