use std::net::SocketAddr;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ecopulse", version, about = "Metrics ingestion endpoint")]
pub struct Cli {
    /// Extra config file, layered above `ecopulse.toml` and the environment.
    #[arg(long)]
    pub config: Option<String>,

    /// Overrides `http.bind`.
    #[arg(long)]
    pub http_bind: Option<SocketAddr>,

    /// Overrides `storage.db_url`.
    #[arg(long)]
    pub db_url: Option<String>,

    /// Print the resolved bind address and exit.
    #[arg(long)]
    pub print_bind: bool,
}

impl Cli {
    /// Flags that take precedence over every config source.
    pub fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(bind) = self.http_bind {
            out.push(("http.bind", bind.to_string()));
        }
        if let Some(url) = &self.db_url {
            out.push(("storage.db_url", url.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_overrides() {
        let cli = Cli::try_parse_from([
            "ecopulse",
            "--http-bind",
            "127.0.0.1:6000",
            "--db-url",
            "sqlite::memory:",
        ])
        .unwrap();

        assert_eq!(
            cli.overrides(),
            vec![
                ("http.bind", "127.0.0.1:6000".to_string()),
                ("storage.db_url", "sqlite::memory:".to_string()),
            ]
        );
        assert!(!cli.print_bind);
    }

    #[test]
    fn rejects_bad_bind() {
        assert!(Cli::try_parse_from(["ecopulse", "--http-bind", "nope"]).is_err());
    }
}
