//! Shared plumbing for the curator binaries: logging setup, configuration
//! loading with command-line overrides, and client construction.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use curator::{CuratorConfig, LoggingConfig};
use curator_client::EsClient;

/// Connection and logging flags shared by both binaries. Every flag
/// overrides the corresponding config-file key.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalFlags {
    /// Path to the curator configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Elasticsearch endpoints (repeatable or comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Elastic Cloud cloud_id
    #[arg(long, global = true)]
    pub cloud_id: Option<String>,

    /// Pre-encoded API key token
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(long, global = true)]
    pub password: Option<String>,

    /// CA bundle for TLS verification
    #[arg(long, global = true)]
    pub ca_certs: Option<PathBuf>,

    #[arg(long, global = true)]
    pub client_cert: Option<PathBuf>,

    #[arg(long, global = true)]
    pub client_key: Option<PathBuf>,

    /// Disable TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub request_timeout: Option<u64>,

    #[arg(long, global = true)]
    pub loglevel: Option<String>,

    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    /// `default` or `json`
    #[arg(long, global = true)]
    pub logformat: Option<String>,
}

impl GlobalFlags {
    /// Load the config file (if any) and fold the flags in on top.
    pub fn resolve(&self) -> Result<CuratorConfig> {
        let mut config = match &self.config {
            Some(path) => CuratorConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => CuratorConfig::default(),
        };

        let es = &mut config.elasticsearch;
        if !self.hosts.is_empty() {
            es.hosts = self.hosts.clone();
            es.cloud_id = None;
        }
        if let Some(cloud_id) = &self.cloud_id {
            es.cloud_id = Some(cloud_id.clone());
            es.hosts.clear();
        }
        if let Some(token) = &self.api_key {
            es.api_key.token = Some(token.clone());
        }
        if let Some(username) = &self.username {
            es.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            es.password = Some(password.clone());
        }
        if let Some(ca) = &self.ca_certs {
            es.ca_certs = Some(ca.clone());
        }
        if let Some(cert) = &self.client_cert {
            es.client_cert = Some(cert.clone());
        }
        if let Some(key) = &self.client_key {
            es.client_key = Some(key.clone());
        }
        if self.insecure {
            es.verify_certs = false;
        }
        if let Some(timeout) = self.request_timeout {
            es.request_timeout = timeout;
        }

        let logging = &mut config.logging;
        if let Some(level) = &self.loglevel {
            logging.loglevel = level.clone();
        }
        if let Some(file) = &self.logfile {
            logging.logfile = Some(file.display().to_string());
        }
        if let Some(format) = &self.logformat {
            logging.logformat = format.clone();
        }

        Ok(config)
    }
}

/// Initialize the tracing subscriber from the logging config.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = match config.loglevel.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        other => anyhow::bail!("unknown loglevel: {}", other),
    };
    let mut directives = vec![level.to_string()];
    for module in &config.blacklist {
        directives.push(format!("{}=off", module));
    }
    let filter = EnvFilter::try_new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| directives.join(",")),
    )?;

    let json = config.logformat.eq_ignore_ascii_case("json");
    match &config.logfile {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening logfile {}", path))?;
            let writer = std::sync::Arc::new(file);
            if json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_ansi(false)
                            .with_writer(writer),
                    )
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_ansi(false)
                            .with_writer(writer),
                    )
                    .init();
            }
        }
        None => {
            if json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer().json())
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer())
                    .init();
            }
        }
    }
    Ok(())
}

/// Build the Elasticsearch client and, when `master_only` is configured,
/// verify the connected node is the elected master. Returns `None` when the
/// node is not the master (the conventional do-nothing success case).
pub async fn connect(config: &CuratorConfig) -> Result<Option<EsClient>> {
    let client = EsClient::new(&config.elasticsearch)?;
    if config.elasticsearch.master_only && !client.is_elected_master().await? {
        tracing::info!("connected node is not the elected master; nothing to do");
        return Ok(None);
    }
    Ok(Some(client))
}

/// Map a curator error to its process exit code and print it.
pub fn exit_with(error: &curator::Error) -> ! {
    eprintln!("Error: {}", error);
    std::process::exit(error.exit_code());
}
