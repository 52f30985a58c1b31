//! easytcp server entry point.
//!
//! Accepts TCP connections, runs the handshake with each peer and dispatches
//! its requests to the built-in `echo`, `join` and `leave` handlers.
//!
//! # Usage
//!
//! ```text
//! easytcp-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>  TOML config file [env: EASYTCP_CONFIG]
//!   --bind   <IP>    Override network.bind_address [env: EASYTCP_BIND]
//!   --port   <PORT>  Override network.port [env: EASYTCP_PORT]
//! ```
//!
//! Command-line values take precedence over the config file. `RUST_LOG`
//! takes precedence over the configured `log_level`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use easytcp_server::application::builtin::register_builtin_handlers;
use easytcp_server::application::{HandlerRegistry, Server};
use easytcp_server::infrastructure::{run_server, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Session server for the easytcp request/response protocol.
#[derive(Debug, Parser)]
#[command(name = "easytcp-server", version)]
struct Cli {
    /// Path to a TOML config file. A missing file means all defaults.
    #[arg(long, env = "EASYTCP_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind to, e.g. `0.0.0.0` or `127.0.0.1`.
    #[arg(long, env = "EASYTCP_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "EASYTCP_PORT")]
    port: Option<u16>,
}

impl Cli {
    /// Loads the config file (if any) and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if the
    /// resulting bind address is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load_from_path(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }

        config
            .network
            .socket_addr()
            .context("invalid listener address")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "easytcp server starting on {}:{} (protocol {})",
        config.network.bind_address, config.network.port, config.protocol.version
    );

    let mut handlers = HandlerRegistry::new();
    register_builtin_handlers(&mut handlers).context("failed to register built-in handlers")?;
    let server = Arc::new(Server::new(config).with_handlers(handlers));

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(server, running).await?;

    info!("easytcp server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("easytcp-server").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_without_arguments_uses_default_config() {
        let config = Cli {
            config: None,
            bind: None,
            port: None,
        }
        .into_server_config()
        .unwrap();

        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_cli_port_and_bind_override() {
        // Arrange
        let cli = cli(&["--bind", "127.0.0.1", "--port", "9999"]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.network.socket_addr().unwrap().to_string(), "127.0.0.1:9999");
    }

    #[test]
    fn test_cli_invalid_bind_returns_error() {
        let cli = Cli {
            config: None,
            bind: Some("not.an.ip".to_string()),
            port: None,
        };

        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_cli_missing_config_file_falls_back_to_defaults() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/easytcp/config.toml")),
            bind: None,
            port: Some(4000),
        };

        let config = cli.into_server_config().unwrap();

        assert_eq!(config.network.port, 4000);
        assert_eq!(config.protocol, ServerConfig::default().protocol);
    }
}
