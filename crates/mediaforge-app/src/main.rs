// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mediaforge server entry point.
//
// Initialises logging, loads the configuration, starts the HTTP server and
// runs until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mediaforge_core::config::default_config_path;
use mediaforge_core::{Result, ServerConfig};
use mediaforge_server::{AppState, MediaServer};
use tracing::{error, info};

/// Self-hosted media converter server.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Configuration file (JSON).
    ///
    /// Defaults to `mediaforge/config.json` under the XDG config directory.
    /// Missing files fall back to built-in defaults; `MEDIAFORGE_*`
    /// environment variables override either.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(args.config_path()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "mediaforge failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: PathBuf) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Mediaforge starting");

    let config = ServerConfig::load(&config_path)?.with_env_overrides();
    config.validate()?;

    let mut server = MediaServer::new(AppState::new(config));
    let addr = server.start().await?;
    info!(%addr, features = ?AppState::features(), "ready");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    server.stop().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_flag_in_every_spelling() {
        for argv in [
            ["mediaforge", "--config", "/etc/mf.json"].as_slice(),
            &["mediaforge", "--config=/etc/mf.json"],
            &["mediaforge", "-c", "/etc/mf.json"],
        ] {
            let args = Args::try_parse_from(argv).unwrap();
            assert_eq!(args.config_path(), PathBuf::from("/etc/mf.json"));
        }
    }

    #[test]
    fn no_arguments_use_the_default_location() {
        let args = Args::try_parse_from(["mediaforge"]).unwrap();
        assert_eq!(args.config_path(), default_config_path());
    }

    #[test]
    fn bad_arguments_are_reported() {
        assert!(Args::try_parse_from(["mediaforge", "--config"]).is_err());
        let err = Args::try_parse_from(["mediaforge", "--port", "80"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn help_and_version_are_generated() {
        let err = Args::try_parse_from(["mediaforge", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let err = Args::try_parse_from(["mediaforge", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }
}
