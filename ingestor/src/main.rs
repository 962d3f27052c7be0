mod app;
mod ingest;
mod loader;
mod model;
mod normalize;
mod pipeline;
mod poller;
mod snapshot;
mod store;

use clap::{Parser, Subcommand};
use ingestor_core::{telemetry, Config, Error};
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[clap(name = "ingestor")]
#[clap(about = "Product catalog ingestion: poll, normalize, snapshot, upsert", version)]
struct Cli {
    /// Configuration file (defaults to ./ingestor.toml when present)
    #[clap(long, global = true, env = "INGESTOR_CONFIG")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the destination table if needed
    Init,

    /// Run the full pipeline once
    Run {
        #[clap(flatten)]
        overrides: Overrides,
    },

    /// Poll and write the snapshot without loading it
    Extract {
        #[clap(flatten)]
        overrides: Overrides,
    },

    /// Load a previously written snapshot
    Replay {
        /// Snapshot to load (defaults to the configured snapshot path)
        #[clap(long)]
        snapshot: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct Overrides {
    /// Override the catalog endpoint URL
    #[clap(long)]
    url: Option<String>,

    /// Override the total polling budget
    #[clap(long)]
    timeout_secs: Option<u64>,

    /// Override the pause between poll attempts
    #[clap(long)]
    interval_secs: Option<u64>,

    /// Override the snapshot location
    #[clap(long)]
    snapshot: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut Config) -> ingestor_core::Result<()> {
        if let Some(url) = self.url {
            config.source.url = url;
        }
        if let Some(timeout) = self.timeout_secs {
            config.poll.timeout_secs = timeout;
        }
        if let Some(interval) = self.interval_secs {
            config.poll.interval_secs = interval;
        }
        if let Some(snapshot) = self.snapshot {
            config.snapshot.path = snapshot;
        }
        config
            .validate()
            .map_err(|e| Error::Config(format!("invalid overrides: {}", e)))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e.downcast_ref::<Error>() {
            Some(err) => error!(
                error = %err,
                retryable = err.is_retryable(),
                fatal = err.is_fatal(),
                "Fatal error"
            ),
            None => error!(error = %e, "Fatal error"),
        }
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = load_config(cli.config.as_deref())?;

    // Initialize telemetry
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Commands::Init => {
            let app = connect(config).await?;
            app.init().await?;
            info!("Destination table is ready");
        }

        Commands::Run { overrides } => {
            overrides.apply(&mut config)?;

            info!(
                url = %config.source.url,
                timeout_secs = config.poll.timeout_secs,
                interval_secs = config.poll.interval_secs,
                "Starting ingestion run"
            );

            let app = connect(config).await?;
            let summary = app.run().await?;

            if summary.report.is_empty() {
                info!(run_id = %summary.run_id, "Source had no catalog items, nothing loaded");
            } else if !summary.report.failed.is_empty() {
                warn!(
                    run_id = %summary.run_id,
                    failed = ?summary.report.failed_ids(),
                    "Some records were not loaded"
                );
            }
        }

        Commands::Extract { overrides } => {
            overrides.apply(&mut config)?;
            let snapshot = config.snapshot.path.clone();

            let app = connect(config).await?;
            let written = app.extract().await?;
            info!(records = written, path = %snapshot.display(), "Extract finished");
        }

        Commands::Replay { snapshot } => {
            let snapshot = snapshot.unwrap_or_else(|| config.snapshot.path.clone());

            let app = connect(config).await?;
            let report = app.replay(&snapshot).await?;
            info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = ?report.failed_ids(),
                "Replay finished"
            );
        }
    }

    telemetry::shutdown();
    Ok(())
}

fn load_config(file: Option<&Path>) -> ingestor_core::Result<Config> {
    Config::load(file).map_err(|e| Error::Config(format!("failed to load config: {}", e)))
}

/// The pool connects on first use, so an unreachable database surfaces as a
/// schema error from the first stage rather than here.
async fn connect(config: Config) -> anyhow::Result<app::App> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect_lazy(&config.database.url)?;

    Ok(app::App::new(config, pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_overrides_are_applied_and_validated() {
        let cli = Cli::parse_from([
            "ingestor",
            "run",
            "--url",
            "http://localhost:9999/products",
            "--interval-secs",
            "5",
            "--snapshot",
            "/tmp/other.csv",
        ]);
        let Commands::Run { overrides } = cli.command else {
            panic!("expected run");
        };

        let mut config = Config::default();
        overrides.apply(&mut config).unwrap();

        assert_eq!(config.source.url, "http://localhost:9999/products");
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.timeout_secs, 300);
        assert_eq!(config.snapshot.path, PathBuf::from("/tmp/other.csv"));
    }

    #[test]
    fn zero_interval_override_is_rejected() {
        let cli = Cli::parse_from(["ingestor", "extract", "--interval-secs", "0"]);
        let Commands::Extract { overrides } = cli.command else {
            panic!("expected extract");
        };

        let err = overrides.apply(&mut Config::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn unreadable_config_file_is_a_config_error() {
        let err = load_config(Some(Path::new("/nonexistent/ingestor.toml"))).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("configuration error: failed to load config"));
    }
}
