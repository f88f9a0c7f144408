mod config;

use clap::{Parser, Subcommand};
use config::{Config, LoggingConfig, MetricsConfig, Settings, Source};
use metrics_exporter_statsd::StatsdBuilder;
use reconciler::{SyncError, SyncOptions, SyncOutcome};
use remote_settings::RemoteSettingsClient;
use shared::metrics_defs::describe_all;
use signatures::{ArchiveSource, RowsSource, SignatureSource};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "crash_sync";

/// Keeps the crash id collection in line with the current top crashers.
#[derive(Parser)]
#[command(name = "crash-sync", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand, Clone, Copy, Debug, Default, PartialEq)]
enum CliCommand {
    /// Reconcile the collection with the latest top crashers (default)
    #[default]
    Sync,
    /// Delete every record in the collection
    Purge,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests land here too.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match Config::load(&cli.settings) {
        Ok(config) => config,
        Err(e) => {
            let _guard = init_logging(None);
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = init_logging(config.logging.as_ref());

    if let Some(metrics) = &config.metrics {
        if let Err(e) = init_metrics(metrics) {
            tracing::error!("Failed to set up metrics: {e}");
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command.unwrap_or_default(), config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, config: Config) -> Result<(), SyncError> {
    let client = Arc::new(RemoteSettingsClient::new(&config.collection)?);
    if client.is_dry_run() {
        tracing::info!("Dry run: no changes will be sent to {}", client.collection_endpoint());
    }

    match command {
        CliCommand::Sync => {
            let source = build_source(&config.source);
            let options = SyncOptions {
                force_update: config.force_update,
                environment: config.environment,
                max_in_flight: config.max_in_flight,
            };

            match reconciler::sync(client, source.as_ref(), &options).await? {
                SyncOutcome::UpToDate { .. } => {}
                SyncOutcome::Synced(summary) => {
                    if summary.upsert_failures + summary.delete_failures > 0 {
                        tracing::warn!(
                            upsert_failures = summary.upsert_failures,
                            delete_failures = summary.delete_failures,
                            "Some records were not updated"
                        );
                    }
                }
            }
        }
        CliCommand::Purge => {
            reconciler::purge(&client, config.environment).await?;
        }
    }

    Ok(())
}

fn build_source(source: &Source) -> Box<dyn SignatureSource> {
    match source {
        Source::Archive(archive) => Box::new(ArchiveSource::new(archive.clone())),
        Source::Rows(path) => Box::new(RowsSource::new(path)),
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`). Errors are also
/// reported to Sentry when a DSN is configured.
fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| "a metrics recorder is already installed")?;

    describe_all(remote_settings::metrics_defs::ALL_METRICS);
    describe_all(signatures::metrics_defs::ALL_METRICS);
    describe_all(reconciler::metrics_defs::ALL_METRICS);

    tracing::info!(
        "Sending metrics to {}:{}",
        config.statsd_host,
        config.statsd_port
    );
    Ok(())
}
