//! # Queue Ingest CLI
//!
//! Command-line interface for running queue-ingest consumers.
//!
//! Commands:
//! - `run` starts the configured number of consumers, writes events to
//!   stdout as JSON lines and stops on Ctrl-C
//! - `validate` loads and checks the configuration, optionally printing it
//!
//! Logs go to stderr so that stdout carries only events.

use clap::{Parser, Subcommand};
use queue_ingest_core::{
    BatchProcessor, ConfigError, Consumer, ConsumerHandle, EventSink, IngestConfig, IngestError,
    JsonLinesSink, LogFormat, LoggingConfig, LoopExit,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// queue-ingest - Consume queue messages as structured events
#[derive(Parser)]
#[command(name = "queue-ingest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Poll an SQS queue and emit message bodies as structured events")]
pub struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "QUEUE_INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overriding the configuration file
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start consumers and emit events to stdout
    Run {
        /// Number of consumers, overriding `consumer_threads`
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Validate configuration
    Validate {
        /// Print the resolved configuration with secrets masked
        #[arg(short, long)]
        show: bool,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Consumer error: {0}")]
    Ingest(#[from] IngestError),

    #[error("{failed} of {total} consumers stopped after exhausting their retries")]
    ConsumersFailed { failed: usize, total: usize },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Ingest(_) => 2,
            Self::ConsumersFailed { .. } => 3,
            Self::InvalidArgument { .. } => 4,
            Self::CommandFailed { .. } => 5,
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse arguments and execute the selected command
pub async fn run_cli() -> Result<(), CliError> {
    execute(Cli::parse()).await
}

pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let loaded = IngestConfig::load(cli.config.as_deref());

    // Log with defaults when the configuration itself is unusable
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    initialize_logging(&cli, &logging)?;

    let config = loaded?;

    match cli.command {
        Commands::Run { threads } => run_consumers(config, threads).await,
        Commands::Validate { show } => validate_config(&config, show),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Set up the global subscriber; `RUST_LOG` wins over the configured level
fn initialize_logging(cli: &Cli, logging: &LoggingConfig) -> Result<(), CliError> {
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs || logging.format == LogFormat::Json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("failed to initialize logging: {}", e),
    })
}

/// Validate the configuration and optionally print it
pub fn validate_config(config: &IngestConfig, show: bool) -> Result<(), CliError> {
    config.validate()?;
    info!(queue = %config.queue_url, "Configuration is valid");

    if show {
        let rendered =
            serde_yaml::to_string(&config.redacted()).map_err(|e| CliError::CommandFailed {
                message: format!("failed to render configuration: {}", e),
            })?;
        println!("{}", rendered);
    }

    Ok(())
}

/// Run consumers until Ctrl-C or until every consumer has stopped
pub async fn run_consumers(config: IngestConfig, threads: Option<usize>) -> Result<(), CliError> {
    let threads = threads.unwrap_or(config.consumer_threads);
    if threads == 0 {
        return Err(CliError::InvalidArgument {
            arg: "threads".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    config.validate()?;
    let settings = config.settings()?;

    let sink: Arc<dyn EventSink> = Arc::new(JsonLinesSink::stdout());
    let processor = BatchProcessor::new(config.codec.build(), config.decorator(), sink);

    let mut handles: Vec<ConsumerHandle> = Vec::with_capacity(threads);
    for index in 0..threads {
        let consumer = Consumer::new(
            format!("consumer-{}", index),
            settings.clone(),
            processor.clone(),
        );

        match consumer.start(config.queue_config()).await {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!(consumer = index, error = %e, "Failed to start consumer");
                stop_all(handles).await;
                return Err(e.into());
            }
        }
    }

    info!(
        queue = %config.queue_url,
        consumers = threads,
        codec = processor.codec().name(),
        "Consumers started"
    );

    let stop_signals: Vec<_> = handles.iter().map(|h| h.stop_signal()).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping consumers");
            for signal in &stop_signals {
                signal.stop();
            }
        }
    });

    let failed = join_all(handles).await;
    if failed > 0 {
        return Err(CliError::ConsumersFailed {
            failed,
            total: threads,
        });
    }

    Ok(())
}

/// Wait for every consumer, returning how many ended abnormally
async fn join_all(handles: Vec<ConsumerHandle>) -> usize {
    let mut failed = 0;

    for handle in handles {
        let id = handle.id().to_string();
        let stats = handle.shared_stats();

        match handle.join().await {
            Ok(LoopExit::StopRequested) => {
                info!(consumer = %id, stats = ?stats.snapshot(), "Consumer finished");
            }
            Ok(LoopExit::RetriesExhausted) => {
                failed += 1;
                error!(consumer = %id, stats = ?stats.snapshot(), "Consumer gave up after exhausting retries");
            }
            Err(e) => {
                failed += 1;
                error!(consumer = %id, error = %e, "Consumer task failed");
            }
        }
    }

    failed
}

async fn stop_all(handles: Vec<ConsumerHandle>) {
    for handle in &handles {
        handle.stop();
    }
    join_all(handles).await;
}
