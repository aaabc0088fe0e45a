//! Tests for the queue-ingest-cli library module.

use super::*;

fn valid_config() -> IngestConfig {
    IngestConfig {
        queue_url: "https://sqs.us-east-1.amazonaws.com/123456789012/orders".to_string(),
        ..IngestConfig::default()
    }
}

#[test]
fn test_cli_parsing_run() {
    let cli = Cli::try_parse_from(["queue-ingest", "--json-logs", "run", "--threads", "3"]).unwrap();

    assert!(cli.json_logs);
    assert!(cli.log_level.is_none());
    match cli.command {
        Commands::Run { threads } => assert_eq!(threads, Some(3)),
        _ => panic!("Expected Run command"),
    }
}

#[test]
fn test_cli_parsing_validate_with_config() {
    let cli = Cli::try_parse_from([
        "queue-ingest",
        "--config",
        "/etc/queue-ingest/orders.yaml",
        "-l",
        "debug",
        "validate",
        "--show",
    ])
    .unwrap();

    assert_eq!(
        cli.config,
        Some(PathBuf::from("/etc/queue-ingest/orders.yaml"))
    );
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    match cli.command {
        Commands::Validate { show } => assert!(show),
        _ => panic!("Expected Validate command"),
    }
}

#[test]
fn test_cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["queue-ingest"]).is_err());
}

#[test]
fn test_exit_codes_are_distinct() {
    let errors = [
        CliError::Configuration(ConfigError::Missing {
            key: "queue_url".to_string(),
        }),
        CliError::Ingest(IngestError::Task {
            message: "panicked".to_string(),
        }),
        CliError::ConsumersFailed {
            failed: 1,
            total: 2,
        },
        CliError::InvalidArgument {
            arg: "threads".to_string(),
            message: "must be at least 1".to_string(),
        },
        CliError::CommandFailed {
            message: "boom".to_string(),
        },
    ];

    let mut codes: Vec<i32> = errors.iter().map(CliError::exit_code).collect();
    assert!(codes.iter().all(|c| *c != 0));
    codes.dedup();
    assert_eq!(codes.len(), errors.len());
}

#[test]
fn test_validate_config_accepts_valid_configuration() {
    assert!(validate_config(&valid_config(), false).is_ok());
}

#[test]
fn test_validate_config_reports_missing_queue() {
    let result = validate_config(&IngestConfig::default(), false);
    assert!(matches!(
        result,
        Err(CliError::Configuration(ConfigError::Missing { .. }))
    ));
}

#[tokio::test]
async fn test_run_rejects_zero_threads() {
    let result = run_consumers(valid_config(), Some(0)).await;
    assert!(matches!(result, Err(CliError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_run_rejects_invalid_configuration() {
    let result = run_consumers(IngestConfig::default(), None).await;
    assert!(matches!(result, Err(CliError::Configuration(_))));
}

#[test]
fn test_validate_config_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.yaml");
    std::fs::write(
        &path,
        "queue_url: https://sqs.eu-west-1.amazonaws.com/123456789012/audit\n\
         region: eu-west-1\n\
         codec: json_lines\n\
         consumer_threads: 2\n",
    )
    .unwrap();

    let config = IngestConfig::load(Some(&path)).unwrap();

    assert_eq!(config.region, "eu-west-1");
    assert_eq!(config.consumer_threads, 2);
    assert!(validate_config(&config, true).is_ok());
}
