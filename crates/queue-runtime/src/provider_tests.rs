//! Tests for provider types.

use super::*;

#[test]
fn test_provider_limits() {
    assert_eq!(ProviderType::AwsSqs.max_batch_size(), 10);
    assert_eq!(ProviderType::InMemory.max_batch_size(), 10);
}

#[test]
fn test_queue_config_defaults() {
    let config = QueueConfig::default();
    assert_eq!(config.provider.provider_type(), ProviderType::InMemory);
    assert!(config.buffer.is_none());
}

#[test]
fn test_buffer_config_defaults() {
    let config = BufferConfig::default();
    assert_eq!(config.max_batch_open(), Duration::from_millis(5000));
    assert_eq!(config.max_inflight_receive_batches, 50);
    assert_eq!(config.max_done_receive_batches, 50);
}

#[test]
fn test_aws_config_defaults() {
    let config = AwsSqsConfig::new("eu-west-1");
    assert_eq!(config.region, "eu-west-1");
    assert_eq!(config.max_connections, 1000);
    assert!(config.endpoint_url.is_none());
    assert!(matches!(config.credentials, AwsCredentials::DefaultChain));
}

#[test]
fn test_provider_config_deserializes_tagged() {
    let json = r#"{
        "type": "aws_sqs",
        "region": "us-east-2",
        "credentials": { "type": "profile", "name": "ingest" }
    }"#;

    let config: ProviderConfig = serde_json::from_str(json).unwrap();
    match config {
        ProviderConfig::AwsSqs(aws) => {
            assert_eq!(aws.region, "us-east-2");
            assert_eq!(aws.max_connections, 1000);
            assert!(matches!(
                aws.credentials,
                AwsCredentials::Profile { ref name } if name == "ingest"
            ));
        }
        other => panic!("unexpected provider: {:?}", other),
    }
}

#[test]
fn test_static_credentials_debug_is_redacted() {
    let credentials = AwsCredentials::Static {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "super-secret".to_string(),
        session_token: None,
    };

    let rendered = format!("{:?}", credentials);
    assert!(rendered.contains("AKIDEXAMPLE"));
    assert!(!rendered.contains("super-secret"));
}
