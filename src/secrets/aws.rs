//! AWS Secrets Manager implementation.
//!
//! Uses the AWS SDK for Rust with the standard credential chain
//! (environment, instance profile, etc.). Secret values are returned
//! verbatim; parsing the JSON payload is the caller's concern.

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;

use super::{SecretError, SecretManager, SecretResult};

/// Configuration for AWS Secrets Manager.
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerConfig {
    /// AWS region (e.g., "eu-west-3")
    pub region: Option<String>,
    /// Optional prefix for all secret names
    pub prefix: String,
    /// Optional endpoint URL for testing with localstack
    pub endpoint_url: Option<String>,
}

impl AwsSecretsManagerConfig {
    /// Create a new config with the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            prefix: String::new(),
            endpoint_url: None,
        }
    }

    /// Create a new config using the default region from environment.
    pub fn from_env() -> Self {
        Self {
            region: None,
            prefix: String::new(),
            endpoint_url: None,
        }
    }

    /// Set the secret name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set a custom endpoint URL (useful for localstack testing).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

/// AWS Secrets Manager client.
pub struct AwsSecretsManager {
    client: Client,
    prefix: String,
}

impl AwsSecretsManager {
    /// Create a new AWS Secrets Manager client with the given configuration.
    ///
    /// No network traffic happens here; connectivity is only exercised by
    /// `get` and `health_check`.
    pub async fn new(config: AwsSecretsManagerConfig) -> SecretResult<Self> {
        let mut aws_config = aws_config::from_env();

        if let Some(region) = &config.region {
            aws_config = aws_config.region(aws_config::Region::new(region.clone()));
        }

        let aws_config = aws_config.load().await;

        let mut sm_config = aws_sdk_secretsmanager::config::Builder::from(&aws_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            sm_config = sm_config.endpoint_url(endpoint_url);
        }

        let client = Client::from_conf(sm_config.build());

        Ok(Self {
            client,
            prefix: config.prefix,
        })
    }

    /// Build the full secret name with prefix.
    fn full_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}{}", self.prefix, name)
        }
    }
}

#[async_trait]
impl SecretManager for AwsSecretsManager {
    async fn get(&self, name: &str) -> SecretResult<Option<String>> {
        let full_name = self.full_name(name);

        match self
            .client
            .get_secret_value()
            .secret_id(&full_name)
            .send()
            .await
        {
            Ok(output) => {
                if let Some(secret_string) = output.secret_string() {
                    Ok(Some(secret_string.to_string()))
                } else if let Some(secret_binary) = output.secret_binary() {
                    String::from_utf8(secret_binary.clone().into_inner())
                        .map(Some)
                        .map_err(|e| {
                            SecretError::Internal(format!(
                                "Secret '{}' binary is not valid UTF-8: {}",
                                name, e
                            ))
                        })
                } else {
                    Ok(None)
                }
            }
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    Ok(None)
                } else {
                    Err(SecretError::Connection(format!(
                        "Failed to get secret '{}': {}",
                        name, service_error
                    )))
                }
            }
        }
    }

    async fn health_check(&self) -> SecretResult<()> {
        // List secrets with max results of 1 to verify connectivity
        match self.client.list_secrets().max_results(1).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_error = err.into_service_error();
                Err(SecretError::Connection(format!(
                    "AWS Secrets Manager health check failed: {}",
                    service_error
                )))
            }
        }
    }
}
