use crate::arn::parse_role_arn;
use crate::error::{Result, SsoError};
use crate::models::RoleCredentials;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_credential_types::Credentials;
use chrono::{TimeZone, Utc};
use std::time::{Duration, SystemTime};

/// Source name attached to the caller credentials handed to the SDK
const PROVIDER_NAME: &str = "ssocred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub external_id: Option<String>,
    pub source_identity: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StsApi: Send + Sync {
    /// Assume `request.role_arn` using `caller` as the identity
    async fn assume_role(
        &self,
        caller: &RoleCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<RoleCredentials>;
}

/// STS backed by the AWS SDK, one client per caller identity
pub struct SdkStsClient {
    region: String,
    retry: RetryConfig,
}

impl SdkStsClient {
    pub fn new(region: &str, max_attempts: u32, max_backoff: Duration) -> Self {
        Self {
            region: region.to_string(),
            retry: RetryConfig::standard()
                .with_max_attempts(max_attempts.max(1))
                .with_max_backoff(max_backoff),
        }
    }

    async fn client_for(&self, caller: &RoleCredentials) -> aws_sdk_sts::Client {
        let creds = Credentials::new(
            &caller.access_key_id,
            &caller.secret_access_key,
            Some(caller.session_token.clone()),
            Some(SystemTime::from(caller.expiration)),
            PROVIDER_NAME,
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()))
            .credentials_provider(creds)
            .retry_config(self.retry.clone())
            .load()
            .await;

        aws_sdk_sts::Client::new(&config)
    }
}

#[async_trait]
impl StsApi for SdkStsClient {
    async fn assume_role(
        &self,
        caller: &RoleCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<RoleCredentials> {
        let (account_id, role_name) = parse_role_arn(&request.role_arn)?;

        tracing::debug!(
            "AssumeRole {} as {}",
            request.role_arn,
            request.role_session_name
        );

        let response = self
            .client_for(caller)
            .await
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.role_session_name)
            .set_external_id(request.external_id.clone())
            .set_source_identity(request.source_identity.clone())
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("AssumeRole", e))?;

        let creds = response
            .credentials()
            .ok_or_else(|| SsoError::AwsSdk("No credentials in AssumeRole response".to_string()))?;

        let millis = creds
            .expiration()
            .to_millis()
            .map_err(|e| SsoError::AwsSdk(format!("Invalid expiration timestamp: {}", e)))?;
        let expiration = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| SsoError::AwsSdk("Invalid expiration timestamp".to_string()))?;

        Ok(RoleCredentials {
            account_id,
            role_name,
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration,
        })
    }
}
