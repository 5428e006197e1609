use crate::error::{Result, SsoError};
use crate::models::{AccessToken, ClientRegistration, DeviceAuthorization};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_ssooidc::Client as SsoOidcClient;
use std::time::Duration;

pub const CLIENT_NAME: &str = "ssocred";
pub const CLIENT_TYPE: &str = "public";
pub const GRANT_TYPE_DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

/// The three SSO OIDC calls used by the device authorization flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OidcApi: Send + Sync {
    async fn register_client(
        &self,
        client_name: &str,
        client_type: &str,
    ) -> Result<ClientRegistration>;

    async fn start_device_authorization(
        &self,
        start_url: &str,
        client: &ClientRegistration,
    ) -> Result<DeviceAuthorization>;

    /// Fails with `AuthorizationPending` or `SlowDown` while the user has not finished
    async fn create_token(
        &self,
        client: &ClientRegistration,
        device_code: &str,
    ) -> Result<AccessToken>;
}

/// SSO OIDC backed by the AWS SDK
pub struct SdkOidcClient {
    client: SsoOidcClient,
}

impl SdkOidcClient {
    pub async fn new(region: &str, max_attempts: u32, max_backoff: Duration) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .retry_config(
                RetryConfig::standard()
                    .with_max_attempts(max_attempts.max(1))
                    .with_max_backoff(max_backoff),
            )
            .load()
            .await;

        Self {
            client: SsoOidcClient::new(&config),
        }
    }
}

#[async_trait]
impl OidcApi for SdkOidcClient {
    async fn register_client(
        &self,
        client_name: &str,
        client_type: &str,
    ) -> Result<ClientRegistration> {
        tracing::debug!("Registering client with SSO-OIDC");

        let response = self
            .client
            .register_client()
            .client_name(client_name)
            .client_type(client_type)
            .grant_types(GRANT_TYPE_REFRESH_TOKEN)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("RegisterClient", e))?;

        Ok(ClientRegistration {
            client_id: response
                .client_id()
                .ok_or_else(|| SsoError::AwsSdk("No client_id in response".to_string()))?
                .to_string(),
            client_secret: response
                .client_secret()
                .ok_or_else(|| SsoError::AwsSdk("No client_secret in response".to_string()))?
                .to_string(),
            issued_at: response.client_id_issued_at(),
            secret_expires_at: response.client_secret_expires_at(),
        })
    }

    async fn start_device_authorization(
        &self,
        start_url: &str,
        client: &ClientRegistration,
    ) -> Result<DeviceAuthorization> {
        tracing::debug!("Starting device authorization for: {}", start_url);

        let response = self
            .client
            .start_device_authorization()
            .client_id(&client.client_id)
            .client_secret(&client.client_secret)
            .start_url(start_url)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("StartDeviceAuthorization", e))?;

        Ok(DeviceAuthorization {
            device_code: response
                .device_code()
                .ok_or_else(|| SsoError::AwsSdk("No device_code in response".to_string()))?
                .to_string(),
            user_code: response
                .user_code()
                .ok_or_else(|| SsoError::AwsSdk("No user_code in response".to_string()))?
                .to_string(),
            verification_uri: response
                .verification_uri()
                .ok_or_else(|| SsoError::AwsSdk("No verification_uri in response".to_string()))?
                .to_string(),
            verification_uri_complete: response.verification_uri_complete().map(|s| s.to_string()),
            expires_in: response.expires_in(),
            interval: response.interval(),
        })
    }

    async fn create_token(
        &self,
        client: &ClientRegistration,
        device_code: &str,
    ) -> Result<AccessToken> {
        let response = self
            .client
            .create_token()
            .client_id(&client.client_id)
            .client_secret(&client.client_secret)
            .grant_type(GRANT_TYPE_DEVICE_CODE)
            .device_code(device_code)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("CreateToken", e))?;

        let access_token = response
            .access_token()
            .ok_or_else(|| SsoError::AwsSdk("No access_token in response".to_string()))?;

        tracing::debug!("Token expires in {} seconds", response.expires_in());

        Ok(AccessToken::new(
            access_token,
            response.token_type().unwrap_or_default(),
            response.expires_in(),
            response.id_token().map(|s| s.to_string()),
            response.refresh_token().map(|s| s.to_string()),
        ))
    }
}
