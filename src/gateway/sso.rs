use crate::error::{Result, SsoError};
use crate::models::{AccountInfo, Page, RoleCredentials};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_sso::Client as SsoClient;
use chrono::{TimeZone, Utc};

/// Largest page size the SSO list APIs accept
pub const MAX_RESULTS: i32 = 1000;

/// The AWS SSO portal API. One call per method, no retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SsoApi: Send + Sync {
    /// Accounts come back with `id` 0; the catalog numbers them
    async fn list_accounts(
        &self,
        access_token: &str,
        next_token: Option<String>,
    ) -> Result<Page<AccountInfo>>;

    /// Role names assigned to the user in `account_id`
    async fn list_account_roles(
        &self,
        access_token: &str,
        account_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredentials>;

    async fn logout(&self, access_token: &str) -> Result<()>;
}

/// SSO portal API backed by the AWS SDK. SDK retries are off since
/// `RetryGateway` owns the retry policy for these calls.
pub struct SdkSsoClient {
    client: SsoClient,
}

impl SdkSsoClient {
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        Self {
            client: SsoClient::new(&config),
        }
    }
}

#[async_trait]
impl SsoApi for SdkSsoClient {
    async fn list_accounts(
        &self,
        access_token: &str,
        next_token: Option<String>,
    ) -> Result<Page<AccountInfo>> {
        let response = self
            .client
            .list_accounts()
            .access_token(access_token)
            .max_results(MAX_RESULTS)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("ListAccounts", e))?;

        let items = response
            .account_list()
            .iter()
            .map(|account| AccountInfo {
                id: 0,
                account_id: account.account_id().unwrap_or("").to_string(),
                account_name: account.account_name().unwrap_or("").to_string(),
                email_address: account.email_address().unwrap_or("").to_string(),
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(|s| s.to_string()),
        })
    }

    async fn list_account_roles(
        &self,
        access_token: &str,
        account_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let response = self
            .client
            .list_account_roles()
            .access_token(access_token)
            .account_id(account_id)
            .max_results(MAX_RESULTS)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("ListAccountRoles", e))?;

        let items = response
            .role_list()
            .iter()
            .filter_map(|role| role.role_name().map(|s| s.to_string()))
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(|s| s.to_string()),
        })
    }

    async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredentials> {
        let response = self
            .client
            .get_role_credentials()
            .access_token(access_token)
            .account_id(account_id)
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("GetRoleCredentials", e))?;

        let role_creds = response
            .role_credentials()
            .ok_or_else(|| SsoError::AwsSdk("No role_credentials in response".to_string()))?;

        let expiration = Utc
            .timestamp_millis_opt(role_creds.expiration())
            .single()
            .ok_or_else(|| SsoError::AwsSdk("Invalid expiration timestamp".to_string()))?;

        Ok(RoleCredentials {
            account_id: account_id.to_string(),
            role_name: role_name.to_string(),
            access_key_id: role_creds
                .access_key_id()
                .ok_or_else(|| SsoError::AwsSdk("No access_key_id in credentials".to_string()))?
                .to_string(),
            secret_access_key: role_creds
                .secret_access_key()
                .ok_or_else(|| {
                    SsoError::AwsSdk("No secret_access_key in credentials".to_string())
                })?
                .to_string(),
            session_token: role_creds
                .session_token()
                .ok_or_else(|| SsoError::AwsSdk("No session_token in credentials".to_string()))?
                .to_string(),
            expiration,
        })
    }

    async fn logout(&self, access_token: &str) -> Result<()> {
        self.client
            .logout()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| SsoError::from_sdk("Logout", e))?;
        Ok(())
    }
}
