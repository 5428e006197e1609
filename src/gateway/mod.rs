// Retrying access to the AWS SSO portal API
mod sso;

#[cfg(test)]
pub use sso::MockSsoApi;
pub use sso::{SdkSsoClient, SsoApi, MAX_RESULTS};

use crate::auth::AuthSession;
use crate::config::{DEFAULT_MAX_BACKOFF_SECONDS, DEFAULT_MAX_RETRY};
use crate::error::{Result, SsoError};
use crate::models::{AccountInfo, Page, RoleCredentials};
use crate::wait::{sleep_or_cancel, Backoff};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// First backoff step; doubles on every retry up to `max_backoff`
pub const BASE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retry: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_retry: u32, max_backoff: Duration) -> Self {
        Self {
            max_retry,
            backoff: Backoff::new(BASE_BACKOFF, max_backoff),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRY,
            Duration::from_secs(DEFAULT_MAX_BACKOFF_SECONDS),
        )
    }
}

/// Calls the SSO API with the session's current token.
///
/// Throttling and other failures are retried with backoff. A rejected token
/// triggers one re-authentication; if the refreshed token is rejected as
/// well the call fails.
pub struct RetryGateway {
    api: Arc<dyn SsoApi>,
    auth: Arc<AuthSession>,
    policy: RetryPolicy,
}

impl RetryGateway {
    pub fn new(api: Arc<dyn SsoApi>, auth: Arc<AuthSession>, policy: RetryPolicy) -> Self {
        Self { api, auth, policy }
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn list_accounts(&self, next_token: Option<String>) -> Result<Page<AccountInfo>> {
        let api = &self.api;
        self.call("ListAccounts", move |token| {
            let next_token = next_token.clone();
            async move { api.list_accounts(&token, next_token).await }
        })
        .await
    }

    pub async fn list_account_roles(
        &self,
        account_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let api = &self.api;
        self.call("ListAccountRoles", move |token| {
            let next_token = next_token.clone();
            async move { api.list_account_roles(&token, account_id, next_token).await }
        })
        .await
    }

    pub async fn get_role_credentials(
        &self,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredentials> {
        let api = &self.api;
        self.call("GetRoleCredentials", move |token| async move {
            api.get_role_credentials(&token, account_id, role_name)
                .await
        })
        .await
    }

    /// Invalidate `access_token` server side. Not retried.
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        self.api.logout(access_token).await
    }

    async fn call<T, F, Fut>(&self, operation: &str, request: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cancel = self.auth.cancellation();
        let mut token = self.auth.access_token().await?;
        let mut reauthenticated = false;
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SsoError::Cancelled);
            }

            let err = match request(token.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            // the request with a refreshed token does not count as a retry
            if err.is_unauthorized() {
                if reauthenticated {
                    return Err(SsoError::AuthenticationFailed {
                        instance: self.auth.instance().name.clone(),
                        reason: format!("{} rejected the refreshed SSO token: {}", operation, err),
                    });
                }
                tracing::debug!("{} rejected the SSO token: {}", operation, err);
                reauthenticated = true;
                token = self.auth.refresh_after_unauthorized(&token).await?;
                continue;
            }
            reauthenticated = false;

            if err.is_throttled() {
                tracing::warn!(
                    "{} throttled (attempt {}/{})",
                    operation,
                    attempt + 1,
                    self.policy.max_retry + 1
                );
            } else {
                tracing::error!(
                    "{} failed (attempt {}/{}): {}",
                    operation,
                    attempt + 1,
                    self.policy.max_retry + 1,
                    err
                );
            }

            if attempt >= self.policy.max_retry {
                return Err(err);
            }

            let delay = self.policy.backoff.delay(attempt);
            tracing::debug!("Retrying {} in {:?}", operation, delay);
            sleep_or_cancel(cancel, delay).await?;
            attempt += 1;
        }
    }
}
