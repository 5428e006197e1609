// Session management module
use crate::arn::make_role_arn;
use crate::auth::{AuthSession, OidcApi, SdkOidcClient};
use crate::catalog::RoleCatalog;
use crate::config::{Config, RoleChains};
use crate::credentials::{CredentialBroker, SdkStsClient, StsApi};
use crate::error::{Result, SsoError};
use crate::gateway::{RetryGateway, RetryPolicy, SdkSsoClient, SsoApi};
use crate::models::{AccessToken, RoleCredentials, RoleInfo, SsoInstance};
use crate::storage::{JsonStore, SecureStore};
use crate::url::{HandleUrl, UrlAction, UrlOpener};
use std::sync::Arc;

/// Everything a session is assembled from
pub struct SessionParts {
    pub instance: SsoInstance,
    pub oidc: Arc<dyn OidcApi>,
    pub sso: Arc<dyn SsoApi>,
    pub sts: Arc<dyn StsApi>,
    pub store: Arc<dyn SecureStore>,
    pub opener: Arc<dyn UrlOpener>,
    pub url_action: UrlAction,
    pub chains: RoleChains,
    pub policy: RetryPolicy,
    pub threads: usize,
}

/// One SSO instance with its token, role catalog and credential broker
pub struct SsoSession {
    auth: Arc<AuthSession>,
    gateway: Arc<RetryGateway>,
    catalog: RoleCatalog,
    broker: CredentialBroker,
    store: Arc<dyn SecureStore>,
    chains: Arc<RoleChains>,
    threads: usize,
}

impl SsoSession {
    /// Build a session for the named (or default) SSO instance backed by AWS
    pub async fn connect(
        config: &Config,
        sso_name: Option<&str>,
        url_action: Option<UrlAction>,
    ) -> Result<Self> {
        let (instance, sso) = config.sso_instance(sso_name)?;
        tracing::debug!(
            "Using SSO instance {} ({} in {})",
            instance.name,
            instance.start_url,
            instance.region
        );

        let store_path = match &config.store_path {
            Some(path) => path.clone(),
            None => JsonStore::default_path()?,
        };
        let store = Arc::new(JsonStore::open(store_path)?);

        let attempts = config.max_retry + 1;
        let oidc = SdkOidcClient::new(&instance.region, attempts, config.max_backoff()).await;
        let sso_api = SdkSsoClient::new(&instance.region).await;
        let sts = SdkStsClient::new(&instance.region, attempts, config.max_backoff());

        Ok(Self::from_parts(SessionParts {
            oidc: Arc::new(oidc),
            sso: Arc::new(sso_api),
            sts: Arc::new(sts),
            store,
            opener: Arc::new(HandleUrl::new(
                config.browser.clone(),
                config.url_exec_command.clone(),
            )),
            url_action: url_action
                .or(sso.auth_url_action)
                .unwrap_or(config.url_action),
            chains: sso.role_chains()?,
            policy: RetryPolicy::new(config.max_retry, config.max_backoff()),
            threads: config.threads,
            instance,
        }))
    }

    pub fn from_parts(parts: SessionParts) -> Self {
        let auth = Arc::new(AuthSession::new(
            parts.instance,
            parts.oidc,
            parts.store.clone(),
            parts.opener,
            parts.url_action,
        ));
        let gateway = Arc::new(RetryGateway::new(parts.sso, auth.clone(), parts.policy));
        let chains = Arc::new(parts.chains);

        Self {
            catalog: RoleCatalog::new(gateway.clone(), chains.clone()),
            broker: CredentialBroker::new(gateway.clone(), parts.sts, chains.clone()),
            auth,
            gateway,
            store: parts.store,
            chains,
            threads: parts.threads,
        }
    }

    pub fn instance(&self) -> &SsoInstance {
        self.auth.instance()
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Reuse the stored token unless `force`, otherwise run the device flow
    pub async fn login(&self, force: bool) -> Result<AccessToken> {
        if !force && self.auth.valid_auth_token().await {
            if let Some(token) = self.auth.current_token().await {
                tracing::debug!("Reusing cached SSO token for {}", self.instance().name);
                return Ok(token);
            }
        }
        self.auth.authenticate().await
    }

    /// All roles in all accounts
    pub async fn list_roles(&self) -> Result<Vec<RoleInfo>> {
        self.catalog.get_all_roles(self.threads).await
    }

    /// Credentials for a role, served from the store while they are still valid
    pub async fn role_credentials(
        &self,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredentials> {
        let arn = make_role_arn(account_id, role_name)?;

        if let Ok(creds) = self.store.get_role_credentials(&arn) {
            if !creds.is_expired() {
                tracing::debug!("Using cached credentials for {}", arn);
                return Ok(creds);
            }
            tracing::debug!("Cached credentials for {} expired", arn);
        }

        let creds = self
            .broker
            .get_role_credentials(account_id, role_name)
            .await
            .map_err(|source| SsoError::RoleCredentialsFailed {
                instance: self.instance().name.clone(),
                arn: arn.clone(),
                source: Box::new(source),
            })?;
        self.store.save_role_credentials(&arn, &creds)?;
        Ok(creds)
    }

    /// Delete cached role credentials, and the SSO token too if `include_token`.
    /// Returns how many roles were flushed.
    pub async fn flush(&self, include_token: bool) -> Result<usize> {
        let mut arns: Vec<String> = self.chains.arns().map(|arn| arn.to_string()).collect();

        if self.auth.valid_auth_token().await {
            arns.extend(self.list_roles().await?.into_iter().map(|role| role.arn));
        } else {
            tracing::debug!("No valid SSO token, only flushing configured roles");
        }
        arns.sort();
        arns.dedup();

        for arn in &arns {
            self.store.delete_role_credentials(arn)?;
        }

        if include_token {
            self.auth.clear_token().await?;
        }
        Ok(arns.len())
    }

    /// Invalidate the SSO token with AWS and forget it locally
    pub async fn logout(&self) -> Result<()> {
        let token = match self.auth.current_token().await {
            Some(token) => Some(token),
            None => self
                .store
                .get_create_token_response(&self.instance().store_key())
                .ok(),
        };

        let result = match &token {
            Some(token) => self.gateway.logout(&token.access_token).await,
            None => {
                tracing::debug!("No SSO token to log out of");
                Ok(())
            }
        };

        self.auth.clear_token().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MockStsApi;
    use crate::gateway::MockSsoApi;
    use crate::models::{AccountInfo, Page, RoleChainConfig};
    use crate::testing::{instance, role_credentials, FakeOidc, MemoryStore, RecordingOpener};

    const FOO: &str = "arn:aws:iam::111111111111:role/Foo";

    fn session(sso: MockSsoApi, store: Arc<MemoryStore>, chains: RoleChains) -> SsoSession {
        store
            .save_create_token_response(
                &instance().store_key(),
                &AccessToken::new("cached", "Bearer", 3600, None, None),
            )
            .unwrap();

        SsoSession::from_parts(SessionParts {
            instance: instance(),
            oidc: Arc::new(FakeOidc::default()),
            sso: Arc::new(sso),
            sts: Arc::new(MockStsApi::new()),
            store,
            opener: Arc::new(RecordingOpener::default()),
            url_action: UrlAction::Print,
            chains,
            policy: RetryPolicy::default(),
            threads: 2,
        })
    }

    #[tokio::test]
    async fn test_role_credentials_are_cached_in_store() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .times(1)
            .returning(|_, account, role| Ok(role_credentials(account, role, "AKIAFOO")));

        let store = Arc::new(MemoryStore::default());
        let session = session(sso, store.clone(), RoleChains::default());

        let first = session.role_credentials("111111111111", "Foo").await.unwrap();
        let second = session.role_credentials("111111111111", "Foo").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.get_role_credentials(FOO).unwrap().access_key_id,
            "AKIAFOO"
        );
    }

    #[tokio::test]
    async fn test_expired_cached_credentials_are_refreshed() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .times(1)
            .returning(|_, account, role| Ok(role_credentials(account, role, "AKIANEW")));

        let store = Arc::new(MemoryStore::default());
        let mut stale = role_credentials("111111111111", "Foo", "AKIAOLD");
        stale.expiration = chrono::Utc::now() + chrono::Duration::seconds(30);
        store.save_role_credentials(FOO, &stale).unwrap();

        let session = session(sso, store.clone(), RoleChains::default());
        let creds = session.role_credentials("111111111111", "Foo").await.unwrap();
        assert_eq!(creds.access_key_id, "AKIANEW");
        assert_eq!(store.get_role_credentials(FOO).unwrap().access_key_id, "AKIANEW");
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_credentials_error_names_instance_and_arn() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials().returning(|_, _, _| {
            Err(SsoError::AwsSdk(
                "GetRoleCredentials: ForbiddenException No access".to_string(),
            ))
        });

        let session = session(sso, Arc::default(), RoleChains::default());
        let err = session
            .role_credentials("111111111111", "Foo")
            .await
            .unwrap_err();

        assert!(matches!(err, SsoError::RoleCredentialsFailed { .. }));
        let text = err.to_string();
        assert!(text.contains("Default"));
        assert!(text.contains(FOO));
        assert!(text.contains("ForbiddenException"));
    }

    #[tokio::test]
    async fn test_login_reuses_valid_token() {
        let session = session(MockSsoApi::new(), Arc::default(), RoleChains::default());
        let token = session.login(false).await.unwrap();
        assert_eq!(token.access_token, "cached");

        let forced = session.login(true).await.unwrap();
        assert_eq!(forced.access_token, "token-1");
    }

    #[tokio::test]
    async fn test_logout_calls_sso_and_forgets_token() {
        let mut sso = MockSsoApi::new();
        sso.expect_logout()
            .withf(|token| token == "cached")
            .times(1)
            .returning(|_| Ok(()));

        let store = Arc::new(MemoryStore::default());
        let session = session(sso, store.clone(), RoleChains::default());
        session.logout().await.unwrap();

        assert!(store
            .get_create_token_response(&instance().store_key())
            .is_err());
        assert!(session.auth().current_token().await.is_none());
    }

    #[tokio::test]
    async fn test_flush_deletes_known_role_credentials() {
        let mut sso = MockSsoApi::new();
        sso.expect_list_accounts().returning(|_, _| {
            Ok(Page {
                items: vec![AccountInfo {
                    id: 0,
                    account_id: "111111111111".to_string(),
                    account_name: "dev".to_string(),
                    email_address: String::new(),
                }],
                next_token: None,
            })
        });
        sso.expect_list_account_roles().returning(|_, _, _| {
            Ok(Page {
                items: vec!["Foo".to_string()],
                next_token: None,
            })
        });

        let chained = "arn:aws:iam::222222222222:role/Bar";
        let chains: RoleChains = [RoleChainConfig {
            arn: chained.to_string(),
            via: Some(FOO.to_string()),
            ..Default::default()
        }]
        .into_iter()
        .collect();

        let store = Arc::new(MemoryStore::default());
        store
            .save_role_credentials(FOO, &role_credentials("111111111111", "Foo", "A"))
            .unwrap();
        store
            .save_role_credentials(chained, &role_credentials("222222222222", "Bar", "B"))
            .unwrap();

        let session = session(sso, store.clone(), chains);
        assert_eq!(session.flush(true).await.unwrap(), 2);

        assert!(store.get_role_credentials(FOO).is_err());
        assert!(store.get_role_credentials(chained).is_err());
        assert!(store
            .get_create_token_response(&instance().store_key())
            .is_err());
    }
}
