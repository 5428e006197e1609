// Shared fakes for unit tests
use crate::auth::{AuthSession, OidcApi};
use crate::error::{Result, SsoError};
use crate::gateway::{RetryGateway, RetryPolicy, SsoApi};
use crate::models::{
    AccessToken, ClientRegistration, DeviceAuthorization, RoleCredentials, SsoInstance,
};
use crate::storage::SecureStore;
use crate::url::{ContainerHint, UrlAction, UrlOpener};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn instance() -> SsoInstance {
    SsoInstance {
        name: "Default".to_string(),
        start_url: "https://example.awsapps.com/start".to_string(),
        region: "us-east-1".to_string(),
    }
}

pub fn role_credentials(account_id: &str, role_name: &str, key: &str) -> RoleCredentials {
    RoleCredentials {
        account_id: account_id.to_string(),
        role_name: role_name.to_string(),
        access_key_id: key.to_string(),
        secret_access_key: format!("{}-secret", key),
        session_token: format!("{}-session", key),
        expiration: Utc::now() + chrono::Duration::hours(1),
    }
}

/// Session whose store already holds a valid token named `cached`
pub fn authenticated_session() -> Arc<AuthSession> {
    let store = MemoryStore::default();
    store
        .save_create_token_response(
            &instance().store_key(),
            &AccessToken::new("cached", "Bearer", 3600, None, None),
        )
        .unwrap();
    Arc::new(AuthSession::new(
        instance(),
        Arc::new(FakeOidc::default()),
        Arc::new(store),
        Arc::new(RecordingOpener::default()),
        UrlAction::Print,
    ))
}

pub fn gateway(api: impl SsoApi + 'static) -> Arc<RetryGateway> {
    Arc::new(RetryGateway::new(
        Arc::new(api),
        authenticated_session(),
        RetryPolicy::default(),
    ))
}

#[derive(Default)]
pub struct MemoryStore {
    clients: Mutex<HashMap<String, ClientRegistration>>,
    tokens: Mutex<HashMap<String, AccessToken>>,
    creds: Mutex<HashMap<String, RoleCredentials>>,
}

fn missing(what: &str, key: &str) -> SsoError {
    SsoError::CacheError(format!("No {} for {}", what, key))
}

impl SecureStore for MemoryStore {
    fn save_register_client_data(&self, key: &str, client: &ClientRegistration) -> Result<()> {
        self.clients
            .lock()
            .unwrap()
            .insert(key.to_string(), client.clone());
        Ok(())
    }

    fn get_register_client_data(&self, key: &str) -> Result<ClientRegistration> {
        self.clients
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| missing("RegisterClientData", key))
    }

    fn delete_register_client_data(&self, key: &str) -> Result<()> {
        self.clients.lock().unwrap().remove(key);
        Ok(())
    }

    fn save_create_token_response(&self, key: &str, token: &AccessToken) -> Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .insert(key.to_string(), token.clone());
        Ok(())
    }

    fn get_create_token_response(&self, key: &str) -> Result<AccessToken> {
        self.tokens
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| missing("CreateTokenResponse", key))
    }

    fn delete_create_token_response(&self, key: &str) -> Result<()> {
        self.tokens.lock().unwrap().remove(key);
        Ok(())
    }

    fn save_role_credentials(&self, arn: &str, creds: &RoleCredentials) -> Result<()> {
        self.creds
            .lock()
            .unwrap()
            .insert(arn.to_string(), creds.clone());
        Ok(())
    }

    fn get_role_credentials(&self, arn: &str) -> Result<RoleCredentials> {
        self.creds
            .lock()
            .unwrap()
            .get(arn)
            .cloned()
            .ok_or_else(|| missing("RoleCredentials", arn))
    }

    fn delete_role_credentials(&self, arn: &str) -> Result<()> {
        self.creds.lock().unwrap().remove(arn);
        Ok(())
    }
}

/// Records every URL instead of opening it
#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<(UrlAction, String)>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<(UrlAction, String)> {
        self.opened.lock().unwrap().clone()
    }
}

impl UrlOpener for RecordingOpener {
    fn open(&self, action: UrlAction, url: &str, _container: &ContainerHint) -> Result<()> {
        self.opened.lock().unwrap().push((action, url.to_string()));
        Ok(())
    }
}

/// OIDC service where the user approves immediately; every device flow
/// yields a new token named `token-<n>`
#[derive(Default)]
pub struct FakeOidc {
    tokens_issued: AtomicUsize,
}

impl FakeOidc {
    pub fn device_flows(&self) -> usize {
        self.tokens_issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OidcApi for FakeOidc {
    async fn register_client(
        &self,
        _client_name: &str,
        _client_type: &str,
    ) -> Result<ClientRegistration> {
        Ok(ClientRegistration {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            issued_at: Utc::now().timestamp(),
            secret_expires_at: (Utc::now() + chrono::Duration::days(90)).timestamp(),
        })
    }

    async fn start_device_authorization(
        &self,
        _start_url: &str,
        _client: &ClientRegistration,
    ) -> Result<DeviceAuthorization> {
        // yield so concurrent callers really do queue on the authenticate lock
        tokio::task::yield_now().await;
        Ok(DeviceAuthorization {
            device_code: "device-code".to_string(),
            user_code: "ABCD-EFGH".to_string(),
            verification_uri: "https://device.sso.us-east-1.amazonaws.com/".to_string(),
            verification_uri_complete: None,
            expires_in: 600,
            interval: 1,
        })
    }

    async fn create_token(
        &self,
        _client: &ClientRegistration,
        _device_code: &str,
    ) -> Result<AccessToken> {
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(
            format!("token-{}", n),
            "Bearer",
            28800,
            None,
            None,
        ))
    }
}
