use super::oidc::{OidcApi, CLIENT_NAME, CLIENT_TYPE};
use crate::error::{Result, SsoError};
use crate::models::{AccessToken, ClientRegistration, DeviceAuthorization, SsoInstance};
use crate::storage::SecureStore;
use crate::url::{ContainerHint, UrlAction, UrlOpener};
use crate::wait::sleep_or_cancel;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Poll interval used when StartDeviceAuthorization does not return one
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;
/// Added to the poll interval every time the service asks us to slow down
pub const SLOW_DOWN_STEP_SECONDS: u64 = 5;

const CONTAINER_COLOR: &str = "blue";
const CONTAINER_ICON: &str = "fingerprint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unregistered,
    ClientRegistered,
    DeviceAuthorized,
    Polling,
    Authenticated,
}

/// OIDC device authorization for one SSO instance.
///
/// Holds the in-memory access token every SSO API call is built with.
/// Device flows are serialized by `authenticate_lock`, so concurrent callers
/// that all need a fresh token end up sharing a single browser login.
pub struct AuthSession {
    instance: SsoInstance,
    oidc: Arc<dyn OidcApi>,
    store: Arc<dyn SecureStore>,
    opener: Arc<dyn UrlOpener>,
    url_action: UrlAction,
    token: RwLock<Option<AccessToken>>,
    authenticate_lock: Mutex<()>,
    client: StdMutex<Option<ClientRegistration>>,
    state: StdMutex<AuthState>,
    cancel: CancellationToken,
}

impl AuthSession {
    pub fn new(
        instance: SsoInstance,
        oidc: Arc<dyn OidcApi>,
        store: Arc<dyn SecureStore>,
        opener: Arc<dyn UrlOpener>,
        url_action: UrlAction,
    ) -> Self {
        Self {
            instance,
            oidc,
            store,
            opener,
            url_action,
            token: RwLock::new(None),
            authenticate_lock: Mutex::new(()),
            client: StdMutex::new(None),
            state: StdMutex::new(AuthState::Unregistered),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn instance(&self) -> &SsoInstance {
        &self.instance
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current state; an authenticated session whose token or client
    /// registration has expired reports `Unregistered`
    pub fn state(&self) -> AuthState {
        let state = *self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state != AuthState::Authenticated {
            return state;
        }

        let client_expired = self
            .client
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map_or(false, |c| c.is_expired());
        let token_expired = self
            .token
            .try_read()
            .map(|t| t.as_ref().map_or(true, |t| t.is_expired()))
            .unwrap_or(false);

        if client_expired || token_expired {
            AuthState::Unregistered
        } else {
            AuthState::Authenticated
        }
    }

    fn set_state(&self, state: AuthState) {
        tracing::debug!("Auth state for {}: {:?}", self.instance.name, state);
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    /// Load the stored token and keep it if it is still valid. Never touches the network.
    pub async fn valid_auth_token(&self) -> bool {
        let key = self.instance.store_key();
        match self.store.get_create_token_response(&key) {
            Ok(token) if !token.is_expired() => {
                *self.token.write().await = Some(token);
                self.set_state(AuthState::Authenticated);
                true
            }
            Ok(token) => {
                tracing::debug!(
                    "Cached SSO token for {} expired at {}",
                    self.instance.name,
                    token.expires_at
                );
                false
            }
            Err(e) => {
                tracing::debug!("No cached SSO token for {}: {}", self.instance.name, e);
                false
            }
        }
    }

    /// Token currently held in memory, expired or not
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    /// Run a full device flow, even if a valid token is cached
    pub async fn authenticate(&self) -> Result<AccessToken> {
        let _guard = self.authenticate_lock.lock().await;
        self.reauthenticate_locked().await
    }

    /// Bearer token for the next SSO API call, authenticating first if needed
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }
        if self.valid_auth_token().await {
            return self.fresh_token().await;
        }

        let _guard = self.authenticate_lock.lock().await;
        // Someone else may have finished a login while we waited
        if let Some(token) = self.token.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }
        Ok(self.reauthenticate_locked().await?.access_token)
    }

    /// Called after the SSO API rejected `stale`. Only one caller runs the
    /// device flow; the rest pick up the token it produced.
    pub async fn refresh_after_unauthorized(&self, stale: &str) -> Result<String> {
        let _guard = self.authenticate_lock.lock().await;

        if let Some(token) = self.token.read().await.as_ref() {
            if token.access_token != stale && !token.is_expired() {
                tracing::debug!("SSO token already refreshed by a concurrent caller");
                return Ok(token.access_token.clone());
            }
        }

        tracing::info!(
            "SSO token for {} was rejected, re-authenticating",
            self.instance.name
        );
        Ok(self.reauthenticate_locked().await?.access_token)
    }

    /// Forget the token in memory and in the store
    pub async fn clear_token(&self) -> Result<()> {
        *self.token.write().await = None;
        self.store
            .delete_create_token_response(&self.instance.store_key())?;
        let has_client = self
            .client
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some();
        self.set_state(if has_client {
            AuthState::ClientRegistered
        } else {
            AuthState::Unregistered
        });
        Ok(())
    }

    async fn fresh_token(&self) -> Result<String> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(SsoError::TokenExpired)
    }

    // Caller must hold authenticate_lock
    async fn reauthenticate_locked(&self) -> Result<AccessToken> {
        self.device_flow().await.map_err(|e| match e {
            SsoError::Cancelled | SsoError::AuthorizationExpired => e,
            SsoError::AuthenticationFailed { .. } => e,
            other => SsoError::AuthenticationFailed {
                instance: self.instance.name.clone(),
                reason: other.to_string(),
            },
        })
    }

    async fn device_flow(&self) -> Result<AccessToken> {
        let client = self.register_client(false).await?;
        let (client, device) = self.start_device_authorization(client).await?;
        self.present(&device)?;

        let token = self.create_token(&client, &device).await?;
        self.store
            .save_create_token_response(&self.instance.store_key(), &token)?;
        *self.token.write().await = Some(token.clone());
        self.set_state(AuthState::Authenticated);

        tracing::info!(
            "Authenticated to {}, token valid for {} seconds",
            self.instance.name,
            token.expires_in
        );
        Ok(token)
    }

    async fn register_client(&self, force: bool) -> Result<ClientRegistration> {
        let key = self.instance.store_key();

        if !force {
            let cached = self
                .client
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone()
                .or_else(|| self.store.get_register_client_data(&key).ok());

            if let Some(client) = cached {
                if !client.is_expired() {
                    tracing::debug!("Reusing client registration {}", client.client_id);
                    self.remember_client(&client);
                    return Ok(client);
                }
                tracing::debug!("Client registration expired, registering again");
            }
        }

        let client = self.oidc.register_client(CLIENT_NAME, CLIENT_TYPE).await?;
        self.store.save_register_client_data(&key, &client)?;
        self.remember_client(&client);
        Ok(client)
    }

    fn remember_client(&self, client: &ClientRegistration) {
        *self.client.lock().unwrap_or_else(|p| p.into_inner()) = Some(client.clone());
        self.set_state(AuthState::ClientRegistered);
    }

    /// A server side invalidated registration shows up here, so the first
    /// failure forces a new registration and tries once more
    async fn start_device_authorization(
        &self,
        client: ClientRegistration,
    ) -> Result<(ClientRegistration, DeviceAuthorization)> {
        let start_url = &self.instance.start_url;

        let (client, device) = match self
            .oidc
            .start_device_authorization(start_url, &client)
            .await
        {
            Ok(device) => (client, device),
            Err(e) => {
                tracing::warn!(
                    "StartDeviceAuthorization failed ({}), refreshing client registration",
                    e
                );
                let client = self.register_client(true).await?;
                let device = self
                    .oidc
                    .start_device_authorization(start_url, &client)
                    .await?;
                (client, device)
            }
        };

        self.set_state(AuthState::DeviceAuthorized);
        Ok((client, device))
    }

    fn present(&self, device: &DeviceAuthorization) -> Result<()> {
        let hint = ContainerHint::new(self.instance.store_key(), CONTAINER_COLOR, CONTAINER_ICON);
        tracing::info!(
            "Verify this code in your browser to log in to {}: {}",
            self.instance.name,
            device.user_code
        );
        self.opener
            .open(self.url_action.for_authentication(), device.url(), &hint)
    }

    async fn create_token(
        &self,
        client: &ClientRegistration,
        device: &DeviceAuthorization,
    ) -> Result<AccessToken> {
        self.set_state(AuthState::Polling);

        let mut interval = if device.interval > 0 {
            Duration::from_secs(device.interval as u64)
        } else {
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS)
        };
        let deadline = (device.expires_in > 0)
            .then(|| Instant::now() + Duration::from_secs(device.expires_in as u64));

        tracing::info!("Waiting for SSO authentication to complete...");
        loop {
            match self.oidc.create_token(client, &device.device_code).await {
                Ok(token) => return Ok(token),
                Err(SsoError::AuthorizationPending) => {}
                Err(SsoError::SlowDown) => {
                    interval += Duration::from_secs(SLOW_DOWN_STEP_SECONDS);
                    tracing::debug!("SlowDown requested, poll interval now {:?}", interval);
                }
                Err(e) => return Err(e),
            }

            if let Some(deadline) = deadline {
                if Instant::now() + interval > deadline {
                    return Err(SsoError::AuthorizationExpired);
                }
            }
            sleep_or_cancel(&self.cancel, interval).await?;
        }
    }
}
