// AWS SSO OIDC authentication module
mod oidc;
mod session;

#[cfg(test)]
pub use oidc::MockOidcApi;
pub use oidc::{OidcApi, SdkOidcClient, CLIENT_NAME, CLIENT_TYPE, GRANT_TYPE_DEVICE_CODE};
pub use session::{
    AuthSession, AuthState, DEFAULT_POLL_INTERVAL_SECONDS, SLOW_DOWN_STEP_SECONDS,
};
