use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One configured AWS IAM Identity Center instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SsoInstance {
    /// User chosen name for this instance (key in the config file)
    pub name: String,
    pub start_url: String,
    pub region: String,
}

impl SsoInstance {
    /// Key under which this instance's client registration and token are stored
    pub fn store_key(&self) -> String {
        format!("{}:{}", self.region, self.start_url)
    }
}

/// Result of SSO OIDC RegisterClient, cached long term
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientRegistration {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    /// Unix seconds
    #[serde(rename = "clientIdIssuedAt")]
    pub issued_at: i64,
    /// Unix seconds
    #[serde(rename = "clientSecretExpiresAt")]
    pub secret_expires_at: i64,
}

impl ClientRegistration {
    /// Expired if the secret expires within the next hour
    pub fn is_expired(&self) -> bool {
        self.secret_expires_at <= (Utc::now() + Duration::hours(1)).timestamp()
    }
}

/// Result of SSO OIDC StartDeviceAuthorization. Never persisted.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    /// Seconds until the device code expires
    pub expires_in: i32,
    /// Polling interval in seconds, 0 if the service did not specify one
    pub interval: i32,
}

impl DeviceAuthorization {
    /// URL to present to the user, preferring the one with the code embedded
    pub fn url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }
}

/// SSO OIDC bearer token used for every SSO API call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    #[serde(rename = "accessToken")]
    pub access_token: String,

    #[serde(rename = "tokenType", default)]
    pub token_type: String,

    /// Lifetime in seconds as reported by AWS
    #[serde(rename = "expiresIn")]
    pub expires_in: i32,

    #[serde(rename = "expiresAt", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    #[serde(rename = "idToken", skip_serializing_if = "Option::is_none", default)]
    pub id_token: Option<String>,

    /// AWS SSO OIDC does not honor refresh tokens; kept for completeness
    #[serde(
        rename = "refreshToken",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub refresh_token: Option<String>,
}

impl AccessToken {
    /// Build a token received now, computing `expires_at` from `expires_in`
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: i32,
        id_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            expires_at: Utc::now() + Duration::seconds(expires_in as i64),
            id_token,
            refresh_token,
        }
    }

    /// Expired if it expires within the next minute
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now() + Duration::minutes(1)
    }
}

/// An AWS account visible to the SSO user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AccountInfo {
    /// Position in the order AWS returned the accounts
    pub id: usize,
    pub account_id: String,
    pub account_name: String,
    pub email_address: String,
}

/// An IAM role assignable to the SSO user within one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleInfo {
    /// Position within the account's role list, contiguous across pages
    pub id: usize,
    pub account_id: String,
    pub account_name: String,
    pub email_address: String,
    pub role_name: String,
    pub arn: String,
    /// Role to chain through, from local configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

impl RoleInfo {
    pub fn full_display(&self) -> String {
        format!(
            "{} ({}): {}",
            self.account_name, self.account_id, self.role_name
        )
    }
}

/// Temporary IAM credentials for one account/role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleCredentials {
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(rename = "roleName")]
    pub role_name: String,
    #[serde(rename = "accessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "secretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    /// Epoch milliseconds on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiration: DateTime<Utc>,
}

impl RoleCredentials {
    /// Expired if they expire within the next minute
    pub fn is_expired(&self) -> bool {
        self.expiration <= Utc::now() + Duration::minutes(1)
    }

    /// RFC 3339 in UTC with second precision, as AWS tools expect
    pub fn expiration_rfc3339(&self) -> String {
        self.expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// How a role that is not directly SSO assignable is reached via AssumeRole
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleChainConfig {
    pub arn: String,
    pub via: Option<String>,
    pub external_id: Option<String>,
    pub source_identity: Option<String>,
}

/// One page of a paginated SSO listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}
