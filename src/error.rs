use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SsoError {
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Too many requests: {0}")]
    Throttled(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication failed for {instance}: {reason}")]
    AuthenticationFailed { instance: String, reason: String },

    #[error("Authorization pending - user must complete device flow")]
    AuthorizationPending,

    #[error("Slow down requested by SSO OIDC")]
    SlowDown,

    #[error("Authorization expired - user took too long to complete device flow")]
    AuthorizationExpired,

    #[error("Token expired or invalid")]
    TokenExpired,

    #[error("Detected role chain loop! Getting {arn} via {via}")]
    RoleChainLoop { arn: String, via: String },

    #[error("Unable to get credentials for {arn} from SSO instance {instance}: {source}")]
    RoleCredentialsFailed {
        instance: String,
        arn: String,
        source: Box<SsoError>,
    },

    #[error("Invalid ARN: {0}")]
    InvalidArn(String),

    #[error("Invalid AWS account id: {0}")]
    InvalidAccountId(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid SSO configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unable to open URL: {0}")]
    BrowserLaunchFailed(String),

    #[error("Command exited with status {0}")]
    CommandFailed(i32),
}

pub type Result<T> = std::result::Result<T, SsoError>;

impl SsoError {
    /// Classify an AWS SDK error by its service error code.
    pub fn from_sdk<E>(context: &str, err: E) -> Self
    where
        E: ProvideErrorMetadata + std::fmt::Display,
    {
        let message = err.message().unwrap_or("").to_string();
        match err.code() {
            Some("TooManyRequestsException") => SsoError::Throttled(message),
            Some("UnauthorizedException") => SsoError::Unauthorized(message),
            Some("AuthorizationPendingException") => SsoError::AuthorizationPending,
            Some("SlowDownException") => SsoError::SlowDown,
            Some("ExpiredTokenException") => SsoError::AuthorizationExpired,
            Some(code) => SsoError::AwsSdk(format!("{}: {} {}", context, code, message)),
            None => SsoError::AwsSdk(format!("{}: {}", context, err)),
        }
    }

    /// Errors the retry gateway will attempt again after backing off.
    pub fn is_throttled(&self) -> bool {
        matches!(self, SsoError::Throttled(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SsoError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_smithy_types::error::ErrorMetadata;

    #[test]
    fn test_from_sdk_classifies_codes() {
        let throttled = ErrorMetadata::builder()
            .code("TooManyRequestsException")
            .message("slow down")
            .build();
        assert!(SsoError::from_sdk("ListAccounts", throttled).is_throttled());

        let unauthorized = ErrorMetadata::builder()
            .code("UnauthorizedException")
            .build();
        assert!(SsoError::from_sdk("ListAccounts", unauthorized).is_unauthorized());

        let pending = ErrorMetadata::builder()
            .code("AuthorizationPendingException")
            .build();
        assert!(matches!(
            SsoError::from_sdk("CreateToken", pending),
            SsoError::AuthorizationPending
        ));
    }

    #[test]
    fn test_from_sdk_keeps_context_for_unknown_codes() {
        let other = ErrorMetadata::builder()
            .code("InvalidRequestException")
            .message("bad account")
            .build();
        let err = SsoError::from_sdk("GetRoleCredentials", other);
        let text = err.to_string();
        assert!(text.contains("GetRoleCredentials"));
        assert!(text.contains("InvalidRequestException"));
        assert!(text.contains("bad account"));
    }

    #[test]
    fn test_role_chain_loop_names_both_arns() {
        let err = SsoError::RoleChainLoop {
            arn: "arn:aws:iam::000000000001:role/A".to_string(),
            via: "arn:aws:iam::000000000002:role/B".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("role/A"));
        assert!(text.contains("role/B"));
    }
}
