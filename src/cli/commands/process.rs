use crate::error::Result;
use crate::models::RoleCredentials;
use crate::session::SsoSession;
use serde::Serialize;

/// Output format of an AWS CLI `credential_process`
#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialProcessOutput {
    pub version: u8,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
}

impl From<&RoleCredentials> for CredentialProcessOutput {
    fn from(creds: &RoleCredentials) -> Self {
        Self {
            version: 1,
            access_key_id: creds.access_key_id.clone(),
            secret_access_key: creds.secret_access_key.clone(),
            session_token: creds.session_token.clone(),
            expiration: creds.expiration_rfc3339(),
        }
    }
}

pub async fn execute(session: &SsoSession, account: &str, role: &str) -> Result<()> {
    session.login(false).await?;
    let creds = session.role_credentials(account, role).await?;

    let output = CredentialProcessOutput::from(&creds);
    print!("{}", serde_json::to_string(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_credential_process_output() {
        let creds = RoleCredentials {
            account_id: "123456789012".to_string(),
            role_name: "Admin".to_string(),
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "session".to_string(),
            expiration: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        };

        let json = serde_json::to_string(&CredentialProcessOutput::from(&creds)).unwrap();
        assert_eq!(
            json,
            r#"{"Version":1,"AccessKeyId":"AKIA","SecretAccessKey":"secret","SessionToken":"session","Expiration":"2023-11-14T22:13:20Z"}"#
        );
    }
}
