use crate::error::Result;
use crate::models::RoleCredentials;
use crate::session::SsoSession;

/// Environment variables that hand `creds` to AWS tools
pub fn credential_env(creds: &RoleCredentials) -> Vec<(&'static str, String)> {
    vec![
        ("AWS_ACCESS_KEY_ID", creds.access_key_id.clone()),
        ("AWS_SECRET_ACCESS_KEY", creds.secret_access_key.clone()),
        ("AWS_SESSION_TOKEN", creds.session_token.clone()),
        ("AWS_CREDENTIAL_EXPIRATION", creds.expiration_rfc3339()),
        ("AWS_SSO_ACCOUNT_ID", creds.account_id.clone()),
        ("AWS_SSO_ROLE_NAME", creds.role_name.clone()),
    ]
}

pub async fn execute(session: &SsoSession, account: &str, role: &str) -> Result<()> {
    session.login(false).await?;
    let creds = session.role_credentials(account, role).await?;

    for (key, value) in credential_env(&creds) {
        println!("export {}=\"{}\"", key, value);
    }
    println!(
        "# Credentials expire at: {}",
        creds.expiration.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}
