use super::eval::credential_env;
use crate::error::{Result, SsoError};
use crate::session::SsoSession;
use std::process::Command;

pub async fn execute(
    session: &SsoSession,
    account: &str,
    role: &str,
    command: Vec<String>,
) -> Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| SsoError::InvalidConfig("No command specified".to_string()))?;

    session.login(false).await?;
    let creds = session.role_credentials(account, role).await?;

    tracing::debug!("Running {} as {}:{}", program, creds.account_id, creds.role_name);
    let status = Command::new(program)
        .args(args)
        .envs(credential_env(&creds))
        .status()?;

    if !status.success() {
        return Err(SsoError::CommandFailed(status.code().unwrap_or(1)));
    }

    Ok(())
}
