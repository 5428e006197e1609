use crate::error::Result;
use crate::session::SsoSession;

pub async fn execute(session: &SsoSession) -> Result<()> {
    session.logout().await?;

    eprintln!("✓ Logged out of {}", session.instance().name);

    Ok(())
}
