use crate::error::Result;
use crate::session::SsoSession;

pub async fn execute(session: &SsoSession, all: bool) -> Result<()> {
    let flushed = session.flush(all).await?;

    eprintln!("✓ Flushed cached credentials for {} roles", flushed);
    if all {
        eprintln!("  SSO token for {} deleted", session.instance().name);
    }

    Ok(())
}
