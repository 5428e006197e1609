use crate::error::Result;
use crate::expiry::{format_time_remaining, is_expiring_soon};
use crate::session::SsoSession;

pub async fn execute(session: &SsoSession, force: bool) -> Result<()> {
    let token = session.login(force).await?;

    eprintln!("✓ Logged in to {}", session.instance().name);
    eprintln!(
        "  Token expires in: {}",
        format_time_remaining(&token.expires_at)
    );
    if is_expiring_soon(&token.expires_at, 30) {
        eprintln!("  Run `ssocred login --force` to start a fresh session");
    }

    Ok(())
}
