use crate::error::Result;
use crate::session::SsoSession;

pub async fn execute(session: &SsoSession, json: bool) -> Result<()> {
    session.login(false).await?;
    let roles = session.list_roles().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&roles)?);
        return Ok(());
    }

    println!("Available accounts and roles:\n");
    for role in roles {
        match &role.via {
            Some(via) => println!("  {} (via {})", role.full_display(), via),
            None => println!("  {}", role.full_display()),
        }
    }

    Ok(())
}
