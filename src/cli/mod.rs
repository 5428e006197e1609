// CLI interface
pub mod commands;

use crate::arn::{normalize_account_id, parse_role_arn};
use crate::config::Config;
use crate::error::{Result, SsoError};
use crate::session::SsoSession;
use crate::url::UrlAction;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ssocred")]
#[command(about = "Temporary AWS credentials from AWS IAM Identity Center", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Name of the SSO instance in the config file
    #[arg(long, global = true, env = "SSOCRED_SSO")]
    pub sso: Option<String>,

    /// How to present the SSO login URL (clip, print, printurl, open, exec)
    #[arg(long, global = true)]
    pub url_action: Option<UrlAction>,

    /// Never try to open a browser
    #[arg(long, global = true)]
    pub headless: bool,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to AWS SSO
    Login {
        /// Re-authenticate even if the cached token is still valid
        #[arg(short, long)]
        force: bool,
    },

    /// Log out of AWS SSO and forget the token
    Logout,

    /// List available accounts and roles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print shell export statements for a role's credentials
    Eval {
        #[command(flatten)]
        target: RoleTarget,
    },

    /// Execute a command with a role's credentials in its environment
    Exec {
        #[command(flatten)]
        target: RoleTarget,

        /// Command to execute
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Print a role's credentials as JSON for the AWS CLI credential_process setting
    Process {
        #[command(flatten)]
        target: RoleTarget,
    },

    /// Delete cached role credentials
    Flush {
        /// Also delete the SSO token
        #[arg(long)]
        all: bool,
    },
}

/// The role to get credentials for, by ARN or by account and role name
#[derive(Args, Debug, Clone)]
pub struct RoleTarget {
    /// Role ARN, or <account>:<role>
    #[arg(long, conflicts_with_all = ["account", "role"], required_unless_present = "account")]
    pub arn: Option<String>,

    /// Account ID
    #[arg(short, long, requires = "role")]
    pub account: Option<String>,

    /// Role name
    #[arg(short, long, requires = "account")]
    pub role: Option<String>,
}

impl RoleTarget {
    /// Account id and role name
    pub fn resolve(&self) -> Result<(String, String)> {
        match (&self.arn, &self.account, &self.role) {
            (Some(arn), _, _) => parse_role_arn(arn),
            (None, Some(account), Some(role)) => Ok((normalize_account_id(account)?, role.clone())),
            _ => Err(SsoError::InvalidConfig(
                "please specify --arn or --account and --role".to_string(),
            )),
        }
    }
}

pub async fn execute(args: Cli) -> Result<()> {
    let config = Config::load()?;
    let session = SsoSession::connect(&config, args.sso.as_deref(), args.url_action).await?;

    match args.command {
        Commands::Login { force } => commands::login::execute(&session, force).await,
        Commands::Logout => commands::logout::execute(&session).await,
        Commands::List { json } => commands::list::execute(&session, json).await,
        Commands::Eval { target } => {
            let (account, role) = target.resolve()?;
            commands::eval::execute(&session, &account, &role).await
        }
        Commands::Exec { target, command } => {
            let (account, role) = target.resolve()?;
            commands::exec::execute(&session, &account, &role, command).await
        }
        Commands::Process { target } => {
            let (account, role) = target.resolve()?;
            commands::process::execute(&session, &account, &role).await
        }
        Commands::Flush { all } => commands::flush::execute(&session, all).await,
    }
}
