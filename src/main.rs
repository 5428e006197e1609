// ssocred - temporary AWS credentials from AWS IAM Identity Center

use clap::Parser;
use ssocred::error::SsoError;
use ssocred::{cli, env};

#[tokio::main]
async fn main() {
    // Parse CLI arguments first to get verbose flag
    let args = cli::Cli::parse();

    if args.headless {
        env::set_headless_override(true);
    }

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stdout is reserved for command output (eval, list)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli::execute(args).await {
        Ok(()) => {}
        Err(SsoError::CommandFailed(code)) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}
