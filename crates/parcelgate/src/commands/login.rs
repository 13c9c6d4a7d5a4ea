//! Login command - performs one login through the configured strategy.
//!
//! Useful for checking carrier credentials and login URLs before deploying.

use anyhow::{Result, bail};
use clap::Args;
use parcelgate_auth::Credentials;

use super::Context;
use crate::wiring;

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Carrier account username
    #[arg(short, long, env = "ANDREANI_USERNAME")]
    pub username: String,

    /// Carrier account password
    #[arg(long, env = "ANDREANI_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Print the full token instead of a prefix
    #[arg(long)]
    pub show_token: bool,
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    if args.username.trim().is_empty() || args.password.is_empty() {
        bail!("username and password must not be empty");
    }

    let tokens = wiring::build_token_manager(&ctx.config.auth)?;
    let credentials = Credentials::new(args.username, args.password);
    let record = tokens.get_record(&credentials).await?;
    let now = tokens.clock().now();

    println!("Login succeeded ({} strategy)", tokens.backend_name());
    println!(
        "Expires in: {}s (provider lifetime {}s)",
        record.expires_in_secs(now),
        record.provider_lifetime
    );

    if record.credential.is_session_only() {
        println!("Session: cookies only, no bearer token");
    } else {
        let token = record.credential.as_str();
        if args.show_token {
            println!("Token: {}", token);
        } else {
            let prefix: String = token.chars().take(8).collect();
            println!("Token: {}...", prefix);
        }
    }
    Ok(())
}
