//! Serve command - runs the proxy server in the foreground.

use anyhow::Result;
use clap::Args;
use parcelgate_server::Server;

use super::Context;
use crate::wiring;

/// Arguments for the serve command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let server_config = wiring::server_config(config, args.port, args.bind.as_deref())?;
    let state = wiring::app_state(config, server_config)?;

    if ctx.verbose {
        println!("Auth strategy: {}", config.auth.strategy);
        println!("Tariff URL: {}", config.carrier.tariff_url);
        if let Some(url) = &config.carrier.quote_url {
            println!("Quote URL: {}", url);
        }
        println!("Shipment URL: {}", config.carrier.shipment_url);
    }
    if config.carrier.api_key.is_none() {
        eprintln!("warning: no carrier API key configured (set ANDREANI_API_KEY)");
    }

    let server = Server::from_state(state);
    println!("Listening on http://{}", server.bind_address());
    server.run().await?;
    Ok(())
}
