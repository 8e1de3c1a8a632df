//! Refresh command - one-off token refresh for diagnostics.

use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, build_dispatcher};

/// Arguments for the refresh command.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Print only the access token
    #[arg(long)]
    pub access_only: bool,
}

/// Run the refresh command.
pub async fn run(args: RefreshArgs, ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?.config;
    config.validate_credentials()?;

    let dispatcher = build_dispatcher(&config)?;
    let pair = dispatcher
        .refresher()
        .refresh()
        .await
        .context("Token refresh failed; the refresh token may need manual renewal")?;

    if args.access_only {
        println!("{}", pair.access_token);
    } else {
        println!("{}", serde_json::to_string_pretty(&pair)?);
    }

    Ok(())
}
