//! Config command - show effective configuration.

use anyhow::Result;
use clap::Args;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show secrets instead of redacting them
    #[arg(long)]
    pub show_secrets: bool,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files found; using defaults");
    } else {
        for path in sources {
            println!("# Loaded from {}", path.display());
        }
    }
    for var in &loaded.env_overrides {
        println!("# Overridden by ${}", var);
    }
    if ctx.verbose {
        for warning in &loaded.warnings {
            println!("# Warning: {}", warning);
        }
    }

    // Fill in defaults so every effective value is visible
    let mut effective = loaded.config.clone();
    effective.server = Some(effective.server());
    effective.upstream = Some(effective.upstream());
    effective.oauth = Some(effective.oauth());

    let shown = if args.show_secrets {
        effective
    } else {
        effective.redacted()
    };
    println!("{}", shown.to_toml()?);

    Ok(())
}
