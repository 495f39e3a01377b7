//! Configuration commands.

use anyhow::Result;
use warden::WardenConfig;

/// Show the effective configuration.
pub fn show(config: &WardenConfig, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "toml" => print!("{}", config.to_toml()?),
        other => anyhow::bail!("Unknown format '{other}' (expected toml or json)"),
    }
    Ok(())
}
