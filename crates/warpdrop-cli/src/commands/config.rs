//! Config command implementation.

use anyhow::Result;

use warpdrop_core::config::Config;

use super::ConfigArgs;

/// Run the config command.
pub fn run(args: &ConfigArgs) -> Result<()> {
    if args.path {
        println!("{}", Config::config_path().display());
        return Ok(());
    }

    if args.reset {
        let config = Config::default();
        config.save()?;
        println!("Wrote defaults to {}", Config::config_path().display());
        return Ok(());
    }

    let config = super::load_config();
    println!("# {}", Config::config_path().display());
    println!();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
