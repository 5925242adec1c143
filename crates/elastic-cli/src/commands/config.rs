use anyhow::{bail, Result};

use elastic_core::ElasticConfig;

pub fn show(config: &ElasticConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn path() -> Result<()> {
    println!("{}", ElasticConfig::config_path().display());
    Ok(())
}

pub fn init(force: bool) -> Result<()> {
    let path = ElasticConfig::config_path();
    if path.exists() && !force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let written = ElasticConfig::default().save()?;
    println!("Wrote default configuration to {}", written.display());
    Ok(())
}
