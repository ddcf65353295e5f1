//! `pdl config` – show where the config lives and what is in effect.

use anyhow::Result;
use pdl_core::config::{self, PdlConfig};

pub fn run_config(cfg: &PdlConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
