use crate::config::{Config, ConfigError, ConfigPaths};
use clap::Args;
use std::fs;

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Overwrite an existing config with defaults
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, paths: &ConfigPaths) -> Result<(), ConfigError> {
    fs::create_dir_all(&paths.base_dir)?;
    fs::create_dir_all(&paths.sessions_dir)?;

    if paths.config_path.exists() && !args.force {
        println!(
            "config already present at {} (use --force to reset)",
            paths.config_path.display()
        );
        return Ok(());
    }

    Config::write(paths, &Config::default())?;
    println!("wrote default config to {}", paths.config_path.display());
    Ok(())
}
