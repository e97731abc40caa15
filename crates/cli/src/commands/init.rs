//! Settings file creation

use clap::Args;
use vizreg_common::config::{working_dir, SETTINGS_FILE};
use vizreg_common::Settings;

use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing settings file
    #[arg(long)]
    pub force: bool,
}

/// Write the effective settings to `vizreg.toml` in the working directory
pub fn execute(args: InitArgs, settings: Settings) -> anyhow::Result<bool> {
    let path = working_dir().join(SETTINGS_FILE);
    if path.exists() && !args.force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    settings.save(&path)?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(true)
}
