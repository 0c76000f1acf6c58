use super::Host;
use crate::config::{CONFIG_FILE_NAME, Config};
use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use clap::Args;
use std::io::Write;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration
    #[arg(long, short, value_name = "PATH", default_value = CONFIG_FILE_NAME)]
    pub output: Utf8PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Write the default configuration, refusing to overwrite unless `--force` is given.
pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!("'{}' already exists, pass --force to overwrite it", args.output);
    }

    Config::save_default(&args.output)?;
    writeln!(host.output(), "Wrote the default configuration to '{}'", args.output)?;
    Ok(())
}
