use super::{Host, current_dir};
use crate::config::{CONFIG_FILE_NAME, Config};
use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use clap::Args;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file to check, `org-snapshot.yaml` in the current directory by default
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// Load and validate a configuration file, reporting the first problem.
pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    let dir = current_dir()?;
    let path = args.config.clone().unwrap_or_else(|| dir.join(CONFIG_FILE_NAME));
    if !path.exists() {
        bail!("could not find configuration file '{path}'");
    }

    let config = Config::load(&dir, Some(path.as_path()))?;
    let packages: usize = config.projects.iter().map(|p| p.packages.len()).sum();
    writeln!(
        host.output(),
        "Configuration '{path}' is valid: organization '{}', {} project(s), {packages} package(s)",
        config.organization,
        config.projects.len()
    )?;
    Ok(())
}
