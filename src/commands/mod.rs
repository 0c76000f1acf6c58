//! Command-line entry point.

mod init;
mod sync;
mod validate;

pub use init::{InitArgs, init_config};
pub use sync::{SyncArgs, sync_snapshots};
pub use validate::{ValidateArgs, validate_config};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::ffi::OsString;
use std::io::Write;

/// The process environment `run` talks to.
pub trait Host {
    fn output(&mut self) -> impl Write;
    fn error(&mut self) -> impl Write;
    fn exit(&mut self, code: i32);
}

#[derive(Debug, Parser)]
#[command(name = "org-snapshot", version, about = "Regenerate the JSON snapshots behind an organization's website")]
struct Cli {
    /// Minimum level of log messages; `RUST_LOG` takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch projects, contributors and package statistics, then write the snapshot files
    Sync(SyncArgs),

    /// Write the default configuration file
    Init(InitArgs),

    /// Check a configuration file without fetching anything
    Validate(ValidateArgs),
}

/// Parse `args`, run the selected command and report failures through `host`.
///
/// Exit codes: 0 on success (including a degraded snapshot), 1 when the command failed and 2 on
/// invalid usage.
pub async fn run<H, I, T>(host: &mut H, args: I)
where
    H: Host,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                _ = write!(host.output(), "{}", e.render());
                host.exit(0);
            } else {
                _ = write!(host.error(), "{}", e.render());
                host.exit(2);
            }
            return;
        }
    };

    _ = env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .try_init();

    let result = match &cli.command {
        Command::Sync(args) => sync_snapshots(host, args).await,
        Command::Init(args) => init_config(host, args),
        Command::Validate(args) => validate_config(host, args),
    };

    if let Err(e) = result {
        _ = writeln!(host.error(), "error: {e:#}");
        host.exit(1);
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().context("determining the current directory")?;
    Utf8PathBuf::try_from(dir).context("the current directory is not valid UTF-8")
}
