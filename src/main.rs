//! Regenerates the JSON snapshots behind an organization's website.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use org_snapshot::{Host, run};
use std::io::{Write, stderr, stdout};

/// Host that talks to the real process streams.
#[derive(Debug, Clone, Default)]
pub struct RealHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for RealHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[tokio::main]
#[cfg_attr(coverage_nightly, coverage(off))]
async fn main() {
    run(&mut RealHost, std::env::args_os()).await;
}
