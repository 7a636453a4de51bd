// server/src/main.rs

// Entry point of the `hms` binary; argument parsing and dispatch live in
// the cli module.

use anyhow::Result;
use hms_server::cli::start_cli;

#[tokio::main]
async fn main() -> Result<()> {
    start_cli().await
}
