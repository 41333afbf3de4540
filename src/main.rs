//! grdep CLI entry point
//!
//! Parses arguments, runs the selected command and reports failures with
//! a suggestion on stderr. Exits with status 1 on any error.

use anyhow::Result;
use clap::Parser;
use grdep::cli;
use grdep::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
