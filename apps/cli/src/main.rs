//! yuque-export CLI: export Yuque knowledge bases to local markdown.
//!
//! Every document is written as a markdown file under a directory tree
//! mirroring the repository's table of contents, with images and
//! attachments downloaded next to it.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
