//! Parley - A static site generator for conversation transcripts.

mod asset;
mod build;
mod catalog;
mod cli;
mod config;
mod home;
mod html;
mod logger;
mod lookup;
mod markup;
mod mention;
mod render;
mod transcript;
mod utils;

use anyhow::Result;
use build::{build_site, check_site};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;

    match cli.command() {
        Commands::Build { .. } => build_site(&config).map(|_| ()),
        Commands::Check { strict } => check_site(&config, strict),
    }
}
