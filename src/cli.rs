//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley transcript site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long)]
    pub content: Option<PathBuf>,

    /// Config file name (default: parley.toml)
    #[arg(short = 'C', long, default_value = "parley.toml")]
    pub config: PathBuf,

    /// subcommands (default: build)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments of the build command
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Minify the html content
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Skip network lookups and use only cached values
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub offline: Option<bool>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse every document, render the site and write the lookup cache
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Parse every document and report problems without writing anything
    Check {
        /// Treat transcript diagnostics as errors
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    /// The command to run; `build` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Build {
            build_args: BuildArgs::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_build() {
        let cli = Cli::parse_from(["parley"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.command(), Commands::Build { .. }));
        assert_eq!(cli.config, PathBuf::from("parley.toml"));
    }

    #[test]
    fn test_check_strict() {
        let cli = Cli::parse_from(["parley", "check", "--strict"]);
        assert!(matches!(cli.command(), Commands::Check { strict: true }));
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::parse_from(["parley", "-c", "notes", "build", "--minify", "false"]);
        assert_eq!(cli.content, Some(PathBuf::from("notes")));
        let Commands::Build { build_args } = cli.command() else {
            panic!("expected build");
        };
        assert_eq!(build_args.minify, Some(false));
        assert_eq!(build_args.offline, None);
        assert!(!build_args.clean);
    }
}
