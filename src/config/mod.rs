//! Site configuration management for `parley.toml`.
//!
//! # Sections
//!
//! | Section        | Purpose                                   |
//! |----------------|-------------------------------------------|
//! | `[base]`       | Site metadata (title, url)                |
//! | `[build]`      | Content, output and cache paths, minify   |
//! | `[transcript]` | Speaker-turn heuristics                   |
//! | `[lookup]`     | External lookups (issue titles)           |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "Transcripts"
//!
//! [build]
//! content = "content"
//! output = "public"
//!
//! [transcript]
//! retort_threshold = 50
//!
//! [lookup]
//! github_repo = "owner/transcripts"
//! ```

mod base;
mod build;
pub mod defaults;
mod error;
mod lookup;
mod transcript;

use base::BaseConfig;
use build::BuildConfig;
use error::ConfigError;
use lookup::LookupConfig;
use transcript::TranscriptConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing parley.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Speaker-turn heuristics
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// External lookups
    #[serde(default)]
    pub lookup: LookupConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("parley.toml"))
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Load `parley.toml` under the CLI root, falling back to defaults when
    /// the file does not exist, then apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        self.update_path_with_root(&root, &cli.config);

        if let Some(Commands::Build { build_args }) = &cli.command {
            self.build.clean |= build_args.clean;
            Self::update_option(&mut self.build.minify, build_args.minify.as_ref());
            Self::update_option(&mut self.lookup.offline, build_args.offline.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve all paths against the root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, config_file: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config_file));
        self.build.content = Self::normalize_path(&root.join(&self.build.content));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));

        let cache = self.build.cache.to_string_lossy().into_owned();
        let cache = PathBuf::from(shellexpand::tilde(&cache).into_owned());
        self.build.cache = if cache.is_relative() {
            Self::normalize_path(&root.join(cache))
        } else {
            Self::normalize_path(&cache)
        };
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base.url
            && !base_url.starts_with("http")
        {
            bail!(ConfigError::Invalid(
                "[base].url: must start with http:// or https://".into()
            ));
        }

        if self.transcript.retort_threshold == 0 {
            bail!(ConfigError::Invalid(
                "[transcript].retort_threshold: must be positive".into()
            ));
        }

        if let Some(repo) = &self.lookup.github_repo {
            let valid = repo
                .split_once('/')
                .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
            if !valid {
                bail!(ConfigError::Invalid(format!(
                    "[lookup].github_repo: must look like `owner/name`, got `{repo}`"
                )));
            }
        }

        if self.build.content == self.build.output {
            bail!(ConfigError::Invalid(
                "[build].content: must differ from [build].output".into()
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
