//! `[build]` section configuration.
//!
//! Contains paths and output settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in parley.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"             # Source directory
/// output = "public"               # Output directory
/// cache = "~/.cache/parley.json"  # Lookup cache, tilde-expanded
/// minify = true
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Directory holding the markdown transcripts.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Persisted lookup cache file.
    #[serde(default = "defaults::build::cache")]
    #[educe(Default = defaults::build::cache())]
    pub cache: PathBuf,

    /// Minify HTML output.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.root, None);
        assert_eq!(config.build.content, PathBuf::from("content"));
        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.cache, PathBuf::from(".cache/lookups.json"));
        assert!(config.build.minify);
        assert!(!config.build.clean);
    }

    #[test]
    fn test_build_config_custom_paths() {
        let config = r#"
            [build]
            content = "transcripts"
            output = "dist"
            cache = "state/cache.json"
            minify = false
            clean = true
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.content, PathBuf::from("transcripts"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.cache, PathBuf::from("state/cache.json"));
        assert!(!config.build.minify);
        assert!(config.build.clean);
    }

    #[test]
    fn test_build_config_unknown_field() {
        let result: Result<SiteConfig, _> = toml::from_str("[build]\ntailwind = true");
        assert!(result.is_err());
    }
}
