//! `[lookup]` section configuration.
//!
//! Controls network lookups made while rendering, such as issue titles.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[lookup]` section in parley.toml.
///
/// # Example
/// ```toml
/// [lookup]
/// github_repo = "owner/transcripts"
/// offline = false
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    /// `owner/name` of the repository `{#123}` references point into.
    #[serde(default = "defaults::lookup::github_repo")]
    #[educe(Default = defaults::lookup::github_repo())]
    pub github_repo: Option<String>,

    /// Never touch the network; only cached values are used.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub offline: bool,

    /// Per-request timeout.
    #[serde(default = "defaults::lookup::timeout_secs")]
    #[educe(Default = defaults::lookup::timeout_secs())]
    pub timeout_secs: u64,
}

impl LookupConfig {
    /// Whether network lookups may be made at all.
    pub fn is_online(&self) -> bool {
        !self.offline && self.github_repo.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_lookup_defaults_are_offline() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert_eq!(config.lookup.github_repo, None);
        assert!(!config.lookup.offline);
        assert_eq!(config.lookup.timeout_secs, 10);
        assert!(!config.lookup.is_online());
    }

    #[test]
    fn test_lookup_online_with_repo() {
        let config: SiteConfig =
            toml::from_str("[lookup]\ngithub_repo = \"owner/repo\"").unwrap();
        assert!(config.lookup.is_online());
    }

    #[test]
    fn test_lookup_offline_overrides_repo() {
        let config: SiteConfig = toml::from_str(
            "[lookup]\ngithub_repo = \"owner/repo\"\noffline = true",
        )
        .unwrap();
        assert!(!config.lookup.is_online());
    }
}
