//! `[transcript]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[transcript]` section in parley.toml - speaker-turn heuristics.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct TranscriptConfig {
    /// A short reply to an interrupted turn renders compactly when its
    /// trimmed length, in characters, is below this value.
    #[serde(default = "defaults::transcript::retort_threshold")]
    #[educe(Default = defaults::transcript::retort_threshold())]
    pub retort_threshold: usize,
}
