//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn title() -> String {
        "Transcripts".into()
    }

    pub fn url() -> Option<String> {
        None
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn cache() -> PathBuf {
        ".cache/lookups.json".into()
    }
}

// ============================================================================
// [transcript] Section Defaults
// ============================================================================

pub mod transcript {
    pub fn retort_threshold() -> usize {
        crate::transcript::DEFAULT_RETORT_THRESHOLD
    }
}

// ============================================================================
// [lookup] Section Defaults
// ============================================================================

pub mod lookup {
    pub fn github_repo() -> Option<String> {
        None
    }

    pub fn timeout_secs() -> u64 {
        10
    }
}
