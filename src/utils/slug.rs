//! URL slugification and path utilities.
//!
//! Converts document paths and entity names to URL-safe keys.

use std::path::{Component, Path};

/// Slug used when a name has no ASCII transliteration at all.
const FALLBACK_SLUG: &str = "untitled";

/// Length of a `YYYY-MM-DD-` file name prefix.
const DATE_PREFIX_LEN: usize = "0000-00-00-".len();

// ============================================================================
// Slugification
// ============================================================================

/// Stable key for a mentioned entity.
///
/// Transliterates to ASCII, lowercases, and collapses every run of other
/// characters into a single `-`. Returns an empty string when nothing
/// alphanumeric remains.
///
/// ```ignore
/// entity_key("William Blake")  // → "william-blake"
/// entity_key("Gödel, Kurt")     // → "godel-kurt"
/// ```
pub fn entity_key(name: &str) -> String {
    let ascii = deunicode::deunicode(name);
    let mut key = String::with_capacity(ascii.len());

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
        } else if !key.is_empty() && !key.ends_with('-') {
            key.push('-');
        }
    }

    while key.ends_with('-') {
        key.pop();
    }
    key
}

/// Strip a leading `YYYY-MM-DD-` from a file stem.
pub fn strip_date_prefix(stem: &str) -> &str {
    let bytes = stem.as_bytes();
    let is_prefixed = bytes.len() > DATE_PREFIX_LEN
        && bytes[..DATE_PREFIX_LEN].iter().enumerate().all(|(i, b)| match i {
            4 | 7 | 10 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if is_prefixed { &stem[DATE_PREFIX_LEN..] } else { stem }
}

// ============================================================================
// Content Path Utilities
// ============================================================================

/// URL path of a document, relative to the content directory.
///
/// | Source | URL |
/// |--------|-----|
/// | `2020-01-01-thyroid.md` | `/thyroid/` |
/// | `radio/Blake & Goethe.md` | `/radio/blake-goethe/` |
/// | `radio/index.md` | `/radio/` |
pub fn url_path(relative: &Path) -> String {
    let mut segments: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|component| match component {
            Component::Normal(name) => Some(slug_or_fallback(&name.to_string_lossy())),
            _ => None,
        })
        .collect();

    let stem = relative
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    let stem = strip_date_prefix(&stem);
    if stem != "index" {
        segments.push(slug_or_fallback(stem));
    }

    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

fn slug_or_fallback(text: &str) -> String {
    let slug = entity_key(text);
    if slug.is_empty() {
        FALLBACK_SLUG.to_owned()
    } else {
        slug
    }
}
