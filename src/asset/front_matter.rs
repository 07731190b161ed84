//! YAML front matter of a source document.
//!
//! ```yaml
//! ---
//! id: thyroid-interview
//! title: The Thyroid Interview
//! completed: true
//! added: 2020-01-01
//! prev-paths:
//!   - /old/thyroid
//! speakers:
//!   RP: Ray Peat
//!   KM: Kate Murphy
//! source:
//!   url: https://www.youtube.com/watch?v=xyz
//! ---
//! ```
//!
//! Only `id` is required. Unknown keys are ignored so transcripts can carry
//! extra bookkeeping of their own.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Header fence.
const FENCE: &str = "---";

/// Date format for `added`.
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("missing front matter header")]
    MissingHeader,

    #[error("front matter header is never closed")]
    Unterminated,

    #[error("invalid YAML")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid date in `{field}`: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid value in `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Source media a transcript was made from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Source {
    pub url: Option<String>,
}

/// Header as written; validated into [`FrontMatter`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawFrontMatter {
    id: Option<String>,
    title: Option<String>,
    series: Option<String>,
    completed: bool,
    added: Option<serde_yaml::Value>,
    prev_paths: Vec<String>,
    speakers: BTreeMap<String, String>,
    source: Source,
    mentions: Vec<String>,
}

/// Validated document metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// Stable identity, unique across the catalog.
    pub id: String,
    pub title: String,
    pub series: Option<String>,
    pub completed: bool,
    pub added: Option<NaiveDate>,
    /// URL paths this document used to live at, oldest first.
    pub prev_paths: Vec<String>,
    pub speakers: BTreeMap<String, String>,
    pub source: Source,
    /// Entities to index this document under besides inline mentions.
    pub mentions: Vec<String>,
}

impl FrontMatter {
    /// Parse and validate a YAML header.
    pub fn parse(yaml: &str) -> Result<Self, FrontMatterError> {
        // An empty header deserializes to `null`
        let raw: RawFrontMatter = if yaml.trim().is_empty() {
            RawFrontMatter::default()
        } else {
            serde_yaml::from_str(yaml)?
        };

        let id = raw
            .id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(FrontMatterError::MissingField("id"))?;

        let added = raw.added.map(|value| parse_date("added", value)).transpose()?;

        let prev_paths = raw
            .prev_paths
            .into_iter()
            .map(|path| {
                let path = path.trim().to_owned();
                if path.is_empty() {
                    Err(FrontMatterError::InvalidField {
                        field: "prev-paths",
                        reason: "empty path".into(),
                    })
                } else {
                    Ok(path)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            title: raw.title.unwrap_or_else(|| id.clone()),
            id,
            series: raw.series,
            completed: raw.completed,
            added,
            prev_paths,
            speakers: raw.speakers,
            source: raw.source,
            mentions: raw.mentions,
        })
    }
}

/// Split `source` into its YAML header, the body, and the number of lines
/// preceding the body.
pub fn split(source: &str) -> Result<(&str, &str, usize), FrontMatterError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let mut lines = source.split_inclusive('\n');
    let first = lines.next().ok_or(FrontMatterError::MissingHeader)?;
    if first.trim_end() != FENCE {
        return Err(FrontMatterError::MissingHeader);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for (index, line) in lines.enumerate() {
        if matches!(line.trim_end(), FENCE | "...") {
            let body_start = offset + line.len();
            // header line + yaml lines + closing line
            return Ok((&source[yaml_start..offset], &source[body_start..], index + 2));
        }
        offset += line.len();
    }

    Err(FrontMatterError::Unterminated)
}

fn parse_date(field: &'static str, value: serde_yaml::Value) -> Result<NaiveDate, FrontMatterError> {
    let text = match value {
        serde_yaml::Value::String(text) => text,
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_owned())
            .unwrap_or_default(),
    };

    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|_| FrontMatterError::InvalidDate { field, value: text })
}
