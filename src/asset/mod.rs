//! One source document and everything derived from it.
//!
//! An [`Asset`] is built once from the raw file: the front matter is
//! validated, the body is parsed into prose and speaker turns, and the
//! entities it mentions are collected. Nothing changes after construction.

pub mod front_matter;

use crate::{
    markup,
    render::{RenderContext, RenderError},
    transcript::{self, Diagnostic, Node, SpeakerTurn, Transcript},
    utils::{minify::minify_html, slug},
};
use chrono::NaiveDate;
use front_matter::{FrontMatter, FrontMatterError};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    str::Utf8Error,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{}` is not valid UTF-8", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: Utf8Error,
    },

    #[error("`{}`: {source}", path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("`{}` reuses id `{id}` of `{}`", path.display(), first.display())]
    DuplicateId {
        path: PathBuf,
        id: String,
        first: PathBuf,
    },

    #[error("`{}` would be written to `{url}`, already taken by `{}`", path.display(), first.display())]
    DuplicateUrl {
        path: PathBuf,
        url: String,
        first: PathBuf,
    },
}

impl AssetError {
    /// Source file the error is about.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Encoding { path, .. }
            | Self::FrontMatter { path, .. }
            | Self::DuplicateId { path, .. }
            | Self::DuplicateUrl { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    path: PathBuf,
    url: String,
    source: String,
    front_matter: FrontMatter,
    transcript: Transcript,
    /// Transcript diagnostics with lines relative to the whole file.
    diagnostics: Vec<Diagnostic>,
    /// Entity key → name as first written.
    mentions: BTreeMap<String, String>,
}

impl Asset {
    /// Build an asset from raw file bytes.
    ///
    /// The URL is derived from the file name alone; [`Asset::load`] derives
    /// it from the path relative to the content root instead.
    pub fn new(path: impl Into<PathBuf>, raw: &[u8], threshold: usize) -> Result<Self, AssetError> {
        let path = path.into();
        let source = std::str::from_utf8(raw)
            .map_err(|source| AssetError::Encoding {
                path: path.clone(),
                source,
            })?
            .to_owned();

        let front_matter_err = |source| AssetError::FrontMatter {
            path: path.clone(),
            source,
        };
        let (yaml, body, lines_before_body) =
            front_matter::split(&source).map_err(front_matter_err)?;
        let front_matter = FrontMatter::parse(yaml).map_err(front_matter_err)?;

        let transcript = transcript::parse(body, &front_matter.speakers, threshold);
        let diagnostics = transcript
            .diagnostics
            .iter()
            .map(|d| Diagnostic {
                line: d.line + lines_before_body,
                kind: d.kind.clone(),
            })
            .collect();

        let mut mentions = BTreeMap::new();
        let declared = front_matter
            .mentions
            .iter()
            .map(|name| (slug::entity_key(name), name.trim().to_owned()));
        for (key, name) in markup::mentions(body).into_iter().chain(declared) {
            if !key.is_empty() {
                mentions.entry(key).or_insert(name);
            }
        }

        let url = slug::url_path(Path::new(path.file_name().unwrap_or_default()));

        Ok(Self {
            path,
            url,
            source,
            front_matter,
            transcript,
            diagnostics,
            mentions,
        })
    }

    /// Read and build the asset at `path`, which lies under `content_root`.
    pub fn load(path: &Path, content_root: &Path, threshold: usize) -> Result<Self, AssetError> {
        let raw = fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut asset = Self::new(path, &raw, threshold)?;

        let relative = path.strip_prefix(content_root).unwrap_or(path);
        asset.url = slug::url_path(relative);
        Ok(asset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Site-relative URL, e.g. `/radio/thyroid/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn id(&self) -> &str {
        &self.front_matter.id
    }

    pub fn title(&self) -> &str {
        &self.front_matter.title
    }

    pub fn front_matter(&self) -> &FrontMatter {
        &self.front_matter
    }

    pub fn is_completed(&self) -> bool {
        self.front_matter.completed
    }

    pub fn date_added(&self) -> Option<NaiveDate> {
        self.front_matter.added
    }

    pub fn prev_paths(&self) -> &[String] {
        &self.front_matter.prev_paths
    }

    pub fn source_url(&self) -> Option<&str> {
        self.front_matter.source.url.as_deref()
    }

    /// 1-based line of the whole file, without its line ending.
    pub fn line(&self, number: usize) -> Option<&str> {
        let line = self.source.lines().nth(number.checked_sub(1)?)?;
        Some(line.trim_end_matches('\r'))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.transcript.nodes
    }

    pub fn turns(&self) -> impl Iterator<Item = &SpeakerTurn> {
        self.transcript.turns()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn mentions(&self) -> &BTreeMap<String, String> {
        &self.mentions
    }

    /// `<output><url>index.html`
    pub fn output_path(&self, output: &Path) -> PathBuf {
        output.join(self.url.trim_matches('/')).join("index.html")
    }

    /// Render through the context's renderer and write the page.
    pub fn write(&self, ctx: &RenderContext) -> Result<PathBuf, RenderError> {
        let html = ctx
            .renderer
            .render_asset(self, ctx)
            .map_err(|err| RenderError::Template {
                path: self.path.clone(),
                source: err.into(),
            })?;

        let target = self.output_path(&ctx.config.build.output);
        let html = minify_html(html.as_bytes(), ctx.config);
        crate::render::write_page(&target, &html).map_err(|source| RenderError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(target)
    }
}
