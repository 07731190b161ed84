//! Parallel page rendering.
//!
//! Every asset is rendered exactly once on the rayon pool. A failing asset
//! does not stop the others; after the batch, the error of the earliest
//! failing asset in input order is returned, so the reported failure is the
//! same no matter how the pool scheduled the work.

use crate::{
    asset::Asset,
    config::SiteConfig,
    log,
    home::HomePage,
    lookup::{LookupCache, github::IssueResolver},
    mention::MentionPage,
    utils::minify::minify_html,
};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    error::Error as StdError,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Page templates.
pub trait Renderer: Sync {
    fn render_asset(&self, asset: &Asset, ctx: &RenderContext) -> anyhow::Result<String>;
    fn render_mention(&self, page: &MentionPage, ctx: &RenderContext) -> anyhow::Result<String>;
    fn render_popup(&self, page: &MentionPage, ctx: &RenderContext) -> anyhow::Result<String>;
    fn render_home(&self, page: &HomePage, ctx: &RenderContext) -> anyhow::Result<String>;
}

/// Everything a render task may read.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub config: &'a SiteConfig,
    pub renderer: &'a dyn Renderer,
    pub cache: &'a LookupCache,
    pub issues: &'a IssueResolver,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render `{}`", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("failed to write page for `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RenderError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Template { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

/// Outcome of a successful render pass.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Written pages, in input order.
    pub written: Vec<PathBuf>,
    /// Previous URL path → ids of the assets claiming it, sorted.
    pub redirects: BTreeMap<String, Vec<String>>,
}

/// Render and write every asset in parallel.
///
/// `on_progress` is called once per attempted asset.
pub fn render_all<F>(
    assets: &[&Asset],
    ctx: &RenderContext,
    on_progress: F,
) -> Result<RenderReport, RenderError>
where
    F: Fn() + Sync,
{
    let redirects: Mutex<BTreeMap<String, Vec<String>>> = Mutex::new(BTreeMap::new());

    let results: Vec<_> = assets
        .par_iter()
        .map(|asset| {
            if !asset.prev_paths().is_empty() {
                let mut redirects = redirects.lock();
                for prev in asset.prev_paths() {
                    redirects
                        .entry(prev.clone())
                        .or_default()
                        .push(asset.id().to_owned());
                }
            }

            let result = asset.write(ctx);
            if let Err(err) = &result {
                log!("error"; "{:#}", error_chain(err));
            }
            on_progress();
            result
        })
        .collect();

    let mut written = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(path) => written.push(path),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let mut redirects = redirects.into_inner();
    for ids in redirects.values_mut() {
        ids.sort();
        ids.dedup();
    }

    Ok(RenderReport { written, redirects })
}

/// Write `content` to `path`, creating parent directories.
pub fn write_page(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Minify and write a rendered page; errors name `target`.
pub fn emit(target: &Path, html: anyhow::Result<String>, ctx: &RenderContext) -> Result<PathBuf, RenderError> {
    let html = html.map_err(|err| RenderError::Template {
        path: target.to_path_buf(),
        source: err.into(),
    })?;
    let html = minify_html(html.as_bytes(), ctx.config);
    write_page(target, &html).map_err(|source| RenderError::Io {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(target.to_path_buf())
}

/// Error message with its source chain, `a: b: c`.
fn error_chain(err: &RenderError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
