//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── prepare_output()        ──► create (or clean) the output directory
//!     │
//!     ├── load_cache()            ──► persisted lookups; a corrupt file starts empty
//!     │
//!     ├── Catalog::build()        ──► parse every document, build indices
//!     │
//!     ├── render_all()            ──► parallel page rendering
//!     │
//!     ├── write_mention_pages()   ──► one page per entity
//!     ├── write_popups()          ──► one fragment per entity
//!     ├── write_home()            ──► index.html with progress and latest document
//!     │
//!     └── LookupCache::write()    ──► always last, even when rendering failed
//! ```

use crate::{
    catalog::Catalog,
    config::SiteConfig,
    home::{HomePage, write_home},
    html::HtmlRenderer,
    log,
    logger::Progress,
    lookup::{LookupCache, LookupError, github::IssueResolver},
    mention::{write_mention_pages, write_popups},
    render::{RenderContext, render_all},
};
use anyhow::{Context, Result, bail};
use std::{collections::BTreeMap, fs, path::Path};

/// What a build produced.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub pages: usize,
    pub mention_pages: usize,
    pub popups: usize,
    /// Whether `index.html` was generated.
    pub home: bool,
    pub excluded: usize,
    /// Previous URL path → ids of the documents claiming it.
    pub redirects: BTreeMap<String, Vec<String>>,
    /// Ids of completed documents, most recently added first.
    pub recent: Vec<String>,
}

/// Build the entire site.
pub fn build_site(config: &SiteConfig) -> Result<BuildSummary> {
    let output = &config.build.output;
    prepare_output(output, config.build.clean)?;

    let cache = load_cache(&config.build.cache)?;
    let catalog = Catalog::build(&config.build.content, config)?;
    log_diagnostics(&catalog);

    let issues = IssueResolver::from_config(config).context("Failed to set up issue lookups")?;
    let ctx = RenderContext {
        config,
        renderer: &HtmlRenderer,
        cache: &cache,
        issues: &issues,
    };

    let assets: Vec<_> = catalog.assets().iter().collect();
    log!("render"; "rendering {} documents...", assets.len());
    let progress = Progress::new("render", assets.len());
    let rendered = render_all(&assets, &ctx, || progress.inc());
    progress.finish();

    let report = match rendered {
        Ok(report) => report,
        Err(err) => {
            if let Err(cache_err) = cache.write() {
                log!("error"; "{:#}", anyhow::Error::from(cache_err));
            }
            return Err(err).context("Build failed");
        }
    };

    let mention_pages = write_mention_pages(&catalog, &ctx).context("Failed to write mention pages")?;
    let popups = write_popups(&catalog, &ctx).context("Failed to write popups")?;

    let home = HomePage::new(&catalog);
    let home_written = write_home(&home, &ctx).context("Failed to write home page")?;

    cache
        .write()
        .with_context(|| format!("Failed to write lookup cache {}", cache.path().display()))?;

    let summary = BuildSummary {
        pages: report.written.len(),
        mention_pages: mention_pages.len(),
        popups: popups.len(),
        home: home_written.is_some(),
        excluded: catalog.excluded().len(),
        redirects: report.redirects,
        recent: home.recent.iter().map(|asset| asset.id().to_owned()).collect(),
    };
    log_build_result(&summary, &catalog);
    Ok(summary)
}

/// Parse every document and report problems without writing output.
///
/// Fails when a document was excluded, or with `strict` when any document
/// has diagnostics.
pub fn check_site(config: &SiteConfig, strict: bool) -> Result<()> {
    let catalog = Catalog::build(&config.build.content, config)?;
    let diagnostics = log_diagnostics(&catalog);

    log!(
        "check";
        "{} documents, {} excluded, {} diagnostics, {} completed",
        catalog.len(),
        catalog.excluded().len(),
        diagnostics,
        catalog.progress()
    );

    if !catalog.excluded().is_empty() {
        bail!("{} document(s) could not be parsed", catalog.excluded().len());
    }
    if strict && diagnostics > 0 {
        bail!("{diagnostics} diagnostic(s) reported");
    }
    Ok(())
}

/// Ensure the output directory exists; with `clean`, remove it first.
fn prepare_output(output: &Path, clean: bool) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(output).with_context(|| {
            format!("Failed to clear output directory: {}", output.display())
        })?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// Load the lookup cache. A corrupt file is reported and replaced on write.
fn load_cache(path: &Path) -> Result<LookupCache> {
    match LookupCache::load(path) {
        Ok(cache) => {
            if !cache.is_empty() {
                log!("cache"; "loaded {} lookups", cache.len());
            }
            Ok(cache)
        }
        Err(err @ LookupError::Corrupt { .. }) => {
            log!("warn"; "{:#}, starting empty", anyhow::Error::from(err));
            Ok(LookupCache::new(path))
        }
        Err(err) => Err(err).context("Failed to load lookup cache"),
    }
}

/// Log transcript diagnostics and contested redirects; returns how many
/// there were.
fn log_diagnostics(catalog: &Catalog) -> usize {
    let mut count = 0;
    for asset in catalog.assets() {
        for diagnostic in asset.diagnostics() {
            let context = asset.line(diagnostic.line).unwrap_or_default().trim();
            log!("warn"; "{}: {} | {}", asset.path().display(), diagnostic, context);
            count += 1;
        }
    }

    for (prev, claimants) in catalog.redirects() {
        if claimants.len() > 1 {
            let ids: Vec<_> = claimants
                .iter()
                .filter_map(|id| catalog.get(*id))
                .map(|asset| asset.id())
                .collect();
            log!("warn"; "previous path {prev} is claimed by {}", ids.join(", "));
            count += 1;
        }
    }
    count
}

fn log_build_result(summary: &BuildSummary, catalog: &Catalog) {
    if summary.pages == 0 {
        log!("warn"; "output is empty, check if content has .md files");
        return;
    }
    log!(
        "done";
        "{} pages, {} mention pages, {} completed",
        summary.pages,
        summary.mention_pages,
        catalog.progress()
    );
}
