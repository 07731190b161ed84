//! The site's home page: every document, how many are completed, and the
//! most recently added completed one.

use crate::{
    asset::Asset,
    catalog::{Catalog, Completion, sort_by_date_added},
    log,
    render::{RenderContext, RenderError, emit},
};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HomePage<'a> {
    /// All documents in discovery order.
    pub assets: Vec<&'a Asset>,
    /// Completed documents, most recently added first.
    pub recent: Vec<&'a Asset>,
    pub progress: Completion,
}

impl<'a> HomePage<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        let mut recent = catalog.completed_assets();
        sort_by_date_added(&mut recent);
        Self {
            assets: catalog.assets().iter().collect(),
            recent,
            progress: catalog.progress(),
        }
    }

    pub fn latest(&self) -> Option<&'a Asset> {
        self.recent.first().copied()
    }
}

/// Write `<output>/index.html`.
///
/// Skipped when a document already renders to `/`.
pub fn write_home(page: &HomePage, ctx: &RenderContext) -> Result<Option<PathBuf>, RenderError> {
    if let Some(asset) = page.assets.iter().find(|asset| asset.url() == "/") {
        log!("warn"; "{} is the home page, skipping the generated one", asset.path().display());
        return Ok(None);
    }

    let target = ctx.config.build.output.join("index.html");
    let html = ctx.renderer.render_home(page, ctx);
    emit(&target, html, ctx).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset::tests::asset,
        lookup::{LookupCache, github::IssueResolver},
        render::tests::{StubRenderer, test_config},
    };
    use std::fs;
    use tempfile::TempDir;

    fn catalog() -> Catalog {
        Catalog::from_assets([
            asset("old.md", "---\nid: old\ncompleted: true\nadded: 2019-01-01\n---\n"),
            asset("draft.md", "---\nid: draft\n---\n"),
            asset("new.md", "---\nid: new\ncompleted: true\nadded: 2023-02-01\n---\n"),
        ])
    }

    #[test]
    fn test_home_page_contents() {
        let catalog = catalog();
        let page = HomePage::new(&catalog);

        assert_eq!(page.assets.len(), 3);
        assert_eq!(page.latest().map(Asset::id), Some("new"));
        let recent: Vec<_> = page.recent.iter().map(|a| a.id()).collect();
        assert_eq!(recent, ["new", "old"]);
        assert_eq!(page.progress.to_string(), "2/3 (67%)");
    }

    #[test]
    fn test_home_page_without_completed_documents() {
        let catalog = Catalog::from_assets([asset("a.md", "---\nid: a\n---\n")]);
        assert!(HomePage::new(&catalog).latest().is_none());
    }

    #[test]
    fn test_write_home() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let renderer = StubRenderer::new(&[]);
        let cache = LookupCache::new(dir.path().join("cache.json"));
        let issues = IssueResolver::offline(None);
        let ctx = RenderContext {
            config: &config,
            renderer: &renderer,
            cache: &cache,
            issues: &issues,
        };

        let catalog = catalog();
        let written = write_home(&HomePage::new(&catalog), &ctx).unwrap();
        assert_eq!(written, Some(dir.path().join("index.html")));
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<p>3 documents, latest new</p>"
        );

        // A document at `/` takes precedence
        let catalog = Catalog::from_assets([asset("index.md", "---\nid: home\n---\n")]);
        fs::remove_file(dir.path().join("index.html")).unwrap();
        assert_eq!(write_home(&HomePage::new(&catalog), &ctx).unwrap(), None);
        assert!(!dir.path().join("index.html").exists());
    }
}
