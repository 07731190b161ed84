//! Pages for mentioned entities.
//!
//! Each entity of the mention index gets a full page listing the documents
//! that mention it, and a small popup fragment shown when hovering a mention
//! link. Both passes run in key order and stop at the first failure.

use crate::{
    asset::Asset,
    catalog::{Catalog, MentionEntry},
    render::{RenderContext, RenderError, emit},
};
use std::path::PathBuf;

/// Directory of mention pages under the output root.
const MENTIONS_DIR: &str = "mentions";
/// Directory of popup fragments under the output root.
const POPUPS_DIR: &str = "popups";

/// One entity with the documents mentioning it.
#[derive(Debug, Clone)]
pub struct MentionPage<'a> {
    pub key: &'a str,
    pub name: &'a str,
    /// In discovery order.
    pub assets: Vec<&'a Asset>,
}

impl<'a> MentionPage<'a> {
    fn new(catalog: &'a Catalog, key: &'a str, entry: &'a MentionEntry) -> Self {
        Self {
            key,
            name: &entry.name,
            assets: entry.assets.iter().filter_map(|id| catalog.get(*id)).collect(),
        }
    }

    pub fn url(&self) -> String {
        mention_url(self.key)
    }
}

/// `/mentions/<key>/`
pub fn mention_url(key: &str) -> String {
    format!("/{MENTIONS_DIR}/{key}/")
}

/// `/popups/<key>.html`
pub fn popup_url(key: &str) -> String {
    format!("/{POPUPS_DIR}/{key}.html")
}

/// All mention pages of the catalog.
pub fn pages(catalog: &Catalog) -> impl Iterator<Item = MentionPage<'_>> {
    catalog
        .mentions()
        .iter()
        .map(move |(key, entry)| MentionPage::new(catalog, key, entry))
}

/// Write `<output>/mentions/<key>/index.html` for every entity.
pub fn write_mention_pages(catalog: &Catalog, ctx: &RenderContext) -> Result<Vec<PathBuf>, RenderError> {
    let output = &ctx.config.build.output;
    pages(catalog)
        .map(|page| {
            let target = output.join(MENTIONS_DIR).join(page.key).join("index.html");
            let html = ctx.renderer.render_mention(&page, ctx);
            emit(&target, html, ctx)
        })
        .collect()
}

/// Write `<output>/popups/<key>.html` for every entity.
pub fn write_popups(catalog: &Catalog, ctx: &RenderContext) -> Result<Vec<PathBuf>, RenderError> {
    let output = &ctx.config.build.output;
    pages(catalog)
        .map(|page| {
            let target = output.join(POPUPS_DIR).join(format!("{}.html", page.key));
            let html = ctx.renderer.render_popup(&page, ctx);
            emit(&target, html, ctx)
        })
        .collect()
}
