//! The collection of all documents and the indices derived from it.
//!
//! # Architecture
//!
//! ```text
//! Catalog::build()
//!     │
//!     ├── discover()      ──► *.md under the content root, sorted by path
//!     │
//!     ├── Asset::load()   ──► in parallel; failures are logged and excluded
//!     │
//!     └── from_assets()   ──► duplicate ids excluded, then one indexing pass:
//!                             completed set, mention index, redirect map
//! ```
//!
//! Every index refers to assets by [`AssetId`], a position in the catalog's
//! asset list, so no index can name an asset outside the collection.

use crate::{
    asset::{Asset, AssetError},
    config::SiteConfig,
    log,
};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of source documents.
const SOURCE_EXT: &str = "md";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("content directory `{}` does not exist", .0.display())]
    MissingRoot(PathBuf),

    #[error("content path `{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Position of an asset in [`Catalog::assets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(usize);

impl AssetId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One entity of the mention index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEntry {
    /// Name as first written, in discovery order.
    pub name: String,
    pub assets: BTreeSet<AssetId>,
}

/// A document left out of the catalog.
#[derive(Debug)]
pub struct Exclusion {
    pub path: PathBuf,
    pub error: AssetError,
}

/// Completed documents out of all documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub completed: usize,
    pub total: usize,
}

impl Completion {
    /// Fraction completed, `0.0` for an empty catalog.
    pub fn ratio(self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.0}%)",
            self.completed,
            self.total,
            self.ratio() * 100.0
        )
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    assets: Vec<Asset>,
    ids: FxHashMap<String, AssetId>,
    urls: FxHashMap<String, AssetId>,
    completed: Vec<AssetId>,
    mentions: BTreeMap<String, MentionEntry>,
    redirects: BTreeMap<String, Vec<AssetId>>,
    excluded: Vec<Exclusion>,
}

impl Catalog {
    /// Discover, load and index every document under `root`.
    pub fn build(root: &Path, config: &SiteConfig) -> Result<Self, CatalogError> {
        if !root.exists() {
            return Err(CatalogError::MissingRoot(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(CatalogError::NotADirectory(root.to_path_buf()));
        }

        let paths = discover(root);
        let threshold = config.transcript.retort_threshold;
        let loaded: Vec<_> = paths
            .par_iter()
            .map(|path| Asset::load(path, root, threshold))
            .collect();

        let mut assets = Vec::with_capacity(loaded.len());
        let mut excluded = Vec::new();
        for result in loaded {
            match result {
                Ok(asset) => assets.push(asset),
                Err(error) => excluded.push(exclude(error)),
            }
        }

        let mut catalog = Self::from_assets(assets);
        excluded.append(&mut catalog.excluded);
        excluded.sort_by(|a, b| a.path.cmp(&b.path));
        catalog.excluded = excluded;

        log!(
            "catalog";
            "{} documents, {} excluded, {} entities",
            catalog.len(),
            catalog.excluded.len(),
            catalog.mentions.len()
        );
        Ok(catalog)
    }

    /// Index already-built assets, keeping their order.
    ///
    /// An asset reusing an earlier asset's id or URL is excluded.
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut catalog = Self::default();

        for asset in assets {
            if let Some(error) = catalog.conflict(&asset) {
                catalog.excluded.push(exclude(error));
                continue;
            }

            let id = AssetId(catalog.assets.len());
            catalog.ids.insert(asset.id().to_owned(), id);
            catalog.urls.insert(asset.url().to_owned(), id);
            catalog.index(id, &asset);
            catalog.assets.push(asset);
        }

        catalog
    }

    /// Id or URL clash with an asset already in the catalog.
    fn conflict(&self, asset: &Asset) -> Option<AssetError> {
        let path = asset.path().to_path_buf();
        let first = |id: &AssetId| self.assets[id.index()].path().to_path_buf();

        if let Some(taken) = self.ids.get(asset.id()) {
            return Some(AssetError::DuplicateId {
                path,
                id: asset.id().to_owned(),
                first: first(taken),
            });
        }
        self.urls.get(asset.url()).map(|taken| AssetError::DuplicateUrl {
            path,
            url: asset.url().to_owned(),
            first: first(taken),
        })
    }

    fn index(&mut self, id: AssetId, asset: &Asset) {
        if asset.is_completed() {
            self.completed.push(id);
        }

        for (key, name) in asset.mentions() {
            self.mentions
                .entry(key.clone())
                .or_insert_with(|| MentionEntry {
                    name: name.clone(),
                    assets: BTreeSet::new(),
                })
                .assets
                .insert(id);
        }

        for prev in asset.prev_paths() {
            let claimants = self.redirects.entry(prev.clone()).or_default();
            if !claimants.contains(&id) {
                claimants.push(id);
            }
        }
    }

    /// All assets in discovery order.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(id.index())
    }

    /// Look up an asset by its front-matter id.
    #[cfg(test)]
    pub fn find_by_id(&self, id: &str) -> Option<AssetId> {
        self.ids.get(id).copied()
    }

    /// Completed assets in discovery order.
    pub fn completed_assets(&self) -> Vec<&Asset> {
        self.completed
            .iter()
            .map(|id| &self.assets[id.index()])
            .collect()
    }

    pub fn progress(&self) -> Completion {
        Completion {
            completed: self.completed.len(),
            total: self.assets.len(),
        }
    }

    /// Entity key → entry.
    pub fn mentions(&self) -> &BTreeMap<String, MentionEntry> {
        &self.mentions
    }

    #[cfg(test)]
    pub fn mention(&self, key: &str) -> Option<&MentionEntry> {
        self.mentions.get(key)
    }

    /// Previous URL path → assets claiming it, in discovery order.
    pub fn redirects(&self) -> &BTreeMap<String, Vec<AssetId>> {
        &self.redirects
    }

    /// Documents left out, sorted by path.
    pub fn excluded(&self) -> &[Exclusion] {
        &self.excluded
    }
}

/// Every `*.md` file under `root`, sorted by path. Hidden entries are skipped.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == SOURCE_EXT))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Most recently added first; undated last; ties keep their order.
pub fn sort_by_date_added(assets: &mut [&Asset]) {
    assets.sort_by_key(|asset| {
        let added = asset.date_added();
        (added.is_none(), Reverse(added))
    });
}

fn exclude(error: AssetError) -> Exclusion {
    log!("error"; "excluded {}", error);
    Exclusion {
        path: error.path().to_path_buf(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::asset;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn three_documents(dir: &Path) {
        write(
            dir,
            "doc1.md",
            "---\nid: doc1\nspeakers:\n  RP: Ray Peat\n  KM: Kate Murphy\n---\n\
             RP: So the thing about the thyroid is\n\nKM: Right, yes\n",
        );
        write(
            dir,
            "doc2.md",
            "---\nid: doc2\ncompleted: true\nadded: 2020-01-01\n---\nDone.\n",
        );
        write(dir, "doc3.md", "---\nid: doc3\ncompleted: false\n---\nDraft.\n");
    }

    #[test]
    fn test_three_document_scenario() {
        let dir = TempDir::new().unwrap();
        three_documents(dir.path());

        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.excluded().is_empty());

        let completed: Vec<_> = catalog.completed_assets().iter().map(|a| a.id()).collect();
        assert_eq!(completed, ["doc2"]);

        let doc1 = catalog.get(catalog.find_by_id("doc1").unwrap()).unwrap();
        let turns: Vec<_> = doc1.turns().collect();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].is_hello);
        assert_eq!(turns[0].short_name, "RP");
        assert!(turns[1].is_hello);
        assert!(turns[1].can_retort);
        assert!(doc1.diagnostics().is_empty());
    }

    #[test]
    fn test_completed_subset_of_all() {
        let dir = TempDir::new().unwrap();
        three_documents(dir.path());
        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();

        for asset in catalog.completed_assets() {
            assert!(asset.is_completed());
            assert!(catalog.find_by_id(asset.id()).is_some());
        }
        assert_eq!(catalog.progress(), Completion { completed: 1, total: 3 });
        assert_eq!(catalog.progress().to_string(), "1/3 (33%)");
    }

    #[test]
    fn test_one_malformed_of_five_is_excluded() {
        let dir = TempDir::new().unwrap();
        for i in 1..=5 {
            let header = if i == 3 {
                "title: no identity".to_string()
            } else {
                format!("id: doc{i}")
            };
            write(dir.path(), &format!("doc{i}.md"), &format!("---\n{header}\n---\nbody\n"));
        }

        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.excluded().len(), 1);
        assert!(catalog.excluded()[0].path.ends_with("doc3.md"));
        assert!(catalog.find_by_id("doc3").is_none());
    }

    #[test]
    fn test_prior_path_scenario() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "doc4.md",
            "---\nid: doc4\nprev-paths:\n  - /old/doc4\n---\nMoved.\n",
        );
        write(dir.path(), "doc5.md", "---\nid: doc5\n---\n");

        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        let doc4 = catalog.find_by_id("doc4").unwrap();
        assert!(catalog.redirects()["/old/doc4"].contains(&doc4));
    }

    #[test]
    fn test_redirect_completeness() {
        let catalog = Catalog::from_assets([
            asset("a.md", "---\nid: a\nprev-paths: [/x, /y]\n---\n"),
            asset("b.md", "---\nid: b\nprev-paths: [/y]\n---\n"),
        ]);

        for (index, asset) in catalog.assets().iter().enumerate() {
            for prev in asset.prev_paths() {
                assert!(catalog.redirects()[prev].contains(&AssetId(index)));
            }
        }
        assert_eq!(catalog.redirects()["/y"], [AssetId(0), AssetId(1)]);
    }

    #[test]
    fn test_mention_round_trip() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "---\nid: a\n---\nOn [[William Blake]] and [[Goethe]].\n");
        write(dir.path(), "b.md", "---\nid: b\n---\nMore [[William Blake]].\n");

        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        let a = catalog.find_by_id("a").unwrap();
        let b = catalog.find_by_id("b").unwrap();
        for (index, asset) in catalog.assets().iter().enumerate() {
            for key in asset.mentions().keys() {
                assert!(catalog.mentions()[key].assets.contains(&AssetId(index)));
            }
        }
        assert_eq!(catalog.mention("william-blake").unwrap().name, "William Blake");
        assert_eq!(
            catalog.mention("william-blake").unwrap().assets,
            BTreeSet::from([a, b])
        );

        // Drop a's references and rebuild
        write(dir.path(), "a.md", "---\nid: a\n---\nNothing here.\n");
        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        let b = catalog.find_by_id("b").unwrap();
        assert_eq!(catalog.mention("william-blake").unwrap().assets, BTreeSet::from([b]));
        assert!(catalog.mention("goethe").is_none());
    }

    #[test]
    fn test_duplicate_id_excluded() {
        let catalog = Catalog::from_assets([
            asset("first.md", "---\nid: same\n---\n"),
            asset("second.md", "---\nid: same\n---\n"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.assets()[0].path(), Path::new("first.md"));
        assert!(matches!(
            catalog.excluded()[0].error,
            AssetError::DuplicateId { .. }
        ));
    }

    #[test]
    fn test_duplicate_url_excluded() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "2020-01-01-thyroid.md", "---\nid: first\n---\n");
        write(dir.path(), "thyroid.md", "---\nid: second\n---\n");
        write(dir.path(), "Blake & Goethe.md", "---\nid: third\n---\n");
        write(dir.path(), "blake-goethe.md", "---\nid: fourth\n---\n");

        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.excluded().len(), 2);
        assert!(catalog.excluded().iter().all(|e| matches!(
            &e.error,
            AssetError::DuplicateUrl { url, .. } if url == "/thyroid/" || url == "/blake-goethe/"
        )));

        let urls: BTreeSet<_> = catalog.assets().iter().map(Asset::url).collect();
        assert_eq!(urls.len(), catalog.len());
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.md", "");
        write(dir.path(), "a/z.md", "");
        write(dir.path(), "a/notes.txt", "");
        write(dir.path(), ".hidden/x.md", "");
        write(dir.path(), ".draft.md", "");

        let found: Vec<_> = discover(dir.path())
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(found, [PathBuf::from("a/z.md"), PathBuf::from("b.md")]);
    }

    #[test]
    fn test_missing_root() {
        let err = Catalog::build(Path::new("/nonexistent/content"), &SiteConfig::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingRoot(_)));
    }

    #[test]
    fn test_sort_by_date_added() {
        let assets = [
            asset("u.md", "---\nid: undated\n---\n"),
            asset("o.md", "---\nid: old\nadded: 2019-05-01\n---\n"),
            asset("n.md", "---\nid: new\nadded: 2022-01-01\n---\n"),
            asset("t.md", "---\nid: tie\nadded: 2019-05-01\n---\n"),
            asset("v.md", "---\nid: undated2\n---\n"),
        ];
        let mut refs: Vec<&Asset> = assets.iter().collect();
        sort_by_date_added(&mut refs);

        let ids: Vec<_> = refs.iter().map(|a| a.id()).collect();
        assert_eq!(ids, ["new", "old", "tie", "undated", "undated2"]);
    }

    #[test]
    fn test_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::build(dir.path(), &SiteConfig::default()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.progress().ratio(), 0.0);
    }
}
