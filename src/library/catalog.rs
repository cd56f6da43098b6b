//! Read-only catalog snapshots and the JSON export format.
//!
//! A [`Catalog`] is what callers get back from the store: a cloned view of
//! every record at one point in time, searchable and filterable without
//! touching the store again.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::domain::{ContentType, Metadata};

/// Current export format version
pub const EXPORT_VERSION: u32 = 1;

/// Point-in-time view of the library, keyed by record id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: HashMap<String, Metadata>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(entries: HashMap<String, Metadata>) -> Self {
        Self { entries }
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Option<&Metadata> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate records in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Metadata> {
        self.entries.values()
    }

    /// Records sorted by last update (most recent first)
    pub fn list(&self, limit: Option<usize>) -> Vec<&Metadata> {
        let mut items: Vec<_> = self.entries.values().collect();
        items.sort_by(|a, b| {
            b.date_updated
                .cmp(&a.date_updated)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some(limit) = limit {
            items.truncate(limit);
        }

        items
    }

    /// Case-insensitive substring match over titles, credits and tag names
    pub fn search(&self, query: &str) -> Vec<&Metadata> {
        let query = query.to_lowercase();
        let hit = |field: Option<&str>| {
            field
                .map(|f| f.to_lowercase().contains(&query))
                .unwrap_or(false)
        };

        let mut items: Vec<_> = self
            .entries
            .values()
            .filter(|m| {
                hit(Some(&m.title))
                    || hit(m.original_title.as_deref())
                    || hit(m.developer.as_deref())
                    || hit(m.publisher.as_deref())
                    || m.tags.iter().any(|t| hit(Some(&t.name)))
            })
            .collect();
        items.sort_by(|a, b| a.title.cmp(&b.title));
        items
    }

    pub fn filter_by_type(&self, content_type: ContentType) -> Vec<&Metadata> {
        self.entries
            .values()
            .filter(|m| m.content_type == content_type)
            .collect()
    }

    /// Records currently materialized somewhere
    pub fn deployed(&self) -> Vec<&Metadata> {
        self.entries.values().filter(|m| m.is_deployed()).collect()
    }

    pub fn into_records(self) -> Vec<Metadata> {
        self.entries.into_values().collect()
    }
}

/// On-disk export of a whole library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub entries: Vec<Metadata>,
}

fn default_version() -> u32 {
    EXPORT_VERSION
}

impl CatalogFile {
    /// Export a snapshot; entries are ordered by id for stable diffs
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut entries: Vec<Metadata> = catalog.iter().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            version: EXPORT_VERSION,
            entries,
        }
    }

    pub async fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to parse library export {}: {}", path.display(), e),
            )
        })
    }

    pub async fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tag;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn catalog(records: Vec<Metadata>) -> Catalog {
        Catalog::from_map(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    #[test]
    fn test_catalog_search() {
        let mut rust = Metadata::new("Rusty Lake")
            .with_id("a")
            .with_tag(Tag::new("puzzle"));
        rust.developer = Some("Rusty Lake".to_string());
        let mut other = Metadata::new("Hollow Knight").with_id("b");
        other.original_title = Some("ホロウナイト".to_string());

        let catalog = catalog(vec![rust, other]);

        // Title
        assert_eq!(catalog.search("lake").len(), 1);
        // Tag
        assert_eq!(catalog.search("PUZZLE").len(), 1);
        // Original title
        assert_eq!(catalog.search("ホロウ").len(), 1);
        // No match
        assert!(catalog.search("celeste").is_empty());
    }

    #[test]
    fn test_catalog_filter_and_deployed() {
        let mut deployed = Metadata::new("A")
            .with_id("a")
            .with_content_type(ContentType::Game);
        deployed.deployed_path = Some("/games/a".to_string());

        let catalog = catalog(vec![
            deployed,
            Metadata::new("B")
                .with_id("b")
                .with_content_type(ContentType::Game),
            Metadata::new("C")
                .with_id("c")
                .with_content_type(ContentType::Comic),
        ]);

        assert_eq!(catalog.filter_by_type(ContentType::Game).len(), 2);
        assert_eq!(catalog.filter_by_type(ContentType::Comic).len(), 1);
        assert_eq!(catalog.deployed().len(), 1);
        assert_eq!(catalog.deployed()[0].id, "a");
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let now = Utc::now();
        let mut old = Metadata::new("Old").with_id("old");
        old.date_updated = now - Duration::days(2);
        let mut new = Metadata::new("New").with_id("new");
        new.date_updated = now;

        let catalog = catalog(vec![old, new]);
        let listed = catalog.list(None);
        assert_eq!(listed[0].id, "new");
        assert_eq!(listed[1].id, "old");
        assert_eq!(catalog.list(Some(1)).len(), 1);
    }

    #[tokio::test]
    async fn test_export_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/export.json");
        let catalog = catalog(vec![
            Metadata::new("B").with_id("b"),
            Metadata::new("A").with_id("a"),
        ]);

        CatalogFile::from_catalog(&catalog).save(&path).await.unwrap();
        let loaded = CatalogFile::load(&path).await.unwrap();

        assert_eq!(loaded.version, EXPORT_VERSION);
        let ids: Vec<_> = loaded.entries.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_export_file_tolerates_missing_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("old.json");
        std::fs::write(&path, r#"{"entries":[{"id":"x","title":"X"}]}"#).unwrap();

        let loaded = CatalogFile::load(&path).await.unwrap();
        assert_eq!(loaded.entries[0].title, "X");
        assert!(!loaded.entries[0].is_deployed());
    }
}
