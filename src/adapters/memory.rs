//! In-memory backend for tests and throwaway sessions.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Backend;
use crate::domain::Metadata;

/// Backend holding records in a process-local map
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, Metadata>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given records already stored
    pub fn with_records(records: impl IntoIterator<Item = Metadata>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }

    /// Overwrite a record behind the catalog's back
    pub fn put(&self, record: Metadata) {
        self.lock().insert(record.id.clone(), record);
    }

    /// Copy of a stored record
    pub fn stored(&self, id: &str) -> Option<Metadata> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Metadata>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_all(&self) -> io::Result<Vec<Metadata>> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn save(&self, record: &Metadata) -> io::Result<()> {
        self.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> io::Result<bool> {
        Ok(self.lock().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let backend = MemoryBackend::new();
        backend
            .save(&Metadata::new("A").with_id("a"))
            .await
            .unwrap();
        backend
            .save(&Metadata::new("B").with_id("b"))
            .await
            .unwrap();

        assert_eq!(backend.load_all().await.unwrap().len(), 2);
        assert!(backend.delete("a").await.unwrap());
        assert!(!backend.delete("a").await.unwrap());
        assert_eq!(backend.len(), 1);
    }
}
