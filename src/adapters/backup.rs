//! Rotating copies of the library database, taken when it is opened.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use tracing::{info, warn};

/// How many copies to keep and where
#[derive(Debug, Clone)]
pub struct BackupPolicy {
    pub dir: PathBuf,
    pub keep: usize,
}

impl BackupPolicy {
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            dir: dir.into(),
            keep,
        }
    }

    /// Copy `source` into the backup directory, pruning the oldest copies
    /// so that at most `keep` remain. Returns the new backup path, or
    /// `None` if there was nothing to back up.
    pub fn backup(&self, source: &Path) -> io::Result<Option<PathBuf>> {
        if self.keep == 0 || !source.is_file() {
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;

        let mut existing: Vec<(SystemTime, PathBuf)> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.path())
            })
            .collect();
        existing.sort();

        while existing.len() >= self.keep {
            let (_, oldest) = existing.remove(0);
            match fs::remove_file(&oldest) {
                Ok(()) => info!("Removed old backup: {}", oldest.display()),
                Err(e) => warn!("Failed to remove old backup {}: {}", oldest.display(), e),
            }
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "library".to_string());
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "db".to_string());
        let target = self.dir.join(format!(
            "{}-{}.{}",
            stem,
            Utc::now().format("%Y%m%d-%H%M%S%.3f"),
            ext
        ));

        fs::copy(source, &target)?;
        info!("Library copied to backup: {}", target.display());

        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let temp = TempDir::new().unwrap();
        let policy = BackupPolicy::new(temp.path().join("backup"), 4);
        let result = policy.backup(&temp.path().join("library.db")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_zero_keep_disables_backups() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("library.db");
        fs::write(&source, b"data").unwrap();

        let policy = BackupPolicy::new(temp.path().join("backup"), 0);
        assert!(policy.backup(&source).unwrap().is_none());
        assert!(!temp.path().join("backup").exists());
    }

    #[test]
    fn test_rotation_drops_oldest() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("library.db");
        fs::write(&source, b"data").unwrap();

        let backup_dir = temp.path().join("backup");
        fs::create_dir_all(&backup_dir).unwrap();

        // Three pre-existing backups, oldest first
        for (i, name) in ["a.db", "b.db", "c.db"].iter().enumerate() {
            let path = backup_dir.join(name);
            fs::write(&path, b"old").unwrap();
            let mtime = FileTime::from_unix_time(1_000_000 + i as i64 * 100, 0);
            filetime::set_file_mtime(&path, mtime).unwrap();
        }

        let policy = BackupPolicy::new(&backup_dir, 3);
        let created = policy.backup(&source).unwrap().unwrap();

        assert!(created.exists());
        assert_eq!(count(&backup_dir), 3);
        assert!(!backup_dir.join("a.db").exists());
        assert!(backup_dir.join("b.db").exists());
        assert!(backup_dir.join("c.db").exists());
        assert!(created
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("library-"));
    }
}
