//! Filesystem archive engine.
//!
//! Handles the archive shapes found in a typical collection:
//! - a plain directory (copied recursively)
//! - `.zip` (via the `zip` crate, optionally encrypted)
//! - `.7z` (via an external `7z` binary)
//! - any other single file (copied into the target directory)

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipArchive, ZipWriter};

use super::ArchiveEngine;

/// Archive engine working directly on local paths
#[derive(Debug, Clone)]
pub struct LocalEngine {
    /// Name or path of the 7-Zip executable
    seven_zip: String,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::with_seven_zip("7z")
    }

    /// Use a custom 7-Zip binary
    pub fn with_seven_zip(seven_zip: impl Into<String>) -> Self {
        Self {
            seven_zip: seven_zip.into(),
        }
    }

    /// Run 7-Zip and fail on a non-zero exit
    async fn run_seven_zip(&self, args: Vec<OsString>, cwd: Option<&Path>) -> io::Result<()> {
        let mut command = Command::new(&self.seven_zip);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command.output().await.map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to spawn '{}': {}", self.seven_zip, e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "'{}' failed with exit code {}: {}",
                self.seven_zip,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn extract_7z(&self, archive: &Path, password: Option<&str>, target: &Path) -> io::Result<()> {
        let mut args: Vec<OsString> = vec!["x".into(), archive.into()];
        let mut out = OsString::from("-o");
        out.push(target);
        args.push(out);
        args.push("-aoa".into());
        // Always pass -p so 7z never prompts on stdin
        args.push(format!("-p{}", password.unwrap_or_default()).into());
        self.run_seven_zip(args, None).await
    }

    async fn pack_7z(&self, source: &Path, archive: &Path, password: Option<&str>) -> io::Result<()> {
        let mut args: Vec<OsString> = vec!["a".into(), "-mx=9".into()];
        if let Some(pwd) = password {
            args.push(format!("-p{}", pwd).into());
            args.push("-mhe=on".into());
        }
        args.push(absolute(archive)?.into());
        args.push("*".into());
        self.run_seven_zip(args, Some(source)).await
    }
}

#[async_trait]
impl ArchiveEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn extract(&self, archive: &Path, password: Option<&str>, target: &Path) -> io::Result<()> {
        if !archive.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Archive {} does not exist", archive.display()),
            ));
        }
        prepare_target(target)?;

        let result = match ArchiveShape::of(archive) {
            ArchiveShape::Directory => {
                info!("Copying {} to {}", archive.display(), target.display());
                blocking(archive, target, |src, dst| copy_dir_all(&src, &dst)).await
            }
            ArchiveShape::Zip => {
                info!("Decompressing ZIP {} to {}", archive.display(), target.display());
                let password = password.map(str::to_string);
                blocking(archive, target, move |src, dst| {
                    extract_zip(&src, &dst, password.as_deref())
                })
                .await
            }
            ArchiveShape::SevenZip => {
                info!("Decompressing 7z {} to {}", archive.display(), target.display());
                self.extract_7z(archive, password, target).await
            }
            ArchiveShape::File => {
                info!("Copying {} into {}", archive.display(), target.display());
                blocking(archive, target, |src, dst| {
                    let name = src.file_name().ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "archive has no file name")
                    })?;
                    fs::copy(&src, dst.join(name)).map(|_| ())
                })
                .await
            }
        };

        if let Err(e) = &result {
            warn!("Extraction into {} failed, clearing it: {}", target.display(), e);
            if let Err(clean) = clear_dir(target) {
                warn!("Failed to clear {}: {}", target.display(), clean);
            }
        }

        result
    }

    async fn remove(&self, target: &Path) -> io::Result<()> {
        if !target.exists() {
            warn!("Deployed path {} no longer exists, nothing to remove", target.display());
            return Ok(());
        }

        let path = target.to_path_buf();
        tokio::task::spawn_blocking(move || {
            if path.is_dir() {
                info!("Clearing directory {}", path.display());
                clear_dir(&path)
            } else {
                info!("Deleting file {}", path.display());
                fs::remove_file(&path)
            }
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn pack(&self, source: &Path, archive: &Path, password: Option<&str>) -> io::Result<()> {
        if !source.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Source {} is not a directory", source.display()),
            ));
        }
        if archive.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("Archive {} already exists", archive.display()),
            ));
        }
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Creating archive {} from {}", archive.display(), source.display());
        let result = match ArchiveShape::of(archive) {
            ArchiveShape::SevenZip => self.pack_7z(source, archive, password).await,
            _ => {
                let password = password.map(str::to_string);
                blocking(source, archive, move |src, dst| {
                    pack_zip(&src, &dst, password.as_deref())
                })
                .await
            }
        };

        if let Err(e) = &result {
            warn!("Packing {} failed, removing partial archive: {}", archive.display(), e);
            if archive.exists() {
                if let Err(clean) = fs::remove_file(archive) {
                    warn!("Failed to remove {}: {}", archive.display(), clean);
                }
            }
        }

        result
    }
}

/// How an archive path will be materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveShape {
    Directory,
    Zip,
    SevenZip,
    File,
}

impl ArchiveShape {
    fn of(path: &Path) -> Self {
        if path.is_dir() {
            return ArchiveShape::Directory;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "zip" => ArchiveShape::Zip,
            "7z" => ArchiveShape::SevenZip,
            _ => ArchiveShape::File,
        }
    }
}

/// Run filesystem work off the async runtime
async fn blocking<F>(src: &Path, dst: &Path, work: F) -> io::Result<()>
where
    F: FnOnce(PathBuf, PathBuf) -> io::Result<()> + Send + 'static,
{
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || work(src, dst))
        .await
        .map_err(io::Error::other)?
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Target must be an empty directory; a missing one is created
fn prepare_target(target: &Path) -> io::Result<()> {
    if target.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Deploy target {} is an existing file", target.display()),
        ));
    }
    if !target.exists() {
        warn!("The selected path {} does not exist, creating it", target.display());
        fs::create_dir_all(target)?;
    }
    if fs::read_dir(target)?.next().is_some() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Deploy target {} is not empty", target.display()),
        ));
    }
    Ok(())
}

/// Remove everything inside `dir`, keeping `dir` itself
fn clear_dir(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let out = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

fn extract_zip(zip: &Path, dst: &Path, password: Option<&str>) -> io::Result<()> {
    let mut archive = ZipArchive::new(File::open(zip)?)?;

    for index in 0..archive.len() {
        let mut file = match password {
            Some(pwd) => archive.by_index_decrypt(index, pwd.as_bytes())?,
            None => archive.by_index(index)?,
        };

        let Some(relative) = file.enclosed_name() else {
            warn!("Skipping unsafe entry '{}' in {}", file.name(), zip.display());
            continue;
        };
        let out = dst.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out_file = File::create(&out)?;
            io::copy(&mut file, &mut out_file)?;
        }
    }

    Ok(())
}

fn pack_zip(src: &Path, zip: &Path, password: Option<&str>) -> io::Result<()> {
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let options = match password {
        Some(pwd) => base.with_aes_encryption(AesMode::Aes256, pwd),
        None => base,
    };

    let mut writer = ZipWriter::new(File::create(zip)?);
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let name = relative.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options.clone())?;
        } else {
            writer.start_file(name, options.clone())?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut writer)?;
        }
    }
    writer.finish()?;

    Ok(())
}

/// Size of a file, or the summed size of every file under a directory
pub fn measure(path: &Path) -> io::Result<u64> {
    let meta = fs::metadata(path)?;
    if meta.is_file() {
        return Ok(meta.len());
    }

    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("data/levels")).unwrap();
        fs::write(root.join("game.exe"), b"MZ").unwrap();
        fs::write(root.join("data/levels/1.lvl"), vec![b'A'; 1024]).unwrap();
    }

    #[tokio::test]
    async fn test_directory_copy_and_remove() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        sample_tree(&source);
        let target = temp.path().join("deployed");

        let engine = LocalEngine::new();
        engine.extract(&source, None, &target).await.unwrap();
        assert!(target.join("game.exe").is_file());
        assert!(target.join("data/levels/1.lvl").is_file());

        engine.remove(&target).await.unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_zip_pack_then_extract() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        sample_tree(&source);
        let archive = temp.path().join("out/game.zip");
        let target = temp.path().join("deployed");

        let engine = LocalEngine::new();
        engine.pack(&source, &archive, None).await.unwrap();
        assert!(archive.is_file());

        engine.extract(&archive, None, &target).await.unwrap();
        assert_eq!(fs::read(target.join("game.exe")).unwrap(), b"MZ");
        assert_eq!(measure(&target).unwrap(), 1026);
    }

    #[tokio::test]
    async fn test_encrypted_zip_needs_password() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        sample_tree(&source);
        let archive = temp.path().join("locked.zip");

        let engine = LocalEngine::new();
        engine.pack(&source, &archive, Some("secret")).await.unwrap();

        let target = temp.path().join("ok");
        engine
            .extract(&archive, Some("secret"), &target)
            .await
            .unwrap();
        assert!(target.join("data/levels/1.lvl").is_file());

        let wrong = temp.path().join("wrong");
        assert!(engine.extract(&archive, Some("nope"), &wrong).await.is_err());
        assert_eq!(fs::read_dir(&wrong).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_plain_file_is_copied_into_target() {
        let temp = TempDir::new().unwrap();
        let rom = temp.path().join("game.iso");
        fs::write(&rom, b"iso").unwrap();
        let target = temp.path().join("deployed");

        LocalEngine::new().extract(&rom, None, &target).await.unwrap();
        assert!(target.join("game.iso").is_file());
    }

    #[tokio::test]
    async fn test_target_preconditions() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        sample_tree(&source);
        let engine = LocalEngine::new();

        let busy = temp.path().join("busy");
        fs::create_dir_all(&busy).unwrap();
        fs::write(busy.join("keep.txt"), b"x").unwrap();
        let err = engine.extract(&source, None, &busy).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(busy.join("keep.txt").exists());

        let file_target = temp.path().join("file.txt");
        fs::write(&file_target, b"x").unwrap();
        assert!(engine.extract(&source, None, &file_target).await.is_err());

        let missing = temp.path().join("missing.zip");
        let err = engine
            .extract(&missing, None, &temp.path().join("t"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_remove_missing_target_is_noop() {
        let temp = TempDir::new().unwrap();
        let engine = LocalEngine::new();
        engine.remove(&temp.path().join("gone")).await.unwrap();
    }

    #[tokio::test]
    async fn test_pack_requires_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, b"x").unwrap();

        let err = LocalEngine::new()
            .pack(&file, &temp.path().join("a.zip"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_pack_leaves_no_archive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        sample_tree(&source);
        std::os::unix::fs::symlink("missing", source.join("dangling")).unwrap();
        let archive = temp.path().join("out/game.zip");

        let engine = LocalEngine::new();
        let err = engine.pack(&source, &archive, None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!archive.exists());

        fs::remove_file(source.join("dangling")).unwrap();
        engine.pack(&source, &archive, None).await.unwrap();
        assert!(archive.is_file());
    }

    #[test]
    fn test_archive_shape() {
        assert_eq!(ArchiveShape::of(Path::new("/x/a.ZIP")), ArchiveShape::Zip);
        assert_eq!(ArchiveShape::of(Path::new("/x/a.7z")), ArchiveShape::SevenZip);
        assert_eq!(ArchiveShape::of(Path::new("/x/a.iso")), ArchiveShape::File);
    }
}
