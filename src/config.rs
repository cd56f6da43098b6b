//! Configuration for mediashelf paths and engine settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MEDIASHELF_HOME, MEDIASHELF_DATA)
//! 2. Config file (.mediashelf/config.yaml)
//! 3. Defaults (~/.mediashelf, data under <home>/data)
//!
//! Config file discovery:
//! - Searches current directory and parents for .mediashelf/config.yaml
//! - `home` is relative to the .mediashelf/ directory, `data` to the
//!   project root (the directory containing .mediashelf/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_BACKUPS: usize = 4;
const DEFAULT_SEVEN_ZIP: &str = "7z";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub library: Option<LibraryConfig>,
    #[serde(default)]
    pub engine: Option<EngineConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .mediashelf/)
    pub home: Option<String>,
    /// Data directory (relative to the project root)
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Number of database backups to keep; 0 disables them
    pub backups: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub seven_zip: Option<String>,
    pub pack_format: Option<PackFormat>,
}

/// Archive format used when packing a directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "7z")]
    SevenZip,
}

impl PackFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PackFormat::Zip => "zip",
            PackFormat::SevenZip => "7z",
        }
    }
}

impl std::fmt::Display for PackFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Database, backups and packed archives
    pub data: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub backups: usize,
    pub seven_zip: String,
    pub pack_format: PackFormat,
}

impl ResolvedConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data.join("library.db")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data.join("backup")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data.join("archive")
    }

    /// Default location for `export` when no path is given
    pub fn export_path(&self) -> PathBuf {
        self.data.join("library.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".mediashelf").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Combine a parsed file (if any) with env overrides
fn resolve(
    default_home: PathBuf,
    config_path: Option<&Path>,
    file: Option<ConfigFile>,
    env_home: Option<String>,
    env_data: Option<String>,
) -> ResolvedConfig {
    let settings_dir = config_path
        .and_then(|p| p.parent()) // .mediashelf/
        .unwrap_or(Path::new("."));
    let project_root = settings_dir.parent().unwrap_or(Path::new("."));

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = match (env_home, paths.home.as_deref()) {
        (Some(env), _) => PathBuf::from(env),
        (None, Some(home)) => resolve_path(settings_dir, home),
        (None, None) => default_home,
    };

    let data = match (env_data, paths.data.as_deref()) {
        (Some(env), _) => PathBuf::from(env),
        (None, Some(data)) => resolve_path(project_root, data),
        (None, None) => home.join("data"),
    };

    let library = file.as_ref().and_then(|f| f.library.clone());
    let engine = file.as_ref().and_then(|f| f.engine.clone());

    ResolvedConfig {
        home,
        data,
        config_file: config_path.map(Path::to_path_buf),
        backups: library
            .and_then(|l| l.backups)
            .unwrap_or(DEFAULT_BACKUPS),
        seven_zip: engine
            .as_ref()
            .and_then(|e| e.seven_zip.clone())
            .unwrap_or_else(|| DEFAULT_SEVEN_ZIP.to_string()),
        pack_format: engine.and_then(|e| e.pack_format).unwrap_or_default(),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".mediashelf");

    let config_file = find_config_file();
    let parsed = match config_file.as_deref() {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(
        default_home,
        config_file.as_deref(),
        parsed,
        std::env::var("MEDIASHELF_HOME").ok(),
        std::env::var("MEDIASHELF_DATA").ok(),
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Re-resolve configuration, bypassing the cache
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database_path())
}

pub fn backup_dir() -> Result<PathBuf> {
    Ok(config()?.backup_dir())
}

pub fn archive_dir() -> Result<PathBuf> {
    Ok(config()?.archive_dir())
}

pub fn export_path() -> Result<PathBuf> {
    Ok(config()?.export_path())
}
