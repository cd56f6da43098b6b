//! Command-line interface for mediashelf.
//!
//! Provides commands for browsing the catalog, adding and packing
//! archives, deploying them to a directory and retracting them again.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::backup::BackupPolicy;
use crate::adapters::{LocalEngine, SqliteBackend};
use crate::commands::{ArchiveRequest, EntryRequest, LibraryCommands, PlatformInfo};
use crate::config;
use crate::domain::{ContentType, Metadata, PlatformKind, Tag};
use crate::library::{Catalog, Library};

/// mediashelf - catalog and deploy game and media archives
#[derive(Parser, Debug)]
#[command(name = "mediashelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List items in the library
    List {
        /// Filter by content type
        #[arg(short = 't', long = "type", value_enum)]
        content_type: Option<TypeArg>,

        /// Only show deployed items
        #[arg(short, long)]
        deployed: bool,

        /// Maximum number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Search the library
    Search {
        /// Search query (title, developer, publisher, tags)
        query: String,
    },

    /// Show details of a library item
    Show {
        /// Item ID (a unique prefix is enough)
        id: String,
    },

    /// Re-read the library from disk
    Reload,

    /// Catalog an existing archive
    Add {
        title: String,

        /// Archive file or directory
        #[arg(short, long)]
        archive: Option<String>,

        #[command(flatten)]
        entry: EntryArgs,
    },

    /// Pack a directory into a new archive and catalog it
    Create {
        /// Directory to pack
        source: PathBuf,

        title: String,

        #[command(flatten)]
        entry: EntryArgs,
    },

    /// Replace an item with the JSON record in a file
    Replace {
        /// JSON file holding the full record (must include its id)
        file: PathBuf,
    },

    /// Delete an item from the library (deployed files are left alone)
    Delete { id: String },

    /// Extract an item's archive into a directory
    Deploy {
        id: String,

        /// Target directory (created if missing, must be empty)
        path: String,
    },

    /// Remove an item's deployed files
    Undeploy { id: String },

    /// Export the library as JSON
    Export {
        /// Output file (defaults to <data>/library.json)
        path: Option<PathBuf>,
    },

    /// Import a JSON export into the library
    Import {
        /// Input file (defaults to <data>/library.json)
        path: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Options shared by `add` and `create`
#[derive(clap::Args, Debug, Clone)]
pub struct EntryArgs {
    #[arg(short = 't', long = "type", value_enum, default_value = "unknown")]
    pub content_type: TypeArg,

    #[arg(short, long, value_enum, default_value = "unknown")]
    pub platform: PlatformArg,

    /// Steam app id, DLsite product id, or a source name for `other`
    #[arg(long)]
    pub platform_id: Option<String>,

    /// Archive password
    #[arg(long)]
    pub password: Option<String>,

    /// Tags, comma-separated (`category:name` or `name`)
    #[arg(long)]
    pub tags: Option<String>,
}

impl EntryArgs {
    fn platform(&self) -> PlatformInfo {
        PlatformInfo::new(self.platform.into(), self.platform_id.clone())
    }

    fn tags(&self) -> Vec<Tag> {
        parse_tags(self.tags.as_deref())
    }
}

/// Content type for CLI (maps to ContentType)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Unknown,
    Game,
    Comic,
    Novel,
    Music,
    Anime,
}

impl From<TypeArg> for ContentType {
    fn from(t: TypeArg) -> Self {
        match t {
            TypeArg::Unknown => ContentType::Unknown,
            TypeArg::Game => ContentType::Game,
            TypeArg::Comic => ContentType::Comic,
            TypeArg::Novel => ContentType::Novel,
            TypeArg::Music => ContentType::Music,
            TypeArg::Anime => ContentType::Anime,
        }
    }
}

/// Platform for CLI (maps to PlatformKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlatformArg {
    Unknown,
    Steam,
    Dlsite,
    Other,
}

impl From<PlatformArg> for PlatformKind {
    fn from(p: PlatformArg) -> Self {
        match p {
            PlatformArg::Unknown => PlatformKind::Unknown,
            PlatformArg::Steam => PlatformKind::Steam,
            PlatformArg::Dlsite => PlatformKind::DLSite,
            PlatformArg::Other => PlatformKind::Other,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            // Inspecting configuration must not take the library lock
            Commands::Config => show_config(),
            command => run(command).await,
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let commands = open_library().await?;

    match command {
        Commands::List {
            content_type,
            deployed,
            limit,
        } => list_library(&commands, content_type, deployed, limit).await,
        Commands::Search { query } => search_library(&commands, &query).await,
        Commands::Show { id } => show_item(&commands, &id).await,
        Commands::Reload => {
            let catalog = commands.library_reload().await?;
            println!("Reloaded {} items", catalog.len());
            Ok(())
        }
        Commands::Add {
            title,
            archive,
            entry,
        } => {
            let added = commands
                .library_add_entry(EntryRequest {
                    title,
                    content_type: entry.content_type.into(),
                    platform: entry.platform(),
                    archive_path: archive,
                    archive_password: entry.password.clone(),
                    tags: entry.tags(),
                })
                .await?;
            println!("Added {} ({})", added.title, added.id);
            Ok(())
        }
        Commands::Create {
            source,
            title,
            entry,
        } => {
            eprintln!("Packing {} ...", source.display());
            let added = commands
                .library_create(ArchiveRequest {
                    source,
                    title,
                    content_type: entry.content_type.into(),
                    platform: entry.platform(),
                    password: entry.password.clone(),
                    tags: entry.tags(),
                })
                .await?;
            println!("Added {} ({})", added.title, added.id);
            if let Some(archive) = added.archive() {
                println!("  Archive: {}", archive);
            }
            Ok(())
        }
        Commands::Replace { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let record: Metadata = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse record in {}", file.display()))?;
            let replaced = commands.library_replace(record).await?;
            println!("Replaced {} ({})", replaced.title, replaced.id);
            Ok(())
        }
        Commands::Delete { id } => {
            let id = resolve_id(&commands.library_get().await, &id)?;
            if commands.library_del(&id).await? {
                println!("Deleted {}", id);
            } else {
                println!("Nothing to delete for {}", id);
            }
            Ok(())
        }
        Commands::Deploy { id, path } => {
            let id = resolve_id(&commands.library_get().await, &id)?;
            eprintln!("Deploying {} to {} ...", id, path);
            let deployed = commands.library_deploy(&id, &path).await?;
            println!("Deployed {} at {}", deployed.title, path);
            Ok(())
        }
        Commands::Undeploy { id } => {
            let id = resolve_id(&commands.library_get().await, &id)?;
            let undeployed = commands.library_deploy_off(&id).await?;
            println!("Undeployed {}", undeployed.title);
            Ok(())
        }
        Commands::Export { path } => {
            let path = match path {
                Some(path) => path,
                None => config::export_path()?,
            };
            let count = commands.library_export(&path).await?;
            println!("Exported {} items to {}", count, path.display());
            Ok(())
        }
        Commands::Import { path } => {
            let path = match path {
                Some(path) => path,
                None => config::export_path()?,
            };
            if commands.library_import(&path).await? {
                println!(
                    "Imported {}, library now holds {} items",
                    path.display(),
                    commands.library_get().await.len()
                );
            } else {
                println!("No export found at {}", path.display());
            }
            Ok(())
        }
        Commands::Config => show_config(),
    }
}

/// Open the configured library and wire it to the local engine
async fn open_library() -> Result<LibraryCommands> {
    let cfg = config::config()?;

    let backups = BackupPolicy::new(cfg.backup_dir(), cfg.backups);
    let db_path = cfg.database_path();
    let backend = SqliteBackend::open(&db_path, Some(&backups))
        .with_context(|| format!("Failed to open library database {}", db_path.display()))?;

    let library = Library::open(Arc::new(backend)).await?;
    let engine = LocalEngine::with_seven_zip(cfg.seven_zip.clone());

    Ok(
        LibraryCommands::new(Arc::new(library), Arc::new(engine), cfg.archive_dir())
            .with_pack_format(cfg.pack_format),
    )
}

fn parse_tags(raw: Option<&str>) -> Vec<Tag> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Tag::parse)
            .collect()
    })
    .unwrap_or_default()
}

/// Exact id, or the single id starting with `prefix`
fn resolve_id(catalog: &Catalog, prefix: &str) -> Result<String> {
    if catalog.contains(prefix) {
        return Ok(prefix.to_string());
    }

    let matches: Vec<&str> = catalog
        .iter()
        .map(|m| m.id.as_str())
        .filter(|id| id.starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => anyhow::bail!("Item not found: {}", prefix),
        _ => anyhow::bail!("Ambiguous id prefix {} ({} matches)", prefix, matches.len()),
    }
}

fn truncate(title: &str, width: usize) -> String {
    if title.chars().count() > width {
        let cut: String = title.chars().take(width - 3).collect();
        format!("{}...", cut)
    } else {
        title.to_string()
    }
}

fn print_table(items: &[&Metadata]) {
    println!("{:<38} {:<8} {:<10} {:<40}", "ID", "TYPE", "DEPLOYED", "TITLE");
    println!("{}", "-".repeat(98));

    for item in items {
        println!(
            "{:<38} {:<8} {:<10} {:<40}",
            item.id,
            item.content_type.to_string(),
            if item.is_deployed() { "yes" } else { "" },
            truncate(&item.title, 40)
        );
    }
}

async fn list_library(
    commands: &LibraryCommands,
    content_type: Option<TypeArg>,
    deployed: bool,
    limit: usize,
) -> Result<()> {
    let catalog = commands.library_get().await;

    if catalog.is_empty() {
        println!("Library is empty. Use 'mediashelf add' or 'mediashelf create' to add items.");
        return Ok(());
    }

    let mut items = catalog.list(None);
    if let Some(ct) = content_type {
        let ct: ContentType = ct.into();
        items.retain(|m| m.content_type == ct);
    }
    if deployed {
        items.retain(|m| m.is_deployed());
    }
    items.truncate(limit);

    print_table(&items);
    println!("\nTotal: {} items", catalog.len());

    Ok(())
}

async fn search_library(commands: &LibraryCommands, query: &str) -> Result<()> {
    let catalog = commands.library_get().await;
    let results = catalog.search(query);

    if results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!("Found {} result(s) for \"{}\":\n", results.len(), query);
    print_table(&results);

    Ok(())
}

async fn show_item(commands: &LibraryCommands, id: &str) -> Result<()> {
    let catalog = commands.library_get().await;
    let id = resolve_id(&catalog, id)?;
    let item = catalog
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;

    println!("  ID:        {}", item.id);
    println!("  Title:     {}", item.title);
    if let Some(original) = &item.original_title {
        println!("  Original:  {}", original);
    }
    println!("  Type:      {}", item.content_type);
    println!("  Platform:  {}", item.platform);
    if let Some(platform_id) = &item.platform_id {
        println!("  Store ID:  {}", platform_id);
    }
    if let Some(developer) = &item.developer {
        println!("  Developer: {}", developer);
    }
    if let Some(publisher) = &item.publisher {
        println!("  Publisher: {}", publisher);
    }
    if let Some(release) = &item.release_date {
        println!("  Released:  {}", release);
    }
    if let Some(version) = &item.version {
        println!("  Version:   {}", version);
    }
    println!("  Archive:   {}", item.archive().unwrap_or("(none)"));
    if let Some(size) = item.size_bytes {
        println!("  Size:      {} bytes", size);
    }
    println!(
        "  Deployed:  {}",
        item.deployed_path.as_deref().unwrap_or("(no)")
    );
    if !item.tags.is_empty() {
        let tags: Vec<String> = item
            .tags
            .iter()
            .map(|t| match &t.category {
                Some(category) => format!("{}:{}", category, t.name),
                None => t.name.clone(),
            })
            .collect();
        println!("  Tags:      {}", tags.join(", "));
    }
    println!("  Created:   {}", item.date_created);
    println!("  Updated:   {}", item.date_updated);
    if let Some(description) = &item.description {
        println!("\n{}", description);
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("mediashelf configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Data:     {}", cfg.data.display());
    println!("  Database: {}", cfg.database_path().display());
    println!("  Backups:  {}", cfg.backup_dir().display());
    println!("  Archives: {}", cfg.archive_dir().display());
    println!("  Export:   {}", cfg.export_path().display());
    println!();
    println!("Library:");
    println!("  Backups kept: {}", cfg.backups);
    println!();
    println!("Engine:");
    println!("  7-Zip binary: {}", cfg.seven_zip);
    println!("  Pack format:  {}", cfg.pack_format);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(Some("genre:rpg, cozy ,,"));
        assert_eq!(
            tags,
            vec![Tag::new("rpg").with_category("genre"), Tag::new("cozy")]
        );
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ホロウナイト・シルクソング", 8), "ホロウナイ...");
    }

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "mediashelf",
            "add",
            "Hollow Knight",
            "--archive",
            "/a.zip",
            "--type",
            "game",
            "--platform",
            "steam",
            "--platform-id",
            "367520",
        ])
        .unwrap();

        match cli.command {
            Commands::Add {
                title,
                archive,
                entry,
            } => {
                assert_eq!(title, "Hollow Knight");
                assert_eq!(archive.as_deref(), Some("/a.zip"));
                assert_eq!(PlatformKind::from(entry.platform), PlatformKind::Steam);
                assert_eq!(entry.platform_id.as_deref(), Some("367520"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
