//! Catalog entry schema and validation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::platform::{Platform, PlatformKind};

/// Kind of media an archive holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Game,
    Comic,
    Novel,
    Music,
    Anime,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Unknown => write!(f, "Unknown"),
            ContentType::Game => write!(f, "Game"),
            ContentType::Comic => write!(f, "Comic"),
            ContentType::Novel => write!(f, "Novel"),
            ContentType::Music => write!(f, "Music"),
            ContentType::Anime => write!(f, "Anime"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(ContentType::Unknown),
            "game" => Ok(ContentType::Game),
            "comic" | "manga" => Ok(ContentType::Comic),
            "novel" => Ok(ContentType::Novel),
            "music" => Ok(ContentType::Music),
            "anime" => Ok(ContentType::Anime),
            _ => anyhow::bail!("Unknown content type: {}", s),
        }
    }
}

/// A free-form label attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,

    #[serde(default)]
    pub category: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Parse `category:name` or a bare `name`
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((category, name)) if !category.trim().is_empty() => {
                Tag::new(name.trim()).with_category(category.trim())
            }
            _ => Tag::new(raw.trim()),
        }
    }
}

/// Whether an entry's archive is currently materialized somewhere.
///
/// Derived from `deployed_path`; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    Undeployed,
    Deployed,
}

/// A single cataloged item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Catalog key; empty until the store assigns one
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub original_title: Option<String>,

    #[serde(default)]
    pub content_type: ContentType,

    #[serde(default)]
    pub platform: Platform,

    /// Storefront id for Steam/DLSite; mirrors `platform.external_id` for Other
    #[serde(default)]
    pub platform_id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub developer: Option<String>,

    #[serde(default)]
    pub publisher: Option<String>,

    /// ISO-8601 calendar date, kept as text
    #[serde(default)]
    pub release_date: Option<String>,

    /// Source archive; `None` for manually cataloged entries
    #[serde(default)]
    pub archive_path: Option<String>,

    #[serde(default)]
    pub archive_password: Option<String>,

    #[serde(default)]
    pub size_bytes: Option<u64>,

    /// Where the archive is materialized; non-empty means Deployed
    #[serde(default)]
    pub deployed_path: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub date_updated: DateTime<Utc>,
}

impl Metadata {
    /// Create an undeployed record with no id yet
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            original_title: None,
            content_type: ContentType::Unknown,
            platform: Platform::unknown(),
            platform_id: None,
            description: None,
            version: None,
            developer: None,
            publisher: None,
            release_date: None,
            archive_path: None,
            archive_password: None,
            size_bytes: None,
            deployed_path: None,
            tags: Vec::new(),
            date_created: now,
            date_updated: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_platform_id(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self
    }

    pub fn with_archive(mut self, archive_path: impl Into<String>) -> Self {
        self.archive_path = Some(archive_path.into());
        self
    }

    pub fn with_archive_password(mut self, password: impl Into<String>) -> Self {
        self.archive_password = Some(password.into());
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Generate a fresh opaque id
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn deployment_state(&self) -> DeploymentState {
        match self.deployed_path.as_deref() {
            Some(path) if !path.is_empty() => DeploymentState::Deployed,
            _ => DeploymentState::Undeployed,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.deployment_state() == DeploymentState::Deployed
    }

    /// Archive path if one is set and non-empty
    pub fn archive(&self) -> Option<&str> {
        self.archive_path.as_deref().filter(|p| !p.is_empty())
    }

    pub fn mark_updated(&mut self) {
        self.date_updated = Utc::now();
    }

    /// Keep the denormalized `platform_id` in step with `platform`.
    ///
    /// For `Other` the external id is authoritative; other kinds keep the
    /// caller's storefront id untouched.
    pub fn sync_platform_id(&mut self) {
        if self.platform.kind() == PlatformKind::Other {
            self.platform_id = self
                .platform
                .external_id()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
        }
    }

    /// Check record-level rules. No filesystem access.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::Empty { field: "id" });
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }
        if matches!(self.archive_path.as_deref(), Some("")) {
            return Err(ValidationError::Empty {
                field: "archive_path",
            });
        }
        if matches!(self.deployed_path.as_deref(), Some("")) {
            return Err(ValidationError::Empty {
                field: "deployed_path",
            });
        }
        if let Some(index) = self.tags.iter().position(|t| t.name.trim().is_empty()) {
            return Err(ValidationError::EmptyTagName { index });
        }
        Ok(())
    }
}

/// A record rule violation, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field '{field}' must not be empty")]
    Empty { field: &'static str },

    #[error("tag #{index} has an empty name")]
    EmptyTagName { index: usize },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Empty { field } => field,
            ValidationError::EmptyTagName { .. } => "tags",
        }
    }
}
