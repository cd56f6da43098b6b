//! Storefront identity of a cataloged item.
//!
//! A [`Platform`] can only be produced through [`Platform::normalize`], so the
//! rule "only `Other` carries an external id" holds for every value in the
//! catalog, including values decoded from disk.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

/// Known storefronts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    /// Steam (identified by its app id in `platform_id`)
    Steam,

    /// DLsite (identified by its product id in `platform_id`)
    DLSite,

    /// Any other source, named by the external id
    Other,

    /// Unknown or unrecognized source
    #[default]
    #[serde(other)]
    Unknown,
}

impl PlatformKind {
    /// Parse a kind leniently; anything unrecognized becomes `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "steam" => PlatformKind::Steam,
            "dlsite" | "dl" => PlatformKind::DLSite,
            "other" => PlatformKind::Other,
            _ => PlatformKind::Unknown,
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformKind::Steam => write!(f, "Steam"),
            PlatformKind::DLSite => write!(f, "DLSite"),
            PlatformKind::Other => write!(f, "Other"),
            PlatformKind::Unknown => write!(f, "Unknown"),
        }
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Normalized platform identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawPlatform")]
pub struct Platform {
    kind: PlatformKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    external_id: Option<String>,
}

impl Platform {
    /// Build a canonical platform from a kind and whatever id the caller had.
    ///
    /// Total: `Steam`, `DLSite` and `Unknown` drop the id, `Other` always
    /// carries one (empty when none was supplied).
    pub fn normalize(kind: PlatformKind, raw_external_id: Option<String>) -> Self {
        match kind {
            PlatformKind::Other => Self {
                kind,
                external_id: Some(raw_external_id.unwrap_or_default()),
            },
            PlatformKind::Steam | PlatformKind::DLSite | PlatformKind::Unknown => Self {
                kind,
                external_id: None,
            },
        }
    }

    /// Normalize from an untyped kind string
    pub fn normalize_str(kind: &str, raw_external_id: Option<String>) -> Self {
        Self::normalize(PlatformKind::parse(kind), raw_external_id)
    }

    pub fn steam() -> Self {
        Self::normalize(PlatformKind::Steam, None)
    }

    pub fn dlsite() -> Self {
        Self::normalize(PlatformKind::DLSite, None)
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self::normalize(PlatformKind::Other, Some(name.into()))
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    /// External id; `Some` only for `Other`
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.external_id.as_deref()) {
            (PlatformKind::Other, Some(name)) if !name.is_empty() => write!(f, "{}", name),
            (kind, _) => write!(f, "{}", kind),
        }
    }
}

/// Wire shape accepted on decode. Also understands the older
/// `{"platform": "...", "id": "..."}` layout.
#[derive(Deserialize)]
struct RawPlatform {
    #[serde(default, alias = "platform")]
    kind: PlatformKind,

    #[serde(default, alias = "id")]
    external_id: Option<String>,
}

impl From<RawPlatform> for Platform {
    fn from(raw: RawPlatform) -> Self {
        Platform::normalize(raw.kind, raw.external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_platforms_drop_external_id() {
        let steam = Platform::normalize(PlatformKind::Steam, Some("570".to_string()));
        assert_eq!(steam.kind(), PlatformKind::Steam);
        assert_eq!(steam.external_id(), None);

        let dl = Platform::normalize(PlatformKind::DLSite, Some("RJ01".to_string()));
        assert_eq!(dl.external_id(), None);
    }

    #[test]
    fn test_other_always_has_external_id() {
        let named = Platform::normalize(PlatformKind::Other, Some("itch.io".to_string()));
        assert_eq!(named.external_id(), Some("itch.io"));

        let blank = Platform::normalize(PlatformKind::Other, None);
        assert_eq!(blank.external_id(), Some(""));
    }

    #[test]
    fn test_unrecognized_kind_degrades_to_unknown() {
        assert_eq!(PlatformKind::parse("GOG"), PlatformKind::Unknown);
        assert_eq!(PlatformKind::parse("  STEAM "), PlatformKind::Steam);
        assert_eq!(PlatformKind::parse("dl"), PlatformKind::DLSite);
        assert_eq!("whatever".parse::<PlatformKind>(), Ok(PlatformKind::Unknown));

        let p = Platform::normalize_str("gog", Some("x".to_string()));
        assert_eq!(p, Platform::unknown());
    }

    #[test]
    fn test_display() {
        assert_eq!(Platform::steam().to_string(), "Steam");
        assert_eq!(Platform::other("itch.io").to_string(), "itch.io");
        assert_eq!(Platform::other("").to_string(), "Other");
    }

    #[test]
    fn test_decode_normalizes() {
        let p: Platform =
            serde_json::from_str(r#"{"kind":"Steam","external_id":"570"}"#).unwrap();
        assert_eq!(p, Platform::steam());

        let p: Platform = serde_json::from_str(r#"{"kind":"Other"}"#).unwrap();
        assert_eq!(p.external_id(), Some(""));

        let p: Platform = serde_json::from_str(r#"{"kind":"Epic","external_id":"x"}"#).unwrap();
        assert_eq!(p, Platform::unknown());

        let legacy: Platform = serde_json::from_str(r#"{"platform":"Other","id":"Booth"}"#).unwrap();
        assert_eq!(legacy, Platform::other("Booth"));
    }
}
