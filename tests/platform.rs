//! Platform Identity Integration Tests
//!
//! Normalization rules as seen through the public API and on-disk JSON.

use mediashelf::{Metadata, Platform, PlatformKind};

const KINDS: [PlatformKind; 4] = [
    PlatformKind::Steam,
    PlatformKind::DLSite,
    PlatformKind::Other,
    PlatformKind::Unknown,
];

#[test]
fn test_normalization_is_idempotent() {
    let raws = [None, Some(String::new()), Some("Booth".to_string())];

    for kind in KINDS {
        for raw in &raws {
            let once = Platform::normalize(kind, raw.clone());
            let twice = Platform::normalize(once.kind(), once.external_id().map(str::to_string));
            assert_eq!(once, twice, "kind {:?} raw {:?}", kind, raw);
        }
    }
}

#[test]
fn test_only_other_carries_external_id() {
    for kind in KINDS {
        let platform = Platform::normalize(kind, Some("x".to_string()));
        assert_eq!(
            platform.external_id().is_some(),
            kind == PlatformKind::Other,
            "{:?}",
            kind
        );
    }

    assert_eq!(
        Platform::normalize(PlatformKind::Other, None).external_id(),
        Some("")
    );
}

#[test]
fn test_unrecognized_kind_decodes_as_unknown() {
    let platform: Platform =
        serde_json::from_str(r#"{"kind": "Itch", "external_id": "abc"}"#).unwrap();
    assert_eq!(platform.kind(), PlatformKind::Unknown);
    assert_eq!(platform.external_id(), None);

    assert_eq!(PlatformKind::parse("STEAM"), PlatformKind::Steam);
    assert_eq!(PlatformKind::parse("dl"), PlatformKind::DLSite);
    assert_eq!(PlatformKind::parse("gog"), PlatformKind::Unknown);
}

#[test]
fn test_decoded_record_cannot_break_invariant() {
    let record: Metadata = serde_json::from_str(
        r#"{"id": "a", "title": "A", "platform": {"kind": "DLSite", "external_id": "RJ01"}}"#,
    )
    .unwrap();
    assert_eq!(record.platform, Platform::dlsite());

    let encoded = serde_json::to_string(&Platform::other("Booth")).unwrap();
    let decoded: Platform = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, Platform::other("Booth"));
}
