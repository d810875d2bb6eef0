//! Session-gated content delegation tests

mod common;

use chrono::Duration;
use common::{Harness, minter, t0};
use tessera_core::{AccessError, AccessPolicy, DeviceBinding};

/// Split a minted URL into (bucket, key, expires, sig)
fn parse_pointer(url: &str) -> (String, String, i64, String) {
    let rest = url
        .strip_prefix(common::ASSET_BASE)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap();
    let (path, query) = rest.split_once('?').unwrap();
    let (bucket, key) = path.split_once('/').unwrap();

    let mut expires = 0;
    let mut sig = String::new();
    for pair in query.split('&') {
        match pair.split_once('=').unwrap() {
            ("expires", v) => expires = v.parse().unwrap(),
            ("sig", v) => sig = v.to_string(),
            _ => {}
        }
    }
    (bucket.to_string(), key.to_string(), expires, sig)
}

// ============================================================================
// Delegated Pointers
// ============================================================================

#[tokio::test]
async fn test_fetch_mints_verifiable_pointer() {
    let h = Harness::new();
    let issued = h.issue(24, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    let content = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap();
    assert_eq!(content.title, "Intro lecture");
    assert_eq!(content.session_expires_at, t0() + Duration::hours(24));

    let asset = content.asset.unwrap();
    assert_eq!(asset.content_type, "video/mp4");
    // Delegation window (1h) is shorter than the session
    assert_eq!(asset.expires_at, t0() + Duration::hours(1));

    let (bucket, key, expires, sig) = parse_pointer(&asset.url);
    assert_eq!(bucket, "media");
    assert_eq!(key, "lectures/intro.mp4");
    assert!(minter().verify(&bucket, &key, expires, &sig, t0()));
    assert!(!minter().verify(&bucket, &key, expires, &sig, t0() + Duration::hours(1)));
}

#[tokio::test]
async fn test_pointer_never_outlives_session() {
    let h = Harness::new();
    let issued = h.issue(1, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    h.clock.advance(Duration::minutes(30));
    let content = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap();

    assert_eq!(content.asset.unwrap().expires_at, redemption.expires_at);
}

#[tokio::test]
async fn test_fresh_pointer_on_every_fetch() {
    let h = Harness::new();
    let issued = h.issue(24, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    let first = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(10));
    let second = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap();

    let first = first.asset.unwrap();
    let second = second.asset.unwrap();
    assert_ne!(first.url, second.url);
    assert_eq!(second.expires_at - first.expires_at, Duration::minutes(10));
}

#[tokio::test]
async fn test_info_link_has_no_asset() {
    let h = Harness::new();
    let issued = h.issue_for(common::faq(), 24, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    let content = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap();
    assert!(content.asset.is_none());
    assert_eq!(content.link_url.as_deref(), Some("https://example.test/faq"));
}

#[tokio::test]
async fn test_mint_failure_keeps_session_valid() {
    let h = Harness::new();
    let issued = h.issue_for(common::broken_asset(), 24, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    let err = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::DelegationFailed(_)));
    assert!(err.is_retryable());

    // Once the content system fixes the asset, the same session works
    h.catalog.insert(
        common::broken_asset(),
        tessera_core::ResourceMetadata {
            title: "Fixed".into(),
            description: None,
            link_url: None,
            asset: Some(tessera_core::AssetLocator {
                bucket: "media".into(),
                key: "fixed.bin".into(),
                content_type: "application/octet-stream".into(),
            }),
        },
    );
    assert!(
        h.service
            .fetch_content(&redemption.session_token, None)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_removed_resource_is_unavailable() {
    let h = Harness::new();
    let issued = h.issue(24, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    h.catalog.remove(&common::video());

    let err = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ResourceUnavailable(_)));
}

#[tokio::test]
async fn test_oversized_delegation_window_is_capped_by_session() {
    let h = Harness::with_policy(AccessPolicy {
        delegation_window_secs: u64::MAX / 2,
        ..AccessPolicy::default()
    });
    let issued = h.issue(24, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    let content = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap();
    assert_eq!(content.asset.unwrap().expires_at, t0() + Duration::hours(24));
}

// ============================================================================
// Session Checks
// ============================================================================

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let h = Harness::new();
    let err = h
        .service
        .fetch_content(&"ab".repeat(32), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::SessionNotFound));
}

#[tokio::test]
async fn test_session_expires_with_code() {
    let h = Harness::new();
    let issued = h.issue(2, 1).await;
    let redemption = h.service.redeem(&issued.code, None).await.unwrap();

    h.clock.set(redemption.expires_at);
    let err = h
        .service
        .fetch_content(&redemption.session_token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::SessionExpired));
}

// ============================================================================
// Device Binding
// ============================================================================

#[tokio::test]
async fn test_advisory_binding_allows_mismatch() {
    let h = Harness::new();
    let issued = h.issue(24, 1).await;
    let redemption = h
        .service
        .redeem(&issued.code, Some("phone-a".into()))
        .await
        .unwrap();

    for presented in [Some("phone-a"), Some("laptop-b"), None] {
        assert!(
            h.service
                .fetch_content(&redemption.session_token, presented)
                .await
                .is_ok()
        );
    }
}

#[tokio::test]
async fn test_strict_binding_refuses_mismatch() {
    let h = Harness::with_policy(
        AccessPolicy::default().with_device_binding(DeviceBinding::Strict),
    );
    let issued = h.issue(24, 2).await;

    let bound = h
        .service
        .redeem(&issued.code, Some("phone-a".into()))
        .await
        .unwrap();
    assert!(
        h.service
            .fetch_content(&bound.session_token, Some("phone-a"))
            .await
            .is_ok()
    );
    for presented in [Some("laptop-b"), None] {
        let err = h
            .service
            .fetch_content(&bound.session_token, presented)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::DeviceMismatch));
    }

    // A session redeemed without a fingerprint is not bound
    let unbound = h.service.redeem(&issued.code, None).await.unwrap();
    assert!(
        h.service
            .fetch_content(&unbound.session_token, Some("anything"))
            .await
            .is_ok()
    );
}
