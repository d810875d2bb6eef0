//! Shared fixtures for access service tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tessera_core::{
    AccessPolicy, AssetLocator, InMemoryResourceCatalog, IssuerId, ManualClock, ResourceMetadata,
    ResourceRef, SignedUrlMinter,
};
use tessera_service::{AccessService, IssueRequest, IssuedCode};

pub const SIGNING_KEY: [u8; 32] = [7u8; 32];
pub const ASSET_BASE: &str = "https://assets.example.test";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn video() -> ResourceRef {
    ResourceRef::knowledge("kr-video")
}

pub fn faq() -> ResourceRef {
    ResourceRef::info_link("il-faq")
}

/// A knowledge resource whose asset key the minter refuses
pub fn broken_asset() -> ResourceRef {
    ResourceRef::knowledge("kr-broken")
}

pub fn seeded_catalog() -> InMemoryResourceCatalog {
    let catalog = InMemoryResourceCatalog::new();
    catalog.insert(
        video(),
        ResourceMetadata {
            title: "Intro lecture".into(),
            description: Some("First session of the course".into()),
            link_url: None,
            asset: Some(AssetLocator {
                bucket: "media".into(),
                key: "lectures/intro.mp4".into(),
                content_type: "video/mp4".into(),
            }),
        },
    );
    catalog.insert(
        faq(),
        ResourceMetadata {
            title: "Visitor FAQ".into(),
            description: None,
            link_url: Some("https://example.test/faq".into()),
            asset: None,
        },
    );
    catalog.insert(
        broken_asset(),
        ResourceMetadata {
            title: "Broken".into(),
            description: None,
            link_url: None,
            asset: Some(AssetLocator {
                bucket: "media".into(),
                key: "../secrets".into(),
                content_type: "application/octet-stream".into(),
            }),
        },
    );
    catalog
}

pub fn minter() -> SignedUrlMinter {
    SignedUrlMinter::new(ASSET_BASE, SIGNING_KEY)
}

/// A service on in-memory stores with a manual clock at [`t0`]
pub struct Harness {
    pub service: Arc<AccessService>,
    pub clock: Arc<ManualClock>,
    pub catalog: Arc<InMemoryResourceCatalog>,
    pub issuer: IssuerId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(AccessPolicy::default())
    }

    pub fn with_policy(policy: AccessPolicy) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let catalog = Arc::new(seeded_catalog());
        let service = AccessService::in_memory(catalog.clone(), Arc::new(minter()), policy)
            .with_clock(clock.clone());

        Self {
            service: Arc::new(service),
            clock,
            catalog,
            issuer: IssuerId::new("clinic-7"),
        }
    }

    /// Issue a code for [`video`] as the harness issuer
    pub async fn issue(&self, window_hours: u32, max_sessions: u32) -> IssuedCode {
        self.issue_for(video(), window_hours, max_sessions).await
    }

    pub async fn issue_for(
        &self,
        resource: ResourceRef,
        window_hours: u32,
        max_sessions: u32,
    ) -> IssuedCode {
        self.service
            .issue(
                &self.issuer,
                IssueRequest::new(resource, window_hours, max_sessions),
            )
            .await
            .expect("issue failed")
    }
}
