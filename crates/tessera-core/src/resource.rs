//! Gated resources
//!
//! Codes gate two kinds of content: knowledge resources (documents and
//! media) and info-links. Both flow through the same code and session
//! model; only the catalog knows how a kind resolves to content.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag distinguishing the kinds of content a code can gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A document or media item, possibly backed by a binary asset
    KnowledgeResource,
    /// An outbound link with descriptive metadata
    InfoLink,
}

impl ResourceKind {
    /// Label used in logs and display strings
    pub fn label(&self) -> &'static str {
        match self {
            Self::KnowledgeResource => "knowledge_resource",
            Self::InfoLink => "info_link",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pointer to gated content owned by the resource catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn knowledge(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::KnowledgeResource, id)
    }

    pub fn info_link(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::InfoLink, id)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Location of a binary asset in object storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLocator {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
}

/// What the catalog knows about a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Target of an info-link
    #[serde(default)]
    pub link_url: Option<String>,
    /// Binary asset backing a knowledge resource
    #[serde(default)]
    pub asset: Option<AssetLocator>,
}
