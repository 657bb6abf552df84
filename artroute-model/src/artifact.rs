use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag or digest half of an artifact reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceVersion {
    Tag(String),
    Digest(String),
}

impl ReferenceVersion {
    pub fn as_str(&self) -> &str {
        match self {
            ReferenceVersion::Tag(tag) => tag,
            ReferenceVersion::Digest(digest) => digest,
        }
    }
}

/// A parsed, canonical artifact reference.
///
/// `registry` is always populated (the default registry is filled in by the
/// parser) and `repository` carries any implicit `library/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub registry: String,
    pub repository: String,
    pub version: ReferenceVersion,
}

impl ArtifactReference {
    /// Fully-qualified repository name, e.g. `index.docker.io/library/alpine`.
    pub fn canonical_name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// The tag or digest used to address the artifact.
    pub fn identifier(&self) -> &str {
        self.version.as_str()
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            ReferenceVersion::Tag(tag) => {
                write!(f, "{}/{}:{}", self.registry, self.repository, tag)
            }
            ReferenceVersion::Digest(digest) => {
                write!(f, "{}/{}@{}", self.registry, self.repository, digest)
            }
        }
    }
}

/// Remote descriptor of an artifact as reported by its registry.
///
/// Always fetched fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub media_type: String,
    pub canonical_name: String,
    /// Tag or digest the descriptor was fetched with.
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ArtifactDescriptor {
    pub fn new(
        reference: &ArtifactReference,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            media_type: media_type.into(),
            canonical_name: reference.canonical_name(),
            identifier: reference.identifier().to_string(),
            digest: None,
            size: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}
