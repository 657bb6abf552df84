//! Routing rules and the read-only availability projection attached to them.
//!
//! A routing rule maps one or more media types to a scan profile and a
//! downloader. Its status is written by an out-of-process reconciler; this
//! crate only ever reads it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};

/// A single name/value pair passed along with a resource reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Reference to a concrete resource accepted by the orchestration API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

impl ResourceRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Where a rule's scan profile comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSource {
    /// Profile body declared inline on the rule.
    Inline(Value),
    /// Name of an existing profile in the rule's namespace.
    Reference(String),
}

impl ProfileSource {
    /// Builds the source from its wire shape, where exactly one of the two
    /// halves must be present.
    pub fn from_parts(
        value: Option<Value>,
        value_from: Option<String>,
    ) -> Result<Self> {
        let value_from = value_from.filter(|name| !name.is_empty());
        match (value, value_from) {
            (Some(value), None) => Ok(ProfileSource::Inline(value)),
            (None, Some(name)) => Ok(ProfileSource::Reference(name)),
            (Some(_), Some(_)) => Err(ModelError::InvalidSource {
                field: "profile",
                reason: "value and valueFrom are mutually exclusive".into(),
            }),
            (None, None) => Err(ModelError::InvalidSource {
                field: "profile",
                reason: "one of value or valueFrom is required".into(),
            }),
        }
    }
}

/// Where a rule's downloader comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloaderSource {
    Inline(Value),
    Reference(ResourceRef),
}

impl DownloaderSource {
    /// Builds the source from its wire shape. Returns `Ok(None)` when neither
    /// half is set; the reconciler then falls back to the cluster default.
    pub fn from_parts(
        value: Option<Value>,
        value_from: Option<ResourceRef>,
    ) -> Result<Option<Self>> {
        let value_from = value_from.filter(|reference| !reference.name.is_empty());
        match (value, value_from) {
            (Some(value), None) => Ok(Some(DownloaderSource::Inline(value))),
            (None, Some(reference)) => {
                Ok(Some(DownloaderSource::Reference(reference)))
            }
            (Some(_), Some(_)) => Err(ModelError::InvalidSource {
                field: "downloader",
                reason: "value and valueFrom are mutually exclusive".into(),
            }),
            (None, None) => Ok(None),
        }
    }
}

/// Declared state of a routing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRuleSpec {
    pub media_types: Vec<String>,
    pub profile: ProfileSource,
    pub downloader: Option<DownloaderSource>,
    pub scan_service_account_name: Option<String>,
    pub upload_service_account_name: Option<String>,
    pub ttl_seconds_after_finished: Option<i32>,
    pub ttl_seconds_max_lifetime: Option<i32>,
}

impl RoutingRuleSpec {
    pub fn new(media_types: Vec<String>, profile: ProfileSource) -> Self {
        Self {
            media_types,
            profile,
            downloader: None,
            scan_service_account_name: None,
            upload_service_account_name: None,
            ttl_seconds_after_finished: None,
            ttl_seconds_max_lifetime: None,
        }
    }
}

/// Reconciler-reported state of one referenced sub-resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubResourceStatus {
    #[serde(default)]
    pub available: bool,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<ResourceRef>,
}

impl SubResourceStatus {
    pub fn available(reference: ResourceRef) -> Self {
        Self {
            available: true,
            reference: Some(reference),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    fn ready(&self) -> Option<&ResourceRef> {
        if self.available {
            self.reference.as_ref()
        } else {
            None
        }
    }
}

/// Observed state of a routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingRuleStatus {
    pub profile: Option<SubResourceStatus>,
    pub downloader: Option<SubResourceStatus>,
}

/// A namespace-scoped routing rule together with its current status.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRule {
    pub name: String,
    pub namespace: String,
    pub spec: RoutingRuleSpec,
    pub status: RoutingRuleStatus,
}

/// Which sub-resource kept a rule from being routable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    Profile,
    Downloader,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Profile => f.write_str("profile unavailable"),
            Unavailable::Downloader => f.write_str("downloader unavailable"),
        }
    }
}

/// Read-only projection of a rule's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability<'a> {
    Ready {
        profile: &'a ResourceRef,
        downloader: &'a ResourceRef,
    },
    Unavailable(Unavailable),
}

impl RoutingRule {
    /// Projects the rule's status into either both resolved references or
    /// the first sub-resource that is not available. A sub-resource marked
    /// available without a recorded reference counts as unavailable.
    pub fn availability(&self) -> Availability<'_> {
        let Some(profile) =
            self.status.profile.as_ref().and_then(SubResourceStatus::ready)
        else {
            return Availability::Unavailable(Unavailable::Profile);
        };
        let Some(downloader) = self
            .status
            .downloader
            .as_ref()
            .and_then(SubResourceStatus::ready)
        else {
            return Availability::Unavailable(Unavailable::Downloader);
        };
        Availability::Ready {
            profile,
            downloader,
        }
    }
}
