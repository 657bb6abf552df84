//! Parsing of artifact reference strings into canonical [`ArtifactReference`]s.

use artroute_model::{ArtifactReference, ReferenceVersion};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, RouteError};

/// Registry assumed when a reference does not name one.
pub const DEFAULT_REGISTRY: &str = "index.docker.io";
/// Tag assumed when a reference carries neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

const DOCKER_HUB_ALIAS: &str = "docker.io";
const MAX_REPOSITORY_LEN: usize = 255;

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$")
        .expect("tag regex should compile")
});
static DIGEST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sha256:[a-f0-9]{64}$").expect("digest regex should compile")
});
static REGISTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]+)?$")
        .expect("registry regex should compile")
});
static PATH_COMPONENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$")
        .expect("repository component regex should compile")
});

/// Parses `raw` into a canonical reference.
///
/// Accepts `[registry/]repository[:tag]` and `[registry/]repository[:tag]@digest`.
/// A tag in front of a digest is dropped; the digest alone addresses the
/// artifact.
pub fn parse_reference(raw: &str) -> Result<ArtifactReference> {
    if raw.is_empty() {
        return Err(RouteError::invalid_reference(raw, "reference is empty"));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(RouteError::invalid_reference(
            raw,
            "reference contains whitespace",
        ));
    }

    let (name, version) = match raw.split_once('@') {
        Some((name, digest)) => {
            if !DIGEST_PATTERN.is_match(digest) {
                return Err(RouteError::invalid_reference(
                    raw,
                    format!("invalid digest {digest:?}"),
                ));
            }
            let (name, _tag) = split_tag(raw, name)?;
            (name, ReferenceVersion::Digest(digest.to_string()))
        }
        None => {
            let (name, tag) = split_tag(raw, raw)?;
            let tag = tag.unwrap_or(DEFAULT_TAG).to_string();
            (name, ReferenceVersion::Tag(tag))
        }
    };

    let (registry, repository) = split_registry(raw, name)?;
    Ok(ArtifactReference {
        registry,
        repository,
        version,
    })
}

fn split_tag<'a>(
    raw: &str,
    name: &'a str,
) -> Result<(&'a str, Option<&'a str>)> {
    let last_component = name.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    match name[last_component..].rfind(':') {
        Some(offset) => {
            let split = last_component + offset;
            let tag = &name[split + 1..];
            if !TAG_PATTERN.is_match(tag) {
                return Err(RouteError::invalid_reference(
                    raw,
                    format!("invalid tag {tag:?}"),
                ));
            }
            Ok((&name[..split], Some(tag)))
        }
        None => Ok((name, None)),
    }
}

fn split_registry(raw: &str, name: &str) -> Result<(String, String)> {
    let (registry, repository) = match name.split_once('/') {
        Some((first, rest))
            if first.contains('.')
                || first.contains(':')
                || first == "localhost" =>
        {
            if !REGISTRY_PATTERN.is_match(first) {
                return Err(RouteError::invalid_reference(
                    raw,
                    format!("invalid registry {first:?}"),
                ));
            }
            let registry = if first == DOCKER_HUB_ALIAS {
                DEFAULT_REGISTRY
            } else {
                first
            };
            (registry, rest)
        }
        _ => (DEFAULT_REGISTRY, name),
    };

    if repository.is_empty() {
        return Err(RouteError::invalid_reference(raw, "repository is empty"));
    }
    if repository.len() > MAX_REPOSITORY_LEN {
        return Err(RouteError::invalid_reference(
            raw,
            format!("repository longer than {MAX_REPOSITORY_LEN} characters"),
        ));
    }
    if let Some(component) = repository
        .split('/')
        .find(|component| !PATH_COMPONENT_PATTERN.is_match(component))
    {
        return Err(RouteError::invalid_reference(
            raw,
            format!("invalid repository component {component:?}"),
        ));
    }

    let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
        format!("library/{repository}")
    } else {
        repository.to_string()
    };
    Ok((registry.to_string(), repository))
}
