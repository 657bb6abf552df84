use artroute_model::{
    ArtifactDescriptor, Availability, ResourceRef, RoutingRule, Unavailable,
};
use tracing::info;

/// A rule that passed the availability gate and declares the artifact's
/// media type, with the references resolved from its status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedRule<'a> {
    pub rule: &'a RoutingRule,
    pub profile: &'a ResourceRef,
    pub downloader: &'a ResourceRef,
}

/// Why a rule produced no match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unavailable(Unavailable),
    MediaTypeMismatch,
}

/// Evaluates a single rule against the descriptor.
pub fn evaluate<'a>(
    descriptor: &ArtifactDescriptor,
    rule: &'a RoutingRule,
) -> Result<MatchedRule<'a>, SkipReason> {
    let (profile, downloader) = match rule.availability() {
        Availability::Ready {
            profile,
            downloader,
        } => (profile, downloader),
        Availability::Unavailable(reason) => {
            return Err(SkipReason::Unavailable(reason));
        }
    };

    // Exact equality only; one hit is enough regardless of duplicates.
    if rule
        .spec
        .media_types
        .iter()
        .any(|media_type| *media_type == descriptor.media_type)
    {
        Ok(MatchedRule {
            rule,
            profile,
            downloader,
        })
    } else {
        Err(SkipReason::MediaTypeMismatch)
    }
}

/// Filters `rules` down to the ones that should produce a pipeline for
/// `descriptor`, preserving listing order. Each rule contributes at most one
/// match; several rules may match the same artifact.
pub fn match_rules<'a>(
    descriptor: &ArtifactDescriptor,
    rules: &'a [RoutingRule],
) -> Vec<MatchedRule<'a>> {
    rules
        .iter()
        .filter_map(|rule| match evaluate(descriptor, rule) {
            Ok(matched) => Some(matched),
            Err(SkipReason::Unavailable(reason)) => {
                info!(
                    target: "artroute::dispatch",
                    rule = %rule.name,
                    namespace = %rule.namespace,
                    %reason,
                    "skipping routing rule"
                );
                None
            }
            Err(SkipReason::MediaTypeMismatch) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use artroute_model::{
        ArtifactReference, ProfileSource, ReferenceVersion, RoutingRuleSpec,
        RoutingRuleStatus, SubResourceStatus,
    };

    const MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    const INDEX: &str = "application/vnd.oci.image.index.v1+json";
    const CHALK: &str = "application/git.chalk.v1beta+tgz";

    fn descriptor(media_type: &str) -> ArtifactDescriptor {
        let reference = ArtifactReference {
            registry: "ghcr.io".into(),
            repository: "org/app".into(),
            version: ReferenceVersion::Tag("v1".into()),
        };
        ArtifactDescriptor::new(&reference, media_type)
    }

    fn rule(name: &str, media_types: &[&str], profile: bool, downloader: bool) -> RoutingRule {
        let status = |available: bool, reference: &str| {
            if available {
                SubResourceStatus::available(ResourceRef::named(reference))
            } else {
                SubResourceStatus::unavailable()
            }
        };
        RoutingRule {
            name: name.into(),
            namespace: "ns1".into(),
            spec: RoutingRuleSpec::new(
                media_types.iter().map(|m| m.to_string()).collect(),
                ProfileSource::Reference(format!("{name}-profile")),
            ),
            status: RoutingRuleStatus {
                profile: Some(status(profile, &format!("{name}-profile"))),
                downloader: Some(status(downloader, "oci-downloader")),
            },
        }
    }

    #[test]
    fn empty_rule_set_matches_nothing() {
        assert!(match_rules(&descriptor(MANIFEST), &[]).is_empty());
    }

    #[test]
    fn unavailable_rules_never_match() {
        let rules = vec![
            rule("no-profile", &[MANIFEST], false, true),
            rule("no-downloader", &[MANIFEST], true, false),
            rule("neither", &[MANIFEST], false, false),
        ];
        assert!(match_rules(&descriptor(MANIFEST), &rules).is_empty());
        assert_eq!(
            evaluate(&descriptor(MANIFEST), &rules[1]),
            Err(SkipReason::Unavailable(Unavailable::Downloader))
        );
    }

    #[test]
    fn duplicate_media_types_yield_one_match() {
        let rules = vec![rule("dupes", &[MANIFEST, INDEX, MANIFEST], true, true)];
        let matched = match_rules(&descriptor(MANIFEST), &rules);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].profile.name, "dupes-profile");
        assert_eq!(matched[0].downloader.name, "oci-downloader");
    }

    #[test]
    fn independent_rules_fan_out_in_listing_order() {
        let rules = vec![
            rule("second", &[INDEX, MANIFEST], true, true),
            rule("other", &[CHALK], true, true),
            rule("first", &[MANIFEST], true, true),
        ];
        let names: Vec<_> = match_rules(&descriptor(MANIFEST), &rules)
            .iter()
            .map(|matched| matched.rule.name.as_str())
            .collect();
        assert_eq!(names, ["second", "first"]);
    }

    #[test]
    fn matching_is_exact_string_equality() {
        let rules = vec![
            rule("prefix", &["application/vnd.oci.image"], true, true),
            rule("case", &["Application/Vnd.Oci.Image.Manifest.v1+json"], true, true),
        ];
        assert!(match_rules(&descriptor(MANIFEST), &rules).is_empty());
        assert_eq!(
            evaluate(&descriptor(CHALK), &rule("manifest", &[MANIFEST], true, true)),
            Err(SkipReason::MediaTypeMismatch)
        );
    }
}
