//! Managed / unmanaged classification
//!
//! Rules are applied in order and the first match wins. Every ambiguous
//! case resolves to managed.

use crate::config::PinnedIds;
use crate::membership::Membership;
use crate::resource::ResourceDescriptor;
use preflight_common::tags::ownership_tag;
use serde::Serialize;
use std::fmt;

/// Why a resource was classified the way it was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Carries a CloudFormation ownership tag
    Tagged,
    /// Listed in the stack inventory
    InStack,
    /// Neither tagged nor listed: an orphan
    NotFound,
    /// Stack inventory could not be read
    LookupFailed,
    /// Matches an explicitly pinned identifier
    Pinned,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Tagged => "tagged",
            Reason::InStack => "in_stack",
            Reason::NotFound => "not_found",
            Reason::LookupFailed => "lookup_failed",
            Reason::Pinned => "pinned",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub managed: bool,
    pub reason: Reason,
}

impl ClassificationResult {
    fn managed(reason: Reason) -> Self {
        Self {
            managed: true,
            reason,
        }
    }
}

/// Classify one resource against stack membership
pub fn classify(
    resource: &ResourceDescriptor,
    membership: &Membership,
    pinned: &PinnedIds,
) -> ClassificationResult {
    let Some(in_stack) = membership.contains(resource) else {
        return ClassificationResult::managed(Reason::LookupFailed);
    };

    if pinned.contains(&resource.physical_id)
        || resource.parent_id.as_deref().is_some_and(|id| pinned.contains(id))
    {
        return ClassificationResult::managed(Reason::Pinned);
    }

    if ownership_tag(&resource.tags).is_some() {
        return ClassificationResult::managed(Reason::Tagged);
    }

    if in_stack {
        return ClassificationResult::managed(Reason::InStack);
    }

    ClassificationResult {
        managed: false,
        reason: Reason::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::StackMembershipSet;
    use preflight_common::ResourceKind;
    use preflight_common::tags::TAG_STACK_NAME;
    use std::collections::HashMap;

    const CERT_ARN: &str = "arn:aws:acm:us-east-1:123456789012:certificate/1111-2222";

    fn certificate() -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::Certificate, CERT_ARN)
            .with_arn(CERT_ARN)
            .with_domain("api.dev.example.com")
    }

    fn empty() -> Membership {
        Membership::Known(StackMembershipSet::new())
    }

    #[test]
    fn unknown_membership_is_always_managed() {
        let tagged = certificate().with_tags(HashMap::from([(
            TAG_STACK_NAME.to_string(),
            "kernelworx-ue1-dev".to_string(),
        )]));
        for resource in [certificate(), tagged] {
            let result = classify(&resource, &Membership::Unknown, &PinnedIds::default());
            assert!(result.managed);
            assert_eq!(result.reason, Reason::LookupFailed);
        }
    }

    #[test]
    fn ownership_tag_from_any_stack_is_managed() {
        let resource = certificate().with_tags(HashMap::from([(
            TAG_STACK_NAME.to_string(),
            "some-other-stack".to_string(),
        )]));
        let result = classify(&resource, &empty(), &PinnedIds::default());
        assert_eq!(result, ClassificationResult::managed(Reason::Tagged));
    }

    #[test]
    fn untagged_member_is_managed() {
        let mut set = StackMembershipSet::new();
        set.insert(ResourceKind::Certificate, CERT_ARN);
        let result = classify(&certificate(), &Membership::Known(set), &PinnedIds::default());
        assert_eq!(result, ClassificationResult::managed(Reason::InStack));
    }

    #[test]
    fn arn_fragment_member_is_managed() {
        let mut set = StackMembershipSet::new();
        set.insert(ResourceKind::Certificate, "certificate/1111-2222");
        let result = classify(&certificate(), &Membership::Known(set), &PinnedIds::default());
        assert!(result.managed);
    }

    #[test]
    fn pinned_pool_and_its_domain_are_managed() {
        let pinned = PinnedIds {
            user_pool_id: Some("us-east-1_pool".to_string()),
        };
        let pool = ResourceDescriptor::new(ResourceKind::UserPool, "us-east-1_pool");
        let domain = ResourceDescriptor::new(ResourceKind::AuthDomain, "login.dev.example.com")
            .with_parent("us-east-1_pool");
        assert_eq!(classify(&pool, &empty(), &pinned).reason, Reason::Pinned);
        assert_eq!(classify(&domain, &empty(), &pinned).reason, Reason::Pinned);
    }

    #[test]
    fn orphan_is_unmanaged() {
        let result = classify(&certificate(), &empty(), &PinnedIds::default());
        assert!(!result.managed);
        assert_eq!(result.reason, Reason::NotFound);
    }
}
