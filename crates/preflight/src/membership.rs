//! Stack membership index
//!
//! Membership is rebuilt from CloudFormation on every run. A stack that does
//! not exist yet has no members; any other failure leaves membership
//! [`Membership::Unknown`], which the classifier treats as "managed".

use crate::aws::StackOperations;
use crate::aws::error::classify_anyhow_error;
use crate::aws::models::{StackResource, normalize_domain};
use crate::resource::ResourceDescriptor;
use preflight_common::ResourceKind;
use std::collections::HashSet;
use tracing::{info, warn};

/// Physical ids of the resources one stack currently owns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMembershipSet {
    entries: HashSet<(ResourceKind, String)>,
}

impl StackMembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a stack inventory, ignoring resource types outside the kind set
    pub fn from_resources(resources: &[StackResource]) -> Self {
        let mut set = Self::new();
        for resource in resources {
            if let Some(kind) = ResourceKind::from_cloudformation_type(&resource.resource_type) {
                set.insert(kind, &resource.physical_id);
            }
        }
        set
    }

    pub fn insert(&mut self, kind: ResourceKind, physical_id: &str) {
        if !physical_id.is_empty() {
            self.entries.insert((kind, physical_id.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry of the same kind refers to this resource.
    ///
    /// Discovery APIs and the stack inventory disagree on id shape (bare id
    /// vs ARN), so an entry matches when it equals the physical id or ARN,
    /// contains either of them, or is contained in the ARN.
    ///
    /// DNS-named kinds are compared case-insensitively and without the
    /// trailing root dot Route 53 appends to record names.
    pub fn contains(&self, resource: &ResourceDescriptor) -> bool {
        let domain_named = is_domain_named(resource.kind);
        let shape = |id: &str| {
            if domain_named {
                normalize_domain(id)
            } else {
                id.to_string()
            }
        };
        let physical_id = shape(&resource.physical_id);
        let arn = resource.arn.as_deref().map(shape).unwrap_or_default();

        self.entries
            .iter()
            .filter(|(kind, _)| *kind == resource.kind)
            .any(|(_, entry)| {
                let entry = shape(entry);
                (!physical_id.is_empty() && entry.contains(physical_id.as_str()))
                    || (!arn.is_empty()
                        && (entry.contains(arn.as_str()) || arn.contains(entry.as_str())))
            })
    }
}

fn is_domain_named(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::DnsRecord | ResourceKind::AuthDomain | ResourceKind::GraphDomain
    )
}

/// Result of building the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Known(StackMembershipSet),
    /// Inventory could not be read; nothing may be treated as an orphan
    Unknown,
}

impl Membership {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Membership::Unknown)
    }

    pub fn known(&self) -> Option<&StackMembershipSet> {
        match self {
            Membership::Known(set) => Some(set),
            Membership::Unknown => None,
        }
    }

    /// `Some(true)` for members, `None` when membership is unknown
    pub fn contains(&self, resource: &ResourceDescriptor) -> Option<bool> {
        self.known().map(|set| set.contains(resource))
    }
}

/// Build the membership index for `stack_name`
pub async fn build_membership<S: StackOperations>(stacks: &S, stack_name: &str) -> Membership {
    match stacks.list_stack_resources(stack_name).await {
        Ok(resources) => {
            let set = StackMembershipSet::from_resources(&resources);
            if set.is_empty() {
                info!(
                    stack = %stack_name,
                    resources = resources.len(),
                    "Stack owns no resources of a reconciled kind"
                );
            } else {
                info!(
                    stack = %stack_name,
                    resources = resources.len(),
                    members = set.len(),
                    "Loaded stack membership"
                );
            }
            Membership::Known(set)
        }
        Err(e) => {
            let error = classify_anyhow_error(&e);
            if error.is_not_found() {
                info!(stack = %stack_name, "Stack does not exist yet, no members");
                Membership::Known(StackMembershipSet::new())
            } else {
                warn!(
                    stack = %stack_name,
                    category = error.category(),
                    error = ?e,
                    "Stack membership unknown, treating every resource as managed"
                );
                Membership::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_resource(resource_type: &str, physical_id: &str) -> StackResource {
        StackResource {
            resource_type: resource_type.to_string(),
            physical_id: physical_id.to_string(),
            logical_id: "Logical".to_string(),
        }
    }

    #[test]
    fn ignores_unknown_types_and_empty_ids() {
        let set = StackMembershipSet::from_resources(&[
            stack_resource("AWS::DynamoDB::Table", "kernelworx-accounts-ue1-dev"),
            stack_resource("AWS::Lambda::Function", "fn"),
            stack_resource("AWS::S3::Bucket", ""),
        ]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn matches_exact_id_within_kind() {
        let mut set = StackMembershipSet::new();
        set.insert(ResourceKind::Table, "kernelworx-accounts-ue1-dev");

        let table = ResourceDescriptor::new(ResourceKind::Table, "kernelworx-accounts-ue1-dev");
        assert!(set.contains(&table));

        let bucket = ResourceDescriptor::new(ResourceKind::Bucket, "kernelworx-accounts-ue1-dev");
        assert!(!set.contains(&bucket));
    }

    #[test]
    fn matches_bare_id_against_arn_entry() {
        let mut set = StackMembershipSet::new();
        set.insert(
            ResourceKind::GraphApi,
            "arn:aws:appsync:us-east-1:123456789012:apis/abcdef123",
        );
        let api = ResourceDescriptor::new(ResourceKind::GraphApi, "abcdef123");
        assert!(set.contains(&api));
    }

    #[test]
    fn matches_bare_entry_against_arn() {
        let mut set = StackMembershipSet::new();
        set.insert(ResourceKind::EdgeIdentity, "E2QWRUHAPOMQZL");
        let identity = ResourceDescriptor::new(ResourceKind::EdgeIdentity, "unrelated").with_arn(
            "arn:aws:cloudfront::123456789012:origin-access-identity/E2QWRUHAPOMQZL",
        );
        assert!(set.contains(&identity));
    }

    #[test]
    fn record_names_match_without_root_dot() {
        let mut set = StackMembershipSet::new();
        set.insert(ResourceKind::DnsRecord, "_old.api.dev.example.com");
        set.insert(ResourceKind::AuthDomain, "Login.Dev.Example.com");

        let record = ResourceDescriptor::new(ResourceKind::DnsRecord, "_old.api.dev.example.com.");
        assert!(set.contains(&record));

        let domain = ResourceDescriptor::new(ResourceKind::AuthDomain, "login.dev.example.com.");
        assert!(set.contains(&domain));

        let other = ResourceDescriptor::new(ResourceKind::DnsRecord, "_new.api.dev.example.com.");
        assert!(!set.contains(&other));
    }

    #[test]
    fn empty_ids_never_match() {
        let mut set = StackMembershipSet::new();
        set.insert(ResourceKind::Certificate, "arn:aws:acm:us-east-1:1:certificate/x");
        let blank = ResourceDescriptor::new(ResourceKind::Certificate, "");
        assert!(!set.contains(&blank));
    }

    #[test]
    fn unknown_membership_has_no_answer() {
        let table = ResourceDescriptor::new(ResourceKind::Table, "t");
        assert_eq!(Membership::Unknown.contains(&table), None);
        assert_eq!(
            Membership::Known(StackMembershipSet::new()).contains(&table),
            Some(false)
        );
    }
}
