//! Snapshot of a live resource as discovered by the locator

use chrono::{DateTime, Utc};
use preflight_common::ResourceKind;
use serde::Serialize;
use std::collections::HashMap;

/// Discovered live resource
///
/// Taken once at discovery time and never updated; re-derive state from the
/// provider instead of mutating a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    /// Identifier the provider's APIs use (ARN for certificates)
    pub physical_id: String,
    pub arn: Option<String>,
    pub domain_name: Option<String>,
    /// Resource this one hangs off (the user pool of a hosted domain, the
    /// API a custom domain is associated with)
    pub parent_id: Option<String>,
    pub tags: HashMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, physical_id: impl Into<String>) -> Self {
        Self {
            kind,
            physical_id: physical_id.into(),
            arn: None,
            domain_name: None,
            parent_id: None,
            tags: HashMap::new(),
            created_at: None,
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        let arn = arn.into();
        self.arn = (!arn.is_empty()).then_some(arn);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_name = Some(domain.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Human-readable identity for logs: the domain when there is one
    pub fn label(&self) -> &str {
        self.domain_name.as_deref().unwrap_or(&self.physical_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_arn_is_dropped() {
        let r = ResourceDescriptor::new(ResourceKind::Table, "t").with_arn("");
        assert_eq!(r.arn, None);
        assert_eq!(r.label(), "t");
    }

    #[test]
    fn label_prefers_domain() {
        let r = ResourceDescriptor::new(ResourceKind::Certificate, "arn:aws:acm:x")
            .with_domain("api.dev.example.com");
        assert_eq!(r.label(), "api.dev.example.com");
    }
}
