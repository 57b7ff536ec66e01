//! Provider-neutral snapshots of live resources
//!
//! Every provider client converts SDK output into these types so the engine
//! (and the in-memory fake used by tests) never touch SDK shapes.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Entry of the certificate listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub arn: String,
    pub domain_name: String,
}

/// Full certificate description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetail {
    pub arn: String,
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    /// ARNs of resources currently using the certificate
    pub in_use_by: Vec<String>,
    /// Names of the DNS records that validate the certificate
    pub validation_records: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CertificateDetail {
    /// Whether the certificate covers `domain` as its primary name or a SAN
    pub fn covers(&self, domain: &str) -> bool {
        same_domain(&self.domain_name, domain)
            || self
                .subject_alternative_names
                .iter()
                .any(|san| same_domain(san, domain))
    }
}

/// Route 53 hosted zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// Route 53 record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub record_type: String,
    pub ttl: Option<i64>,
    pub values: Vec<String>,
}

/// Cognito user-pool domain binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDomainInfo {
    pub domain: String,
    pub user_pool_id: String,
    pub certificate_arn: Option<String>,
}

/// Cognito user pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPoolInfo {
    pub id: String,
    pub name: String,
    pub arn: Option<String>,
    pub tags: HashMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// CloudFront distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionInfo {
    pub id: String,
    pub arn: String,
    /// `InProgress` or `Deployed`
    pub status: String,
    pub enabled: bool,
    pub aliases: Vec<String>,
    pub origin_domains: Vec<String>,
    /// Ids of the origin access identities its origins use
    pub edge_identity_ids: Vec<String>,
    pub certificate_arn: Option<String>,
}

impl DistributionInfo {
    pub fn is_deployed(&self) -> bool {
        self.status == DISTRIBUTION_DEPLOYED
    }
}

/// Status CloudFront reports once a change has propagated to every edge
pub const DISTRIBUTION_DEPLOYED: &str = "Deployed";

/// Edits applied to a distribution with an optimistic-concurrency write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionEdit {
    /// Serve the CloudFront default certificate and drop all aliases
    UseDefaultCertificate,
    /// Stop serving traffic (required before deletion)
    Disable,
}

/// CloudFront origin access identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeIdentityInfo {
    pub id: String,
    pub comment: String,
}

/// AppSync GraphQL API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphApiInfo {
    pub api_id: String,
    pub arn: String,
    pub name: String,
    pub tags: HashMap<String, String>,
}

/// AppSync custom domain name with its API association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDomainInfo {
    pub domain_name: String,
    pub certificate_arn: Option<String>,
    pub associated_api_id: Option<String>,
}

/// DynamoDB table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub arn: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Entry of a stack's resource inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResource {
    pub resource_type: String,
    pub physical_id: String,
    pub logical_id: String,
}

/// Compare DNS names ignoring case and the trailing root dot
pub fn same_domain(a: &str, b: &str) -> bool {
    normalize_domain(a) == normalize_domain(b)
}

/// Lowercase and strip the trailing root dot
pub fn normalize_domain(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(domain: &str, sans: &[&str]) -> CertificateDetail {
        CertificateDetail {
            arn: "arn:aws:acm:us-east-1:123:certificate/abc".to_string(),
            domain_name: domain.to_string(),
            subject_alternative_names: sans.iter().map(|s| s.to_string()).collect(),
            in_use_by: Vec::new(),
            validation_records: Vec::new(),
            created_at: None,
        }
    }

    #[test]
    fn covers_primary_and_alternative_names() {
        let c = cert("dev.example.com", &["dev.example.com", "API.dev.example.com."]);
        assert!(c.covers("dev.example.com"));
        assert!(c.covers("api.dev.example.com"));
        assert!(!c.covers("login.dev.example.com"));
    }

    #[test]
    fn domain_normalization() {
        assert!(same_domain("Example.COM.", "example.com"));
        assert!(!same_domain("a.example.com", "example.com"));
    }
}
