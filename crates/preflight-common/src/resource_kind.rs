//! Resource kinds and cleanup ordering
//!
//! The engine works over a fixed set of resource kinds. Every dispatch on a
//! kind is an exhaustive `match`, so adding a kind is a compile-time-checked
//! change across classification, cleanup and import.

use serde::Serialize;
use std::fmt;

/// Kinds of live cloud resources the engine reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// ACM certificate (blocked by distributions and auth domains using it)
    Certificate,
    /// Route 53 record (only DNS validation records are cleaned)
    DnsRecord,
    /// Cognito user-pool domain binding
    AuthDomain,
    /// AppSync GraphQL API
    GraphApi,
    /// AppSync custom domain-name binding
    GraphDomain,
    /// CloudFront distribution
    CdnDistribution,
    /// CloudFront origin access identity
    EdgeIdentity,
    /// DynamoDB table
    Table,
    /// S3 bucket
    Bucket,
    /// Cognito user pool
    UserPool,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Certificate,
        ResourceKind::DnsRecord,
        ResourceKind::AuthDomain,
        ResourceKind::GraphApi,
        ResourceKind::GraphDomain,
        ResourceKind::CdnDistribution,
        ResourceKind::EdgeIdentity,
        ResourceKind::Table,
        ResourceKind::Bucket,
        ResourceKind::UserPool,
    ];

    /// Get cleanup priority (lower number = cleanup first)
    ///
    /// - 0: certificates (after their users are detached)
    /// - 1: DNS validation records (after the certificates they validated)
    /// - 2: GraphQL domain bindings (before the API they point at)
    /// - 3: GraphQL APIs
    /// - 4: CDN distributions (disabled and deleted before their identity)
    /// - 5: edge identities
    /// - 6: importable kinds, never deleted by the cleaner
    pub fn cleanup_priority(self) -> u8 {
        match self {
            ResourceKind::Certificate => 0,
            ResourceKind::DnsRecord => 1,
            ResourceKind::GraphDomain => 2,
            ResourceKind::GraphApi => 3,
            ResourceKind::CdnDistribution => 4,
            ResourceKind::EdgeIdentity => 5,
            ResourceKind::AuthDomain
            | ResourceKind::Table
            | ResourceKind::Bucket
            | ResourceKind::UserPool => 6,
        }
    }

    /// CloudFormation resource type for this kind
    pub fn cloudformation_type(self) -> &'static str {
        match self {
            ResourceKind::Certificate => "AWS::CertificateManager::Certificate",
            ResourceKind::DnsRecord => "AWS::Route53::RecordSet",
            ResourceKind::AuthDomain => "AWS::Cognito::UserPoolDomain",
            ResourceKind::GraphApi => "AWS::AppSync::GraphQLApi",
            ResourceKind::GraphDomain => "AWS::AppSync::DomainName",
            ResourceKind::CdnDistribution => "AWS::CloudFront::Distribution",
            ResourceKind::EdgeIdentity => "AWS::CloudFront::CloudFrontOriginAccessIdentity",
            ResourceKind::Table => "AWS::DynamoDB::Table",
            ResourceKind::Bucket => "AWS::S3::Bucket",
            ResourceKind::UserPool => "AWS::Cognito::UserPool",
        }
    }

    /// Map a CloudFormation resource type back to a kind.
    ///
    /// Types outside the reconciled set return `None`.
    pub fn from_cloudformation_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.cloudformation_type() == resource_type)
    }

    /// Whether CloudFormation can adopt an existing resource of this kind
    pub fn is_importable(self) -> bool {
        match self {
            ResourceKind::Table
            | ResourceKind::Bucket
            | ResourceKind::UserPool
            | ResourceKind::AuthDomain
            | ResourceKind::GraphDomain
            | ResourceKind::CdnDistribution
            | ResourceKind::EdgeIdentity => true,
            ResourceKind::Certificate | ResourceKind::DnsRecord | ResourceKind::GraphApi => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Certificate => "certificate",
            ResourceKind::DnsRecord => "dns_record",
            ResourceKind::AuthDomain => "auth_domain",
            ResourceKind::GraphApi => "graph_api",
            ResourceKind::GraphDomain => "graph_domain",
            ResourceKind::CdnDistribution => "cdn_distribution",
            ResourceKind::EdgeIdentity => "edge_identity",
            ResourceKind::Table => "table",
            ResourceKind::Bucket => "bucket",
            ResourceKind::UserPool => "user_pool",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificates_before_validation_records() {
        assert!(
            ResourceKind::Certificate.cleanup_priority()
                < ResourceKind::DnsRecord.cleanup_priority(),
            "Validation records are only stale once their certificate is gone"
        );
    }

    #[test]
    fn test_graph_domain_before_graph_api() {
        assert!(
            ResourceKind::GraphDomain.cleanup_priority()
                < ResourceKind::GraphApi.cleanup_priority()
        );
    }

    #[test]
    fn test_distribution_before_edge_identity() {
        assert!(
            ResourceKind::CdnDistribution.cleanup_priority()
                < ResourceKind::EdgeIdentity.cleanup_priority(),
            "An identity cannot be deleted while a distribution uses it"
        );
    }

    #[test]
    fn test_cloudformation_type_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(
                ResourceKind::from_cloudformation_type(kind.cloudformation_type()),
                Some(kind)
            );
        }
        assert_eq!(ResourceKind::from_cloudformation_type("AWS::Lambda::Function"), None);
    }

    #[test]
    fn test_importable_kinds() {
        assert!(ResourceKind::Table.is_importable());
        assert!(ResourceKind::UserPool.is_importable());
        assert!(!ResourceKind::Certificate.is_importable());
        assert!(!ResourceKind::GraphApi.is_importable());
    }
}
