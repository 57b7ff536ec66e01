//! Resource locator
//!
//! Finds live resources by the selectors the naming convention produces:
//! domain names, distribution aliases, origin buckets and exact names. Never
//! free-text search.
//!
//! Lookups come in two flavors. The plain ones log any API error and report
//! "not found" so a broken read degrades to "nothing to clean". The `try_*`
//! ones propagate errors for callers that must tell "absent" from "unknown"
//! (building dependency edges, rescanning certificates before deleting
//! validation records).

use crate::aws::models::{
    AuthDomainInfo, CertificateDetail, DistributionInfo, DnsRecord, GraphDomainInfo, HostedZone,
    normalize_domain, same_domain,
};
use crate::aws::{
    AuthOperations, BucketOperations, CdnOperations, CertificateOperations, CloudApi,
    DnsOperations, GraphOperations, TableOperations,
};
use crate::resource::ResourceDescriptor;
use anyhow::{Context, Result};
use preflight_common::ResourceKind;
use preflight_common::defaults::VALIDATION_RECORD_MARKER;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Certificate with the description it was matched on
#[derive(Debug, Clone)]
pub struct LocatedCertificate {
    pub descriptor: ResourceDescriptor,
    pub detail: CertificateDetail,
}

#[derive(Debug, Clone)]
pub struct LocatedDistribution {
    pub descriptor: ResourceDescriptor,
    pub info: DistributionInfo,
}

#[derive(Debug, Clone)]
pub struct LocatedAuthDomain {
    pub descriptor: ResourceDescriptor,
    pub info: AuthDomainInfo,
}

#[derive(Debug, Clone)]
pub struct LocatedGraphDomain {
    pub descriptor: ResourceDescriptor,
    pub info: GraphDomainInfo,
}

/// DNS validation record with the zone it lives in
#[derive(Debug, Clone)]
pub struct LocatedRecord {
    pub descriptor: ResourceDescriptor,
    pub zone_id: String,
    pub record: DnsRecord,
}

/// Whether `name` is `domain` or one of its subdomains
pub fn is_within(name: &str, domain: &str) -> bool {
    let name = normalize_domain(name);
    let domain = normalize_domain(domain);
    !domain.is_empty() && (name == domain || name.ends_with(&format!(".{domain}")))
}

/// Whether a certificate's primary name can plausibly cover names under
/// `root` (the name itself, a parent, a child or a wildcard of either)
fn is_related(primary: &str, root: &str) -> bool {
    let primary = normalize_domain(primary);
    let primary = primary.trim_start_matches("*.");
    is_within(primary, root) || is_within(root, primary)
}

/// Whether a free-text comment names `needle` as a whole token.
///
/// Tokens are runs of name characters. A token matches when it equals the
/// needle or ends with `-{needle}` (as in `access-identity-{bucket}`), so
/// `dev.example.com` never mentions `example.com`.
pub fn comment_mentions(comment: &str, needle: &str) -> bool {
    let needle = normalize_domain(needle);
    if needle.is_empty() {
        return false;
    }
    comment
        .split(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        .map(normalize_domain)
        .any(|token| {
            token == needle
                || token
                    .strip_suffix(needle.as_str())
                    .is_some_and(|prefix| prefix.ends_with('-'))
        })
}

/// Whether a record set is an ACM DNS validation record
pub fn is_validation_record(record: &DnsRecord) -> bool {
    record.record_type == "CNAME"
        && record.name.starts_with('_')
        && record
            .values
            .iter()
            .any(|value| value.contains(VALIDATION_RECORD_MARKER))
}

/// Log a failed lookup and treat it as "not found"
fn or_not_found<T: Default>(kind: ResourceKind, selector: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(
            kind = %kind,
            selector = %selector,
            error = ?e,
            "Lookup failed, treating as not found"
        );
        T::default()
    })
}

/// Read-only queries against live account state
pub struct Locator<'a, C: CloudApi> {
    cloud: &'a C,
}

impl<'a, C: CloudApi> Locator<'a, C> {
    pub fn new(cloud: &'a C) -> Self {
        Self { cloud }
    }

    /// Every certificate whose primary name is related to `root`, described
    /// and tagged. Any failure fails the whole scan.
    pub async fn try_certificates_under(&self, root: &str) -> Result<Vec<LocatedCertificate>> {
        let certificates = self.cloud.certificates();
        let mut located = Vec::new();

        for summary in certificates.list_certificates().await? {
            if !is_related(&summary.domain_name, root) {
                continue;
            }
            let Some(detail) = certificates.describe_certificate(&summary.arn).await? else {
                continue;
            };
            let tags = certificates
                .certificate_tags(&detail.arn)
                .await
                .with_context(|| format!("Failed to read tags of {}", detail.arn))?;

            let descriptor = ResourceDescriptor::new(ResourceKind::Certificate, &detail.arn)
                .with_arn(&detail.arn)
                .with_domain(&detail.domain_name)
                .with_tags(tags)
                .with_created_at(detail.created_at);
            located.push(LocatedCertificate { descriptor, detail });
        }

        debug!(root = %root, count = located.len(), "Located certificates");
        Ok(located)
    }

    /// Certificates under `root` covering any of `domains` as primary name
    /// or subject alternative name
    pub async fn certificates_for(&self, root: &str, domains: &[String]) -> Vec<LocatedCertificate> {
        let all = or_not_found(
            ResourceKind::Certificate,
            root,
            self.try_certificates_under(root).await,
        );
        all.into_iter()
            .filter(|c| domains.iter().any(|d| c.detail.covers(d)))
            .collect()
    }

    pub async fn hosted_zone(&self, domain: &str) -> Option<HostedZone> {
        or_not_found(
            ResourceKind::DnsRecord,
            domain,
            self.cloud.dns().find_hosted_zone(domain).await,
        )
    }

    /// Validation records in `zone` named under one of `domains`
    pub async fn validation_records(
        &self,
        zone: &HostedZone,
        domains: &[String],
    ) -> Vec<LocatedRecord> {
        let records = or_not_found(
            ResourceKind::DnsRecord,
            &zone.name,
            self.cloud.dns().list_records(&zone.id).await,
        );

        records
            .into_iter()
            .filter(is_validation_record)
            .filter(|record| domains.iter().any(|d| is_within(&record.name, d)))
            .map(|record| LocatedRecord {
                descriptor: ResourceDescriptor::new(ResourceKind::DnsRecord, &record.name)
                    .with_domain(normalize_domain(&record.name))
                    .with_parent(&zone.id),
                zone_id: zone.id.clone(),
                record,
            })
            .collect()
    }

    pub async fn try_auth_domain(&self, domain: &str) -> Result<Option<LocatedAuthDomain>> {
        let info = self.cloud.auth().describe_domain(domain).await?;
        Ok(info.map(|info| LocatedAuthDomain {
            descriptor: ResourceDescriptor::new(ResourceKind::AuthDomain, &info.domain)
                .with_domain(&info.domain)
                .with_parent(&info.user_pool_id),
            info,
        }))
    }

    pub async fn auth_domain(&self, domain: &str) -> Option<LocatedAuthDomain> {
        or_not_found(
            ResourceKind::AuthDomain,
            domain,
            self.try_auth_domain(domain).await,
        )
    }

    /// User pool with exactly this name
    pub async fn user_pool(&self, name: &str) -> Option<ResourceDescriptor> {
        let result: Result<Option<ResourceDescriptor>> = async {
            let auth = self.cloud.auth();
            let Some(summary) = auth
                .list_user_pools()
                .await?
                .into_iter()
                .find(|pool| pool.name == name)
            else {
                return Ok(None);
            };
            let pool = auth.describe_user_pool(&summary.id).await?.unwrap_or(summary);
            Ok(Some(
                ResourceDescriptor::new(ResourceKind::UserPool, &pool.id)
                    .with_arn(pool.arn.clone().unwrap_or_default())
                    .with_tags(pool.tags)
                    .with_created_at(pool.created_at),
            ))
        }
        .await;
        or_not_found(ResourceKind::UserPool, name, result)
    }

    /// User pool by id
    pub async fn user_pool_by_id(&self, id: &str) -> Option<ResourceDescriptor> {
        let pool = or_not_found(
            ResourceKind::UserPool,
            id,
            self.cloud.auth().describe_user_pool(id).await,
        )?;
        Some(
            ResourceDescriptor::new(ResourceKind::UserPool, &pool.id)
                .with_arn(pool.arn.unwrap_or_default())
                .with_tags(pool.tags)
                .with_created_at(pool.created_at),
        )
    }

    /// GraphQL API with exactly this name
    pub async fn graph_api(&self, name: &str) -> Option<ResourceDescriptor> {
        let apis = or_not_found(
            ResourceKind::GraphApi,
            name,
            self.cloud.graph().list_graph_apis().await,
        );
        apis.into_iter().find(|api| api.name == name).map(|api| {
            ResourceDescriptor::new(ResourceKind::GraphApi, &api.api_id)
                .with_arn(&api.arn)
                .with_tags(api.tags)
        })
    }

    pub async fn try_graph_domain(&self, domain: &str) -> Result<Option<LocatedGraphDomain>> {
        let Some(info) = self.cloud.graph().get_domain_name(domain).await? else {
            return Ok(None);
        };
        let mut descriptor = ResourceDescriptor::new(ResourceKind::GraphDomain, &info.domain_name)
            .with_domain(&info.domain_name);
        if let Some(api_id) = &info.associated_api_id {
            descriptor = descriptor.with_parent(api_id);
        }
        Ok(Some(LocatedGraphDomain { descriptor, info }))
    }

    pub async fn graph_domain(&self, domain: &str) -> Option<LocatedGraphDomain> {
        or_not_found(
            ResourceKind::GraphDomain,
            domain,
            self.try_graph_domain(domain).await,
        )
    }

    /// Distributions matching `predicate`, each with its tags.
    async fn try_distributions_where(
        &self,
        predicate: impl Fn(&DistributionInfo) -> bool,
    ) -> Result<Vec<LocatedDistribution>> {
        let cdn = self.cloud.cdn();
        let mut located = Vec::new();

        for info in cdn.list_distributions().await? {
            if !predicate(&info) {
                continue;
            }
            let tags = cdn
                .distribution_tags(&info.arn)
                .await
                .with_context(|| format!("Failed to read tags of distribution {}", info.id))?;
            let mut descriptor = ResourceDescriptor::new(ResourceKind::CdnDistribution, &info.id)
                .with_arn(&info.arn)
                .with_tags(tags);
            if let Some(alias) = info.aliases.first() {
                descriptor = descriptor.with_domain(alias);
            }
            located.push(LocatedDistribution { descriptor, info });
        }

        Ok(located)
    }

    /// Distributions serving `site_domain` or reading from `origin_bucket`
    pub async fn distributions(
        &self,
        site_domain: &str,
        origin_bucket: &str,
    ) -> Vec<LocatedDistribution> {
        let origin_prefix = format!("{origin_bucket}.s3");
        let result = self
            .try_distributions_where(|info| {
                info.aliases.iter().any(|a| same_domain(a, site_domain))
                    || info
                        .origin_domains
                        .iter()
                        .any(|origin| origin.starts_with(&origin_prefix))
            })
            .await;
        or_not_found(ResourceKind::CdnDistribution, site_domain, result)
    }

    /// Distributions whose viewer certificate is `certificate_arn`
    pub async fn try_distributions_with_certificate(
        &self,
        certificate_arn: &str,
    ) -> Result<Vec<LocatedDistribution>> {
        self.try_distributions_where(|info| {
            info.certificate_arn.as_deref() == Some(certificate_arn)
        })
        .await
    }

    /// Edge identities whose comment mentions any of `needles`
    pub async fn edge_identities_mentioning(&self, needles: &[String]) -> Vec<ResourceDescriptor> {
        let identities = or_not_found(
            ResourceKind::EdgeIdentity,
            &needles.join(","),
            self.cloud.cdn().list_edge_identities().await,
        );
        identities
            .into_iter()
            .filter(|identity| {
                needles
                    .iter()
                    .any(|needle| comment_mentions(&identity.comment, needle))
            })
            .map(|identity| edge_identity(&identity.id))
            .collect()
    }

    /// Table with exactly this name
    pub async fn table(&self, name: &str) -> Option<ResourceDescriptor> {
        let result: Result<Option<ResourceDescriptor>> = async {
            let tables = self.cloud.tables();
            let Some(info) = tables.describe_table(name).await? else {
                return Ok(None);
            };
            let tags = if info.arn.is_empty() {
                HashMap::new()
            } else {
                tables.table_tags(&info.arn).await?
            };
            Ok(Some(
                ResourceDescriptor::new(ResourceKind::Table, &info.name)
                    .with_arn(&info.arn)
                    .with_tags(tags)
                    .with_created_at(info.created_at),
            ))
        }
        .await;
        or_not_found(ResourceKind::Table, name, result)
    }

    /// Bucket with exactly this name
    pub async fn bucket(&self, name: &str) -> Option<ResourceDescriptor> {
        let result: Result<Option<ResourceDescriptor>> = async {
            let buckets = self.cloud.buckets();
            if !buckets.bucket_exists(name).await? {
                return Ok(None);
            }
            let tags = buckets.bucket_tags(name).await?;
            Ok(Some(
                ResourceDescriptor::new(ResourceKind::Bucket, name)
                    .with_arn(format!("arn:aws:s3:::{name}"))
                    .with_tags(tags),
            ))
        }
        .await;
        or_not_found(ResourceKind::Bucket, name, result)
    }
}

/// Descriptor of an origin access identity known by id only
pub fn edge_identity(id: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(ResourceKind::EdgeIdentity, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, record_type: &str, value: &str) -> DnsRecord {
        DnsRecord {
            name: name.to_string(),
            record_type: record_type.to_string(),
            ttl: Some(300),
            values: vec![value.to_string()],
        }
    }

    #[test]
    fn recognizes_validation_records() {
        let validation = record(
            "_3f2a.api.dev.example.com.",
            "CNAME",
            "_9b1c.xlfgrmvvlj.acm-validations.aws.",
        );
        assert!(is_validation_record(&validation));

        let other_cname = record("_dmarc.example.com.", "CNAME", "mail.example.net.");
        assert!(!is_validation_record(&other_cname));

        let txt = record(
            "_3f2a.api.dev.example.com.",
            "TXT",
            "_9b1c.acm-validations.aws.",
        );
        assert!(!is_validation_record(&txt));

        let no_underscore = record("www.dev.example.com.", "CNAME", "x.acm-validations.aws.");
        assert!(!is_validation_record(&no_underscore));
    }

    #[test]
    fn domain_containment() {
        assert!(is_within("_x.api.dev.example.com.", "dev.example.com"));
        assert!(is_within("DEV.example.com", "dev.example.com"));
        assert!(!is_within("xdev.example.com", "dev.example.com"));
        assert!(!is_within("example.com", ""));
    }

    #[test]
    fn comments_mention_whole_names_only() {
        assert!(comment_mentions("access-identity-kernelworx-static-ue1-dev", "kernelworx-static-ue1-dev"));
        assert!(comment_mentions("Identity for example.com.", "example.com"));
        assert!(comment_mentions("Identity for Dev.Example.com", "dev.example.com"));
        assert!(!comment_mentions("Identity for dev.example.com", "example.com"));
        assert!(!comment_mentions("access-identity-kernelworx-static-ue1-dev2", "kernelworx-static-ue1-dev"));
        assert!(!comment_mentions("anything", ""));
    }

    #[test]
    fn related_certificate_names() {
        assert!(is_related("api.dev.example.com", "example.com"));
        assert!(is_related("*.example.com", "example.com"));
        assert!(is_related("example.com", "dev.example.com"));
        assert!(!is_related("example.org", "example.com"));
    }
}
