//! Orphan cleanup
//!
//! Deletes unmanaged resources CloudFormation cannot import, in a fixed
//! order: certificates, stale validation records, the stray GraphQL API,
//! stray distributions and their edge identities. Every resource is handled
//! on its own; a failure is logged and tallied, never propagated.

use crate::aws::models::normalize_domain;
use crate::aws::{CertificateOperations, CdnOperations, CloudApi, DnsOperations, GraphOperations};
use crate::classifier::{ClassificationResult, classify};
use crate::config::{CleanupOptions, DistributionPolicy, PinnedIds, ReconcileConfig};
use crate::detacher::{DependencyEdge, DetachOutcome, Detacher, Relationship};
use crate::locator::{LocatedCertificate, Locator, edge_identity};
use crate::membership::Membership;
use crate::resource::ResourceDescriptor;
use anyhow::Result;
use preflight_common::{Naming, ResourceKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use tracing::{debug, info, warn};

/// Per-kind counts for one cleanup pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindTally {
    pub found: usize,
    pub managed: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Report of cleanup operations
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub kinds: BTreeMap<ResourceKind, KindTally>,
}

impl CleanupReport {
    fn tally(&mut self, kind: ResourceKind) -> &mut KindTally {
        self.kinds.entry(kind).or_default()
    }

    /// Counts for one kind (zero when nothing of that kind was seen)
    pub fn get(&self, kind: ResourceKind) -> KindTally {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_deleted(&self) -> usize {
        self.kinds.values().map(|t| t.deleted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.kinds.values().map(|t| t.failed).sum()
    }

    pub fn log_summary(&self) {
        for (kind, tally) in &self.kinds {
            info!(
                kind = %kind,
                found = tally.found,
                managed = tally.managed,
                deleted = tally.deleted,
                failed = tally.failed,
                skipped = tally.skipped,
                "Cleanup summary"
            );
        }
        info!(
            dry_run = self.dry_run,
            deleted = self.total_deleted(),
            failed = self.total_failed(),
            "Cleanup finished"
        );
    }
}

pub struct Cleaner<'a, C: CloudApi> {
    cloud: &'a C,
    locator: Locator<'a, C>,
    detacher: Detacher<'a, C>,
    naming: &'a Naming,
    membership: &'a Membership,
    pinned: &'a PinnedIds,
    options: &'a CleanupOptions,
}

impl<'a, C: CloudApi> Cleaner<'a, C> {
    pub fn new(cloud: &'a C, config: &'a ReconcileConfig, membership: &'a Membership) -> Self {
        Self {
            cloud,
            locator: Locator::new(cloud),
            detacher: Detacher::new(cloud, &config.cleanup.wait, config.cleanup.max_attempts),
            naming: config.naming(),
            membership,
            pinned: &config.pinned,
            options: &config.cleanup,
        }
    }

    /// Run every cleanup step in order
    pub async fn run(&self) -> CleanupReport {
        let mut report = CleanupReport {
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        info!(
            environment = %self.naming.environment(),
            site = %self.naming.site_domain(),
            dry_run = self.options.dry_run,
            "Cleaning orphaned resources"
        );

        self.clean_certificates(&mut report).await;
        self.clean_validation_records(&mut report).await;
        self.clean_graph_api(&mut report).await;
        match self.options.distribution_policy {
            DistributionPolicy::Delete => self.clean_distributions(&mut report).await,
            DistributionPolicy::Adopt => {
                info!("Distribution policy is adopt, leaving distributions for import")
            }
        }

        report.log_summary();
        report
    }

    fn classify(&self, resource: &ResourceDescriptor) -> ClassificationResult {
        let result = classify(resource, self.membership, self.pinned);
        debug!(
            kind = %resource.kind,
            resource_id = %resource.label(),
            managed = result.managed,
            reason = %result.reason,
            "Classified"
        );
        result
    }

    /// Count a located resource; returns whether it may be cleaned
    fn admit(&self, report: &mut CleanupReport, resource: &ResourceDescriptor) -> bool {
        let result = self.classify(resource);
        let tally = report.tally(resource.kind);
        tally.found += 1;
        if result.managed {
            tally.managed += 1;
            info!(
                kind = %resource.kind,
                resource_id = %resource.label(),
                reason = %result.reason,
                "Skipping managed resource"
            );
        }
        !result.managed
    }

    /// Issue a delete (or log it in dry-run mode) and tally the outcome
    async fn delete<F, Fut>(
        &self,
        report: &mut CleanupReport,
        resource: &ResourceDescriptor,
        action: &str,
        op: F,
    ) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.options.dry_run {
            info!(
                kind = %resource.kind,
                resource_id = %resource.label(),
                "[DRY RUN] Would {}",
                action
            );
            report.tally(resource.kind).skipped += 1;
            return false;
        }

        match op().await {
            Ok(()) => {
                info!(
                    kind = %resource.kind,
                    resource_id = %resource.label(),
                    action,
                    outcome = "deleted",
                    "Deleted"
                );
                report.tally(resource.kind).deleted += 1;
                true
            }
            Err(e) => {
                warn!(
                    kind = %resource.kind,
                    resource_id = %resource.label(),
                    action,
                    outcome = "failed",
                    error = ?e,
                    "Failed to delete"
                );
                report.tally(resource.kind).failed += 1;
                false
            }
        }
    }

    fn skip(&self, report: &mut CleanupReport, resource: &ResourceDescriptor, reason: &str) {
        info!(
            kind = %resource.kind,
            resource_id = %resource.label(),
            outcome = "skipped",
            reason,
            "Skipping"
        );
        report.tally(resource.kind).skipped += 1;
    }

    /// Everything that must be detached before the certificate can go
    async fn certificate_edges(&self, certificate: &LocatedCertificate) -> Result<Vec<DependencyEdge>> {
        let mut edges = Vec::new();
        let arn = certificate.descriptor.physical_id.as_str();

        if let Some(domain) = self
            .locator
            .try_auth_domain(&self.naming.login_domain())
            .await?
            && domain.info.certificate_arn.as_deref() == Some(arn)
        {
            edges.push(DependencyEdge {
                blocking: domain.descriptor,
                blocked: certificate.descriptor.clone(),
                relationship: Relationship::DomainCertificate,
            });
        }

        for distribution in self.locator.try_distributions_with_certificate(arn).await? {
            edges.push(DependencyEdge {
                blocking: distribution.descriptor,
                blocked: certificate.descriptor.clone(),
                relationship: Relationship::ViewerCertificate,
            });
        }

        Ok(edges)
    }

    async fn clean_certificates(&self, report: &mut CleanupReport) {
        let domains = self.naming.deploy_domains();
        let certificates = self
            .locator
            .certificates_for(self.naming.base_domain(), &domains)
            .await;

        for certificate in certificates {
            let descriptor = &certificate.descriptor;
            if !self.admit(report, descriptor) {
                continue;
            }
            debug!(
                certificate = %descriptor.physical_id,
                in_use_by = ?certificate.detail.in_use_by,
                "Certificate users reported by ACM"
            );

            let edges = match self.certificate_edges(&certificate).await {
                Ok(edges) => edges,
                Err(e) => {
                    warn!(
                        certificate = %descriptor.physical_id,
                        error = ?e,
                        "Could not determine certificate users"
                    );
                    self.skip(report, descriptor, "users unknown");
                    continue;
                }
            };

            if let Some(edge) = edges.iter().find(|edge| self.classify(&edge.blocking).managed) {
                info!(
                    certificate = %descriptor.physical_id,
                    blocking_kind = %edge.blocking.kind,
                    blocking = %edge.blocking.label(),
                    "Certificate is used by a managed resource"
                );
                self.skip(report, descriptor, "in use by managed resource");
                continue;
            }

            if self.options.dry_run {
                for edge in &edges {
                    info!(
                        relationship = %edge.relationship,
                        blocking = %edge.blocking.label(),
                        "[DRY RUN] Would detach"
                    );
                }
            } else if !self.detach_all(report, &edges).await {
                self.skip(report, descriptor, "dependency not detached");
                continue;
            }

            self.delete(report, descriptor, "delete certificate", || {
                self.cloud.certificates().delete_certificate(&descriptor.physical_id)
            })
            .await;
        }
    }

    async fn detach_all(&self, report: &mut CleanupReport, edges: &[DependencyEdge]) -> bool {
        for edge in edges {
            let outcome = self.detacher.detach(edge).await;
            if !outcome.is_clear() {
                return false;
            }
            // Detaching a hosted domain deletes it
            if outcome == DetachOutcome::Detached
                && edge.relationship == Relationship::DomainCertificate
            {
                report.tally(edge.blocking.kind).deleted += 1;
            }
        }
        true
    }

    async fn clean_validation_records(&self, report: &mut CleanupReport) {
        let Some(zone) = self.locator.hosted_zone(self.naming.base_domain()).await else {
            debug!(domain = %self.naming.base_domain(), "No hosted zone for base domain");
            return;
        };

        let records = self
            .locator
            .validation_records(&zone, &self.naming.deploy_domains())
            .await;
        if records.is_empty() {
            return;
        }

        // Rescan after certificate cleanup; a record is stale only when no
        // remaining certificate references it
        let referenced: HashSet<String> = match self
            .locator
            .try_certificates_under(self.naming.base_domain())
            .await
        {
            Ok(certificates) => certificates
                .iter()
                .flat_map(|c| c.detail.validation_records.iter())
                .map(|name| normalize_domain(name))
                .collect(),
            Err(e) => {
                warn!(error = ?e, "Certificate rescan failed, keeping validation records");
                for located in &records {
                    report.tally(ResourceKind::DnsRecord).found += 1;
                    self.skip(report, &located.descriptor, "certificate rescan failed");
                }
                return;
            }
        };

        for located in records {
            let descriptor = &located.descriptor;
            if !self.admit(report, descriptor) {
                continue;
            }
            if referenced.contains(&normalize_domain(&located.record.name)) {
                self.skip(report, descriptor, "validates a live certificate");
                continue;
            }

            self.delete(report, descriptor, "delete validation record", || {
                self.cloud.dns().delete_record(&located.zone_id, &located.record)
            })
            .await;
        }
    }

    async fn clean_graph_api(&self, report: &mut CleanupReport) {
        let Some(api) = self.locator.graph_api(&self.naming.api_name()).await else {
            return;
        };
        if !self.admit(report, &api) {
            return;
        }

        let api_domain = self.naming.api_domain();
        let binding = match self.locator.try_graph_domain(&api_domain).await {
            Ok(binding) => binding,
            Err(e) => {
                warn!(domain = %api_domain, error = ?e, "Could not read API domain binding");
                self.skip(report, &api, "domain binding unknown");
                return;
            }
        };

        if let Some(binding) = binding
            && binding.info.associated_api_id.as_deref() == Some(api.physical_id.as_str())
        {
            let domain = &binding.descriptor;
            if !self.admit(report, domain) {
                self.skip(report, &api, "bound to a managed domain");
                return;
            }

            let graph = self.cloud.graph();
            let removed = self
                .delete(report, domain, "disassociate and delete domain name", || async {
                    graph.disassociate_api(&domain.physical_id).await?;
                    graph.delete_domain_name(&domain.physical_id).await
                })
                .await;
            if !removed && !self.options.dry_run {
                self.skip(report, &api, "domain binding still present");
                return;
            }
        }

        self.delete(report, &api, "delete GraphQL API", || {
            self.cloud.graph().delete_graph_api(&api.physical_id)
        })
        .await;
    }

    async fn clean_distributions(&self, report: &mut CleanupReport) {
        let site_domain = self.naming.site_domain();
        let origin_bucket = self.naming.static_bucket();
        let distributions = self.locator.distributions(&site_domain, &origin_bucket).await;

        let mut handled: HashSet<String> = HashSet::new();
        let mut still_used: HashSet<String> = HashSet::new();

        for distribution in distributions {
            let descriptor = &distribution.descriptor;
            let identities = &distribution.info.edge_identity_ids;
            handled.extend(identities.iter().cloned());

            if !self.admit(report, descriptor) {
                still_used.extend(identities.iter().cloned());
                continue;
            }

            if self.options.dry_run {
                info!(
                    distribution = %descriptor.physical_id,
                    "[DRY RUN] Would disable, wait for deployment and delete distribution"
                );
                report.tally(descriptor.kind).skipped += 1;
                for id in identities {
                    self.clean_edge_identity(report, &edge_identity(id)).await;
                }
                continue;
            }

            // Tearing down the distribution releases the identity its origin reads through
            let outcome = match identities.first() {
                Some(id) => {
                    let edge = DependencyEdge {
                        blocking: descriptor.clone(),
                        blocked: edge_identity(id),
                        relationship: Relationship::OriginAccess,
                    };
                    self.detacher.detach(&edge).await
                }
                None => self.detacher.tear_down_distribution(descriptor).await,
            };
            match outcome {
                DetachOutcome::Detached => report.tally(descriptor.kind).deleted += 1,
                DetachOutcome::AlreadyDetached => {
                    self.skip(report, descriptor, "already deleted")
                }
                DetachOutcome::NotDetached(reason) => {
                    warn!(
                        distribution = %descriptor.physical_id,
                        reason = %reason,
                        "Distribution not deleted, keeping its edge identities"
                    );
                    report.tally(descriptor.kind).failed += 1;
                    still_used.extend(identities.iter().cloned());
                    continue;
                }
            }

            for id in identities {
                self.clean_edge_identity(report, &edge_identity(id)).await;
            }
        }

        let needles = [site_domain, origin_bucket];
        for identity in self.locator.edge_identities_mentioning(&needles).await {
            if handled.contains(&identity.physical_id) || still_used.contains(&identity.physical_id)
            {
                continue;
            }
            self.clean_edge_identity(report, &identity).await;
        }
    }

    async fn clean_edge_identity(&self, report: &mut CleanupReport, identity: &ResourceDescriptor) {
        if !self.admit(report, identity) {
            return;
        }
        self.delete(report, identity, "delete edge identity", || {
            self.cloud.cdn().delete_edge_identity(&identity.physical_id)
        })
        .await;
    }
}
