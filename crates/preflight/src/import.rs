//! Import manifest generation
//!
//! Lists live resources of importable kinds that exist under their
//! conventional names but are not owned by any stack. The logical ids must
//! match what the deploy would synthesize for the same constructs, otherwise
//! CloudFormation rejects the import.

use crate::aws::CloudApi;
use crate::classifier::classify;
use crate::config::{DistributionPolicy, ReconcileConfig};
use crate::locator::{Locator, edge_identity};
use crate::membership::Membership;
use crate::resource::ResourceDescriptor;
use preflight_common::import_record::{
    API_DOMAIN_PATH, DISTRIBUTION_PATH, EDGE_IDENTITY_PATH, EXPORTS_BUCKET_PATH, STATIC_BUCKET_PATH,
    USER_POOL_DOMAIN_PATH, USER_POOL_PATH,
};
use preflight_common::naming::TABLE_PURPOSES;
use preflight_common::{ImportRecord, ResourceKind};
use std::collections::HashSet;
use tracing::{debug, info};

pub struct ImportGenerator<'a, C: CloudApi> {
    locator: Locator<'a, C>,
    config: &'a ReconcileConfig,
    membership: &'a Membership,
    records: Vec<ImportRecord>,
    seen: HashSet<String>,
}

impl<'a, C: CloudApi> ImportGenerator<'a, C> {
    pub fn new(cloud: &'a C, config: &'a ReconcileConfig, membership: &'a Membership) -> Self {
        Self {
            locator: Locator::new(cloud),
            config,
            membership,
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Records for every importable resource that exists outside the stack.
    ///
    /// `None` when nothing needs importing or membership is unknown.
    pub async fn generate(mut self) -> Option<Vec<ImportRecord>> {
        if self.membership.is_unknown() {
            info!(
                stack = %self.config.stack_name(),
                "Stack membership unknown, skipping import"
            );
            return None;
        }

        let naming = self.config.naming();

        for purpose in TABLE_PURPOSES {
            let name = naming.table_name(purpose);
            let found = self.locator.table(&name).await;
            if self.adoptable(found.as_ref()) {
                self.push(Some(ImportRecord::table(purpose, &name)));
            }
        }

        for (bucket, path) in [
            (naming.static_bucket(), STATIC_BUCKET_PATH),
            (naming.exports_bucket(), EXPORTS_BUCKET_PATH),
        ] {
            let found = self.locator.bucket(&bucket).await;
            if self.adoptable(found.as_ref()) {
                self.push(ImportRecord::for_construct(
                    ResourceKind::Bucket,
                    path,
                    [("BucketName", bucket)],
                ));
            }
        }

        let pool = self.locator.user_pool(&naming.user_pool_name()).await;
        if let Some(pool) = pool.as_ref()
            && self.adoptable(Some(pool))
        {
            self.push(ImportRecord::for_construct(
                ResourceKind::UserPool,
                USER_POOL_PATH,
                [("UserPoolId", pool.physical_id.clone())],
            ));
        }

        let login_domain = naming.login_domain();
        if let Some(domain) = self.locator.auth_domain(&login_domain).await
            && self.adoptable(Some(&domain.descriptor))
        {
            self.push(ImportRecord::for_construct(
                ResourceKind::AuthDomain,
                USER_POOL_DOMAIN_PATH,
                [
                    ("UserPoolId", domain.info.user_pool_id.clone()),
                    ("Domain", domain.info.domain.clone()),
                ],
            ));
        }

        let api_domain = naming.api_domain();
        if let Some(domain) = self.locator.graph_domain(&api_domain).await
            && self.adoptable(Some(&domain.descriptor))
        {
            self.push(ImportRecord::for_construct(
                ResourceKind::GraphDomain,
                API_DOMAIN_PATH,
                [("DomainName", domain.info.domain_name.clone())],
            ));
        }

        if self.config.distribution_policy() == DistributionPolicy::Adopt {
            self.adopt_distribution().await;
        }

        if self.records.is_empty() {
            info!("Nothing to import");
            return None;
        }
        info!(records = self.records.len(), "Generated import records");
        Some(self.records)
    }

    /// The site distribution and the edge identity its origin reads through
    async fn adopt_distribution(&mut self) {
        let naming = self.config.naming();
        let distributions = self
            .locator
            .distributions(&naming.site_domain(), &naming.static_bucket())
            .await;

        // The stack declares one distribution; adopt the first candidate only
        let Some(distribution) = distributions
            .into_iter()
            .find(|d| self.adoptable(Some(&d.descriptor)))
        else {
            return;
        };

        self.push(ImportRecord::for_construct(
            ResourceKind::CdnDistribution,
            DISTRIBUTION_PATH,
            [("Id", distribution.info.id.clone())],
        ));

        if let Some(id) = distribution.info.edge_identity_ids.first()
            && self.adoptable(Some(&edge_identity(id)))
        {
            self.push(ImportRecord::for_construct(
                ResourceKind::EdgeIdentity,
                EDGE_IDENTITY_PATH,
                [("Id", id.clone())],
            ));
        }
    }

    /// Exists and is owned by no stack
    fn adoptable(&self, resource: Option<&ResourceDescriptor>) -> bool {
        let Some(resource) = resource.filter(|r| r.kind.is_importable()) else {
            return false;
        };
        let result = classify(resource, self.membership, &self.config.pinned);
        debug!(
            kind = %resource.kind,
            resource_id = %resource.label(),
            managed = result.managed,
            reason = %result.reason,
            "Import candidate"
        );
        !result.managed
    }

    fn push(&mut self, record: Option<ImportRecord>) {
        let Some(record) = record else {
            return;
        };
        if self.seen.insert(record.logical_resource_id.clone()) {
            info!(
                resource_type = %record.resource_type,
                logical_id = %record.logical_resource_id,
                "Import record"
            );
            self.records.push(record);
        }
    }
}
