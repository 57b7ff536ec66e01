//! CloudFront distribution and origin access identity operations
//!
//! Every mutation needs the resource's current ETag. Edits read the config
//! and ETag together and write back with `If-Match`; a stale ETag surfaces as
//! [`AwsError::ConcurrencyConflict`](super::error::AwsError).

use super::context::{AwsContext, FromAwsContext};
use super::error::{ignore_not_found, retry_throttled, sdk_error};
use super::models::{DistributionEdit, DistributionInfo, EdgeIdentityInfo};
use super::tags::extract_tags;
use anyhow::{Context, Result};
use aws_sdk_cloudfront::Client;
use aws_sdk_cloudfront::types::{Aliases, Origins, ViewerCertificate};
use std::collections::HashMap;
use std::future::Future;
use tracing::debug;

pub trait CdnOperations: Send + Sync {
    fn list_distributions(&self) -> impl Future<Output = Result<Vec<DistributionInfo>>> + Send;

    /// Fetch current distribution state, `None` once it is deleted
    fn get_distribution(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<DistributionInfo>>> + Send;

    /// Apply an edit with an ETag-guarded write
    fn edit_distribution(
        &self,
        id: &str,
        edit: DistributionEdit,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a disabled, deployed distribution
    fn delete_distribution(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn distribution_tags(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send;

    fn list_edge_identities(&self)
    -> impl Future<Output = Result<Vec<EdgeIdentityInfo>>> + Send;

    /// Delete an origin access identity no distribution uses any more
    fn delete_edge_identity(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

pub struct CloudFrontClient {
    client: Client,
}

impl FromAwsContext for CloudFrontClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudfront_client(),
        }
    }
}

/// `origin-access-identity/cloudfront/E2QWRUHAPOMQZL` -> `E2QWRUHAPOMQZL`
pub(crate) fn edge_identity_id(reference: &str) -> Option<&str> {
    reference
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty() && reference.starts_with("origin-access-identity/"))
}

fn origin_parts(origins: Option<&Origins>) -> (Vec<String>, Vec<String>) {
    let mut domains = Vec::new();
    let mut identities = Vec::new();
    for origin in origins.map(|o| o.items()).unwrap_or_default() {
        domains.push(origin.domain_name().to_string());
        if let Some(id) = origin
            .s3_origin_config()
            .and_then(|c| edge_identity_id(c.origin_access_identity()))
            && !identities.iter().any(|known| known == id)
        {
            identities.push(id.to_string());
        }
    }
    (domains, identities)
}

fn alias_list(aliases: Option<&Aliases>) -> Vec<String> {
    aliases.map(|a| a.items().to_vec()).unwrap_or_default()
}

fn certificate_of(viewer: Option<&ViewerCertificate>) -> Option<String> {
    viewer
        .and_then(|v| v.acm_certificate_arn())
        .map(str::to_string)
}

impl CdnOperations for CloudFrontClient {
    async fn list_distributions(&self) -> Result<Vec<DistributionInfo>> {
        let mut distributions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list distributions")?;

            let Some(list) = response.distribution_list() else {
                break;
            };
            for summary in list.items() {
                let (origin_domains, edge_identity_ids) = origin_parts(summary.origins());
                distributions.push(DistributionInfo {
                    id: summary.id().to_string(),
                    arn: summary.arn().to_string(),
                    status: summary.status().to_string(),
                    enabled: summary.enabled(),
                    aliases: alias_list(summary.aliases()),
                    origin_domains,
                    edge_identity_ids,
                    certificate_arn: certificate_of(summary.viewer_certificate()),
                });
            }

            if !list.is_truncated() {
                break;
            }
            marker = list.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        debug!(count = distributions.len(), "Listed distributions");
        Ok(distributions)
    }

    async fn get_distribution(&self, id: &str) -> Result<Option<DistributionInfo>> {
        let result = retry_throttled("cloudfront:GetDistribution", || async move {
            self.client
                .get_distribution()
                .id(id)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        let Some(response) = ignore_not_found(result).context("Failed to get distribution")?
        else {
            return Ok(None);
        };
        let Some(distribution) = response.distribution() else {
            return Ok(None);
        };

        let config = distribution.distribution_config();
        let (origin_domains, edge_identity_ids) = origin_parts(config.and_then(|c| c.origins()));
        Ok(Some(DistributionInfo {
            id: distribution.id().to_string(),
            arn: distribution.arn().to_string(),
            status: distribution.status().to_string(),
            enabled: config.is_some_and(|c| c.enabled()),
            aliases: alias_list(config.and_then(|c| c.aliases())),
            origin_domains,
            edge_identity_ids,
            certificate_arn: certificate_of(config.and_then(|c| c.viewer_certificate())),
        }))
    }

    async fn edit_distribution(&self, id: &str, edit: DistributionEdit) -> Result<()> {
        let response = self
            .client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(sdk_error)
            .context("Failed to get distribution config")?;

        let etag = response
            .e_tag()
            .context("Distribution config has no ETag")?
            .to_string();
        let mut config = response
            .distribution_config()
            .cloned()
            .context("Distribution config missing from response")?;

        match edit {
            DistributionEdit::UseDefaultCertificate => {
                config.viewer_certificate = Some(
                    ViewerCertificate::builder()
                        .cloud_front_default_certificate(true)
                        .build(),
                );
                // The default certificate cannot serve custom aliases
                config.aliases = Some(
                    Aliases::builder()
                        .quantity(0)
                        .build()
                        .context("Invalid alias list")?,
                );
            }
            DistributionEdit::Disable => config.enabled = false,
        }

        self.client
            .update_distribution()
            .id(id)
            .if_match(etag)
            .distribution_config(config)
            .send()
            .await
            .map_err(sdk_error)
            .context("Failed to update distribution")?;

        debug!(distribution = %id, ?edit, "Distribution updated");
        Ok(())
    }

    async fn delete_distribution(&self, id: &str) -> Result<()> {
        let current = self
            .client
            .get_distribution()
            .id(id)
            .send()
            .await
            .map_err(sdk_error);
        let Some(current) = ignore_not_found(current).context("Failed to get distribution")?
        else {
            debug!(distribution = %id, "Distribution already deleted");
            return Ok(());
        };
        let etag = current
            .e_tag()
            .context("Distribution has no ETag")?
            .to_string();

        let result = self
            .client
            .delete_distribution()
            .id(id)
            .if_match(etag)
            .send()
            .await
            .map_err(sdk_error);
        ignore_not_found(result).context("Failed to delete distribution")?;
        Ok(())
    }

    async fn distribution_tags(&self, arn: &str) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .list_tags_for_resource()
            .resource(arn)
            .send()
            .await
            .map_err(sdk_error)
            .context("Failed to list distribution tags")?;

        let items = response.tags().map(|t| t.items()).unwrap_or_default();
        Ok(extract_tags(items, |t| Some(t.key()), |t| t.value()))
    }

    async fn list_edge_identities(&self) -> Result<Vec<EdgeIdentityInfo>> {
        let mut identities = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_cloud_front_origin_access_identities()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list origin access identities")?;

            let Some(list) = response.cloud_front_origin_access_identity_list() else {
                break;
            };
            for summary in list.items() {
                identities.push(EdgeIdentityInfo {
                    id: summary.id().to_string(),
                    comment: summary.comment().to_string(),
                });
            }

            if !list.is_truncated() {
                break;
            }
            marker = list.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        Ok(identities)
    }

    async fn delete_edge_identity(&self, id: &str) -> Result<()> {
        let current = self
            .client
            .get_cloud_front_origin_access_identity()
            .id(id)
            .send()
            .await
            .map_err(sdk_error);
        let Some(current) =
            ignore_not_found(current).context("Failed to get origin access identity")?
        else {
            debug!(identity = %id, "Origin access identity already deleted");
            return Ok(());
        };
        let etag = current
            .e_tag()
            .context("Origin access identity has no ETag")?
            .to_string();

        let result = self
            .client
            .delete_cloud_front_origin_access_identity()
            .id(id)
            .if_match(etag)
            .send()
            .await
            .map_err(sdk_error);
        ignore_not_found(result).context("Failed to delete origin access identity")?;
        Ok(())
    }
}
