//! Route 53 hosted-zone and record operations

use super::context::{AwsContext, FromAwsContext};
use super::error::{ignore_not_found, retry_throttled, sdk_error};
use super::models::{DnsRecord, HostedZone, same_domain};
use anyhow::{Context, Result};
use aws_sdk_route53::Client;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use std::future::Future;
use tracing::debug;

pub trait DnsOperations: Send + Sync {
    /// Find the public hosted zone named exactly `domain`
    fn find_hosted_zone(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Option<HostedZone>>> + Send;

    /// List every record set in a zone
    fn list_records(&self, zone_id: &str) -> impl Future<Output = Result<Vec<DnsRecord>>> + Send;

    /// Delete a record set. The record must match what is live.
    fn delete_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub struct Route53Client {
    client: Client,
}

impl FromAwsContext for Route53Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.route53_client(),
        }
    }
}

/// Zone ids come back as `/hostedzone/Z123`; the record APIs want `Z123`
fn bare_zone_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

impl DnsOperations for Route53Client {
    async fn find_hosted_zone(&self, domain: &str) -> Result<Option<HostedZone>> {
        let response = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(domain)
            .send()
            .await
            .map_err(sdk_error)
            .context("Failed to list hosted zones")?;

        let zone = response
            .hosted_zones()
            .iter()
            .filter(|zone| !zone.config().is_some_and(|c| c.private_zone()))
            .find(|zone| same_domain(zone.name(), domain))
            .map(|zone| HostedZone {
                id: bare_zone_id(zone.id()).to_string(),
                name: zone.name().to_string(),
            });

        Ok(zone)
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut start_name: Option<String> = None;
        let mut start_type: Option<RrType> = None;

        loop {
            let response = self
                .client
                .list_resource_record_sets()
                .hosted_zone_id(zone_id)
                .set_start_record_name(start_name.take())
                .set_start_record_type(start_type.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list record sets")?;

            for set in response.resource_record_sets() {
                records.push(DnsRecord {
                    name: set.name().to_string(),
                    record_type: set.r#type().as_str().to_string(),
                    ttl: set.ttl(),
                    values: set
                        .resource_records()
                        .iter()
                        .map(|r| r.value().to_string())
                        .collect(),
                });
            }

            if !response.is_truncated() {
                break;
            }
            start_name = response.next_record_name().map(str::to_string);
            start_type = response.next_record_type().cloned();
            if start_name.is_none() {
                break;
            }
        }

        debug!(zone = %zone_id, count = records.len(), "Listed record sets");
        Ok(records)
    }

    async fn delete_record(&self, zone_id: &str, record: &DnsRecord) -> Result<()> {
        let mut set = ResourceRecordSet::builder()
            .name(&record.name)
            .r#type(RrType::from(record.record_type.as_str()));
        if let Some(ttl) = record.ttl {
            set = set.ttl(ttl);
        }
        for value in &record.values {
            set = set.resource_records(
                ResourceRecord::builder()
                    .value(value)
                    .build()
                    .context("Invalid record value")?,
            );
        }

        let change = Change::builder()
            .action(ChangeAction::Delete)
            .resource_record_set(set.build().context("Invalid record set")?)
            .build()
            .context("Invalid record change")?;
        let batch = ChangeBatch::builder()
            .changes(change)
            .comment("Remove stale certificate validation record")
            .build()
            .context("Invalid change batch")?;

        let result = retry_throttled("route53:ChangeResourceRecordSets", || {
            let batch = batch.clone();
            async move {
                self.client
                    .change_resource_record_sets()
                    .hosted_zone_id(zone_id)
                    .change_batch(batch)
                    .send()
                    .await
                    .map_err(sdk_error)
            }
        })
        .await;

        if ignore_not_found(result)
            .context("Failed to delete record set")?
            .is_none()
        {
            debug!(record = %record.name, "Record set already deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hosted_zone_prefix() {
        assert_eq!(bare_zone_id("/hostedzone/Z0123ABC"), "Z0123ABC");
        assert_eq!(bare_zone_id("Z0123ABC"), "Z0123ABC");
    }
}
