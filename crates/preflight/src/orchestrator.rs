//! Entry points for one reconciliation run
//!
//! Every run rebuilds stack membership first, then either cleans orphans,
//! generates the import manifest, or reports what it would act on.

use crate::aws::CloudApi;
use crate::classifier::{ClassificationResult, classify};
use crate::cleaner::{Cleaner, CleanupReport};
use crate::config::ReconcileConfig;
use crate::import::ImportGenerator;
use crate::locator::Locator;
use crate::membership::{Membership, build_membership};
use crate::resource::ResourceDescriptor;
use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use preflight_common::import_record::manifest_json;
use preflight_common::{ImportRecord, ResourceKind};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// One located resource with its classification
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    #[serde(flatten)]
    pub descriptor: ResourceDescriptor,
    #[serde(flatten)]
    pub classification: ClassificationResult,
}

pub struct Orchestrator<C: CloudApi> {
    cloud: C,
    config: ReconcileConfig,
}

impl<C: CloudApi> Orchestrator<C> {
    pub fn new(cloud: C, config: ReconcileConfig) -> Self {
        Self { cloud, config }
    }

    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    async fn membership(&self) -> Membership {
        build_membership(self.cloud.stacks(), self.config.stack_name()).await
    }

    /// Delete orphans. Never fails; failures are logged and tallied.
    pub async fn cleanup(&self) -> CleanupReport {
        let membership = self.membership().await;
        Cleaner::new(&self.cloud, &self.config, &membership)
            .run()
            .await
    }

    /// Import records for this run, `None` when nothing needs importing
    pub async fn import_records(&self) -> Option<Vec<ImportRecord>> {
        let membership = self.membership().await;
        ImportGenerator::new(&self.cloud, &self.config, &membership)
            .generate()
            .await
    }

    /// Write the import manifest to the configured path.
    ///
    /// Returns the path written, or `None` when nothing needs importing (in
    /// which case no file is written).
    pub async fn import_manifest(&self) -> Result<Option<PathBuf>> {
        let Some(records) = self.import_records().await else {
            return Ok(None);
        };
        let path = PathBuf::from(&self.config.manifest_path);
        write_manifest(&path, &records)?;
        info!(path = %path.display(), records = records.len(), "Wrote import manifest");
        Ok(Some(path))
    }

    /// Every resource the engine would consider, with its classification
    pub async fn scan(&self) -> Vec<ScanEntry> {
        let membership = self.membership().await;
        let naming = self.config.naming();
        let locator = Locator::new(&self.cloud);
        let mut found: Vec<ResourceDescriptor> = Vec::new();

        let domains = naming.deploy_domains();
        found.extend(
            locator
                .certificates_for(naming.base_domain(), &domains)
                .await
                .into_iter()
                .map(|c| c.descriptor),
        );
        if let Some(zone) = locator.hosted_zone(naming.base_domain()).await {
            found.extend(
                locator
                    .validation_records(&zone, &domains)
                    .await
                    .into_iter()
                    .map(|r| r.descriptor),
            );
        }
        if let Some(domain) = locator.auth_domain(&naming.login_domain()).await {
            found.push(domain.descriptor);
        }
        found.extend(locator.graph_api(&naming.api_name()).await);
        if let Some(domain) = locator.graph_domain(&naming.api_domain()).await {
            found.push(domain.descriptor);
        }

        let site_domain = naming.site_domain();
        let static_bucket = naming.static_bucket();
        found.extend(
            locator
                .distributions(&site_domain, &static_bucket)
                .await
                .into_iter()
                .map(|d| d.descriptor),
        );
        found.extend(
            locator
                .edge_identities_mentioning(&[site_domain, static_bucket.clone()])
                .await,
        );

        for name in naming.table_names() {
            found.extend(locator.table(&name).await);
        }
        for name in [static_bucket, naming.exports_bucket()] {
            found.extend(locator.bucket(&name).await);
        }
        found.extend(locator.user_pool(&naming.user_pool_name()).await);
        if let Some(id) = &self.config.pinned.user_pool_id
            && !found
                .iter()
                .any(|r| r.kind == ResourceKind::UserPool && &r.physical_id == id)
        {
            found.extend(locator.user_pool_by_id(id).await);
        }

        found.sort_by_key(|r| (r.kind.cleanup_priority(), r.kind, r.physical_id.clone()));
        found
            .into_iter()
            .map(|descriptor| {
                let classification = classify(&descriptor, &membership, &self.config.pinned);
                ScanEntry {
                    descriptor,
                    classification,
                }
            })
            .collect()
    }
}

/// Write the manifest file, creating parent directories
pub fn write_manifest(path: &Path, records: &[ImportRecord]) -> Result<()> {
    let body = manifest_json(records).context("Failed to serialize import manifest")?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Render scan entries as a terminal table
pub fn scan_table(entries: &[ScanEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Kind"),
            Cell::new("ID"),
            Cell::new("Managed"),
            Cell::new("Reason"),
            Cell::new("Created"),
        ]);

    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.descriptor.kind.as_str()),
            Cell::new(entry.descriptor.label()),
            Cell::new(if entry.classification.managed { "yes" } else { "no" }),
            Cell::new(entry.classification.reason.as_str()),
            Cell::new(
                entry
                    .descriptor
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Reason;

    fn entry(kind: ResourceKind, id: &str, managed: bool, reason: Reason) -> ScanEntry {
        ScanEntry {
            descriptor: ResourceDescriptor::new(kind, id),
            classification: ClassificationResult { managed, reason },
        }
    }

    #[test]
    fn scan_table_has_a_row_per_entry() {
        let entries = vec![
            entry(ResourceKind::Table, "kernelworx-accounts-ue1-dev", true, Reason::InStack),
            entry(ResourceKind::GraphApi, "api123", false, Reason::NotFound),
        ];

        let table = scan_table(&entries);
        assert_eq!(table.row_iter().count(), 2);

        let rendered = table.to_string();
        assert!(rendered.contains("kernelworx-accounts-ue1-dev"));
        assert!(rendered.contains(Reason::InStack.as_str()));
        assert!(rendered.contains(Reason::NotFound.as_str()));
    }
}
