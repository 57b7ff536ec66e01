//! Dependency detacher
//!
//! Severs the live references that make a delete fail. Every detach is
//! idempotent: it re-reads the blocking resource first and reports
//! [`DetachOutcome::AlreadyDetached`] when the reference is gone. Failures
//! are logged and reported as [`DetachOutcome::NotDetached`] so the caller
//! skips the dependent deletion this run.

use crate::aws::error::classify_anyhow_error;
use crate::aws::models::DistributionEdit;
use crate::aws::{AuthOperations, CdnOperations, CloudApi};
use crate::resource::ResourceDescriptor;
use crate::teardown::DistributionTeardown;
use crate::wait::{WaitConfig, wait_for_resource};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// How the blocking resource references the blocked one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Distribution serves the certificate
    ViewerCertificate,
    /// Hosted auth domain is bound to the certificate
    DomainCertificate,
    /// Distribution reads its origin through the edge identity
    OriginAccess,
}

impl Relationship {
    pub fn as_str(self) -> &'static str {
        match self {
            Relationship::ViewerCertificate => "viewer_certificate",
            Relationship::DomainCertificate => "domain_certificate",
            Relationship::OriginAccess => "origin_access",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `blocking` holds a reference that prevents deleting `blocked`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub blocking: ResourceDescriptor,
    pub blocked: ResourceDescriptor,
    pub relationship: Relationship,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachOutcome {
    Detached,
    AlreadyDetached,
    NotDetached(String),
}

impl DetachOutcome {
    /// Whether the blocked resource is free to delete
    pub fn is_clear(&self) -> bool {
        !matches!(self, DetachOutcome::NotDetached(_))
    }
}

pub struct Detacher<'a, C: CloudApi> {
    cloud: &'a C,
    wait: &'a WaitConfig,
    max_attempts: u32,
}

impl<'a, C: CloudApi> Detacher<'a, C> {
    pub fn new(cloud: &'a C, wait: &'a WaitConfig, max_attempts: u32) -> Self {
        Self {
            cloud,
            wait,
            max_attempts,
        }
    }

    /// Sever one dependency edge
    pub async fn detach(&self, edge: &DependencyEdge) -> DetachOutcome {
        let result = match edge.relationship {
            Relationship::DomainCertificate => self.detach_domain_certificate(edge).await,
            Relationship::ViewerCertificate => self.detach_viewer_certificate(edge).await,
            Relationship::OriginAccess => self.tear_down(&edge.blocking).await,
        };

        match result {
            Ok(outcome) => {
                info!(
                    relationship = %edge.relationship,
                    blocking = %edge.blocking.label(),
                    blocked = %edge.blocked.label(),
                    outcome = ?outcome,
                    "Detached dependency"
                );
                outcome
            }
            Err(e) => {
                warn!(
                    relationship = %edge.relationship,
                    blocking = %edge.blocking.label(),
                    blocked = %edge.blocked.label(),
                    category = classify_anyhow_error(&e).category(),
                    error = ?e,
                    "Failed to detach dependency"
                );
                DetachOutcome::NotDetached(format!("{e:#}"))
            }
        }
    }

    /// Disable, confirm deployed and delete a distribution
    pub async fn tear_down_distribution(&self, distribution: &ResourceDescriptor) -> DetachOutcome {
        match self.tear_down(distribution).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(distribution = %distribution.physical_id, error = ?e, "Distribution teardown failed");
                DetachOutcome::NotDetached(format!("{e:#}"))
            }
        }
    }

    async fn tear_down(&self, distribution: &ResourceDescriptor) -> Result<DetachOutcome> {
        let report = DistributionTeardown::new(self.cloud.cdn(), self.wait, self.max_attempts)
            .run(&distribution.physical_id)
            .await?;
        Ok(if report.already_gone {
            DetachOutcome::AlreadyDetached
        } else {
            DetachOutcome::Detached
        })
    }

    /// Delete the hosted domain bound to the certificate and wait until it
    /// is gone
    async fn detach_domain_certificate(&self, edge: &DependencyEdge) -> Result<DetachOutcome> {
        let auth = self.cloud.auth();
        let domain = edge.blocking.physical_id.as_str();

        let Some(current) = auth.describe_domain(domain).await? else {
            return Ok(DetachOutcome::AlreadyDetached);
        };
        if current.certificate_arn.as_deref() != Some(edge.blocked.physical_id.as_str()) {
            return Ok(DetachOutcome::AlreadyDetached);
        }

        auth.delete_domain(domain, &current.user_pool_id).await?;
        wait_for_resource(
            self.wait,
            || async { Ok(auth.describe_domain(domain).await?.is_none()) },
            "hosted domain deletion",
        )
        .await?;
        Ok(DetachOutcome::Detached)
    }

    /// Point the distribution at the default certificate, retrying a stale
    /// ETag once, then wait for the change to deploy
    async fn detach_viewer_certificate(&self, edge: &DependencyEdge) -> Result<DetachOutcome> {
        let cdn = self.cloud.cdn();
        let id = edge.blocking.physical_id.as_str();

        let Some(current) = cdn.get_distribution(id).await? else {
            return Ok(DetachOutcome::AlreadyDetached);
        };
        if current.certificate_arn.as_deref() != Some(edge.blocked.physical_id.as_str()) {
            return Ok(DetachOutcome::AlreadyDetached);
        }

        if let Err(e) = cdn
            .edit_distribution(id, DistributionEdit::UseDefaultCertificate)
            .await
        {
            if !classify_anyhow_error(&e).is_conflict() {
                return Err(e);
            }
            info!(distribution = %id, "Distribution changed concurrently, re-reading once");
            cdn.edit_distribution(id, DistributionEdit::UseDefaultCertificate)
                .await
                .context("Retry after stale ETag failed")?;
        }

        wait_for_resource(
            self.wait,
            || async {
                let current = cdn.get_distribution(id).await?;
                Ok(current.is_none_or(|d| d.is_deployed()))
            },
            "distribution deployment",
        )
        .await?;
        Ok(DetachOutcome::Detached)
    }
}
