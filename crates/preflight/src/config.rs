//! Configuration types for a reconciliation run

use crate::wait::WaitConfig;
use preflight_common::Naming;
use preflight_common::defaults::{
    DEFAULT_MANIFEST_PATH, DEFAULT_TEARDOWN_ATTEMPTS, DEFAULT_TEARDOWN_TIMEOUT_SECS,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What to do with a distribution the stack does not own
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistributionPolicy {
    /// Tear the distribution and its identity down before deploying
    #[default]
    Delete,
    /// Leave it in place and hand it to the import manifest
    Adopt,
}

impl DistributionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DistributionPolicy::Delete => "delete",
            DistributionPolicy::Adopt => "adopt",
        }
    }
}

impl fmt::Display for DistributionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(DistributionPolicy::Delete),
            "adopt" => Ok(DistributionPolicy::Adopt),
            other => Err(format!(
                "invalid distribution policy '{other}' (expected 'delete' or 'adopt')"
            )),
        }
    }
}

/// Deployment target
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub naming: Naming,
    /// Stack whose inventory decides membership
    pub stack_name: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Long-lived identifiers that must never be reconciled
#[derive(Debug, Clone, Default)]
pub struct PinnedIds {
    /// User pool kept across deployments
    pub user_pool_id: Option<String>,
}

impl PinnedIds {
    /// Whether `id` is one of the pinned identifiers
    pub fn contains(&self, id: &str) -> bool {
        !id.is_empty() && self.user_pool_id.as_deref() == Some(id)
    }
}

/// Behavior flags for the cleanup pass
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Log intended actions without mutating anything
    pub dry_run: bool,
    pub distribution_policy: DistributionPolicy,
    /// Attempts per distribution teardown transition
    pub max_attempts: u32,
    /// Polling for propagation (domain deletion, distribution deployment)
    pub wait: WaitConfig,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            distribution_policy: DistributionPolicy::default(),
            max_attempts: DEFAULT_TEARDOWN_ATTEMPTS,
            wait: WaitConfig {
                initial_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(30),
                timeout: Duration::from_secs(DEFAULT_TEARDOWN_TIMEOUT_SECS),
                jitter: 0.25,
            },
        }
    }
}

/// Configuration for one reconciliation run
///
/// Composed of focused sub-configs; flat accessors cover the fields most
/// call sites need.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub target: TargetConfig,
    pub pinned: PinnedIds,
    pub cleanup: CleanupOptions,
    /// Where the import manifest is written
    pub manifest_path: String,
}

impl ReconcileConfig {
    /// Config for `naming` with the default stack name and options
    pub fn new(naming: Naming) -> Self {
        let stack_name = naming.stack_name();
        Self {
            target: TargetConfig {
                naming,
                stack_name,
                aws_profile: None,
            },
            pinned: PinnedIds::default(),
            cleanup: CleanupOptions::default(),
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
        }
    }

    pub fn naming(&self) -> &Naming {
        &self.target.naming
    }

    pub fn stack_name(&self) -> &str {
        &self.target.stack_name
    }

    pub fn distribution_policy(&self) -> DistributionPolicy {
        self.cleanup.distribution_policy
    }
}
