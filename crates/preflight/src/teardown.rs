//! Distribution teardown state machine
//!
//! ```text
//! Found -> Disabling -> Disabled -> Deployed -> Deleting -> Deleted
//!   \________________________/ (already disabled)
//! ```
//!
//! Writes (disable, delete) get a bounded number of attempts; waits (for
//! `Deployed`, for the distribution to disappear) share one overall
//! deadline taken from the caller's [`WaitConfig`].

use crate::aws::CdnOperations;
use crate::aws::error::classify_anyhow_error;
use crate::aws::models::DistributionEdit;
use crate::wait::{WaitConfig, wait_for_resource};
use backon::{ExponentialBuilder, Retryable};
use std::fmt;
use std::future::Future;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownState {
    /// Located, state not yet read
    Found,
    /// Disable requested
    Disabling,
    /// Disabled, change still propagating
    Disabled,
    /// Disabled and deployed everywhere; safe to delete
    Deployed,
    /// Delete requested
    Deleting,
    Deleted,
}

impl TeardownState {
    pub fn as_str(self) -> &'static str {
        match self {
            TeardownState::Found => "found",
            TeardownState::Disabling => "disabling",
            TeardownState::Disabled => "disabled",
            TeardownState::Deployed => "deployed",
            TeardownState::Deleting => "deleting",
            TeardownState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for TeardownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Teardown of distribution {distribution_id} stopped while {state}")]
pub struct TeardownError {
    pub distribution_id: String,
    pub state: TeardownState,
    #[source]
    pub source: anyhow::Error,
}

/// States a finished teardown passed through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub distribution_id: String,
    pub transitions: Vec<TeardownState>,
    /// The distribution was gone before anything was changed
    pub already_gone: bool,
}

pub struct DistributionTeardown<'a, D: CdnOperations> {
    cdn: &'a D,
    wait: &'a WaitConfig,
    max_attempts: u32,
}

impl<'a, D: CdnOperations> DistributionTeardown<'a, D> {
    pub fn new(cdn: &'a D, wait: &'a WaitConfig, max_attempts: u32) -> Self {
        Self {
            cdn,
            wait,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Drive one distribution to `Deleted`
    pub async fn run(&self, id: &str) -> Result<TeardownReport, TeardownError> {
        let started = Instant::now();
        let mut state = TeardownState::Found;
        let mut transitions = vec![state];

        loop {
            let next = match state {
                TeardownState::Found => {
                    match self.cdn.get_distribution(id).await {
                        Ok(None) => {
                            info!(distribution = %id, "Distribution already deleted");
                            return Ok(TeardownReport {
                                distribution_id: id.to_string(),
                                transitions,
                                already_gone: true,
                            });
                        }
                        Ok(Some(current)) if current.enabled => TeardownState::Disabling,
                        Ok(Some(_)) => TeardownState::Disabled,
                        Err(e) => return Err(fail(id, state, e)),
                    }
                }
                TeardownState::Disabling => {
                    self.attempt(id, state, || {
                        self.cdn.edit_distribution(id, DistributionEdit::Disable)
                    })
                    .await?;
                    TeardownState::Disabled
                }
                TeardownState::Disabled => {
                    wait_for_resource(
                        &self.remaining(started),
                        || async {
                            let current = self.cdn.get_distribution(id).await?;
                            Ok(current.is_none_or(|d| d.is_deployed() && !d.enabled))
                        },
                        "distribution deployment",
                    )
                    .await
                    .map_err(|e| fail(id, state, e))?;
                    TeardownState::Deployed
                }
                TeardownState::Deployed => {
                    self.attempt(id, state, || self.cdn.delete_distribution(id))
                        .await?;
                    TeardownState::Deleting
                }
                TeardownState::Deleting => {
                    wait_for_resource(
                        &self.remaining(started),
                        || async { Ok(self.cdn.get_distribution(id).await?.is_none()) },
                        "distribution deletion",
                    )
                    .await
                    .map_err(|e| fail(id, state, e))?;
                    TeardownState::Deleted
                }
                TeardownState::Deleted => break,
            };

            info!(distribution = %id, from = %state, to = %next, "Distribution teardown transition");
            state = next;
            transitions.push(state);
        }

        Ok(TeardownReport {
            distribution_id: id.to_string(),
            transitions,
            already_gone: false,
        })
    }

    /// Wait budget left before the overall deadline
    fn remaining(&self, started: Instant) -> WaitConfig {
        WaitConfig {
            timeout: self.wait.timeout.saturating_sub(started.elapsed()),
            ..self.wait.clone()
        }
    }

    /// Run a write, retrying stale ETags, in-use and throttling errors
    async fn attempt<F, Fut>(&self, id: &str, state: TeardownState, op: F) -> Result<(), TeardownError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        op.retry(
            ExponentialBuilder::default()
                .with_min_delay(self.wait.initial_delay)
                .with_max_delay(self.wait.max_delay)
                .with_max_times(self.max_attempts.saturating_sub(1) as usize),
        )
        .when(|e| {
            let error = classify_anyhow_error(e);
            error.is_conflict() || error.is_in_use() || error.is_retryable()
        })
        .notify(|e, delay| {
            warn!(
                distribution = %id,
                state = %state,
                delay = ?delay,
                error = %e,
                "Teardown step failed, retrying..."
            );
        })
        .await
        .map_err(|e| fail(id, state, e))
    }
}

fn fail(id: &str, state: TeardownState, source: anyhow::Error) -> TeardownError {
    TeardownError {
        distribution_id: id.to_string(),
        state,
        source,
    }
}
