//! Polling with exponential backoff and an overall timeout.
//!
//! Used for every asynchronous transition the engine waits on: hosted domain
//! deletion propagating, distributions reaching `Deployed`, distributions
//! disappearing after deletion.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for resource waiting with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
    /// Jitter factor (0.0 - 1.0) to add randomness to delays
    pub jitter: f64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

/// Wait for a condition with exponential backoff.
///
/// `check` returns `Ok(true)` when the condition holds and `Ok(false)` to
/// poll again. A check error ends the wait immediately.
///
/// # Example
/// ```ignore
/// wait_for_resource(
///     &WaitConfig::default(),
///     || async { Ok(cdn.get_distribution(id).await?.is_none()) },
///     "distribution deletion",
/// ).await?;
/// ```
pub async fn wait_for_resource<F, Fut>(config: &WaitConfig, check: F, resource_name: &str) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .without_max_times();
    if config.jitter > 0.0 {
        backoff = backoff.with_jitter();
    }
    let mut delays = backoff.build();

    loop {
        attempts += 1;

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(false) => {
                if start.elapsed() >= config.timeout {
                    anyhow::bail!(
                        "Timeout waiting for {} after {:?} ({} attempts)",
                        resource_name,
                        config.timeout,
                        attempts
                    );
                }

                let remaining = config.timeout.saturating_sub(start.elapsed());
                let delay = delays.next().unwrap_or(config.max_delay).min(remaining);
                debug!(
                    resource = %resource_name,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Resource not ready, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Resource check failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast() -> WaitConfig {
        WaitConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            timeout: Duration::from_millis(200),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn returns_once_ready() {
        let polls = Cell::new(0);
        let result = wait_for_resource(
            &fast(),
            || {
                polls.set(polls.get() + 1);
                let ready = polls.get() >= 3;
                async move { Ok(ready) }
            },
            "test",
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(polls.get(), 3);
    }

    #[tokio::test]
    async fn times_out() {
        let config = WaitConfig {
            timeout: Duration::from_millis(20),
            ..fast()
        };
        let err = wait_for_resource(&config, || async { Ok(false) }, "never")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timeout waiting for never"));
    }

    #[tokio::test]
    async fn check_error_stops_polling() {
        let polls = Cell::new(0);
        let result = wait_for_resource(
            &fast(),
            || {
                polls.set(polls.get() + 1);
                async { Err(anyhow::anyhow!("access denied")) }
            },
            "failing",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(polls.get(), 1);
    }
}
