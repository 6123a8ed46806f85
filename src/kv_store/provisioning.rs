//! Idempotent table provisioning with bounded, cancellable waits.

use super::{BillingMode, KeyValueStore, TableSchema, TableStatus};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Table {table} did not reach {goal} within {timeout:?}")]
    Timeout {
        table: String,
        goal: &'static str,
        timeout: Duration,
    },

    #[error("Table {table} did not reach {goal} after {attempts} attempts")]
    AttemptsExhausted {
        table: String,
        goal: &'static str,
        attempts: u32,
    },

    #[error("Provisioning of table {0} was cancelled")]
    Cancelled(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Bounds for the waits performed while a new table comes up.
///
/// Each wait makes at most `max_attempts` attempts, `poll_interval` apart,
/// and gives up once `timeout` has elapsed since the wait started.
#[derive(Debug, Clone)]
pub struct ProvisioningPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 60,
            timeout: Duration::from_secs(600),
        }
    }
}

impl ProvisioningPolicy {
    /// Calls `attempt` until it returns `Ok(true)`. Errors from `attempt` are
    /// treated as transient and retried like `Ok(false)`.
    pub async fn retry_until<F>(
        &self,
        table: &str,
        goal: &'static str,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<(), ProvisioningError>
    where
        F: FnMut() -> anyhow::Result<bool>,
    {
        let deadline = Instant::now() + self.timeout;
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ProvisioningError::Cancelled(table.to_owned()));
            }

            attempts += 1;
            match attempt() {
                Ok(true) => {
                    debug!("Table {} reached {} after {} attempts", table, goal, attempts);
                    return Ok(());
                }
                Ok(false) => debug!("Table {} not yet at {} (attempt {})", table, goal, attempts),
                Err(err) => debug!(
                    "Transient failure waiting for {} on table {}: {:#}",
                    goal, table, err
                ),
            }

            if attempts >= max_attempts {
                return Err(ProvisioningError::AttemptsExhausted {
                    table: table.to_owned(),
                    goal,
                    attempts,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ProvisioningError::Cancelled(table.to_owned()));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(ProvisioningError::Timeout {
                        table: table.to_owned(),
                        goal,
                        timeout: self.timeout,
                    });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

/// Creates the table if it does not exist yet, waits for it to become active
/// and switches it to on-demand billing.
///
/// An existing table is brought to the same state, so a run interrupted
/// between creation and the billing switch is completed by the next one.
/// Returns whether the table was created by this call.
pub async fn ensure_table(
    store: &dyn KeyValueStore,
    schema: &TableSchema,
    policy: &ProvisioningPolicy,
    cancel: &CancellationToken,
) -> Result<bool, ProvisioningError> {
    let (created, needs_activation, needs_billing) = match store.describe_table(&schema.name)? {
        Some(description) => (
            false,
            description.status != TableStatus::Active,
            description.billing_mode != BillingMode::OnDemand,
        ),
        None => {
            schema.validate()?;
            info!("Creating table {}", schema.name);
            store.create_table(schema)?;
            (true, true, true)
        }
    };

    if needs_activation {
        policy
            .retry_until(&schema.name, "active status", cancel, || {
                Ok(store
                    .describe_table(&schema.name)?
                    .is_some_and(|description| description.status == TableStatus::Active))
            })
            .await?;
    }

    if needs_billing {
        policy
            .retry_until(&schema.name, "on-demand billing", cancel, || {
                store
                    .update_billing_mode(&schema.name, BillingMode::OnDemand)
                    .map(|_| true)
            })
            .await?;
    }

    if needs_activation || needs_billing {
        info!("Table {} is active", schema.name);
    }
    Ok(created)
}
