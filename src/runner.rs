//! Per-kind driver.
//!
//! A [`PurgeRunner`] takes one [`ResourceKind`](crate::kinds::ResourceKind)
//! through `WAITING_PREREQ → LISTING → ITERATING → DONE`, or `FAILED`.
//!
//! - The prerequisite is polled with exponential backoff up to a deadline.
//!   Dry runs and runs restricted to explicit kinds skip this step.
//! - Deletes are retried a fixed number of times at a fixed interval. A
//!   resource that is already gone counts as deleted.
//! - Every sleep races the shared cancellation token, and the token is
//!   checked before each resource, so a runner stops within one interval of
//!   another runner failing.
//!
//! A runner that fails cancels the shared token itself. A runner that stops
//! because the token was cancelled reports `Cancelled`, not a failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_channel::Sender;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::kinds::Kind;
use crate::types::error::{
    PurgeError, is_cancelled_error, is_endpoint_not_found_error, is_not_found_error,
};
use crate::types::token::PurgeCancellationToken;
use crate::types::{PurgeStatistics, Resource};

/// Terminal state of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindStatus {
    Completed,
    /// The service backing the kind is not in the catalog.
    Unavailable,
    /// Stopped because the shared token was cancelled.
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindOutcome {
    pub kind: String,
    pub order: i32,
    pub status: KindStatus,
    /// Deletes given up on without failing the kind (explicit selection only).
    pub failed_deletions: u64,
}

impl KindOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, KindStatus::Failed(_))
    }
}

pub struct PurgeRunner {
    kind: Kind,
    config: Config,
    cancellation_token: PurgeCancellationToken,
    stats_sender: Sender<PurgeStatistics>,
    failed_deletions: AtomicU64,
}

impl PurgeRunner {
    pub fn new(
        kind: Kind,
        config: Config,
        cancellation_token: PurgeCancellationToken,
        stats_sender: Sender<PurgeStatistics>,
    ) -> Self {
        Self {
            kind,
            config,
            cancellation_token,
            stats_sender,
            failed_deletions: AtomicU64::new(0),
        }
    }

    /// Purge the kind and report how it ended.
    ///
    /// Never returns an error: failures are turned into
    /// [`KindStatus::Failed`] after cancelling the shared token.
    pub async fn run(self) -> KindOutcome {
        let kind = self.kind.name().to_string();
        let order = self.kind.order();
        debug!(kind = %kind, order = order, "purge runner started.");

        let status = match self.purge().await {
            Ok(()) => {
                info!(kind = %kind, "purge of resource kind has been completed.");
                KindStatus::Completed
            }
            Err(e) if is_cancelled_error(&e) => {
                info!(kind = %kind, "purge of resource kind has been cancelled.");
                KindStatus::Cancelled
            }
            Err(e) if is_endpoint_not_found_error(&e) => {
                info!(
                    kind = %kind,
                    error = %e,
                    "service of resource kind is not available, skipping."
                );
                KindStatus::Unavailable
            }
            Err(e) => {
                self.cancellation_token.cancel();
                let message = format!("{e:#}");
                error!(kind = %kind, error = %message, "purge of resource kind failed.");
                KindStatus::Failed(message)
            }
        };

        KindOutcome {
            kind,
            order,
            status,
            failed_deletions: self.failed_deletions.load(Ordering::SeqCst),
        }
    }

    async fn purge(&self) -> Result<()> {
        if self.config.dry_run || self.config.is_explicit_kind_selection() {
            debug!(kind = self.kind.name(), "skipping prerequisite check.");
        } else {
            self.wait_for_prerequisite().await?;
        }

        self.check_cancelled()?;
        let resources = self.unless_cancelled(self.kind.list()).await?;
        debug!(
            kind = self.kind.name(),
            count = resources.len(),
            "resources have been listed."
        );

        for resource in resources {
            self.check_cancelled()?;
            self.process_resource(&resource).await?;
        }

        Ok(())
    }

    async fn process_resource(&self, resource: &Resource) -> Result<()> {
        let description = self.kind.to_str(resource);

        if !self.unless_cancelled(self.kind.should_delete(resource)).await? {
            debug!(
                kind = self.kind.name(),
                resource = %description,
                "resource is not owned by the purged project, skipping."
            );
            self.send_stats(PurgeStatistics::DeleteSkip {
                kind: self.kind.name().to_string(),
                description,
            })
            .await;
            return Ok(());
        }

        if self.config.dry_run {
            info!(
                kind = self.kind.name(),
                resource = %description,
                "[dry-run] resource would be deleted."
            );
            self.send_stats(PurgeStatistics::DryRunListed {
                order: self.kind.order(),
                kind: self.kind.name().to_string(),
                description,
            })
            .await;
            return Ok(());
        }

        match self.delete_with_retry(resource, &description).await {
            Err(e)
                if self.config.is_explicit_kind_selection()
                    && e.downcast_ref::<PurgeError>().is_some_and(|e| {
                        matches!(e, PurgeError::DeletionFailed { .. })
                    }) =>
            {
                warn!(
                    kind = self.kind.name(),
                    resource = %description,
                    error = %e,
                    "deletion failed, continuing since only explicit resource kinds were requested."
                );
                self.failed_deletions.fetch_add(1, Ordering::SeqCst);
                self.send_stats(PurgeStatistics::DeleteError {
                    kind: self.kind.name().to_string(),
                    description,
                })
                .await;
                Ok(())
            }
            result => result,
        }
    }

    async fn delete_with_retry(&self, resource: &Resource, description: &str) -> Result<()> {
        let retry_config = &self.config.delete_retry_config;
        let interval = Duration::from_millis(retry_config.interval_milliseconds);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.unless_cancelled(self.kind.delete(resource)).await {
                Err(e) if is_cancelled_error(&e) => return Err(e),
                Ok(()) => {
                    info!(
                        kind = self.kind.name(),
                        resource = description,
                        "resource has been deleted."
                    );
                    self.send_stats(PurgeStatistics::DeleteComplete {
                        kind: self.kind.name().to_string(),
                        description: description.to_string(),
                    })
                    .await;
                    return Ok(());
                }
                Err(e) if is_not_found_error(&e) => {
                    warn!(
                        kind = self.kind.name(),
                        resource = description,
                        "resource has already been deleted."
                    );
                    self.send_stats(PurgeStatistics::DeleteAbsent {
                        kind: self.kind.name().to_string(),
                        description: description.to_string(),
                    })
                    .await;
                    return Ok(());
                }
                Err(e) if attempt >= retry_config.max_attempts => {
                    return Err(PurgeError::DeletionFailed {
                        kind: self.kind.name().to_string(),
                        attempts: attempt,
                        message: format!("{description}: {e:#}"),
                    }
                    .into());
                }
                Err(e) => {
                    warn!(
                        kind = self.kind.name(),
                        resource = description,
                        attempt = attempt,
                        max_attempts = retry_config.max_attempts,
                        error = %e,
                        "deletion failed, retrying."
                    );
                    self.sleep_unless_cancelled(interval).await?;
                }
            }
        }
    }

    async fn wait_for_prerequisite(&self) -> Result<()> {
        let prerequisite_config = &self.config.prerequisite_config;
        let timeout = Duration::from_millis(prerequisite_config.timeout_milliseconds);
        let max_interval = Duration::from_millis(prerequisite_config.max_interval_milliseconds);
        let mut interval = Duration::from_millis(prerequisite_config.initial_interval_milliseconds);
        let deadline = Instant::now() + timeout;

        loop {
            self.check_cancelled()?;
            if self.unless_cancelled(self.kind.check_prerequisite()).await? {
                debug!(kind = self.kind.name(), "prerequisite has been met.");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PurgeError::PrerequisiteTimeout {
                    kind: self.kind.name().to_string(),
                    timeout_secs: timeout.as_secs(),
                }
                .into());
            }

            info!(
                kind = self.kind.name(),
                wait_milliseconds = interval.as_millis() as u64,
                "prerequisite not met yet, waiting."
            );
            self.sleep_unless_cancelled(interval.min(deadline - now))
                .await?;
            interval = (interval * 2).min(max_interval);
        }
    }

    async fn sleep_unless_cancelled(&self, duration: Duration) -> Result<()> {
        self.unless_cancelled(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    /// Drive a call into the kind, dropping it as soon as the shared token is
    /// cancelled.
    async fn unless_cancelled<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => Err(PurgeError::Cancelled.into()),
            result = future => result,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PurgeError::Cancelled.into());
        }
        Ok(())
    }

    async fn send_stats(&self, stats: PurgeStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}
