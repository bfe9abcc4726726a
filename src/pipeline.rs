//! Purge scheduler.
//!
//! Kinds, sorted by order, are fed into a bounded MPMC channel consumed by
//! `worker_size` workers. Each worker drives one [`PurgeRunner`] at a time.
//! Order is not a sequencing guarantee: kinds run concurrently and each one
//! blocks on its own prerequisite until the kinds it depends on are empty.
//! A kind only ever depends on kinds with a lower order, and those are
//! dequeued first, so a waiting runner never holds up its own dependency.
//!
//! The only state shared between workers is the cancellation token. The run
//! has failed iff the token ends up cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::kinds::Kind;
use crate::runner::{KindOutcome, KindStatus, PurgeRunner};
use crate::types::PurgeStatistics;
use crate::types::token::PurgeCancellationToken;

/// Runs every kind of a purge on a bounded worker pool.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// # use ospurge_rs::{Config, KindContext, KindRegistry, PurgePipeline, create_purge_cancellation_token};
/// # let config: Config = todo!();
/// # let ctx: KindContext = todo!();
/// let kinds = KindRegistry::with_builtin_kinds().instantiate(&ctx, None)?;
/// let cancellation_token = create_purge_cancellation_token();
/// let mut pipeline = PurgePipeline::new(config, kinds, cancellation_token);
/// pipeline.run().await;
/// if pipeline.has_error() {
///     for outcome in pipeline.failures() {
///         eprintln!("{}: {:?}", outcome.kind, outcome.status);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct PurgePipeline {
    config: Config,
    kinds: Vec<Kind>,
    cancellation_token: PurgeCancellationToken,
    stats_sender: Sender<PurgeStatistics>,
    stats_receiver: Receiver<PurgeStatistics>,
    has_panic: Arc<AtomicBool>,
    outcomes: Arc<Mutex<Vec<KindOutcome>>>,
    ready: bool,
}

impl PurgePipeline {
    pub fn new(
        config: Config,
        mut kinds: Vec<Kind>,
        cancellation_token: PurgeCancellationToken,
    ) -> Self {
        kinds.sort_by_key(|kind| kind.order());
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        Self {
            config,
            kinds,
            cancellation_token,
            stats_sender,
            stats_receiver,
            has_panic: Arc::new(AtomicBool::new(false)),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            ready: true,
        }
    }

    /// Run every kind to completion, failure or cancellation.
    ///
    /// Returns once all workers have exited. The stats channel is closed on
    /// return.
    pub async fn run(&mut self) {
        assert!(self.ready, "PurgePipeline::run() called more than once");
        self.ready = false;

        let kinds = std::mem::take(&mut self.kinds);
        info!(
            kinds = kinds.len(),
            worker_size = self.config.worker_size,
            dry_run = self.config.dry_run,
            "purge has started."
        );

        let kind_receiver = self.feed_kinds(kinds);
        let workers = self.spawn_workers(kind_receiver);

        for worker in workers {
            if let Err(e) = worker.await {
                self.cancellation_token.cancel();
                self.has_panic.store(true, Ordering::SeqCst);
                error!("purge worker panicked: {}", e);
            }
        }

        if self.has_error() {
            warn!("purge has failed. some resources may not have been deleted.");
        } else if self.failed_deletion_count() > 0 {
            warn!(
                failed_deletions = self.failed_deletion_count(),
                "purge has been completed with errors. some resources could not be deleted."
            );
        } else {
            info!("purge has been completed.");
        }

        self.shutdown();
    }

    /// True iff the shared cancellation token has been cancelled, by a
    /// failing kind or by an interrupt.
    pub fn has_error(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Check if any runner task panicked.
    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// Outcomes of every kind that ran, sorted by order.
    pub fn outcomes(&self) -> Vec<KindOutcome> {
        let mut outcomes = self.outcomes.lock().unwrap().clone();
        outcomes.sort_by_key(|outcome| outcome.order);
        outcomes
    }

    /// Number of deletes that were given up on without failing their kind.
    pub fn failed_deletion_count(&self) -> u64 {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .map(|outcome| outcome.failed_deletions)
            .sum()
    }

    pub fn failures(&self) -> Vec<KindOutcome> {
        self.outcomes()
            .into_iter()
            .filter(KindOutcome::is_failed)
            .collect()
    }

    /// Failure messages, one per failed kind.
    ///
    /// Returns `None` if no kind failed.
    pub fn get_error_messages(&self) -> Option<Vec<String>> {
        let messages: Vec<String> = self
            .failures()
            .into_iter()
            .filter_map(|outcome| match outcome.status {
                KindStatus::Failed(message) => Some(format!("{}: {}", outcome.kind, message)),
                _ => None,
            })
            .collect();
        if messages.is_empty() {
            return None;
        }
        Some(messages)
    }

    /// Get the stats receiver for progress reporting.
    pub fn get_stats_receiver(&self) -> Receiver<PurgeStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats sender to signal the reporter to finish.
    ///
    /// Call this before `run()` if you don't need statistics.
    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }

    fn feed_kinds(&self, kinds: Vec<Kind>) -> Receiver<Kind> {
        let capacity = usize::from(self.config.worker_size.max(1));
        let (sender, receiver) = async_channel::bounded::<Kind>(capacity);

        tokio::spawn(async move {
            for kind in kinds {
                debug!(kind = kind.name(), order = kind.order(), "dispatching kind.");
                if sender.send(kind).await.is_err() {
                    break;
                }
            }
        });

        receiver
    }

    /// Spawn the worker pool. Each runner is spawned in its own task so that
    /// a panic in a kind is caught, recorded as a failure and turned into
    /// cancellation.
    fn spawn_workers(&self, kind_receiver: Receiver<Kind>) -> Vec<JoinHandle<()>> {
        (0..self.config.worker_size.max(1))
            .map(|worker_index| {
                let kind_receiver = kind_receiver.clone();
                let config = self.config.clone();
                let cancellation_token = self.cancellation_token.clone();
                let stats_sender = self.stats_sender.clone();
                let has_panic = self.has_panic.clone();
                let outcomes = self.outcomes.clone();

                tokio::spawn(async move {
                    debug!(worker_index, "purge worker started.");

                    while let Ok(kind) = kind_receiver.recv().await {
                        let kind_name = kind.name().to_string();
                        let order = kind.order();
                        let runner = PurgeRunner::new(
                            kind,
                            config.clone(),
                            cancellation_token.clone(),
                            stats_sender.clone(),
                        );

                        let outcome = match tokio::spawn(runner.run()).await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                cancellation_token.cancel();
                                has_panic.store(true, Ordering::SeqCst);
                                error!(worker_index, kind = %kind_name, "purge runner task panicked: {}", e);
                                KindOutcome {
                                    kind: kind_name,
                                    order,
                                    status: KindStatus::Failed(format!(
                                        "purge runner panicked: {e}"
                                    )),
                                    failed_deletions: 0,
                                }
                            }
                        };
                        outcomes.lock().unwrap().push(outcome);
                    }

                    debug!(worker_index, "purge worker has been completed.");
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::ResourceKind;
    use crate::kinds::block_storage::{Snapshots, Volumes};
    use crate::kinds::compute::Servers;
    use crate::test_utils::{
        FakeCloud, TEST_PROJECT_ID, init_dummy_tracing_subscriber, make_kind_context,
        make_server, make_snapshot, make_test_config, make_volume,
    };
    use crate::types::Resource;
    use crate::types::token::create_purge_cancellation_token;
    use anyhow::Result;
    use async_trait::async_trait;

    struct PanickingKind;

    #[async_trait]
    impl ResourceKind for PanickingKind {
        fn name(&self) -> &str {
            "Panics"
        }

        fn order(&self) -> i32 {
            1
        }

        fn project_id(&self) -> &str {
            TEST_PROJECT_ID
        }

        async fn list(&self) -> Result<Vec<Resource>> {
            panic!("list exploded");
        }

        async fn delete(&self, _resource: &Resource) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn volumes_wait_for_snapshots_of_the_same_run() {
        init_dummy_tracing_subscriber();

        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.volumes = vec![make_volume("v1", TEST_PROJECT_ID)];
            state.snapshots = vec![make_snapshot("sn-1", "v1", Some(TEST_PROJECT_ID))];
            state.delete_failures.insert("sn-1".to_string(), 1);
        });
        let ctx = make_kind_context(&cloud);
        let kinds: Vec<Kind> = vec![Box::new(Volumes::new(&ctx)), Box::new(Snapshots::new(&ctx))];

        let mut pipeline =
            PurgePipeline::new(make_test_config(), kinds, create_purge_cancellation_token());
        pipeline.close_stats_sender();
        pipeline.run().await;

        assert!(!pipeline.has_error());
        assert_eq!(
            cloud.delete_calls(),
            vec!["snapshot:sn-1", "snapshot:sn-1", "volume:v1"]
        );
        let outcomes = pipeline.outcomes();
        assert_eq!(outcomes[0].kind, "Snapshots");
        assert_eq!(outcomes[1].kind, "Volumes");
        assert!(
            outcomes
                .iter()
                .all(|outcome| outcome.status == KindStatus::Completed)
        );
        assert!(pipeline.get_error_messages().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_kind_cancels_the_others() {
        init_dummy_tracing_subscriber();

        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.servers = vec![make_server("s1", TEST_PROJECT_ID)];
            state.volumes = vec![make_volume("v1", TEST_PROJECT_ID)];
            state.delete_failures.insert("s1".to_string(), u32::MAX);
        });
        let ctx = make_kind_context(&cloud);
        let kinds: Vec<Kind> = vec![Box::new(Servers::new(&ctx)), Box::new(Volumes::new(&ctx))];

        let mut pipeline =
            PurgePipeline::new(make_test_config(), kinds, create_purge_cancellation_token());
        let stats = pipeline.get_stats_receiver();
        pipeline.run().await;

        assert!(pipeline.has_error());
        assert!(!pipeline.has_panic());
        assert!(!cloud.delete_calls().contains(&"volume:v1".to_string()));

        let outcomes = pipeline.outcomes();
        assert!(outcomes[0].is_failed());
        assert_eq!(outcomes[1].status, KindStatus::Cancelled);
        assert_eq!(pipeline.failures().len(), 1);
        assert!(
            pipeline.get_error_messages().unwrap()[0]
                .starts_with("Servers: Failed to delete Servers resource after 3 attempts")
        );
        assert!(stats.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_kind_is_a_failure() {
        init_dummy_tracing_subscriber();

        let cloud = FakeCloud::new();
        let ctx = make_kind_context(&cloud);
        let kinds: Vec<Kind> = vec![Box::new(PanickingKind), Box::new(Servers::new(&ctx))];

        let mut pipeline =
            PurgePipeline::new(make_test_config(), kinds, create_purge_cancellation_token());
        pipeline.run().await;

        assert!(pipeline.has_error());
        assert!(pipeline.has_panic());
        assert_eq!(pipeline.failures()[0].kind, "Panics");
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_kind_failures_are_counted_without_error() {
        init_dummy_tracing_subscriber();

        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.servers = vec![
                make_server("s1", TEST_PROJECT_ID),
                make_server("s2", TEST_PROJECT_ID),
                make_server("s3", TEST_PROJECT_ID),
            ];
            state.delete_failures.insert("s1".to_string(), u32::MAX);
            state.delete_failures.insert("s3".to_string(), u32::MAX);
        });
        let ctx = make_kind_context(&cloud);
        let kinds: Vec<Kind> = vec![Box::new(Servers::new(&ctx))];
        let mut config = make_test_config();
        config.resources = Some(vec!["Servers".to_string()]);

        let mut pipeline = PurgePipeline::new(config, kinds, create_purge_cancellation_token());
        pipeline.run().await;

        assert!(!pipeline.has_error());
        assert!(pipeline.get_error_messages().is_none());
        assert_eq!(pipeline.failed_deletion_count(), 2);
        assert_eq!(pipeline.outcomes()[0].status, KindStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_runs_kinds_in_order() {
        init_dummy_tracing_subscriber();

        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.servers = vec![make_server("s1", TEST_PROJECT_ID)];
            state.volumes = vec![make_volume("v1", TEST_PROJECT_ID)];
            state.snapshots = vec![make_snapshot("sn-1", "v1", Some(TEST_PROJECT_ID))];
        });
        let ctx = make_kind_context(&cloud);
        let kinds: Vec<Kind> = vec![
            Box::new(Volumes::new(&ctx)),
            Box::new(Snapshots::new(&ctx)),
            Box::new(Servers::new(&ctx)),
        ];
        let mut config = make_test_config();
        config.worker_size = 1;

        let mut pipeline = PurgePipeline::new(config, kinds, create_purge_cancellation_token());
        pipeline.run().await;

        assert!(!pipeline.has_error());
        assert_eq!(
            cloud.delete_calls(),
            vec!["server:s1", "snapshot:sn-1", "volume:v1"]
        );
    }

    #[tokio::test]
    async fn empty_run_succeeds() {
        init_dummy_tracing_subscriber();

        let mut pipeline =
            PurgePipeline::new(make_test_config(), Vec::new(), create_purge_cancellation_token());
        pipeline.run().await;

        assert!(!pipeline.has_error());
        assert!(pipeline.outcomes().is_empty());
        assert_eq!(pipeline.failed_deletion_count(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "called more than once")]
    async fn run_twice_panics() {
        let mut pipeline =
            PurgePipeline::new(make_test_config(), Vec::new(), create_purge_cancellation_token());
        pipeline.run().await;
        pipeline.run().await;
    }
}
