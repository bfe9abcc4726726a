//! Shared scheduler test infrastructure for ospurge-rs.
//!
//! Provides an in-memory [`Inventory`] of resources and [`InventoryKind`], a
//! resource kind backed by it, so that whole purge runs can be exercised
//! through the public API without a cloud.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ospurge_rs::config::{DeleteRetryConfig, PrerequisiteConfig};
use ospurge_rs::types::GenericResource;
use ospurge_rs::{
    Config, Kind, KindOutcome, PurgeCancellationToken, PurgeError, PurgePipeline,
    PurgeStatistics, Resource, ResourceKind, create_purge_cancellation_token,
};

pub const PROJECT_ID: &str = "project-under-purge";

/// Resources left in the fake project, by kind name.
#[derive(Clone, Default)]
pub struct Inventory {
    state: Arc<Mutex<InventoryState>>,
}

#[derive(Default)]
struct InventoryState {
    resources: BTreeMap<String, Vec<Resource>>,
    deletes: Vec<String>,
    list_calls: Vec<String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: &str, id: &str, owner: Option<&str>) {
        let resource = Resource::Generic(GenericResource {
            kind: kind.to_string(),
            id: id.to_string(),
            owner: owner.map(str::to_string),
            attributes: serde_json::Value::Null,
        });
        self.state
            .lock()
            .unwrap()
            .resources
            .entry(kind.to_string())
            .or_default()
            .push(resource);
    }

    pub fn remaining(&self, kind: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(kind)
            .map(|resources| resources.iter().map(|r| r.id().to_string()).collect())
            .unwrap_or_default()
    }

    /// Successful deletes, as `kind:id`, in the order they happened.
    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().list_calls.clone()
    }

    fn list(&self, kind: &str) -> Vec<Resource> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push(kind.to_string());
        state.resources.get(kind).cloned().unwrap_or_default()
    }

    fn remove(&self, kind: &str, id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(resources) = state.resources.get_mut(kind) else {
            return false;
        };
        let before = resources.len();
        resources.retain(|resource| resource.id() != id);
        let removed = resources.len() != before;
        if removed {
            state.deletes.push(format!("{kind}:{id}"));
        }
        removed
    }
}

/// How [`InventoryKind::delete`] behaves.
#[derive(Clone, Copy, Debug)]
pub enum DeleteBehavior {
    /// Remove the resource after the given delay.
    Succeed(Duration),
    /// Every call fails with an API error.
    AlwaysFail,
}

/// Resource kind backed by an [`Inventory`].
pub struct InventoryKind {
    name: String,
    order: i32,
    inventory: Inventory,
    depends_on: Vec<String>,
    list_delay: Duration,
    delete_behavior: DeleteBehavior,
}

impl InventoryKind {
    pub fn new(name: &str, order: i32, inventory: &Inventory) -> Self {
        Self {
            name: name.to_string(),
            order,
            inventory: inventory.clone(),
            depends_on: Vec::new(),
            list_delay: Duration::ZERO,
            delete_behavior: DeleteBehavior::Succeed(Duration::ZERO),
        }
    }

    /// Only start deleting once `kind` has nothing left.
    pub fn depends_on(mut self, kind: &str) -> Self {
        self.depends_on.push(kind.to_string());
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn with_delete_behavior(mut self, delete_behavior: DeleteBehavior) -> Self {
        self.delete_behavior = delete_behavior;
        self
    }

    pub fn boxed(self) -> Kind {
        Box::new(self)
    }
}

#[async_trait]
impl ResourceKind for InventoryKind {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn project_id(&self) -> &str {
        PROJECT_ID
    }

    async fn check_prerequisite(&self) -> Result<bool> {
        Ok(self
            .depends_on
            .iter()
            .all(|kind| self.inventory.remaining(kind).is_empty()))
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        tokio::time::sleep(self.list_delay).await;
        Ok(self.inventory.list(&self.name))
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        match self.delete_behavior {
            DeleteBehavior::Succeed(delay) => {
                tokio::time::sleep(delay).await;
                if self.inventory.remove(&self.name, resource.id()) {
                    Ok(())
                } else {
                    Err(PurgeError::NotFound(resource.to_string()).into())
                }
            }
            DeleteBehavior::AlwaysFail => Err(PurgeError::Api {
                status: 409,
                message: format!("{} is in use", resource.id()),
            }
            .into()),
        }
    }
}

/// Config with short intervals, purging [`PROJECT_ID`].
pub fn test_config() -> Config {
    Config {
        worker_size: 4,
        delete_retry_config: DeleteRetryConfig {
            max_attempts: 3,
            interval_milliseconds: 1000,
        },
        prerequisite_config: PrerequisiteConfig {
            timeout_milliseconds: 60_000,
            initial_interval_milliseconds: 1000,
            max_interval_milliseconds: 4000,
        },
        ..Config::for_project(PROJECT_ID)
    }
}

/// Result of running a purge pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    pub has_error: bool,
    pub has_panic: bool,
    pub outcomes: Vec<KindOutcome>,
    pub error_messages: Vec<String>,
    pub failed_deletions: u64,
    pub stats: Vec<PurgeStatistics>,
}

pub async fn run_pipeline(config: Config, kinds: Vec<Kind>) -> PipelineResult {
    run_pipeline_with_token(config, kinds, create_purge_cancellation_token()).await
}

pub async fn run_pipeline_with_token(
    config: Config,
    kinds: Vec<Kind>,
    cancellation_token: PurgeCancellationToken,
) -> PipelineResult {
    let mut pipeline = PurgePipeline::new(config, kinds, cancellation_token);
    let stats_receiver = pipeline.get_stats_receiver();

    pipeline.run().await;

    let mut stats = Vec::new();
    while let Ok(stat) = stats_receiver.try_recv() {
        stats.push(stat);
    }

    PipelineResult {
        has_error: pipeline.has_error(),
        has_panic: pipeline.has_panic(),
        outcomes: pipeline.outcomes(),
        error_messages: pipeline.get_error_messages().unwrap_or_default(),
        failed_deletions: pipeline.failed_deletion_count(),
        stats,
    }
}

impl PipelineResult {
    pub fn status_of(&self, kind: &str) -> Option<&ospurge_rs::KindStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.kind == kind)
            .map(|outcome| &outcome.status)
    }
}
