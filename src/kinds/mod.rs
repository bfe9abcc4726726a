//! Resource kinds: one category of cloud resource each, with its own
//! listing, ownership filter, deletion call and prerequisite.
//!
//! A kind's `order` places it in the dependency ordering. Kinds whose
//! resources must be gone before others can be deleted get a lower order.
//! The prerequisite of a kind only ever looks at kinds with a lower order.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::cloud::Cloud;
use crate::types::Resource;
use crate::types::error::{PurgeError, is_endpoint_not_found_error};

pub mod block_storage;
pub mod compute;
pub mod image;
pub mod metering;
pub mod network;
pub mod object_storage;
pub mod orchestration;
pub mod registry;

pub use registry::KindRegistry;

/// Type alias for a boxed ResourceKind trait object.
pub type Kind = Box<dyn ResourceKind>;

/// Per-run data every kind is bound to.
#[derive(Clone)]
pub struct KindContext {
    pub cloud: Cloud,
    /// Project being purged.
    pub project_id: String,
    pub delete_shared_resources: bool,
}

impl KindContext {
    pub fn new(cloud: Cloud, project_id: &str, delete_shared_resources: bool) -> Self {
        KindContext {
            cloud,
            project_id: project_id.to_string(),
            delete_shared_resources,
        }
    }
}

/// One category of cloud resource.
///
/// Instances are created per run, bound to a [`KindContext`], and driven by
/// a [`PurgeRunner`](crate::runner::PurgeRunner).
#[async_trait]
pub trait ResourceKind: Send + Sync {
    fn name(&self) -> &str;

    /// Position in the dependency ordering; lower purges first.
    fn order(&self) -> i32;

    /// Project being purged.
    fn project_id(&self) -> &str;

    /// True when the resources this kind depends on are gone.
    async fn check_prerequisite(&self) -> Result<bool> {
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<Resource>>;

    /// Ownership filter applied to each listed resource.
    async fn should_delete(&self, resource: &Resource) -> Result<bool> {
        Ok(is_owned_by(self.name(), resource, self.project_id()))
    }

    async fn delete(&self, resource: &Resource) -> Result<()>;

    /// Human readable description used in logs and the dry-run inventory.
    fn to_str(&self, resource: &Resource) -> String {
        resource.to_string()
    }
}

/// Default ownership rule.
///
/// A resource reporting no owner at all is assumed to belong to the project.
pub fn is_owned_by(kind: &str, resource: &Resource, project_id: &str) -> bool {
    match resource.owner() {
        Some(owner) => owner == project_id,
        None => {
            warn!(
                kind = kind,
                resource = %resource,
                "can't determine owner of resource, assuming it is owned by the purged project."
            );
            true
        }
    }
}

/// Outcome of a dependency listing used by prerequisite checks.
///
/// A dependency whose service is not in the catalog cannot have resources
/// left, so `EndpointNotFound` counts as empty.
pub(crate) fn none_remaining<T>(listing: Result<Vec<T>>) -> Result<bool> {
    match listing {
        Ok(resources) => Ok(resources.is_empty()),
        Err(e) if is_endpoint_not_found_error(&e) => Ok(true),
        Err(e) => Err(e),
    }
}

pub(crate) fn unexpected_resource(kind: &str, resource: &Resource) -> anyhow::Error {
    PurgeError::UnexpectedResource {
        kind: kind.to_string(),
        resource: resource.to_string(),
    }
    .into()
}
