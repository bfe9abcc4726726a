use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::Deserialize;
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::types::{
    Alarm, Backup, Container, FloatingIp, GroupSnapshot, Image, Network, Port, Router,
    SecurityGroup, Server, Snapshot, Stack, StorageObject, Volume, VolumeGroup,
};

pub mod openstack;

/// Type alias for a boxed CloudClient trait object.
pub type Cloud = Box<dyn CloudClient + Send + Sync>;

/// Type alias for a boxed IdentityClient trait object.
pub type Identity = Box<dyn IdentityClient + Send + Sync>;

/// Cloud services a resource kind may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Compute,
    Volume,
    Network,
    Image,
    ObjectStore,
    Orchestration,
    Alarming,
}

impl ServiceType {
    /// Service catalog types accepted for this service, preferred first.
    pub fn catalog_types(&self) -> &'static [&'static str] {
        match self {
            ServiceType::Compute => &["compute"],
            ServiceType::Volume => &["volumev3", "block-storage", "volume"],
            ServiceType::Network => &["network"],
            ServiceType::Image => &["image"],
            ServiceType::ObjectStore => &["object-store"],
            ServiceType::Orchestration => &["orchestration"],
            ServiceType::Alarming => &["alarming"],
        }
    }
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_types()[0])
    }
}

/// Keystone project.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Typed access to the cloud services the built-in kinds purge.
///
/// Every list/delete call a built-in kind needs has its own method. A call
/// for a service missing from the catalog fails with
/// [`PurgeError::EndpointNotFound`](crate::types::error::PurgeError::EndpointNotFound),
/// and a call on a resource that no longer exists fails with
/// [`PurgeError::NotFound`](crate::types::error::PurgeError::NotFound).
///
/// Network list calls take the project id because an admin token sees the
/// resources of every project.
#[async_trait]
pub trait CloudClient: DynClone {
    fn has_service(&self, service: ServiceType) -> bool;

    /// True when the block storage API supports generic volume groups.
    async fn supports_volume_groups(&self) -> Result<bool>;

    // Compute
    async fn list_servers(&self) -> Result<Vec<Server>>;
    async fn delete_server(&self, id: &str) -> Result<()>;

    // Block storage
    async fn list_volumes(&self) -> Result<Vec<Volume>>;
    async fn get_volume(&self, id: &str) -> Result<Volume>;
    async fn delete_volume(&self, id: &str) -> Result<()>;
    async fn list_volume_snapshots(&self) -> Result<Vec<Snapshot>>;
    async fn delete_volume_snapshot(&self, id: &str) -> Result<()>;
    async fn list_volume_backups(&self) -> Result<Vec<Backup>>;
    async fn delete_volume_backup(&self, id: &str) -> Result<()>;
    async fn list_volume_groups(&self) -> Result<Vec<VolumeGroup>>;
    async fn delete_volume_group(&self, id: &str, delete_volumes: bool) -> Result<()>;
    async fn list_group_snapshots(&self) -> Result<Vec<GroupSnapshot>>;
    async fn delete_group_snapshot(&self, id: &str) -> Result<()>;

    // Image
    async fn list_images(&self) -> Result<Vec<Image>>;
    async fn delete_image(&self, id: &str) -> Result<()>;

    // Network
    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>>;
    async fn delete_network(&self, id: &str) -> Result<()>;
    /// Lists the project's ports, restricted to `device_owners` unless it is empty.
    async fn list_ports(&self, project_id: &str, device_owners: &[&str]) -> Result<Vec<Port>>;
    async fn delete_port(&self, id: &str) -> Result<()>;
    async fn list_routers(&self, project_id: &str) -> Result<Vec<Router>>;
    async fn delete_router(&self, id: &str) -> Result<()>;
    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<()>;
    async fn list_floating_ips(&self, project_id: &str) -> Result<Vec<FloatingIp>>;
    async fn delete_floating_ip(&self, id: &str) -> Result<()>;
    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>>;
    async fn delete_security_group(&self, id: &str) -> Result<()>;

    // Orchestration
    async fn list_stacks(&self) -> Result<Vec<Stack>>;
    /// Deletes the stack and returns once the service no longer reports it.
    async fn delete_stack(&self, name: &str, id: &str) -> Result<()>;

    // Object storage
    async fn list_containers(&self) -> Result<Vec<Container>>;
    async fn list_objects(&self, container: &str) -> Result<Vec<StorageObject>>;
    async fn delete_object(&self, container: &str, name: &str) -> Result<()>;
    async fn delete_container(&self, name: &str) -> Result<()>;

    // Alarming
    async fn list_alarms(&self, project_id: &str) -> Result<Vec<Alarm>>;
    async fn delete_alarm(&self, id: &str) -> Result<()>;
}

dyn_clone::clone_trait_object!(CloudClient);

/// Identity operations used to prepare and restore the purged project.
#[async_trait]
pub trait IdentityClient {
    /// Id of the user the credentials belong to.
    fn current_user_id(&self) -> &str;

    /// Id of the project the credentials are scoped to.
    fn current_project_id(&self) -> &str;

    /// Looks a project up by id, then by name.
    async fn find_project(&self, id_or_name: &str) -> Result<Option<Project>>;

    /// Grants the role and returns whether a new assignment was created.
    async fn grant_role(&self, role_name: &str, user_id: &str, project_id: &str) -> Result<bool>;

    async fn revoke_role(&self, role_name: &str, user_id: &str, project_id: &str) -> Result<()>;

    async fn set_project_enabled(&self, project_id: &str, enabled: bool) -> Result<()>;

    async fn delete_project(&self, project_id: &str) -> Result<()>;

    /// Client scoped to `project_id`, used by every resource kind of the run.
    async fn connect_project(&self, project_id: &str) -> Result<Cloud>;
}
