//! Shared test utilities for the ospurge library crate.
//!
//! [`FakeCloud`] is an in-memory [`CloudClient`] whose delete calls remove
//! records from its state, so prerequisite checks of later kinds observe the
//! deletions of earlier ones. [`FakeIdentity`] records the identity calls made
//! by [`PurgeSession`](crate::session::PurgeSession).

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::cloud::{Cloud, CloudClient, IdentityClient, Project, ServiceType};
use crate::config::{Config, DeleteRetryConfig, PrerequisiteConfig};
use crate::kinds::KindContext;
use crate::types::error::PurgeError;
use crate::types::{
    Alarm, Backup, Container, FloatingIp, GroupSnapshot, Image, Network, Ownable, Port, Router,
    SecurityGroup, Server, Snapshot, Stack, StorageObject, Volume, VolumeGroup,
};

pub(crate) const TEST_PROJECT_ID: &str = "project-under-purge";
pub(crate) const OTHER_PROJECT_ID: &str = "another-project";

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit tests.
///
/// Key defaults: `worker_size=4`, 3 delete attempts 1s apart, prerequisite
/// deadline of 10s polled from 1s up to 4s.
pub(crate) fn make_test_config() -> Config {
    Config {
        worker_size: 4,
        delete_retry_config: DeleteRetryConfig {
            max_attempts: 3,
            interval_milliseconds: 1000,
        },
        prerequisite_config: PrerequisiteConfig {
            timeout_milliseconds: 10_000,
            initial_interval_milliseconds: 1000,
            max_interval_milliseconds: 4000,
        },
        ..Config::for_project(TEST_PROJECT_ID)
    }
}

pub(crate) fn make_kind_context(cloud: &FakeCloud) -> KindContext {
    KindContext::new(Box::new(cloud.clone()), TEST_PROJECT_ID, false)
}

#[derive(Default)]
pub(crate) struct FakeCloudState {
    pub unavailable_services: HashSet<ServiceType>,
    pub volume_groups_supported: bool,
    pub servers: Vec<Server>,
    pub volumes: Vec<Volume>,
    pub snapshots: Vec<Snapshot>,
    pub backups: Vec<Backup>,
    pub volume_groups: Vec<VolumeGroup>,
    pub group_snapshots: Vec<GroupSnapshot>,
    pub images: Vec<Image>,
    pub networks: Vec<Network>,
    pub ports: Vec<Port>,
    pub routers: Vec<Router>,
    pub floating_ips: Vec<FloatingIp>,
    pub security_groups: Vec<SecurityGroup>,
    pub stacks: Vec<Stack>,
    pub containers: Vec<Container>,
    pub objects: Vec<StorageObject>,
    pub alarms: Vec<Alarm>,
    /// Remaining failures per resource id before its delete succeeds.
    pub delete_failures: HashMap<String, u32>,
    /// Every delete call, as `<call>:<id>`, successful or not.
    pub delete_calls: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeCloud {
    pub state: Arc<Mutex<FakeCloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        let cloud = FakeCloud::default();
        cloud.with_state(|state| state.volume_groups_supported = true);
        cloud
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeCloudState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.with_state(|state| state.delete_calls.clone())
    }

    fn check_service(&self, service: ServiceType) -> Result<()> {
        if self.with_state(|state| state.unavailable_services.contains(&service)) {
            return Err(PurgeError::EndpointNotFound(service.to_string()).into());
        }
        Ok(())
    }

    fn remove<T: Ownable>(
        &self,
        service: ServiceType,
        call: &str,
        id: &str,
        records: impl FnOnce(&mut FakeCloudState) -> &mut Vec<T>,
    ) -> Result<()> {
        self.check_service(service)?;
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(format!("{call}:{id}"));

        if let Some(remaining) = state.delete_failures.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PurgeError::Api {
                    status: 409,
                    message: format!("{call} {id} is busy"),
                }
                .into());
            }
        }

        let records = records(&mut *state);
        let before = records.len();
        records.retain(|record| record.id() != id);
        if records.len() == before {
            return Err(PurgeError::NotFound(format!("{call} {id}")).into());
        }
        Ok(())
    }

    fn list_all<T: Clone>(
        &self,
        service: ServiceType,
        records: impl FnOnce(&FakeCloudState) -> &Vec<T>,
    ) -> Result<Vec<T>> {
        self.check_service(service)?;
        let state = self.state.lock().unwrap();
        Ok(records(&*state).clone())
    }

    fn list_project<T: Clone + Ownable>(
        &self,
        service: ServiceType,
        project_id: &str,
        records: impl FnOnce(&FakeCloudState) -> &Vec<T>,
    ) -> Result<Vec<T>> {
        Ok(self
            .list_all(service, records)?
            .into_iter()
            .filter(|record| record.owner() == Some(project_id))
            .collect())
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    fn has_service(&self, service: ServiceType) -> bool {
        self.check_service(service).is_ok()
    }

    async fn supports_volume_groups(&self) -> Result<bool> {
        Ok(self.has_service(ServiceType::Volume)
            && self.with_state(|state| state.volume_groups_supported))
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        self.list_all(ServiceType::Compute, |s| &s.servers)
    }

    async fn delete_server(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Compute, "server", id, |s| &mut s.servers)
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.list_all(ServiceType::Volume, |s| &s.volumes)
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        self.list_all(ServiceType::Volume, |s| &s.volumes)?
            .into_iter()
            .find(|volume| volume.id == id)
            .ok_or_else(|| PurgeError::NotFound(format!("volume {id}")).into())
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Volume, "volume", id, |s| &mut s.volumes)
    }

    async fn list_volume_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.list_all(ServiceType::Volume, |s| &s.snapshots)
    }

    async fn delete_volume_snapshot(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Volume, "snapshot", id, |s| &mut s.snapshots)
    }

    async fn list_volume_backups(&self) -> Result<Vec<Backup>> {
        self.list_all(ServiceType::Volume, |s| &s.backups)
    }

    async fn delete_volume_backup(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Volume, "backup", id, |s| &mut s.backups)
    }

    async fn list_volume_groups(&self) -> Result<Vec<VolumeGroup>> {
        self.list_all(ServiceType::Volume, |s| &s.volume_groups)
    }

    async fn delete_volume_group(&self, id: &str, _delete_volumes: bool) -> Result<()> {
        self.remove(ServiceType::Volume, "volume_group", id, |s| {
            &mut s.volume_groups
        })
    }

    async fn list_group_snapshots(&self) -> Result<Vec<GroupSnapshot>> {
        self.list_all(ServiceType::Volume, |s| &s.group_snapshots)
    }

    async fn delete_group_snapshot(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Volume, "group_snapshot", id, |s| {
            &mut s.group_snapshots
        })
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        self.list_all(ServiceType::Image, |s| &s.images)
    }

    async fn delete_image(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Image, "image", id, |s| &mut s.images)
    }

    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        self.list_project(ServiceType::Network, project_id, |s| &s.networks)
    }

    async fn delete_network(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Network, "network", id, |s| &mut s.networks)
    }

    async fn list_ports(&self, project_id: &str, device_owners: &[&str]) -> Result<Vec<Port>> {
        Ok(self
            .list_project(ServiceType::Network, project_id, |s| &s.ports)?
            .into_iter()
            .filter(|port| {
                device_owners.is_empty() || device_owners.contains(&port.device_owner.as_str())
            })
            .collect())
    }

    async fn delete_port(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Network, "port", id, |s| &mut s.ports)
    }

    async fn list_routers(&self, project_id: &str) -> Result<Vec<Router>> {
        self.list_project(ServiceType::Network, project_id, |s| &s.routers)
    }

    async fn delete_router(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Network, "router", id, |s| &mut s.routers)
    }

    async fn remove_router_interface(&self, _router_id: &str, port_id: &str) -> Result<()> {
        self.remove(ServiceType::Network, "router_interface", port_id, |s| {
            &mut s.ports
        })
    }

    async fn list_floating_ips(&self, project_id: &str) -> Result<Vec<FloatingIp>> {
        self.list_project(ServiceType::Network, project_id, |s| &s.floating_ips)
    }

    async fn delete_floating_ip(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Network, "floating_ip", id, |s| {
            &mut s.floating_ips
        })
    }

    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>> {
        self.list_project(ServiceType::Network, project_id, |s| &s.security_groups)
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Network, "security_group", id, |s| {
            &mut s.security_groups
        })
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        self.list_all(ServiceType::Orchestration, |s| &s.stacks)
    }

    async fn delete_stack(&self, _name: &str, id: &str) -> Result<()> {
        self.remove(ServiceType::Orchestration, "stack", id, |s| &mut s.stacks)
    }

    async fn list_containers(&self) -> Result<Vec<Container>> {
        self.list_all(ServiceType::ObjectStore, |s| &s.containers)
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<StorageObject>> {
        Ok(self
            .list_all(ServiceType::ObjectStore, |s| &s.objects)?
            .into_iter()
            .filter(|object| object.container_name == container)
            .collect())
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        self.check_service(ServiceType::ObjectStore)?;
        self.with_state(|state| {
            state.delete_calls.push(format!("object:{container}/{name}"));
            let before = state.objects.len();
            state
                .objects
                .retain(|object| !(object.container_name == container && object.name == name));
            if state.objects.len() == before {
                return Err(PurgeError::NotFound(format!("object {name}")).into());
            }
            Ok(())
        })
    }

    async fn delete_container(&self, name: &str) -> Result<()> {
        self.remove(ServiceType::ObjectStore, "container", name, |s| {
            &mut s.containers
        })
    }

    async fn list_alarms(&self, project_id: &str) -> Result<Vec<Alarm>> {
        self.list_project(ServiceType::Alarming, project_id, |s| &s.alarms)
    }

    async fn delete_alarm(&self, id: &str) -> Result<()> {
        self.remove(ServiceType::Alarming, "alarm", id, |s| &mut s.alarms)
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentityState {
    pub projects: Vec<Project>,
    /// Existing `(role, user, project)` assignments.
    pub assignments: HashSet<(String, String, String)>,
    /// Identity calls in order, e.g. `grant:admin:p1`.
    pub calls: Vec<String>,
}

#[derive(Clone)]
pub(crate) struct FakeIdentity {
    pub user_id: String,
    pub project_id: String,
    pub cloud: FakeCloud,
    pub state: Arc<Mutex<FakeIdentityState>>,
}

impl FakeIdentity {
    pub fn new(cloud: &FakeCloud) -> Self {
        FakeIdentity {
            user_id: "admin-user".to_string(),
            project_id: "admin-project".to_string(),
            cloud: cloud.clone(),
            state: Arc::new(Mutex::new(FakeIdentityState::default())),
        }
    }

    pub fn with_project(self, id: &str, name: &str, enabled: bool) -> Self {
        self.state.lock().unwrap().projects.push(Project {
            id: id.to_string(),
            name: name.to_string(),
            enabled,
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl IdentityClient for FakeIdentity {
    fn current_user_id(&self) -> &str {
        &self.user_id
    }

    fn current_project_id(&self) -> &str {
        &self.project_id
    }

    async fn find_project(&self, id_or_name: &str) -> Result<Option<Project>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .projects
            .iter()
            .find(|project| project.id == id_or_name)
            .or_else(|| {
                state
                    .projects
                    .iter()
                    .find(|project| project.name == id_or_name)
            })
            .cloned())
    }

    async fn grant_role(&self, role_name: &str, user_id: &str, project_id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("grant:{role_name}:{project_id}"));
        Ok(state.assignments.insert((
            role_name.to_string(),
            user_id.to_string(),
            project_id.to_string(),
        )))
    }

    async fn revoke_role(&self, role_name: &str, user_id: &str, project_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("revoke:{role_name}:{project_id}"));
        state.assignments.remove(&(
            role_name.to_string(),
            user_id.to_string(),
            project_id.to_string(),
        ));
        Ok(())
    }

    async fn set_project_enabled(&self, project_id: &str, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("enabled:{project_id}:{enabled}"));
        if let Some(project) = state
            .projects
            .iter_mut()
            .find(|project| project.id == project_id)
        {
            project.enabled = enabled;
        }
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete:{project_id}"));
        state.projects.retain(|project| project.id != project_id);
        Ok(())
    }

    async fn connect_project(&self, project_id: &str) -> Result<Cloud> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("connect:{project_id}"));
        Ok(Box::new(self.cloud.clone()))
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

pub(crate) fn make_server(id: &str, project_id: &str) -> Server {
    Server {
        id: id.to_string(),
        name: format!("vm-{id}"),
        project_id: Some(project_id.to_string()),
        tenant_id: None,
    }
}

pub(crate) fn make_volume(id: &str, project_id: &str) -> Volume {
    Volume {
        id: id.to_string(),
        name: Some(format!("volume-{id}")),
        tenant_id: Some(project_id.to_string()),
    }
}

pub(crate) fn make_snapshot(id: &str, volume_id: &str, project_id: Option<&str>) -> Snapshot {
    Snapshot {
        id: id.to_string(),
        name: Some(format!("snapshot-{id}")),
        volume_id: volume_id.to_string(),
        project_id: project_id.map(str::to_string),
    }
}

pub(crate) fn make_port(id: &str, device_owner: &str, device_id: &str, project_id: &str) -> Port {
    Port {
        id: id.to_string(),
        network_id: "net-1".to_string(),
        device_owner: device_owner.to_string(),
        device_id: device_id.to_string(),
        project_id: Some(project_id.to_string()),
        tenant_id: None,
    }
}

pub(crate) fn make_network(id: &str, project_id: &str, router_external: bool) -> Network {
    Network {
        id: id.to_string(),
        name: format!("network-{id}"),
        project_id: Some(project_id.to_string()),
        tenant_id: None,
        router_external,
    }
}

pub(crate) fn make_image(id: &str, owner: &str, visibility: &str) -> Image {
    Image {
        id: id.to_string(),
        name: Some(format!("image-{id}")),
        owner: Some(owner.to_string()),
        visibility: Some(visibility.to_string()),
        is_public: None,
    }
}

pub(crate) fn make_object(container: &str, name: &str) -> StorageObject {
    StorageObject {
        name: name.to_string(),
        container_name: container.to_string(),
    }
}
