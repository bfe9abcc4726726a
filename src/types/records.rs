//! Strongly typed records returned by the cloud services.
//!
//! Field names follow the JSON documents returned by the OpenStack APIs so the
//! records can be deserialized directly. Only the fields the purge needs are
//! kept.

use serde::Deserialize;

use super::Ownable;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "os-vol-tenant-attr:tenant_id")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub volume_id: String,
    /// Only reported by platforms exposing the extended snapshot attributes.
    #[serde(default, rename = "os-extended-snapshot-attributes:project_id")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Backup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "os-backup-project-attr:project_id")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VolumeGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    /// Glance v1 flag, still returned by some deployments.
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl Image {
    pub fn is_public(&self) -> bool {
        self.is_public == Some(true) || self.visibility.as_deref() == Some("public")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default, rename = "router:external")]
    pub router_external: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Router {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    #[serde(default)]
    pub floating_ip_address: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stack {
    pub id: String,
    pub stack_name: String,
    #[serde(default)]
    pub project: Option<String>,
}

/// Swift container. Containers live in the project's account, so the
/// service reports no owner on them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Container {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageObject {
    pub name: String,
    /// Filled in by the client; Swift does not repeat it per object.
    #[serde(default)]
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alarm {
    pub alarm_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Record for kinds registered from outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericResource {
    pub kind: String,
    pub id: String,
    pub owner: Option<String>,
    pub attributes: serde_json::Value,
}

macro_rules! ownable_by_project_or_tenant {
    ($($record:ty),* $(,)?) => {
        $(
            impl Ownable for $record {
                fn id(&self) -> &str {
                    &self.id
                }

                fn owner(&self) -> Option<&str> {
                    self.project_id.as_deref().or(self.tenant_id.as_deref())
                }
            }
        )*
    };
}

ownable_by_project_or_tenant!(Server, Network, Port, Router, FloatingIp, SecurityGroup);

macro_rules! ownable_by_project {
    ($($record:ty),* $(,)?) => {
        $(
            impl Ownable for $record {
                fn id(&self) -> &str {
                    &self.id
                }

                fn owner(&self) -> Option<&str> {
                    self.project_id.as_deref()
                }
            }
        )*
    };
}

ownable_by_project!(Snapshot, Backup, VolumeGroup, GroupSnapshot);

impl Ownable for Volume {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

impl Ownable for Image {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

impl Ownable for Stack {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> Option<&str> {
        self.project.as_deref()
    }
}

impl Ownable for Container {
    fn id(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> Option<&str> {
        None
    }
}

impl Ownable for StorageObject {
    fn id(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> Option<&str> {
        None
    }
}

impl Ownable for Alarm {
    fn id(&self) -> &str {
        &self.alarm_id
    }

    fn owner(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
}

impl Ownable for GenericResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}
