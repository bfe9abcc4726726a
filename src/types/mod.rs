use std::fmt;
use std::fmt::{Debug, Display, Formatter};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod records;
pub mod token;

pub use records::{
    Alarm, Backup, Container, FloatingIp, GenericResource, GroupSnapshot, Image, Network, Port,
    Router, SecurityGroup, Server, Snapshot, Stack, StorageObject, Volume, VolumeGroup,
};

/// Minimal capability shared by every record the purge core handles.
///
/// The generic ownership filter only ever looks at these two values; all
/// other fields stay on the concrete record type.
pub trait Ownable {
    fn id(&self) -> &str;

    /// Identifier of the owning project, if the service reports one.
    fn owner(&self) -> Option<&str>;
}

/// A cloud resource listed by a [`ResourceKind`](crate::kinds::ResourceKind).
///
/// One variant per built-in record type. Kinds added through the registry
/// extension slot use [`Resource::Generic`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Server(Server),
    Volume(Volume),
    Snapshot(Snapshot),
    Backup(Backup),
    VolumeGroup(VolumeGroup),
    GroupSnapshot(GroupSnapshot),
    Image(Image),
    Network(Network),
    Port(Port),
    Router(Router),
    FloatingIp(FloatingIp),
    SecurityGroup(SecurityGroup),
    Stack(Stack),
    Container(Container),
    StorageObject(StorageObject),
    Alarm(Alarm),
    Generic(GenericResource),
}

impl Resource {
    fn as_ownable(&self) -> &dyn Ownable {
        match self {
            Self::Server(r) => r,
            Self::Volume(r) => r,
            Self::Snapshot(r) => r,
            Self::Backup(r) => r,
            Self::VolumeGroup(r) => r,
            Self::GroupSnapshot(r) => r,
            Self::Image(r) => r,
            Self::Network(r) => r,
            Self::Port(r) => r,
            Self::Router(r) => r,
            Self::FloatingIp(r) => r,
            Self::SecurityGroup(r) => r,
            Self::Stack(r) => r,
            Self::Container(r) => r,
            Self::StorageObject(r) => r,
            Self::Alarm(r) => r,
            Self::Generic(r) => r,
        }
    }

    pub fn id(&self) -> &str {
        self.as_ownable().id()
    }

    pub fn owner(&self) -> Option<&str> {
        self.as_ownable().owner()
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(r) => write!(f, "VM (id='{}', name='{}')", r.id, r.name),
            Self::Volume(r) => write!(
                f,
                "Volume (id='{}', name='{}')",
                r.id,
                r.name.as_deref().unwrap_or_default()
            ),
            Self::Snapshot(r) => write!(
                f,
                "Volume Snapshot (id='{}', name='{}')",
                r.id,
                r.name.as_deref().unwrap_or_default()
            ),
            Self::Backup(r) => write!(
                f,
                "Volume Backup (id='{}', name='{}')",
                r.id,
                r.name.as_deref().unwrap_or_default()
            ),
            Self::VolumeGroup(r) => write!(
                f,
                "Volume Group (id='{}', name='{}')",
                r.id,
                r.name.as_deref().unwrap_or_default()
            ),
            Self::GroupSnapshot(r) => write!(
                f,
                "Group Snapshot (id='{}', name='{}')",
                r.id,
                r.name.as_deref().unwrap_or_default()
            ),
            Self::Image(r) => write!(
                f,
                "Image (id='{}', name='{}')",
                r.id,
                r.name.as_deref().unwrap_or_default()
            ),
            Self::Network(r) => write!(f, "Network (id='{}', name='{}')", r.id, r.name),
            Self::Port(r) => write!(
                f,
                "Port (id='{}', network_id='{}', device_owner='{}')",
                r.id, r.network_id, r.device_owner
            ),
            Self::Router(r) => write!(f, "Router (id='{}', name='{}')", r.id, r.name),
            Self::FloatingIp(r) => write!(f, "Floating IP (id='{}')", r.id),
            Self::SecurityGroup(r) => {
                write!(f, "Security Group (id='{}', name='{}')", r.id, r.name)
            }
            Self::Stack(r) => write!(f, "Heat Stack (id='{}', name='{}')", r.id, r.stack_name),
            Self::Container(r) => write!(f, "Container (name='{}')", r.name),
            Self::StorageObject(r) => write!(
                f,
                "Object '{}' from Container '{}'",
                r.name, r.container_name
            ),
            Self::Alarm(r) => write!(f, "Alarm (id='{}', name='{}')", r.alarm_id, r.name),
            Self::Generic(r) => write!(f, "{} (id='{}')", r.kind, r.id),
        }
    }
}

/// Statistics sent through the stats channel while kinds are purged.
#[derive(Debug, Clone, PartialEq)]
pub enum PurgeStatistics {
    DeleteComplete { kind: String, description: String },
    /// The resource was already gone when the delete call reached the service.
    DeleteAbsent { kind: String, description: String },
    /// The resource is not owned by the purged project.
    DeleteSkip { kind: String, description: String },
    /// Delete failure tolerated because only explicit kinds were requested.
    DeleteError { kind: String, description: String },
    DryRunListed {
        order: i32,
        kind: String,
        description: String,
    },
}

/// Keystone password credentials.
///
/// The password is cleared from memory when this struct is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: String,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
}

impl Debug for PasswordCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("username", &self.username)
            .field("password", &"** redacted **")
            .field("user_domain_name", &self.user_domain_name)
            .field("user_domain_id", &self.user_domain_id)
            .finish()
    }
}
