//! Neutron kinds.
//!
//! Routers cannot be deleted while interfaces are attached to them, router
//! interfaces cannot be removed while floating IPs are associated through
//! them, and networks cannot be deleted while ports other than the DHCP
//! agent's remain.

use anyhow::Result;
use async_trait::async_trait;

use crate::kinds::{KindContext, ResourceKind, none_remaining, unexpected_resource};
use crate::types::Resource;

const DEVICE_OWNER_DHCP: &str = "network:dhcp";
const DEVICE_OWNER_ROUTER_INTERFACE: &str = "network:router_interface";
const DEVICE_OWNER_ROUTER_INTERFACE_DISTRIBUTED: &str = "network:router_interface_distributed";

const DEFAULT_SECURITY_GROUP_NAME: &str = "default";

pub struct FloatingIps {
    ctx: KindContext,
}

impl FloatingIps {
    pub const NAME: &'static str = "FloatingIPs";
    pub const ORDER: i32 = 25;

    pub fn new(ctx: &KindContext) -> Self {
        FloatingIps { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for FloatingIps {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    /// A floating IP still associated with a server cannot be released.
    async fn check_prerequisite(&self) -> Result<bool> {
        none_remaining(self.ctx.cloud.list_servers().await)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_floating_ips(&self.ctx.project_id)
            .await?
            .into_iter()
            .map(Resource::FloatingIp)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::FloatingIp(floating_ip) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_floating_ip(&floating_ip.id).await
    }
}

/// Router ports, detached from their router instead of deleted.
pub struct RouterInterfaces {
    ctx: KindContext,
}

impl RouterInterfaces {
    pub const NAME: &'static str = "RouterInterfaces";
    pub const ORDER: i32 = 42;

    pub fn new(ctx: &KindContext) -> Self {
        RouterInterfaces { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for RouterInterfaces {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    async fn check_prerequisite(&self) -> Result<bool> {
        Ok(none_remaining(self.ctx.cloud.list_servers().await)?
            && none_remaining(
                self.ctx
                    .cloud
                    .list_floating_ips(&self.ctx.project_id)
                    .await,
            )?)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_ports(
                &self.ctx.project_id,
                &[
                    DEVICE_OWNER_ROUTER_INTERFACE,
                    DEVICE_OWNER_ROUTER_INTERFACE_DISTRIBUTED,
                ],
            )
            .await?
            .into_iter()
            .map(Resource::Port)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Port(port) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx
            .cloud
            .remove_router_interface(&port.device_id, &port.id)
            .await
    }

    fn to_str(&self, resource: &Resource) -> String {
        match resource {
            Resource::Port(port) => format!(
                "Router Interface (id='{}', router_id='{}')",
                port.id, port.device_id
            ),
            other => other.to_string(),
        }
    }
}

pub struct Routers {
    ctx: KindContext,
}

impl Routers {
    pub const NAME: &'static str = "Routers";
    pub const ORDER: i32 = 44;

    pub fn new(ctx: &KindContext) -> Self {
        Routers { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Routers {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    async fn check_prerequisite(&self) -> Result<bool> {
        none_remaining(
            self.ctx
                .cloud
                .list_ports(&self.ctx.project_id, &[DEVICE_OWNER_ROUTER_INTERFACE])
                .await,
        )
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_routers(&self.ctx.project_id)
            .await?
            .into_iter()
            .map(Resource::Router)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Router(router) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_router(&router.id).await
    }
}

/// Ports not managed by Neutron itself.
pub struct Ports {
    ctx: KindContext,
}

impl Ports {
    pub const NAME: &'static str = "Ports";
    pub const ORDER: i32 = 46;

    pub fn new(ctx: &KindContext) -> Self {
        Ports { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Ports {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_ports(&self.ctx.project_id, &[])
            .await?
            .into_iter()
            .filter(|port| {
                port.device_owner != DEVICE_OWNER_DHCP
                    && port.device_owner != DEVICE_OWNER_ROUTER_INTERFACE
            })
            .map(Resource::Port)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Port(port) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_port(&port.id).await
    }
}

pub struct Networks {
    ctx: KindContext,
}

impl Networks {
    pub const NAME: &'static str = "Networks";
    pub const ORDER: i32 = 48;

    pub fn new(ctx: &KindContext) -> Self {
        Networks { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Networks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    /// DHCP ports go away together with their network.
    async fn check_prerequisite(&self) -> Result<bool> {
        let ports = self
            .ctx
            .cloud
            .list_ports(&self.ctx.project_id, &[])
            .await
            .map(|ports| {
                ports
                    .into_iter()
                    .filter(|port| port.device_owner != DEVICE_OWNER_DHCP)
                    .collect::<Vec<_>>()
            });
        none_remaining(ports)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        let delete_shared = self.ctx.delete_shared_resources;
        Ok(self
            .ctx
            .cloud
            .list_networks(&self.ctx.project_id)
            .await?
            .into_iter()
            .filter(|network| delete_shared || !network.router_external)
            .map(Resource::Network)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Network(network) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_network(&network.id).await
    }
}

/// Security groups, except the per-project `default` group.
pub struct SecurityGroups {
    ctx: KindContext,
}

impl SecurityGroups {
    pub const NAME: &'static str = "SecurityGroups";
    pub const ORDER: i32 = 49;

    pub fn new(ctx: &KindContext) -> Self {
        SecurityGroups { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for SecurityGroups {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_security_groups(&self.ctx.project_id)
            .await?
            .into_iter()
            .filter(|group| group.name != DEFAULT_SECURITY_GROUP_NAME)
            .map(Resource::SecurityGroup)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::SecurityGroup(group) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_security_group(&group.id).await
    }
}
