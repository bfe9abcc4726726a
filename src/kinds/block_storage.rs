//! Cinder kinds.
//!
//! Volume groups and group snapshots only exist when the volume service
//! speaks the v3 API; on older endpoints those kinds list nothing and the
//! prerequisites that depend on them are skipped.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::kinds::{KindContext, ResourceKind, is_owned_by, none_remaining, unexpected_resource};
use crate::types::error::{is_endpoint_not_found_error, is_not_found_error};
use crate::types::{Resource, Snapshot};

/// Older volume services do not report the project of a snapshot; the
/// snapshot then belongs to the project owning its volume. A snapshot whose
/// volume is gone is never purged.
async fn is_purged_snapshot(ctx: &KindContext, snapshot: &Snapshot) -> Result<bool> {
    if snapshot.project_id.is_some() {
        return Ok(is_owned_by(
            Snapshots::NAME,
            &Resource::Snapshot(snapshot.clone()),
            &ctx.project_id,
        ));
    }

    match ctx.cloud.get_volume(&snapshot.volume_id).await {
        Ok(volume) => Ok(is_owned_by(
            Snapshots::NAME,
            &Resource::Volume(volume),
            &ctx.project_id,
        )),
        Err(e) if is_not_found_error(&e) => {
            debug!(
                snapshot_id = %snapshot.id,
                volume_id = %snapshot.volume_id,
                "volume of snapshot not found, skipping."
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// True when no snapshot the Snapshots kind would delete is left. Snapshots
/// it skips are not waited for.
async fn no_purged_snapshots_remain(ctx: &KindContext) -> Result<bool> {
    let snapshots = match ctx.cloud.list_volume_snapshots().await {
        Ok(snapshots) => snapshots,
        Err(e) if is_endpoint_not_found_error(&e) => return Ok(true),
        Err(e) => return Err(e),
    };
    for snapshot in &snapshots {
        if is_purged_snapshot(ctx, snapshot).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub struct Backups {
    ctx: KindContext,
}

impl Backups {
    pub const NAME: &'static str = "Backups";
    pub const ORDER: i32 = 33;

    pub fn new(ctx: &KindContext) -> Self {
        Backups { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Backups {
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
            .list_volume_backups()
            .await?
            .into_iter()
            .map(Resource::Backup)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Backup(backup) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_volume_backup(&backup.id).await
    }
}

pub struct GroupSnapshots {
    ctx: KindContext,
}

impl GroupSnapshots {
    pub const NAME: &'static str = "GroupSnapshots";
    pub const ORDER: i32 = 36;

    pub fn new(ctx: &KindContext) -> Self {
        GroupSnapshots { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for GroupSnapshots {
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
        if !self.ctx.cloud.supports_volume_groups().await? {
            return Ok(Vec::new());
        }
        Ok(self
            .ctx
            .cloud
            .list_group_snapshots()
            .await?
            .into_iter()
            .map(Resource::GroupSnapshot)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::GroupSnapshot(group_snapshot) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_group_snapshot(&group_snapshot.id).await
    }
}

pub struct Snapshots {
    ctx: KindContext,
}

impl Snapshots {
    pub const NAME: &'static str = "Snapshots";
    pub const ORDER: i32 = 39;

    pub fn new(ctx: &KindContext) -> Self {
        Snapshots { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Snapshots {
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
        if !self.ctx.cloud.supports_volume_groups().await? {
            return Ok(true);
        }
        none_remaining(self.ctx.cloud.list_group_snapshots().await)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_volume_snapshots()
            .await?
            .into_iter()
            .map(Resource::Snapshot)
            .collect())
    }

    async fn should_delete(&self, resource: &Resource) -> Result<bool> {
        let Resource::Snapshot(snapshot) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        is_purged_snapshot(&self.ctx, snapshot).await
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Snapshot(snapshot) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_volume_snapshot(&snapshot.id).await
    }
}

pub struct VolumeGroups {
    ctx: KindContext,
}

impl VolumeGroups {
    pub const NAME: &'static str = "VolumeGroups";
    pub const ORDER: i32 = 60;

    pub fn new(ctx: &KindContext) -> Self {
        VolumeGroups { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for VolumeGroups {
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
        if !self.ctx.cloud.supports_volume_groups().await? {
            return Ok(true);
        }
        Ok(none_remaining(self.ctx.cloud.list_group_snapshots().await)?
            && no_purged_snapshots_remain(&self.ctx).await?)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        if !self.ctx.cloud.supports_volume_groups().await? {
            return Ok(Vec::new());
        }
        Ok(self
            .ctx
            .cloud
            .list_volume_groups()
            .await?
            .into_iter()
            .map(Resource::VolumeGroup)
            .collect())
    }

    /// Deletes the group together with the volumes it contains.
    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::VolumeGroup(group) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_volume_group(&group.id, true).await
    }
}

pub struct Volumes {
    ctx: KindContext,
}

impl Volumes {
    pub const NAME: &'static str = "Volumes";
    pub const ORDER: i32 = 65;

    pub fn new(ctx: &KindContext) -> Self {
        Volumes { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Volumes {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    /// Attached volumes and volumes with snapshots cannot be deleted.
    ///
    /// Only snapshots the Snapshots kind deletes are waited for. One it skips
    /// would otherwise hold Volumes until the prerequisite timeout.
    async fn check_prerequisite(&self) -> Result<bool> {
        if !no_purged_snapshots_remain(&self.ctx).await?
            || !none_remaining(self.ctx.cloud.list_servers().await)?
        {
            return Ok(false);
        }
        if !self.ctx.cloud.supports_volume_groups().await? {
            return Ok(true);
        }
        none_remaining(self.ctx.cloud.list_volume_groups().await)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_volumes()
            .await?
            .into_iter()
            .map(Resource::Volume)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Volume(volume) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_volume(&volume.id).await
    }
}
