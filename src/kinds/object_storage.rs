//! Swift kinds.
//!
//! Swift accounts are scoped to a single project, so everything listed
//! through the project-scoped connection belongs to the purged project.
//! Objects are purged last among the data kinds because images and volume
//! backups may be stored in the object store.

use anyhow::Result;
use async_trait::async_trait;

use crate::kinds::image::Images;
use crate::kinds::{KindContext, ResourceKind, none_remaining, unexpected_resource};
use crate::types::{Resource, StorageObject};

async fn list_all_objects(ctx: &KindContext) -> Result<Vec<StorageObject>> {
    let mut objects = Vec::new();
    for container in ctx.cloud.list_containers().await? {
        let mut listed = ctx.cloud.list_objects(&container.name).await?;
        for object in listed.iter_mut() {
            object.container_name = container.name.clone();
        }
        objects.extend(listed);
    }
    Ok(objects)
}

pub struct Objects {
    ctx: KindContext,
}

impl Objects {
    pub const NAME: &'static str = "Objects";
    pub const ORDER: i32 = 73;

    pub fn new(ctx: &KindContext) -> Self {
        Objects { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Objects {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    /// Owned images and volume backups may still be stored as objects.
    async fn check_prerequisite(&self) -> Result<bool> {
        Ok(none_remaining(Images::list_owned(&self.ctx).await)?
            && none_remaining(self.ctx.cloud.list_volume_backups().await)?)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(list_all_objects(&self.ctx)
            .await?
            .into_iter()
            .map(Resource::StorageObject)
            .collect())
    }

    async fn should_delete(&self, _resource: &Resource) -> Result<bool> {
        Ok(true)
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::StorageObject(object) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx
            .cloud
            .delete_object(&object.container_name, &object.name)
            .await
    }
}

pub struct Containers {
    ctx: KindContext,
}

impl Containers {
    pub const NAME: &'static str = "Containers";
    pub const ORDER: i32 = 75;

    pub fn new(ctx: &KindContext) -> Self {
        Containers { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Containers {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn project_id(&self) -> &str {
        &self.ctx.project_id
    }

    /// Swift refuses to delete a container that still holds objects.
    async fn check_prerequisite(&self) -> Result<bool> {
        none_remaining(list_all_objects(&self.ctx).await)
    }

    async fn list(&self) -> Result<Vec<Resource>> {
        Ok(self
            .ctx
            .cloud
            .list_containers()
            .await?
            .into_iter()
            .map(Resource::Container)
            .collect())
    }

    async fn should_delete(&self, _resource: &Resource) -> Result<bool> {
        Ok(true)
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Container(container) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_container(&container.name).await
    }
}
