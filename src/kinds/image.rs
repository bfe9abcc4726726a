use anyhow::Result;
use async_trait::async_trait;

use crate::kinds::{KindContext, ResourceKind, unexpected_resource};
use crate::types::{Image, Resource};

/// Glance images owned by the project.
///
/// Public images stay unless shared resources are deleted as well. An image
/// without an owner is never deleted.
pub struct Images {
    ctx: KindContext,
}

impl Images {
    pub const NAME: &'static str = "Images";
    pub const ORDER: i32 = 53;

    pub fn new(ctx: &KindContext) -> Self {
        Images { ctx: ctx.clone() }
    }

    pub(crate) async fn list_owned(ctx: &KindContext) -> Result<Vec<Image>> {
        Ok(ctx
            .cloud
            .list_images()
            .await?
            .into_iter()
            .filter(|image| is_purgeable_image(image, &ctx.project_id, ctx.delete_shared_resources))
            .collect())
    }
}

fn is_purgeable_image(image: &Image, project_id: &str, delete_shared_resources: bool) -> bool {
    image.owner.as_deref() == Some(project_id) && (delete_shared_resources || !image.is_public())
}

#[async_trait]
impl ResourceKind for Images {
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
        Ok(Images::list_owned(&self.ctx)
            .await?
            .into_iter()
            .map(Resource::Image)
            .collect())
    }

    async fn should_delete(&self, resource: &Resource) -> Result<bool> {
        Ok(resource.owner() == Some(self.project_id()))
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Image(image) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_image(&image.id).await
    }
}
