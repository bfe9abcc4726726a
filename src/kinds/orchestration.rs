use anyhow::Result;
use async_trait::async_trait;

use crate::cloud::ServiceType;
use crate::kinds::{KindContext, ResourceKind, unexpected_resource};
use crate::types::Resource;

/// Heat stacks. Purged first: deleting a stack deletes the resources it
/// created, so each delete only returns once the stack is gone.
pub struct Stacks {
    ctx: KindContext,
}

impl Stacks {
    pub const NAME: &'static str = "Stacks";
    pub const ORDER: i32 = 10;

    pub fn new(ctx: &KindContext) -> Self {
        Stacks { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Stacks {
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
        if !self.ctx.cloud.has_service(ServiceType::Orchestration) {
            return Ok(Vec::new());
        }
        Ok(self
            .ctx
            .cloud
            .list_stacks()
            .await?
            .into_iter()
            .map(Resource::Stack)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Stack(stack) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx
            .cloud
            .delete_stack(&stack.stack_name, &stack.id)
            .await
    }
}
