use anyhow::Result;
use async_trait::async_trait;

use crate::kinds::{KindContext, ResourceKind, unexpected_resource};
use crate::types::Resource;

/// Nova instances.
pub struct Servers {
    ctx: KindContext,
}

impl Servers {
    pub const NAME: &'static str = "Servers";
    pub const ORDER: i32 = 15;

    pub fn new(ctx: &KindContext) -> Self {
        Servers { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Servers {
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
            .list_servers()
            .await?
            .into_iter()
            .map(Resource::Server)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Server(server) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_server(&server.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        FakeCloud, OTHER_PROJECT_ID, TEST_PROJECT_ID, make_kind_context, make_server,
        make_volume,
    };
    use crate::types::error::PurgeError;

    #[tokio::test]
    async fn list_filter_and_delete() {
        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.servers = vec![
                make_server("s1", TEST_PROJECT_ID),
                make_server("s2", OTHER_PROJECT_ID),
            ];
        });
        let kind = Servers::new(&make_kind_context(&cloud));

        let resources = kind.list().await.unwrap();
        assert_eq!(resources.len(), 2);
        assert!(kind.should_delete(&resources[0]).await.unwrap());
        assert!(!kind.should_delete(&resources[1]).await.unwrap());

        kind.delete(&resources[0]).await.unwrap();
        assert_eq!(cloud.delete_calls(), vec!["server:s1"]);
        assert_eq!(kind.to_str(&resources[1]), "VM (id='s2', name='vm-s2')");
    }

    #[tokio::test]
    async fn delete_rejects_other_records() {
        let cloud = FakeCloud::new();
        let kind = Servers::new(&make_kind_context(&cloud));

        let error = kind
            .delete(&Resource::Volume(make_volume("v1", TEST_PROJECT_ID)))
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<PurgeError>(),
            Some(PurgeError::UnexpectedResource { .. })
        ));
        assert!(cloud.delete_calls().is_empty());
    }
}
