use anyhow::Result;
use async_trait::async_trait;

use crate::kinds::{KindContext, ResourceKind, unexpected_resource};
use crate::types::Resource;

/// Aodh alarms of the project.
pub struct Alarms {
    ctx: KindContext,
}

impl Alarms {
    pub const NAME: &'static str = "Alarms";
    pub const ORDER: i32 = 20;

    pub fn new(ctx: &KindContext) -> Self {
        Alarms { ctx: ctx.clone() }
    }
}

#[async_trait]
impl ResourceKind for Alarms {
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
            .list_alarms(&self.ctx.project_id)
            .await?
            .into_iter()
            .map(Resource::Alarm)
            .collect())
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let Resource::Alarm(alarm) = resource else {
            return Err(unexpected_resource(self.name(), resource));
        };
        self.ctx.cloud.delete_alarm(&alarm.alarm_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ServiceType;
    use crate::test_utils::{FakeCloud, OTHER_PROJECT_ID, TEST_PROJECT_ID, make_kind_context};
    use crate::types::Alarm;
    use crate::types::error::is_endpoint_not_found_error;

    fn alarm(id: &str, project_id: &str) -> Alarm {
        Alarm {
            alarm_id: id.to_string(),
            name: format!("cpu-{id}"),
            project_id: Some(project_id.to_string()),
        }
    }

    #[tokio::test]
    async fn list_only_project_alarms() {
        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.alarms = vec![alarm("a1", TEST_PROJECT_ID), alarm("a2", OTHER_PROJECT_ID)];
        });
        let kind = Alarms::new(&make_kind_context(&cloud));

        let resources = kind.list().await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(kind.to_str(&resources[0]), "Alarm (id='a1', name='cpu-a1')");

        kind.delete(&resources[0]).await.unwrap();
        assert_eq!(cloud.delete_calls(), vec!["alarm:a1"]);
    }

    #[tokio::test]
    async fn list_without_alarming_service_is_endpoint_not_found() {
        let cloud = FakeCloud::new();
        cloud.with_state(|state| {
            state.unavailable_services.insert(ServiceType::Alarming);
        });
        let kind = Alarms::new(&make_kind_context(&cloud));

        let error = kind.list().await.unwrap_err();
        assert!(is_endpoint_not_found_error(&error));
    }
}
