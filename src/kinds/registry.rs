//! Explicit registry of resource kinds.
//!
//! The registry maps kind names to constructors. Built-in kinds are
//! registered by [`KindRegistry::with_builtin_kinds`]; library users add
//! their own kinds (or replace a built-in one) with
//! [`KindRegistry::register`].

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::kinds::block_storage::{Backups, GroupSnapshots, Snapshots, VolumeGroups, Volumes};
use crate::kinds::compute::Servers;
use crate::kinds::image::Images;
use crate::kinds::metering::Alarms;
use crate::kinds::network::{
    FloatingIps, Networks, Ports, RouterInterfaces, Routers, SecurityGroups,
};
use crate::kinds::object_storage::{Containers, Objects};
use crate::kinds::orchestration::Stacks;
use crate::kinds::{Kind, KindContext};
use crate::types::error::PurgeError;

/// Builds a kind bound to the given run context.
pub type KindConstructor = Arc<dyn Fn(&KindContext) -> Kind + Send + Sync>;

/// Names of the built-in kinds, in dependency order.
pub const BUILTIN_KIND_NAMES: &[&str] = &[
    Stacks::NAME,
    Servers::NAME,
    Alarms::NAME,
    FloatingIps::NAME,
    Backups::NAME,
    GroupSnapshots::NAME,
    Snapshots::NAME,
    RouterInterfaces::NAME,
    Routers::NAME,
    Ports::NAME,
    Networks::NAME,
    SecurityGroups::NAME,
    Images::NAME,
    VolumeGroups::NAME,
    Volumes::NAME,
    Objects::NAME,
    Containers::NAME,
];

#[derive(Clone, Default)]
pub struct KindRegistry {
    constructors: Vec<(String, KindConstructor)>,
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register(Stacks::NAME, |ctx| Box::new(Stacks::new(ctx)));
        registry.register(Servers::NAME, |ctx| Box::new(Servers::new(ctx)));
        registry.register(Alarms::NAME, |ctx| Box::new(Alarms::new(ctx)));
        registry.register(FloatingIps::NAME, |ctx| Box::new(FloatingIps::new(ctx)));
        registry.register(Backups::NAME, |ctx| Box::new(Backups::new(ctx)));
        registry.register(GroupSnapshots::NAME, |ctx| {
            Box::new(GroupSnapshots::new(ctx))
        });
        registry.register(Snapshots::NAME, |ctx| Box::new(Snapshots::new(ctx)));
        registry.register(RouterInterfaces::NAME, |ctx| {
            Box::new(RouterInterfaces::new(ctx))
        });
        registry.register(Routers::NAME, |ctx| Box::new(Routers::new(ctx)));
        registry.register(Ports::NAME, |ctx| Box::new(Ports::new(ctx)));
        registry.register(Networks::NAME, |ctx| Box::new(Networks::new(ctx)));
        registry.register(SecurityGroups::NAME, |ctx| {
            Box::new(SecurityGroups::new(ctx))
        });
        registry.register(Images::NAME, |ctx| Box::new(Images::new(ctx)));
        registry.register(VolumeGroups::NAME, |ctx| Box::new(VolumeGroups::new(ctx)));
        registry.register(Volumes::NAME, |ctx| Box::new(Volumes::new(ctx)));
        registry.register(Objects::NAME, |ctx| Box::new(Objects::new(ctx)));
        registry.register(Containers::NAME, |ctx| Box::new(Containers::new(ctx)));
        registry
    }

    /// Add a kind, or replace the constructor of an already registered name.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&KindContext) -> Kind + Send + Sync + 'static,
    {
        let constructor: KindConstructor = Arc::new(constructor);
        match self
            .constructors
            .iter_mut()
            .find(|(registered, _)| registered == name)
        {
            Some(entry) => {
                debug!(kind = name, "replacing registered resource kind.");
                entry.1 = constructor;
            }
            None => self.constructors.push((name.to_string(), constructor)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.iter().any(|(registered, _)| registered == name)
    }

    /// Create the kinds to purge, sorted by ascending order.
    ///
    /// With no selection every registered kind is created. Kinds sharing an
    /// order keep their registration order.
    pub fn instantiate(&self, ctx: &KindContext, selection: Option<&[String]>) -> Result<Vec<Kind>> {
        let mut kinds: Vec<Kind> = match selection {
            None => self
                .constructors
                .iter()
                .map(|(_, constructor)| constructor(ctx))
                .collect(),
            Some(names) => {
                if let Some(unknown) = names.iter().find(|name| !self.contains(name)) {
                    return Err(PurgeError::InvalidConfig(format!(
                        "Unknown resource kind '{unknown}'. Possible values: {}",
                        self.names().join(", ")
                    ))
                    .into());
                }
                self.constructors
                    .iter()
                    .filter(|(name, _)| names.contains(name))
                    .map(|(_, constructor)| constructor(ctx))
                    .collect()
            }
        };

        kinds.sort_by_key(|kind| kind.order());
        Ok(kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::ResourceKind;
    use crate::test_utils::{FakeCloud, make_kind_context};
    use crate::types::Resource;
    use async_trait::async_trait;

    struct Widgets {
        order: i32,
        project_id: String,
    }

    #[async_trait]
    impl ResourceKind for Widgets {
        fn name(&self) -> &str {
            "Widgets"
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn project_id(&self) -> &str {
            &self.project_id
        }

        async fn list(&self) -> Result<Vec<Resource>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _resource: &Resource) -> Result<()> {
            Ok(())
        }
    }

    fn kind_names(kinds: &[Kind]) -> Vec<String> {
        kinds.iter().map(|kind| kind.name().to_string()).collect()
    }

    #[test]
    fn builtin_registry_matches_builtin_names() {
        let registry = KindRegistry::with_builtin_kinds();
        assert_eq!(registry.names(), BUILTIN_KIND_NAMES.to_vec());
    }

    #[test]
    fn instantiate_all_sorted_by_order() {
        let registry = KindRegistry::with_builtin_kinds();
        let kinds = registry
            .instantiate(&make_kind_context(&FakeCloud::new()), None)
            .unwrap();

        let orders: Vec<i32> = kinds.iter().map(|kind| kind.order()).collect();
        assert_eq!(
            orders,
            vec![10, 15, 20, 25, 33, 36, 39, 42, 44, 46, 48, 49, 53, 60, 65, 73, 75]
        );
        assert_eq!(kind_names(&kinds), BUILTIN_KIND_NAMES.to_vec());
    }

    #[test]
    fn instantiate_selection_keeps_dependency_order() {
        let registry = KindRegistry::with_builtin_kinds();
        let selection = vec!["Volumes".to_string(), "Servers".to_string()];
        let kinds = registry
            .instantiate(&make_kind_context(&FakeCloud::new()), Some(&selection))
            .unwrap();

        assert_eq!(kind_names(&kinds), vec!["Servers", "Volumes"]);
    }

    #[test]
    fn instantiate_rejects_unknown_kind() {
        let registry = KindRegistry::with_builtin_kinds();
        let selection = vec!["Servers".to_string(), "Widgets".to_string()];
        let result = registry.instantiate(&make_kind_context(&FakeCloud::new()), Some(&selection));

        let error = result.err().unwrap();
        assert!(matches!(
            error.downcast_ref::<PurgeError>(),
            Some(PurgeError::InvalidConfig(message)) if message.contains("'Widgets'")
        ));
    }

    #[test]
    fn register_adds_and_replaces_kinds() {
        let mut registry = KindRegistry::with_builtin_kinds();
        registry.register("Widgets", |ctx| {
            Box::new(Widgets {
                order: 50,
                project_id: ctx.project_id.clone(),
            })
        });
        assert!(registry.contains("Widgets"));

        let ctx = make_kind_context(&FakeCloud::new());
        let kinds = registry.instantiate(&ctx, None).unwrap();
        let position = kinds
            .iter()
            .position(|kind| kind.name() == "Widgets")
            .unwrap();
        assert_eq!(kinds[position - 1].name(), "SecurityGroups");
        assert_eq!(kinds[position + 1].name(), "Images");

        registry.register("Widgets", |ctx| {
            Box::new(Widgets {
                order: 1,
                project_id: ctx.project_id.clone(),
            })
        });
        let kinds = registry.instantiate(&ctx, None).unwrap();
        assert_eq!(kinds[0].name(), "Widgets");
        assert_eq!(registry.names().len(), BUILTIN_KIND_NAMES.len() + 1);
    }
}
