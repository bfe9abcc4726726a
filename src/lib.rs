/*!
# Overview
ospurge-rs deletes every resource a project owns in an OpenStack cloud.
Servers, volumes, snapshots, networks, routers, images, objects, stacks and
alarms are purged concurrently, each kind waiting until the resources it
depends on are gone.

## Features
- **Dependency aware**: each resource kind waits for the kinds it depends on
  (e.g. volumes wait for their snapshots and the servers they are attached to)
- **Concurrent**: kinds are purged on a bounded worker pool
- **Fail fast**: a kind that cannot be purged stops every other kind
- **Safe by default**: dry-run mode, ownership filter on every resource,
  shared resources (public images, external networks) are kept unless asked
- **Extensible**: third-party resource kinds can be registered next to the
  built-in ones
- **Library-First**: the `ospurge` CLI is a thin wrapper over this library

## As a Library

```toml
[dependencies]
ospurge-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use ospurge_rs::cloud::openstack::OpenStackClient;
use ospurge_rs::config::args::parse_from_args;
use ospurge_rs::{
    Config, KindContext, KindRegistry, PurgePipeline, PurgeSession,
    create_purge_cancellation_token,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = vec![
        "ospurge",
        "--purge-project",
        "demo",
        "--dry-run",
        "--os-auth-url",
        "https://keystone.example.com:5000/v3",
        "--os-username",
        "admin",
        "--os-password",
        "secret",
    ];

    let parsed_args = parse_from_args(args)?;
    let config = Config::try_from(parsed_args).map_err(anyhow::Error::msg)?;
    let client_config = config.client_config.clone().unwrap();

    let identity = OpenStackClient::connect(&client_config).await?;
    let mut session = PurgeSession::new(Box::new(identity), &config).await?;
    session.prepare().await?;

    let ctx = KindContext::new(
        session.connect().await?,
        session.project_id(),
        config.delete_shared_resources,
    );
    let kinds = KindRegistry::with_builtin_kinds().instantiate(&ctx, config.resources.as_deref())?;

    let mut pipeline = PurgePipeline::new(config, kinds, create_purge_cancellation_token());
    pipeline.close_stats_sender();
    pipeline.run().await;
    session.restore().await?;

    if let Some(messages) = pipeline.get_error_messages() {
        eprintln!("{}", messages.join("\n"));
    }
    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod cloud;
pub mod config;
pub mod kinds;
pub mod pipeline;
pub mod runner;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use kinds::{Kind, KindContext, KindRegistry, ResourceKind};
pub use pipeline::PurgePipeline;
pub use runner::{KindOutcome, KindStatus};
pub use session::PurgeSession;
pub use types::error::{PurgeError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PurgeCancellationToken, create_purge_cancellation_token};
pub use types::{PurgeStatistics, Resource};
