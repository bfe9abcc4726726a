use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace, warn};

use ospurge_rs::cloud::openstack::OpenStackClient;
use ospurge_rs::config::Config;
use ospurge_rs::{
    CLIArgs, KindContext, KindRegistry, PurgeError, PurgePipeline, PurgeSession,
    create_purge_cancellation_token, exit_code_from_error,
};

mod ctrl_c_handler;
pub mod indicator;
mod tracing_init;
pub mod ui_config;

/// ospurge - Delete every resource an OpenStack project owns.
///
/// This binary is a thin wrapper over the ospurge-rs library.
/// All core functionality is implemented in the library crate.
#[tokio::main]
async fn main() {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "ospurge",
            &mut std::io::stdout(),
        );

        return;
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    if let Err(e) = run(config).await {
        error!("{e:#}");
        std::process::exit(exit_code_from_error(&e));
    }
}

fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config) -> Result<()> {
    let client_config = config.client_config.clone().ok_or_else(|| {
        PurgeError::InvalidConfig("OpenStack connection settings are missing".to_string())
    })?;

    let identity = OpenStackClient::connect(&client_config).await?;
    let mut session = PurgeSession::new(Box::new(identity), &config).await?;

    if let Err(e) = session.prepare().await {
        if let Err(restore_error) = session.restore().await {
            warn!(error = %restore_error, "failed to restore the purged project.");
        }
        return Err(e);
    }

    let mut purge_result = purge(&config, &session).await;
    if purge_result.is_ok() && config.delete_project {
        purge_result = session.delete_project().await;
    }
    let restore_result = session.restore().await;

    purge_result?;
    restore_result
}

async fn purge(config: &Config, session: &PurgeSession) -> Result<()> {
    let ctx = KindContext::new(
        session.connect().await?,
        session.project_id(),
        config.delete_shared_resources,
    );
    let kinds =
        KindRegistry::with_builtin_kinds().instantiate(&ctx, config.resources.as_deref())?;

    let cancellation_token = create_purge_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!(
        project_id = session.project_id(),
        project_name = session.project_name().unwrap_or_default(),
        "purge pipeline start."
    );

    let mut pipeline = PurgePipeline::new(config.clone(), kinds, cancellation_token);
    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(config),
        ui_config::is_show_result_needed(config),
        config.dry_run,
    );

    pipeline.run().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if pipeline.has_error() {
        for message in pipeline.get_error_messages().unwrap_or_default() {
            error!("{}", message);
        }
        error!(duration_sec = duration_sec, "ospurge failed.");
        return Err(anyhow::anyhow!("ospurge failed."));
    }

    debug!(duration_sec = duration_sec, "ospurge has been completed.");
    Ok(())
}
