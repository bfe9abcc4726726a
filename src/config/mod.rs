pub mod args;

use crate::types::PasswordCredentials;

/// Main configuration for an ospurge-rs run.
///
/// Holds everything needed to run a [`PurgePipeline`](crate::PurgePipeline):
/// which project to purge, which kinds to select, worker pool size, retry and
/// prerequisite timing, and the cloud connection settings used by the binary.
///
/// # Quick Start
///
/// ```
/// use ospurge_rs::Config;
///
/// let config = Config::for_project("demo-project");
/// assert_eq!(config.worker_size, 8);
/// assert_eq!(config.delete_retry_config.max_attempts, 10);
/// ```
///
/// Then customize fields as needed:
///
/// ```
/// use ospurge_rs::Config;
///
/// let mut config = Config::for_own_project();
/// config.dry_run = true;
/// config.resources = Some(vec!["Volumes".to_string(), "Snapshots".to_string()]);
/// assert!(config.is_explicit_kind_selection());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub target: PurgeTarget,
    pub dry_run: bool,
    pub delete_shared_resources: bool,
    /// Explicitly selected kind names. `None` selects every registered kind.
    pub resources: Option<Vec<String>>,
    /// Delete the project after a successful purge.
    pub delete_project: bool,
    pub admin_role_name: String,
    pub worker_size: u16,
    pub delete_retry_config: DeleteRetryConfig,
    pub prerequisite_config: PrerequisiteConfig,
    pub client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
    pub show_no_result: bool,
}

/// Project whose resources are purged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeTarget {
    /// Another project, given by id or name. Requires an admin account.
    Project(String),
    /// The project the credentials are scoped to.
    OwnProject,
}

impl Config {
    /// Configuration purging the project the credentials are scoped to.
    pub fn for_own_project() -> Self {
        Config::default()
    }

    /// Configuration purging another project, looked up by id or name.
    pub fn for_project(id_or_name: &str) -> Self {
        Config {
            target: PurgeTarget::Project(id_or_name.to_string()),
            ..Config::default()
        }
    }

    /// True when `--resource` restricted the run to named kinds.
    ///
    /// In that mode prerequisites are not awaited and a kind whose deletes keep
    /// failing does not stop the other kinds.
    pub fn is_explicit_kind_selection(&self) -> bool {
        self.resources.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: PurgeTarget::OwnProject,
            dry_run: false,
            delete_shared_resources: false,
            resources: None,
            delete_project: false,
            admin_role_name: "admin".to_string(),
            worker_size: 8,
            delete_retry_config: DeleteRetryConfig::default(),
            prerequisite_config: PrerequisiteConfig::default(),
            client_config: None,
            tracing_config: None,
            auto_complete_shell: None,
            show_no_result: false,
        }
    }
}

/// Bounded retry of a single delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRetryConfig {
    /// Total number of delete attempts, including the first one.
    pub max_attempts: u32,
    pub interval_milliseconds: u64,
}

impl Default for DeleteRetryConfig {
    fn default() -> Self {
        DeleteRetryConfig {
            max_attempts: 10,
            interval_milliseconds: 5000,
        }
    }
}

/// Polling of a kind's prerequisite before it starts deleting.
///
/// The poll interval starts at `initial_interval_milliseconds` and doubles up
/// to `max_interval_milliseconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrerequisiteConfig {
    pub timeout_milliseconds: u64,
    pub initial_interval_milliseconds: u64,
    pub max_interval_milliseconds: u64,
}

impl Default for PrerequisiteConfig {
    fn default() -> Self {
        PrerequisiteConfig {
            timeout_milliseconds: 120_000,
            initial_interval_milliseconds: 2000,
            max_interval_milliseconds: 8000,
        }
    }
}

/// OpenStack connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub auth_url: String,
    pub credentials: PasswordCredentials,
    pub project_scope: ProjectScope,
    pub region_name: Option<String>,
    /// Endpoint interface picked from the service catalog (`public`, `internal`, `admin`).
    pub interface: String,
    pub insecure: bool,
    pub timeout_milliseconds: Option<u64>,
    pub stack_delete_config: StackDeleteConfig,
}

/// Polling of a Heat stack after its delete call, until it is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackDeleteConfig {
    pub poll_interval_milliseconds: u64,
    pub timeout_milliseconds: u64,
}

impl Default for StackDeleteConfig {
    fn default() -> Self {
        StackDeleteConfig {
            poll_interval_milliseconds: 2000,
            timeout_milliseconds: 3_600_000,
        }
    }
}

/// Project the credentials authenticate against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectScope {
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub project_domain_id: Option<String>,
    pub project_domain_name: Option<String>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    /// Keep the HTTP client's events instead of filtering them out.
    pub http_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
