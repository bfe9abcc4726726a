use crate::config::{
    ClientConfig, Config, DeleteRetryConfig, PrerequisiteConfig, ProjectScope, PurgeTarget,
    StackDeleteConfig, TracingConfig,
};
use crate::kinds::registry::BUILTIN_KIND_NAMES;
use crate::types::PasswordCredentials;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_WORKER_SIZE: u16 = 8;
const DEFAULT_ADMIN_ROLE_NAME: &str = "admin";
const DEFAULT_DELETE_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_DELETE_RETRY_INTERVAL_MILLISECONDS: u64 = 5000;
const DEFAULT_PREREQUISITE_TIMEOUT_MILLISECONDS: u64 = 120_000;
const DEFAULT_PREREQUISITE_INITIAL_INTERVAL_MILLISECONDS: u64 = 2000;
const DEFAULT_PREREQUISITE_MAX_INTERVAL_MILLISECONDS: u64 = 8000;
const DEFAULT_STACK_DELETE_POLL_INTERVAL_MILLISECONDS: u64 = 2000;
const DEFAULT_STACK_DELETE_TIMEOUT_MILLISECONDS: u64 = 3_600_000;
const DEFAULT_OS_INTERFACE: &str = "public";
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_DELETE_SHARED_RESOURCES: bool = false;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_INSECURE: bool = false;
const DEFAULT_SHOW_NO_RESULT: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_NO_TARGET: &str =
    "One of --purge-project <ID_OR_NAME> or --purge-own-project is required.";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_DELETE_MAX_ATTEMPTS_ZERO: &str = "Delete max attempts must be at least 1.";
const ERROR_MESSAGE_INTERVAL_ZERO: &str = "Retry and prerequisite intervals must be at least 1.";
const ERROR_MESSAGE_PREREQUISITE_TIMEOUT_ZERO: &str = "Prerequisite timeout must be at least 1.";
const ERROR_MESSAGE_STACK_DELETE_ZERO: &str =
    "Stack delete poll interval and timeout must be at least 1.";
const ERROR_MESSAGE_INITIAL_INTERVAL_TOO_LARGE: &str =
    "Prerequisite initial interval must not exceed the max interval.";
const ERROR_MESSAGE_NO_AUTH_URL: &str = "Authentication URL is required (--os-auth-url or OS_AUTH_URL).";
const ERROR_MESSAGE_NO_USERNAME: &str = "Username is required (--os-username or OS_USERNAME).";
const ERROR_MESSAGE_NO_PASSWORD: &str = "Password is required (--os-password or OS_PASSWORD).";

// ---------------------------------------------------------------------------
// Value parser helpers
// ---------------------------------------------------------------------------

fn check_resource_kind(s: &str) -> Result<String, String> {
    if BUILTIN_KIND_NAMES.contains(&s) {
        Ok(s.to_string())
    } else {
        Err(format!(
            "Unknown resource kind '{s}'. Possible values: {}",
            BUILTIN_KIND_NAMES.join(", ")
        ))
    }
}

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// ospurge - Purge every resource owned by an OpenStack project.
///
/// Resources are deleted kind by kind, in dependency order, with several
/// kinds processed concurrently.
///
/// Example:
///   ospurge --purge-project demo --dry-run
///   ospurge --purge-own-project --resource Volumes --resource Snapshots
///   ospurge --purge-project 9d1b... --delete-shared-resources -v
#[derive(Parser, Clone, Debug)]
#[command(name = "ospurge", version, about, long_about = None)]
pub struct CLIArgs {
    // -----------------------------------------------------------------------
    // Target options
    // -----------------------------------------------------------------------
    /// ID or name of the project to purge. Requires an admin account.
    #[arg(
        long,
        env,
        value_parser = NonEmptyStringValueParser::new(),
        conflicts_with = "purge_own_project",
        help_heading = "Target"
    )]
    pub purge_project: Option<String>,

    /// Purge the project the credentials are scoped to.
    #[arg(long, env, help_heading = "Target")]
    pub purge_own_project: bool,

    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// List the resources that would be deleted without deleting anything.
    #[arg(short = 'd', long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    pub dry_run: bool,

    /// Also delete shared resources (public images, external networks).
    #[arg(long, env, default_value_t = DEFAULT_DELETE_SHARED_RESOURCES, help_heading = "General")]
    pub delete_shared_resources: bool,

    /// Purge only the given resource kind. Can be repeated.
    #[arg(
        long,
        value_parser = check_resource_kind,
        help_heading = "General",
        long_help = r#"Purge only the given resource kind. Can be repeated.
Prerequisites are not awaited in this mode and a kind whose deletions keep
failing does not stop the other kinds."#
    )]
    pub resource: Vec<String>,

    /// Delete the project itself once all its resources are gone.
    #[arg(
        long,
        env,
        requires = "purge_project",
        conflicts_with_all = ["dry_run", "resource"],
        help_heading = "General"
    )]
    pub delete_project: bool,

    /// Role granted to the acting user on the purged project for the run.
    #[arg(long, env, default_value = DEFAULT_ADMIN_ROLE_NAME, value_parser = NonEmptyStringValueParser::new(), help_heading = "General")]
    pub admin_role_name: String,

    /// Don't show the result summary.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_RESULT, help_heading = "General")]
    pub show_no_result: bool,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of resource kinds purged concurrently. Default: 8.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Attempts per delete call before the kind fails. Default: 10.
    #[arg(long, env, default_value_t = DEFAULT_DELETE_MAX_ATTEMPTS, help_heading = "Retry")]
    pub delete_max_attempts: u32,

    /// Interval in ms between delete attempts. Default: 5000.
    #[arg(long, env, default_value_t = DEFAULT_DELETE_RETRY_INTERVAL_MILLISECONDS, help_heading = "Retry")]
    pub delete_retry_interval_milliseconds: u64,

    /// Deadline in ms for a kind's prerequisite to be met. Default: 120000.
    #[arg(long, env, default_value_t = DEFAULT_PREREQUISITE_TIMEOUT_MILLISECONDS, help_heading = "Retry")]
    pub prerequisite_timeout_milliseconds: u64,

    /// First poll interval in ms while waiting for a prerequisite. Default: 2000.
    #[arg(long, env, default_value_t = DEFAULT_PREREQUISITE_INITIAL_INTERVAL_MILLISECONDS, help_heading = "Retry")]
    pub prerequisite_initial_interval_milliseconds: u64,

    /// Upper bound in ms of the doubling poll interval. Default: 8000.
    #[arg(long, env, default_value_t = DEFAULT_PREREQUISITE_MAX_INTERVAL_MILLISECONDS, help_heading = "Retry")]
    pub prerequisite_max_interval_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (warn), -v (info), -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Keep the HTTP client's connection events in the logs.
    #[arg(long, env, default_value_t = DEFAULT_HTTP_TRACING, help_heading = "Logging")]
    pub http_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // OpenStack options
    // -----------------------------------------------------------------------
    /// Keystone v3 authentication URL.
    #[arg(long, env = "OS_AUTH_URL", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_auth_url: Option<String>,

    #[arg(long, env = "OS_USERNAME", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_username: Option<String>,

    #[arg(long, env = "OS_PASSWORD", hide_env_values = true, help_heading = "OpenStack")]
    pub os_password: Option<String>,

    #[arg(long, env = "OS_USER_DOMAIN_NAME", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_user_domain_name: Option<String>,

    #[arg(long, env = "OS_USER_DOMAIN_ID", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_user_domain_id: Option<String>,

    #[arg(long, env = "OS_PROJECT_NAME", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_project_name: Option<String>,

    #[arg(long, env = "OS_PROJECT_ID", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_project_id: Option<String>,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_project_domain_name: Option<String>,

    #[arg(long, env = "OS_PROJECT_DOMAIN_ID", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_project_domain_id: Option<String>,

    #[arg(long, env = "OS_REGION_NAME", value_parser = NonEmptyStringValueParser::new(), help_heading = "OpenStack")]
    pub os_region_name: Option<String>,

    /// Endpoint interface used from the service catalog.
    #[arg(long, env = "OS_INTERFACE", default_value = DEFAULT_OS_INTERFACE, value_parser = ["public", "internal", "admin"], help_heading = "OpenStack")]
    pub os_interface: String,

    /// Skip TLS certificate verification.
    #[arg(long, env = "OS_INSECURE", default_value_t = DEFAULT_INSECURE, help_heading = "OpenStack")]
    pub insecure: bool,

    /// Timeout in ms of a single HTTP request.
    #[arg(long, env, help_heading = "OpenStack")]
    pub os_timeout_milliseconds: Option<u64>,

    /// Interval in ms between status checks of a stack being deleted.
    #[arg(long, env, default_value_t = DEFAULT_STACK_DELETE_POLL_INTERVAL_MILLISECONDS, help_heading = "OpenStack")]
    pub stack_delete_poll_interval_milliseconds: u64,

    /// How long in ms to wait for a stack deletion to complete.
    #[arg(long, env, default_value_t = DEFAULT_STACK_DELETE_TIMEOUT_MILLISECONDS, help_heading = "OpenStack")]
    pub stack_delete_timeout_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use ospurge_rs::config::args::parse_from_args;
///
/// let args = vec!["ospurge", "--purge-own-project", "--dry-run"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dry_run);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.delete_max_attempts == 0 {
            return Err(ERROR_MESSAGE_DELETE_MAX_ATTEMPTS_ZERO.to_string());
        }
        if self.delete_retry_interval_milliseconds == 0
            || self.prerequisite_initial_interval_milliseconds == 0
            || self.prerequisite_max_interval_milliseconds == 0
        {
            return Err(ERROR_MESSAGE_INTERVAL_ZERO.to_string());
        }
        if self.prerequisite_timeout_milliseconds == 0 {
            return Err(ERROR_MESSAGE_PREREQUISITE_TIMEOUT_ZERO.to_string());
        }
        if self.stack_delete_poll_interval_milliseconds == 0
            || self.stack_delete_timeout_milliseconds == 0
        {
            return Err(ERROR_MESSAGE_STACK_DELETE_ZERO.to_string());
        }
        if self.prerequisite_max_interval_milliseconds
            < self.prerequisite_initial_interval_milliseconds
        {
            return Err(ERROR_MESSAGE_INITIAL_INTERVAL_TOO_LARGE.to_string());
        }
        Ok(())
    }

    fn parse_target(&self) -> Result<PurgeTarget, String> {
        match (&self.purge_project, self.purge_own_project) {
            (Some(id_or_name), false) => Ok(PurgeTarget::Project(id_or_name.clone())),
            (None, true) => Ok(PurgeTarget::OwnProject),
            _ => Err(ERROR_MESSAGE_NO_TARGET.to_string()),
        }
    }

    fn build_client_config(&self) -> Result<ClientConfig, String> {
        let auth_url = self
            .os_auth_url
            .clone()
            .ok_or_else(|| ERROR_MESSAGE_NO_AUTH_URL.to_string())?;
        let username = self
            .os_username
            .clone()
            .ok_or_else(|| ERROR_MESSAGE_NO_USERNAME.to_string())?;
        let password = self
            .os_password
            .clone()
            .ok_or_else(|| ERROR_MESSAGE_NO_PASSWORD.to_string())?;

        Ok(ClientConfig {
            auth_url,
            credentials: PasswordCredentials {
                username,
                password,
                user_domain_name: self.os_user_domain_name.clone(),
                user_domain_id: self.os_user_domain_id.clone(),
            },
            project_scope: ProjectScope {
                project_id: self.os_project_id.clone(),
                project_name: self.os_project_name.clone(),
                project_domain_id: self.os_project_domain_id.clone(),
                project_domain_name: self.os_project_domain_name.clone(),
            },
            region_name: self.os_region_name.clone(),
            interface: self.os_interface.clone(),
            insecure: self.insecure,
            timeout_milliseconds: self.os_timeout_milliseconds,
            stack_delete_config: StackDeleteConfig {
                poll_interval_milliseconds: self.stack_delete_poll_interval_milliseconds,
                timeout_milliseconds: self.stack_delete_timeout_milliseconds,
            },
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            http_tracing: self.http_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        // Completion generation needs no target and no credentials.
        if args.auto_complete_shell.is_some() {
            return Ok(Config {
                auto_complete_shell: args.auto_complete_shell,
                ..Config::default()
            });
        }

        args.validate()?;

        let target = args.parse_target()?;
        let client_config = args.build_client_config()?;
        let tracing_config = args.build_tracing_config();

        let resources = if args.resource.is_empty() {
            None
        } else {
            let mut resources = args.resource.clone();
            resources.dedup();
            Some(resources)
        };

        Ok(Config {
            target,
            dry_run: args.dry_run,
            delete_shared_resources: args.delete_shared_resources,
            resources,
            delete_project: args.delete_project,
            admin_role_name: args.admin_role_name,
            worker_size: args.worker_size,
            delete_retry_config: DeleteRetryConfig {
                max_attempts: args.delete_max_attempts,
                interval_milliseconds: args.delete_retry_interval_milliseconds,
            },
            prerequisite_config: PrerequisiteConfig {
                timeout_milliseconds: args.prerequisite_timeout_milliseconds,
                initial_interval_milliseconds: args.prerequisite_initial_interval_milliseconds,
                max_interval_milliseconds: args.prerequisite_max_interval_milliseconds,
            },
            client_config: Some(client_config),
            tracing_config,
            auto_complete_shell: None,
            show_no_result: args.show_no_result,
        })
    }
}
