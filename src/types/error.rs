use anyhow::Error;
use thiserror::Error;

/// Exit code for a run that finished with its cancellation flag set.
pub const EXIT_CODE_PURGE_FAILED: i32 = 1;

/// Application-level error types for ospurge-rs.
///
/// These travel inside `anyhow::Error` across the async boundaries of the
/// runners and the pipeline and are recovered with `downcast_ref`.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 1: Purge failures (Api, DeletionFailed, PrerequisiteTimeout, Cancelled, ...)
/// - 2: Project lookup and configuration errors (ProjectNotFound, InvalidConfig)
/// - 3: Authentication failure
/// - 5: Connection failure
/// - 6: Missing privilege (NotAuthorized)
#[derive(Error, Debug, PartialEq)]
pub enum PurgeError {
    /// The resource does not exist (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The service is not present in the service catalog.
    #[error("Endpoint not found for service: {0}")]
    EndpointNotFound(String),

    /// Any other failure reported by a cloud API.
    #[error("Cloud API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unable to connect to the cloud: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// The delete retry budget was exhausted.
    #[error("Failed to delete {kind} resource after {attempts} attempts: {message}")]
    DeletionFailed {
        kind: String,
        attempts: u32,
        message: String,
    },

    #[error("Prerequisite of {kind} not met within {timeout_secs} seconds")]
    PrerequisiteTimeout { kind: String, timeout_secs: u64 },

    /// A kind was handed a record it does not manage.
    #[error("{kind} cannot handle resource: {resource}")]
    UnexpectedResource { kind: String, resource: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stopped because another kind failed or the user interrupted the run.
    #[error("Operation cancelled")]
    Cancelled,
}

impl PurgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PurgeError::ProjectNotFound(_) | PurgeError::InvalidConfig(_) => 2,
            PurgeError::AuthenticationFailed(_) => 3,
            PurgeError::Connection(_) => 5,
            PurgeError::NotAuthorized(_) => 6,
            _ => EXIT_CODE_PURGE_FAILED,
        }
    }
}

pub fn is_cancelled_error(e: &Error) -> bool {
    matches!(e.downcast_ref::<PurgeError>(), Some(PurgeError::Cancelled))
}

/// Absence of the resource. Callers treat this as success for deletes.
pub fn is_not_found_error(e: &Error) -> bool {
    matches!(e.downcast_ref::<PurgeError>(), Some(PurgeError::NotFound(_)))
}

pub fn is_endpoint_not_found_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<PurgeError>(),
        Some(PurgeError::EndpointNotFound(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<PurgeError>() {
        return err.exit_code();
    }
    EXIT_CODE_PURGE_FAILED
}
