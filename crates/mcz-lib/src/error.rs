use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the install engine.
///
/// Operations return `anyhow::Result`; callers that need to branch on the
/// failure kind use `err.downcast_ref::<LauncherError>()`.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("request to {url} failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("hash mismatch for {}: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("version {0} not found in the upstream version list")]
    VersionNotFound(String),

    #[error("{context} is missing required field `{field}`")]
    MissingField { context: String, field: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// `Updater::update` reports cancellation as `UpdateOutcome::Cancelled`;
    /// this variant only appears through `UpdateOutcome::into_result`.
    #[error("operation cancelled")]
    Cancelled,

    #[error("version inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),

    #[error("patch installer exited with {status}")]
    Patch { status: String },
}

impl LauncherError {
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        LauncherError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }
}

/// Identity service failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed authentication request: {0}")]
    BadRequest(String),

    #[error("invalid credentials: {0}")]
    Forbidden(String),

    #[error("authentication server answered HTTP {0}")]
    Status(u16),
}
