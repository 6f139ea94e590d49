//! Engine error types

use canary_clients::ClientError;
use thiserror::Error;

/// Failures that abort a cycle. Probe failures never surface here;
/// they are recorded on the metric sink.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Identity login failed
    #[error("Login failed: {0}")]
    Login(#[source] ClientError),

    /// A setup call failed
    #[error("Setup step '{step}' failed: {source}")]
    Setup {
        step: &'static str,
        #[source]
        source: ClientError,
    },

    /// Setup completed but produced an unusable entity
    #[error("Setup step '{step}' returned unusable data: {reason}")]
    InvalidSetup { step: &'static str, reason: String },
}

impl EngineError {
    pub(crate) fn setup(step: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| EngineError::Setup { step, source }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
