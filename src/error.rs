//! Custom error types and handling
//!
//! This module defines the application's error taxonomy. Configuration,
//! code resolution and before-script failures abort a run before any worker
//! starts. Pipeline failures are not errors of the run itself; they stop the
//! worker pool and are reported through
//! [`RunOutcome::PipelineFailure`](crate::stress::RunOutcome::PipelineFailure).

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Code resolution error: {0}")]
    CodeResolution(String),

    #[error("Before script `{command}` failed: {reason}")]
    BeforeScript { command: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) | Self::Config(_) => "CONFIGURATION_ERROR",
            Self::CodeResolution(_) => "CODE_RESOLUTION_ERROR",
            Self::BeforeScript { .. } => "BEFORE_SCRIPT_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the error was raised before any worker started
    pub fn is_pre_run(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Config(_) | Self::CodeResolution(_) | Self::BeforeScript { .. }
        )
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
