//! CLI error type and exit codes.

use std::fmt;

use survey_mirror::catalogue::FeedError;
use survey_mirror::config::ConfigError;
use survey_mirror::logging::LoggingError;
use survey_mirror::PipelineError;

/// Exit code for configuration problems.
pub const EXIT_CONFIG: i32 = 2;

/// Exit code for runtime failures.
pub const EXIT_FAILURE: i32 = 1;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing settings.
    Config(String),
    /// The configuration file could not be loaded or saved.
    ConfigFile(ConfigError),
    /// The log subscriber could not be installed.
    Logging(LoggingError),
    /// The catalogue feed could not be opened.
    Feed(FeedError),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
    /// The pipeline stopped with a fatal error.
    Pipeline(PipelineError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Feed(e) => write!(f, "Catalogue error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Feed(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<FeedError> for CliError {
    fn from(e: FeedError) -> Self {
        CliError::Feed(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("no records".into()).exit_code(), EXIT_CONFIG);
        assert_eq!(
            CliError::from(ConfigError::RecipeCycle("a -> b -> a".into())).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(PipelineError::DriverStopped).exit_code(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_display_wraps_source() {
        let err = CliError::from(PipelineError::DriverStopped);
        assert_eq!(
            err.to_string(),
            "Pipeline failed: pipeline driver stopped unexpectedly"
        );
    }
}
