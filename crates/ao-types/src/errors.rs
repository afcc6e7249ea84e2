use thiserror::Error;

/// Main error type for allenopt
#[derive(Error, Debug)]
pub enum AoError {
    #[error("Search space error: {0}")]
    SearchSpace(#[from] SearchSpaceError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("Study error: {0}")]
    Study(#[from] StudyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AoError {
    /// True for errors caused by user-supplied configuration, which are
    /// raised before any trial starts.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AoError::SearchSpace(_) | AoError::Template(_) | AoError::Config(_)
        )
    }
}

/// Search-space description errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchSpaceError {
    #[error("Unknown sampling strategy: {strategy} (parameter {parameter})")]
    UnknownStrategy { parameter: String, strategy: String },

    #[error("Parameter {parameter} is missing field \"{field}\"")]
    MissingField { parameter: String, field: String },

    #[error("Invalid bounds for {parameter}: {message}")]
    InvalidBounds { parameter: String, message: String },

    #[error("Parameter {parameter} has no choices")]
    EmptyChoices { parameter: String },

    #[error("Search space must be a JSON object, got {found}")]
    NotAnObject { found: String },
}

/// Errors raised while evaluating a configuration template
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Failed to evaluate {origin}: {message}")]
    Evaluation { origin: String, message: String },

    #[error("{origin} did not produce a JSON document: {message}")]
    Output { origin: String, message: String },
}

/// Errors surfaced by a delegated training run
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Failed to launch trainer {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trainer exited with {status}")]
    ProcessFailed { status: String },

    #[error("Metrics file not found: {path}")]
    MetricsMissing { path: String },

    #[error("Metrics file {path} is malformed: {message}")]
    MalformedMetrics { path: String, message: String },

    #[error("Metric {metric} not reported by training run")]
    MetricNotReported { metric: String },

    #[error("Metric {metric} is not numeric: {value}")]
    NonNumericMetric { metric: String, value: String },
}

/// Optimization engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StudyError {
    #[error("No trials are completed yet")]
    NoCompletedTrials,

    #[error("Study {study_name} was created to {stored}, cannot {requested}")]
    DirectionMismatch {
        study_name: String,
        stored: String,
        requested: String,
    },

    #[error("Unsupported storage URL scheme: {scheme}")]
    UnsupportedStorage { scheme: String },

    #[error("Cannot suggest {parameter}: {message}")]
    InvalidSuggestion { parameter: String, message: String },
}

/// Result type alias for allenopt operations
pub type AoResult<T> = Result<T, AoError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::AoError::Config(format!($($arg)*))
    };
}
