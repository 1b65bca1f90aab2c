use thiserror::Error;

/// Errors from reconciler configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold out of range [0, 1]: {name} = {value}")]
    ThresholdRange { name: &'static str, value: f64 },

    #[error("new_line_threshold ({new_line}) must be below continuation_threshold ({continuation})")]
    ThresholdOrder { new_line: f64, continuation: f64 },

    #[error("duration must be positive: {name} = {value} ms")]
    NonPositiveDuration { name: &'static str, value: i64 },

    #[error("{name} must be at least {min}")]
    TooSmall { name: &'static str, min: usize },
}

/// Errors from snapshot source backends.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source start failed: {0}")]
    StartFailed(String),

    #[error("source stop failed: {0}")]
    StopFailed(String),

    #[error("source backend error: {0}")]
    Backend(String),
}

/// Errors from the stream pipeline.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("processor thread spawn failed: {0}")]
    Spawn(String),
}
