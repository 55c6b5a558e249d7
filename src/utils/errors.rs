use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChoreoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Config error: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Telemetry log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Report encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by a flight link implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("link unavailable: {0}")]
    Unavailable(String),

    #[error("send timed out")]
    SendTimeout,

    #[error("link disconnected")]
    Disconnected,

    #[error("telemetry subscription failed: {0}")]
    Subscribe(String),
}

pub type Result<T> = std::result::Result<T, ChoreoError>;
