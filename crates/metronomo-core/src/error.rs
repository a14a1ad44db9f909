//! Error types for metronomo

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetronomeError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfiguration { field: &'static str, value: String },
    #[error("Audio unavailable: {0}")]
    AudioUnavailable(String),
    #[error("Timer unsupported: {0}")]
    TimerUnsupported(String),
}

impl MetronomeError {
    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidConfiguration {
            field,
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetronomeError>;
