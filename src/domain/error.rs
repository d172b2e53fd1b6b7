//! Domain error types.
//!
//! Zero-variance and zero-divisor conditions are not errors: every component
//! resolves them to a documented neutral value (z = 0, breakout = 1.0,
//! scale = 1.0, cost = default tier).

use chrono::NaiveDate;

/// Top-level error type for futalpha.
#[derive(Debug, thiserror::Error)]
pub enum FutalphaError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing required column '{column}' in {source_name}")]
    MissingColumn { source_name: String, column: String },

    #[error("malformed input in {source_name}: {reason}")]
    MalformedInput { source_name: String, reason: String },

    #[error("insufficient history for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("empty universe on {date}: no symbols survived filtering")]
    EmptyUniverse { date: NaiveDate },

    #[error("no usable output: {reason}")]
    NoUsableOutput { reason: String },

    #[error("model error: {reason}")]
    Model { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FutalphaError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        FutalphaError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        FutalphaError::MalformedInput {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<&FutalphaError> for std::process::ExitCode {
    fn from(err: &FutalphaError) -> Self {
        let code: u8 = match err {
            FutalphaError::Io(_) => 1,
            FutalphaError::ConfigParse { .. }
            | FutalphaError::ConfigMissing { .. }
            | FutalphaError::ConfigInvalid { .. } => 2,
            FutalphaError::MissingColumn { .. } | FutalphaError::MalformedInput { .. } => 3,
            FutalphaError::Model { .. } => 4,
            FutalphaError::InsufficientHistory { .. }
            | FutalphaError::EmptyUniverse { .. }
            | FutalphaError::NoUsableOutput { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
