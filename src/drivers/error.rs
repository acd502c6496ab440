use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to initialize {device}: {reason}")]
    Init { device: String, reason: String },
    #[error("read from {device} failed: {reason}")]
    Read { device: String, reason: String },
    #[error("{0} has no more samples")]
    Exhausted(String),
    #[error("{0} was disconnected")]
    Closed(String),
    #[error("{0} activity exited before reporting its initialization")]
    InitAborted(String),
}
impl AcquisitionError {
    pub fn init(device: &str, reason: impl ToString) -> Self {
        AcquisitionError::Init {
            device: device.to_owned(),
            reason: reason.to_string(),
        }
    }
    pub fn read(device: &str, reason: impl ToString) -> Self {
        AcquisitionError::Read {
            device: device.to_owned(),
            reason: reason.to_string(),
        }
    }
}
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field}: '{input}' is not a number")]
    NotANumber { field: &'static str, input: String },
    #[error("{field}: '{input}' is not a positive whole number")]
    NotACount { field: &'static str, input: String },
    #[error("{field}: rate must be finite and not negative, got {value}")]
    InvalidRate { field: &'static str, value: f64 },
    #[error("{field}: {value} Hz has no usable period")]
    RateOutOfRange { field: &'static str, value: f64 },
}
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no persistence session is open")]
    NoSession,
}
