//! Admission boundary errors.

use thiserror::Error;

pub type AdmissionResult<T> = Result<T, AdmissionError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("unauthorized: unknown API key")]
    Unauthorized,

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("key capacity exhausted ({0} keys tracked)")]
    KeyCapacity(usize),
}
