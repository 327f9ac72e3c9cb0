//! Oracle call errors.

use std::time::Duration;

use thiserror::Error;

pub type OracleResult<T> = Result<T, OracleError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("malformed oracle output: {0}")]
    Malformed(String),

    #[error("invalid oracle endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("oracle failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}
