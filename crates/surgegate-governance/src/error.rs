use thiserror::Error;

use surgegate_limiter::AdmissionError;

pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("pending decision not found: {0}")]
    NotFound(String),

    #[error("policy store refused the change: {0}")]
    Store(#[from] AdmissionError),
}
