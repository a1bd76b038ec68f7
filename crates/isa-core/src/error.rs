use thiserror::Error;
use uuid::Uuid;

use isa_domain::{AmountError, ContributionError, PolicyViolation};

use crate::{
    allowance::{CapacityShortfall, DepositRejection},
    wizard::WizardError,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(CapacityShortfall),
    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),
    #[error("Contribution not found: {0}")]
    ContributionNotFound(Uuid),
    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AmountError> for CoreError {
    fn from(err: AmountError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<ContributionError> for CoreError {
    fn from(err: ContributionError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<DepositRejection> for CoreError {
    fn from(rejection: DepositRejection) -> Self {
        match rejection {
            DepositRejection::NonPositiveAmount(_) => CoreError::Validation(rejection.to_string()),
            DepositRejection::CapacityExceeded(shortfall) => CoreError::CapacityExceeded(shortfall),
        }
    }
}
