use core_types::FieldValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("An error occurred during indicator calculation: {0}")]
    IndicatorError(String),

    #[error("Strategy of type '{0}' not found or implemented")]
    StrategyNotFound(String),

    #[error("strategy spec failed validation on {} field(s)", .0.len())]
    Validation(Vec<FieldValidationError>),
}

impl From<core_types::CoreError> for StrategyError {
    fn from(err: core_types::CoreError) -> Self {
        match err {
            core_types::CoreError::Validation(fields) => StrategyError::Validation(fields),
            other => StrategyError::InvalidParameters(other.to_string()),
        }
    }
}
