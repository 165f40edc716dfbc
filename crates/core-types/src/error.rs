use thiserror::Error;

/// One field that failed strategy-spec validation, reported alongside all
/// its siblings rather than failing fast on the first offender.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("strategy spec failed validation on {} field(s)", .0.len())]
    Validation(Vec<FieldValidationError>),
}
