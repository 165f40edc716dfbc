use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("invalid period {0}: must be greater than zero")]
    InvalidPeriod(usize),
}
