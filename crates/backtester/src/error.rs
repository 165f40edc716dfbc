use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("strategy execution error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("broker error: {0}")]
    Executor(#[from] executor::ExecutorError),

    #[error("no bars were supplied for any requested symbol")]
    DataUnavailable,

    #[error("decimal conversion error: {0}")]
    Decimal(String),
}
