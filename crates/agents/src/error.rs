use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to build the HTTP request: {0}")]
    RequestBuild(#[from] reqwest::Error),

    #[error("oracle call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("oracle returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("strategy spec failed validation: {0}")]
    Strategy(#[from] strategies::error::StrategyError),

    #[error("backtest failed: {0}")]
    Backtest(#[from] backtester::error::BacktestError),
}
