use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("workflow for session {0} was already started")]
    AlreadyStarted(Uuid),
    #[error("market data error: {0}")]
    MarketData(String),
    #[error("agent error: {0}")]
    Agent(#[from] agents::AgentError),
    #[error("backtest error: {0}")]
    Backtest(#[from] backtester::BacktestError),
    #[error("database error: {0}")]
    Database(#[from] database::DbError),
    #[error("sentiment error: {0}")]
    Sentiment(#[from] sentiment::SentimentError),
}
