use thiserror::Error;

/// Errors a single deployment tick can raise. Any variant here causes the
/// tick loop to transition the deployment to `DeploymentStatus::Error` and
/// stop scheduling it (§4.8 "Failure handling") — a single deployment's
/// failure never touches any other deployment's tick loop.
#[derive(Error, Debug)]
pub enum LiveEngineError {
    #[error("broker error: {0}")]
    Broker(#[from] executor::ExecutorError),

    #[error("repository error: {0}")]
    Database(#[from] database::DbError),

    #[error("strategy error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("no current price available for {0}")]
    NoPrice(String),
}
