//! Deployment lifecycle operations invoked from outside the tick loop (§6
//! "Deployment endpoints"). Pause/resume/activate only flip the persisted
//! status the sync loop already polls every `sync_interval_secs`; `stop`
//! additionally closes out this deployment's own virtual positions against
//! the shared broker before marking it `Stopped`, since the broker has no
//! notion of per-deployment ownership (§4.9) to do that on its own.

use core_types::{DeploymentStatus, OrderRequest, OrderSide, OrderStatus, OrderType};
use database::DbRepository;
use executor::Broker;
use uuid::Uuid;

use crate::error::LiveEngineError;

pub async fn activate(repo: &DbRepository, deployment_id: Uuid) -> Result<(), LiveEngineError> {
    repo.update_deployment_status(deployment_id, DeploymentStatus::Running).await?;
    Ok(())
}

pub async fn pause(repo: &DbRepository, deployment_id: Uuid) -> Result<(), LiveEngineError> {
    repo.update_deployment_status(deployment_id, DeploymentStatus::Paused).await?;
    Ok(())
}

pub async fn resume(repo: &DbRepository, deployment_id: Uuid) -> Result<(), LiveEngineError> {
    repo.update_deployment_status(deployment_id, DeploymentStatus::Running).await?;
    Ok(())
}

/// Stops a deployment. When `close_positions` is set, submits a market sell
/// for each of this deployment's own open positions (sized to its own
/// quantity, never the broker's aggregate) before flipping the status,
/// mirroring `tick::run_tick`'s order-submission path.
pub async fn stop(
    repo: &DbRepository,
    broker: &dyn Broker,
    deployment_id: Uuid,
    close_positions: bool,
) -> Result<(), LiveEngineError> {
    if close_positions {
        let positions = repo.list_deployment_positions(deployment_id).await?;
        for position in positions {
            if position.quantity.is_zero() {
                continue;
            }
            let order_request = OrderRequest {
                client_order_id: Uuid::new_v4(),
                symbol: position.symbol.clone(),
                side: OrderSide::Sell,
                order_type: OrderType::Market,
                quantity: position.quantity,
                price: None,
                position_side: None,
            };
            let order = broker
                .submit_order(&order_request)
                .await
                .map_err(LiveEngineError::Broker)?;
            if matches!(order.status, OrderStatus::Filled | OrderStatus::PartiallyFilled) {
                repo.delete_deployment_position(deployment_id, &position.symbol).await?;
            }
        }
    }
    repo.update_deployment_status(deployment_id, DeploymentStatus::Stopped).await?;
    Ok(())
}
