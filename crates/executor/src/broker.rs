//! The unified broker abstraction: one async interface implemented by a
//! `SimulatedBroker` (used by the backtest core) and a `LiveBroker` (thin
//! adapter over `api_client::ApiClient`). Generalizes `Executor` (a narrow
//! "fill this one signal against this one bar" surface) and `ApiClient`
//! into the full account/position/order/bars surface a strategy runtime
//! needs regardless of whether it is backtesting or trading live.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Account, Bar, Order, OrderRequest, OrderSide, OrderStatus, OrderType, Position, TimeInForce,
};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use api_client::ApiClient;

use crate::error::ExecutorError;
use crate::portfolio::Portfolio;

/// Uniform interface over a simulated broker and a live broker. `close_position`/
/// `close_all_positions` are convenience operations built from `submit_order` +
/// `get_position`/`get_all_positions`, not primitive broker calls.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn get_account(&self) -> Result<Account, ExecutorError>;
    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, ExecutorError>;
    async fn get_all_positions(&self) -> Result<Vec<Position>, ExecutorError>;
    async fn submit_order(&self, order: &OrderRequest) -> Result<Order, ExecutorError>;
    async fn cancel_order(&self, order_id: Uuid) -> Result<(), ExecutorError>;
    async fn get_order(&self, order_id: Uuid) -> Result<Order, ExecutorError>;
    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: &str,
    ) -> Result<Vec<Bar>, ExecutorError>;
    async fn get_current_price(&self, symbol: &str) -> Result<Decimal, ExecutorError>;

    async fn close_position(&self, symbol: &str) -> Result<Order, ExecutorError> {
        let position = self
            .get_position(symbol)
            .await?
            .ok_or_else(|| ExecutorError::PositionNotFound(symbol.to_string()))?;
        let closing_side = position.side.opposite();
        self.submit_order(&OrderRequest {
            client_order_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: closing_side,
            order_type: OrderType::Market,
            quantity: position.quantity,
            price: None,
            position_side: None,
        })
        .await
    }

    async fn close_all_positions(&self) -> Result<Vec<Order>, ExecutorError> {
        let mut orders = Vec::new();
        for position in self.get_all_positions().await? {
            orders.push(self.close_position(&position.symbol).await?);
        }
        Ok(orders)
    }
}

struct SimulatedBrokerState {
    portfolio: Portfolio,
    current_prices: HashMap<String, Decimal>,
    orders: HashMap<Uuid, Order>,
    bars: HashMap<String, Vec<Bar>>,
}

/// The backtest core's virtual exchange. Market orders fill immediately at
/// the broker's current known price for the symbol; the backtest driver is
/// responsible for advancing that price (`set_current_price`) one bar at a
/// time before requesting signals.
pub struct SimulatedBroker {
    inner: Mutex<SimulatedBrokerState>,
}

impl SimulatedBroker {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            inner: Mutex::new(SimulatedBrokerState {
                portfolio: Portfolio::new(initial_capital),
                current_prices: HashMap::new(),
                orders: HashMap::new(),
                bars: HashMap::new(),
            }),
        }
    }

    /// Preloads bar history so `get_bars` can serve it back to callers (the
    /// workflow crate's backtest runner, tests). The backtest driver itself
    /// reads bars directly rather than through this path.
    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.inner.get_mut().bars.insert(symbol.to_string(), bars);
        self
    }

    pub async fn set_current_price(&self, symbol: &str, price: Decimal) {
        self.inner
            .lock()
            .await
            .current_prices
            .insert(symbol.to_string(), price);
    }

    pub async fn cash(&self) -> Decimal {
        self.inner.lock().await.portfolio.cash
    }

    pub async fn positions_snapshot(&self) -> HashMap<String, Position> {
        self.inner.lock().await.portfolio.positions.clone()
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    async fn get_account(&self) -> Result<Account, ExecutorError> {
        let state = self.inner.lock().await;
        let positions_value: Decimal = state
            .portfolio
            .positions
            .values()
            .map(|p| {
                let price = state
                    .current_prices
                    .get(&p.symbol)
                    .copied()
                    .unwrap_or(p.entry_price);
                p.market_value(price)
            })
            .sum();
        let portfolio_value = state.portfolio.cash + positions_value;
        Ok(Account {
            equity: portfolio_value,
            cash: state.portfolio.cash,
            buying_power: state.portfolio.cash,
            portfolio_value,
            positions_value,
        })
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, ExecutorError> {
        Ok(self.inner.lock().await.portfolio.positions.get(symbol).cloned())
    }

    async fn get_all_positions(&self) -> Result<Vec<Position>, ExecutorError> {
        Ok(self
            .inner
            .lock()
            .await
            .portfolio
            .positions
            .values()
            .cloned()
            .collect())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<Order, ExecutorError> {
        let mut state = self.inner.lock().await;
        let price = *state
            .current_prices
            .get(&order.symbol)
            .ok_or_else(|| ExecutorError::PortfolioError(format!(
                "no current price known for {}",
                order.symbol
            )))?;

        if order.side == OrderSide::Sell {
            let held = state
                .portfolio
                .positions
                .get(&order.symbol)
                .map(|p| p.quantity)
                .unwrap_or(Decimal::ZERO);
            if order.quantity > held {
                let rejected = Order {
                    id: Uuid::new_v4(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    order_type: order.order_type,
                    tif: TimeInForce::Day,
                    quantity: order.quantity,
                    limit_price: order.price,
                    stop_price: None,
                    status: OrderStatus::Rejected,
                    filled_qty: Decimal::ZERO,
                    filled_avg_price: None,
                    created_at: Utc::now(),
                    filled_at: None,
                };
                state.orders.insert(rejected.id, rejected.clone());
                return Ok(rejected);
            }
        }

        let execution = core_types::Execution {
            execution_id: Uuid::new_v4(),
            client_order_id: order.client_order_id,
            symbol: order.symbol.clone(),
            price,
            quantity: order.quantity,
            fee: Decimal::ZERO,
            fee_asset: "USD".to_string(),
            timestamp: Utc::now(),
            side: order.side,
        };

        match state.portfolio.update_with_execution(&execution) {
            Ok(()) => {
                let filled = Order {
                    id: Uuid::new_v4(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    order_type: order.order_type,
                    tif: TimeInForce::Day,
                    quantity: order.quantity,
                    limit_price: order.price,
                    stop_price: None,
                    status: OrderStatus::Filled,
                    filled_qty: order.quantity,
                    filled_avg_price: Some(price),
                    created_at: execution.timestamp,
                    filled_at: Some(execution.timestamp),
                };
                state.orders.insert(filled.id, filled.clone());
                Ok(filled)
            }
            Err(ExecutorError::InsufficientCash { .. }) => {
                let rejected = Order {
                    id: Uuid::new_v4(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    order_type: order.order_type,
                    tif: TimeInForce::Day,
                    quantity: order.quantity,
                    limit_price: order.price,
                    stop_price: None,
                    status: OrderStatus::Rejected,
                    filled_qty: Decimal::ZERO,
                    filled_avg_price: None,
                    created_at: Utc::now(),
                    filled_at: None,
                };
                state.orders.insert(rejected.id, rejected.clone());
                Ok(rejected)
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_order(&self, order_id: Uuid) -> Result<(), ExecutorError> {
        let mut state = self.inner.lock().await;
        match state.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Cancelled;
                Ok(())
            }
            Some(_) => Ok(()), // already terminal; cancelling is a no-op
            None => Err(ExecutorError::PortfolioError(format!("unknown order {order_id}"))),
        }
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, ExecutorError> {
        self.inner
            .lock()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| ExecutorError::PortfolioError(format!("unknown order {order_id}")))
    }

    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _timeframe: &str,
    ) -> Result<Vec<Bar>, ExecutorError> {
        Ok(self
            .inner
            .lock()
            .await
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.open_time >= start && b.open_time <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Decimal, ExecutorError> {
        self.inner
            .lock()
            .await
            .current_prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExecutorError::PortfolioError(format!("no current price known for {symbol}")))
    }
}

/// Thin adapter to a live exchange. Translates between the broker's
/// vendor-neutral types and `ApiClient`'s Binance-shaped ones. Binance's
/// cancel/query-order endpoints are keyed by `(symbol, clientOrderId)` rather
/// than `clientOrderId` alone, so `submit_order` records the symbol each
/// order was placed under and `cancel_order`/`get_order` look it up from
/// there.
pub struct LiveBroker {
    api_client: Arc<dyn ApiClient>,
    order_symbols: Mutex<HashMap<Uuid, String>>,
}

impl LiveBroker {
    pub fn new(api_client: Arc<dyn ApiClient>) -> Self {
        Self {
            api_client,
            order_symbols: Mutex::new(HashMap::new()),
        }
    }

    async fn symbol_for(&self, order_id: Uuid) -> Result<String, ExecutorError> {
        self.order_symbols
            .lock()
            .await
            .get(&order_id)
            .cloned()
            .ok_or_else(|| ExecutorError::PortfolioError(format!("unknown order {order_id}")))
    }

    fn order_from_response(client_order_id: Uuid, response: api_client::OrderResponse) -> Order {
        let status = match response.status.as_str() {
            "FILLED" => OrderStatus::Filled,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "CANCELED" | "CANCELLED" | "EXPIRED" => OrderStatus::Cancelled,
            "REJECTED" => OrderStatus::Rejected,
            _ => OrderStatus::Pending,
        };
        Order {
            id: client_order_id,
            symbol: response.symbol,
            side: response.side,
            order_type: OrderType::Market,
            tif: TimeInForce::Gtc,
            quantity: response.orig_qty,
            limit_price: if response.price.is_zero() { None } else { Some(response.price) },
            stop_price: None,
            status,
            filled_qty: response.executed_qty,
            filled_avg_price: if response.avg_price.is_zero() { None } else { Some(response.avg_price) },
            created_at: Utc::now(),
            filled_at: if status == OrderStatus::Filled { Some(Utc::now()) } else { None },
        }
    }
}

#[async_trait]
impl Broker for LiveBroker {
    async fn get_account(&self) -> Result<Account, ExecutorError> {
        let balances = self
            .api_client
            .get_account_balance()
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))?;
        let positions = self.get_all_positions().await?;
        let positions_value: Decimal = positions
            .iter()
            .map(|p| p.quantity * p.entry_price)
            .sum();
        let cash = balances
            .iter()
            .find(|b| b.asset == "USDT")
            .map(|b| b.available_balance)
            .unwrap_or(Decimal::ZERO);
        let equity = balances
            .iter()
            .find(|b| b.asset == "USDT")
            .map(|b| b.balance)
            .unwrap_or(cash);
        Ok(Account {
            equity,
            cash,
            buying_power: cash,
            portfolio_value: equity,
            positions_value,
        })
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, ExecutorError> {
        Ok(self
            .get_all_positions()
            .await?
            .into_iter()
            .find(|p| p.symbol == symbol))
    }

    async fn get_all_positions(&self) -> Result<Vec<Position>, ExecutorError> {
        let raw = self
            .api_client
            .get_open_positions()
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))?;
        Ok(raw
            .into_iter()
            .filter(|p| !p.position_amt.is_zero())
            .map(|p| {
                let side = if p.position_amt.is_sign_positive() {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                };
                core_types::Position {
                    position_id: Uuid::new_v4(),
                    symbol: p.symbol,
                    side,
                    quantity: p.position_amt.abs(),
                    entry_price: p.entry_price,
                    unrealized_pnl: p.un_realized_profit,
                    last_updated: Utc::now(),
                }
            })
            .collect())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<Order, ExecutorError> {
        let response = self
            .api_client
            .place_order(order)
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))?;
        let status = match response.status.as_str() {
            "FILLED" => OrderStatus::Filled,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "CANCELED" | "CANCELLED" | "EXPIRED" => OrderStatus::Cancelled,
            "REJECTED" => OrderStatus::Rejected,
            _ => OrderStatus::Pending,
        };
        self.order_symbols
            .lock()
            .await
            .insert(order.client_order_id, response.symbol.clone());
        Ok(Order {
            id: order.client_order_id,
            symbol: response.symbol,
            side: response.side,
            order_type: order.order_type,
            tif: TimeInForce::Gtc,
            quantity: response.orig_qty,
            limit_price: if response.price.is_zero() { None } else { Some(response.price) },
            stop_price: None,
            status,
            filled_qty: response.executed_qty,
            filled_avg_price: if response.avg_price.is_zero() { None } else { Some(response.avg_price) },
            created_at: Utc::now(),
            filled_at: if status == OrderStatus::Filled { Some(Utc::now()) } else { None },
        })
    }

    async fn cancel_order(&self, order_id: Uuid) -> Result<(), ExecutorError> {
        let symbol = self.symbol_for(order_id).await?;
        self.api_client
            .cancel_order(&symbol, &order_id.to_string())
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))?;
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, ExecutorError> {
        let symbol = self.symbol_for(order_id).await?;
        let response = self
            .api_client
            .get_order(&symbol, &order_id.to_string())
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))?;
        Ok(Self::order_from_response(order_id, response))
    }

    async fn get_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: &str,
    ) -> Result<Vec<Bar>, ExecutorError> {
        self.api_client
            .fetch_klines(symbol, timeframe, start, end)
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Decimal, ExecutorError> {
        let now = Utc::now();
        let bars = self
            .api_client
            .fetch_klines(symbol, "1m", now - chrono::Duration::minutes(5), now)
            .await
            .map_err(|e| ExecutorError::Api(e.to_string()))?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| ExecutorError::Api(format!("no recent bars available for {symbol}")))
    }
}
