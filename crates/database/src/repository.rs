use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{
    Deployment, DeploymentMetricsSnapshot, DeploymentPosition, DeploymentStatus, DeploymentTrade,
    Kline, TradingBot, User,
};
use rust_decimal::Decimal;
use sentiment::DatasetCacheStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

/// The `DbRepository` is the system's permanent archive: saved bots,
/// deployments and their trade/position/metric ledgers, the kline bar
/// cache, and (via `sentiment::DatasetCacheStore`) the sentiment dataset
/// cache. All queries are runtime-checked (`sqlx::query`/`query_as`)
/// rather than the compile-time `query!`/`query_as!` macros, since no live
/// `DATABASE_URL` is assumed to be available when this crate is built.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// Converts a `Serialize` enum (stored as a string column) to its wire
/// string, reusing the domain type's own serde representation rather than
/// hand-rolling a second mapping.
fn enum_to_str<T: Serialize>(value: &T) -> Result<String, DbError> {
    match serde_json::to_value(value)? {
        JsonValue::String(s) => Ok(s),
        other => Err(DbError::ConnectionConfigError(format!(
            "expected enum to serialize as a string, got {other}"
        ))),
    }
}

fn str_to_enum<T: DeserializeOwned>(value: &str) -> Result<T, DbError> {
    Ok(serde_json::from_value(JsonValue::String(value.to_string()))?)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbTradingBot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub name: String,
    pub strategy_spec: JsonValue,
    pub insights: Option<JsonValue>,
    pub backtest_summary: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbTradingBot {
    fn into_domain(self) -> Result<TradingBot, DbError> {
        Ok(TradingBot {
            id: self.id,
            user_id: self.user_id,
            session_id: self.session_id,
            name: self.name,
            strategy_spec: serde_json::from_value(self.strategy_spec)?,
            insights: self.insights,
            backtest_summary: self.backtest_summary,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DbDeployment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bot_id: Uuid,
    pub status: String,
    pub initial_capital: Decimal,
    pub current_capital: Decimal,
    pub execution_frequency: String,
    pub max_position_size: Option<Decimal>,
    pub daily_loss_limit: Option<Decimal>,
    pub alpaca_account_id: Option<String>,
    pub deployed_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub total_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub last_execution_at: Option<DateTime<Utc>>,
}

impl DbDeployment {
    fn from_row(row: sqlx::postgres::PgRow) -> Result<Self, DbError> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            bot_id: row.try_get("bot_id")?,
            status: row.try_get("status")?,
            initial_capital: row.try_get("initial_capital")?,
            current_capital: row.try_get("current_capital")?,
            execution_frequency: row.try_get("execution_frequency")?,
            max_position_size: row.try_get("max_position_size")?,
            daily_loss_limit: row.try_get("daily_loss_limit")?,
            alpaca_account_id: row.try_get("alpaca_account_id")?,
            deployed_at: row.try_get("deployed_at")?,
            stopped_at: row.try_get("stopped_at")?,
            total_pnl: row.try_get("total_pnl")?,
            total_return_pct: row.try_get("total_return_pct")?,
            last_execution_at: row.try_get("last_execution_at")?,
        })
    }

    fn into_domain(self) -> Result<Deployment, DbError> {
        Ok(Deployment {
            id: self.id,
            user_id: self.user_id,
            bot_id: self.bot_id,
            status: str_to_enum(&self.status)?,
            initial_capital: self.initial_capital,
            current_capital: self.current_capital,
            execution_frequency: str_to_enum(&self.execution_frequency)?,
            max_position_size: self.max_position_size,
            daily_loss_limit: self.daily_loss_limit,
            alpaca_account_id: self.alpaca_account_id,
            deployed_at: self.deployed_at,
            stopped_at: self.stopped_at,
            total_pnl: self.total_pnl,
            total_return_pct: self.total_return_pct,
            last_execution_at: self.last_execution_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbDeploymentTrade {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub symbol: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub vendor_order_id: Option<String>,
    pub filled_at: DateTime<Utc>,
}

impl DbDeploymentTrade {
    fn into_domain(self) -> Result<DeploymentTrade, DbError> {
        Ok(DeploymentTrade {
            id: self.id,
            deployment_id: self.deployment_id,
            symbol: self.symbol,
            side: str_to_enum(&self.side)?,
            quantity: self.quantity,
            price: self.price,
            vendor_order_id: self.vendor_order_id,
            filled_at: self.filled_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbDeploymentPosition {
    pub deployment_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
}

impl From<DbDeploymentPosition> for DeploymentPosition {
    fn from(row: DbDeploymentPosition) -> Self {
        DeploymentPosition {
            deployment_id: row.deployment_id,
            symbol: row.symbol,
            quantity: row.quantity,
            avg_entry_price: row.avg_entry_price,
            realized_pnl: row.realized_pnl,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbMetricsSnapshot {
    pub deployment_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub virtual_cash: Decimal,
    pub virtual_portfolio_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

impl From<DbMetricsSnapshot> for DeploymentMetricsSnapshot {
    fn from(row: DbMetricsSnapshot) -> Self {
        DeploymentMetricsSnapshot {
            deployment_id: row.deployment_id,
            timestamp: row.timestamp,
            virtual_cash: row.virtual_cash,
            virtual_portfolio_value: row.virtual_portfolio_value,
            unrealized_pnl: row.unrealized_pnl,
            realized_pnl: row.realized_pnl,
        }
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // users
    // ------------------------------------------------------------------

    /// Idempotent: a second call with the same `id` is a no-op.
    pub async fn create_user(&self, id: Uuid, email: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, DbError> {
        let row = sqlx::query_as::<_, DbUser>("SELECT id, email, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;
        Ok(row.into())
    }

    // ------------------------------------------------------------------
    // trading_bots
    // ------------------------------------------------------------------

    /// Saves a new bot artifact. Called once per workflow completion, after
    /// the terminal `ProgressEvent` has already been emitted to the stream.
    pub async fn save_trading_bot(&self, bot: &TradingBot) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO trading_bots (id, user_id, session_id, name, strategy_spec, insights, backtest_summary, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(bot.id)
        .bind(bot.user_id)
        .bind(bot.session_id)
        .bind(&bot.name)
        .bind(serde_json::to_value(&bot.strategy_spec)?)
        .bind(&bot.insights)
        .bind(&bot.backtest_summary)
        .bind(bot.created_at)
        .bind(bot.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_trading_bot(&self, id: Uuid) -> Result<TradingBot, DbError> {
        let row = sqlx::query_as::<_, DbTradingBot>(
            "SELECT id, user_id, session_id, name, strategy_spec, insights, backtest_summary, created_at, updated_at FROM trading_bots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        row.into_domain()
    }

    pub async fn list_trading_bots_for_user(&self, user_id: Uuid) -> Result<Vec<TradingBot>, DbError> {
        let rows = sqlx::query_as::<_, DbTradingBot>(
            "SELECT id, user_id, session_id, name, strategy_spec, insights, backtest_summary, created_at, updated_at FROM trading_bots WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DbTradingBot::into_domain).collect()
    }

    // ------------------------------------------------------------------
    // deployments
    // ------------------------------------------------------------------

    pub async fn create_deployment(&self, deployment: &Deployment) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO deployments (
                id, user_id, bot_id, status, initial_capital, current_capital,
                execution_frequency, max_position_size, daily_loss_limit,
                alpaca_account_id, deployed_at, stopped_at, total_pnl,
                total_return_pct, last_execution_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(deployment.id)
        .bind(deployment.user_id)
        .bind(deployment.bot_id)
        .bind(enum_to_str(&deployment.status)?)
        .bind(deployment.initial_capital)
        .bind(deployment.current_capital)
        .bind(enum_to_str(&deployment.execution_frequency)?)
        .bind(deployment.max_position_size)
        .bind(deployment.daily_loss_limit)
        .bind(&deployment.alpaca_account_id)
        .bind(deployment.deployed_at)
        .bind(deployment.stopped_at)
        .bind(deployment.total_pnl)
        .bind(deployment.total_return_pct)
        .bind(deployment.last_execution_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_deployment(&self, id: Uuid) -> Result<Deployment, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, bot_id, status, initial_capital, current_capital,
                   execution_frequency, max_position_size, daily_loss_limit,
                   alpaca_account_id, deployed_at, stopped_at, total_pnl,
                   total_return_pct, last_execution_at
            FROM deployments WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        DbDeployment::from_row(row)?.into_domain()
    }

    /// All deployments owned by `user_id`, newest first — the reference
    /// transport's list endpoint (§6 "Deployment endpoints").
    pub async fn list_deployments_for_user(&self, user_id: Uuid) -> Result<Vec<Deployment>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, bot_id, status, initial_capital, current_capital,
                   execution_frequency, max_position_size, daily_loss_limit,
                   alpaca_account_id, deployed_at, stopped_at, total_pnl,
                   total_return_pct, last_execution_at
            FROM deployments WHERE user_id = $1 ORDER BY deployed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| DbDeployment::from_row(r)?.into_domain())
            .collect()
    }

    /// Deployments the live engine's sync loop should be ticking, i.e.
    /// everything not `Stopped` or `Error`.
    pub async fn list_active_deployments(&self) -> Result<Vec<Deployment>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, bot_id, status, initial_capital, current_capital,
                   execution_frequency, max_position_size, daily_loss_limit,
                   alpaca_account_id, deployed_at, stopped_at, total_pnl,
                   total_return_pct, last_execution_at
            FROM deployments WHERE status IN ('running', 'paused')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| DbDeployment::from_row(r)?.into_domain())
            .collect()
    }

    pub async fn update_deployment_status(
        &self,
        id: Uuid,
        status: DeploymentStatus,
    ) -> Result<(), DbError> {
        let stopped_at = matches!(status, DeploymentStatus::Stopped).then(|| Utc::now());
        sqlx::query(
            "UPDATE deployments SET status = $1, stopped_at = COALESCE($2, stopped_at) WHERE id = $3",
        )
        .bind(enum_to_str(&status)?)
        .bind(stopped_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Called once per successful tick with the deployment's recomputed
    /// virtual capital/PnL.
    pub async fn update_deployment_capital(
        &self,
        id: Uuid,
        current_capital: Decimal,
        total_pnl: Decimal,
        total_return_pct: Decimal,
        last_execution_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE deployments
            SET current_capital = $1, total_pnl = $2, total_return_pct = $3, last_execution_at = $4
            WHERE id = $5
            "#,
        )
        .bind(current_capital)
        .bind(total_pnl)
        .bind(total_return_pct)
        .bind(last_execution_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // deployment_trades
    // ------------------------------------------------------------------

    pub async fn insert_deployment_trade(&self, trade: &DeploymentTrade) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO deployment_trades (id, deployment_id, symbol, side, quantity, price, vendor_order_id, filled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(trade.id)
        .bind(trade.deployment_id)
        .bind(&trade.symbol)
        .bind(enum_to_str(&trade.side)?)
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(&trade.vendor_order_id)
        .bind(trade.filled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_deployment_trades(
        &self,
        deployment_id: Uuid,
    ) -> Result<Vec<DeploymentTrade>, DbError> {
        let rows = sqlx::query_as::<_, DbDeploymentTrade>(
            "SELECT id, deployment_id, symbol, side, quantity, price, vendor_order_id, filled_at FROM deployment_trades WHERE deployment_id = $1 ORDER BY filled_at ASC",
        )
        .bind(deployment_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DbDeploymentTrade::into_domain).collect()
    }

    // ------------------------------------------------------------------
    // deployment_positions
    // ------------------------------------------------------------------

    pub async fn upsert_deployment_position(
        &self,
        position: &DeploymentPosition,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO deployment_positions (deployment_id, symbol, quantity, avg_entry_price, realized_pnl)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (deployment_id, symbol) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                avg_entry_price = EXCLUDED.avg_entry_price,
                realized_pnl = EXCLUDED.realized_pnl
            "#,
        )
        .bind(position.deployment_id)
        .bind(&position.symbol)
        .bind(position.quantity)
        .bind(position.avg_entry_price)
        .bind(position.realized_pnl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// A flat position is deleted rather than kept at `quantity = 0`.
    pub async fn delete_deployment_position(
        &self,
        deployment_id: Uuid,
        symbol: &str,
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM deployment_positions WHERE deployment_id = $1 AND symbol = $2")
            .bind(deployment_id)
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_deployment_position(
        &self,
        deployment_id: Uuid,
        symbol: &str,
    ) -> Result<Option<DeploymentPosition>, DbError> {
        let row = sqlx::query_as::<_, DbDeploymentPosition>(
            "SELECT deployment_id, symbol, quantity, avg_entry_price, realized_pnl FROM deployment_positions WHERE deployment_id = $1 AND symbol = $2",
        )
        .bind(deployment_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list_deployment_positions(
        &self,
        deployment_id: Uuid,
    ) -> Result<Vec<DeploymentPosition>, DbError> {
        let rows = sqlx::query_as::<_, DbDeploymentPosition>(
            "SELECT deployment_id, symbol, quantity, avg_entry_price, realized_pnl FROM deployment_positions WHERE deployment_id = $1",
        )
        .bind(deployment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // deployment_metrics
    // ------------------------------------------------------------------

    pub async fn insert_deployment_metrics(
        &self,
        snapshot: &DeploymentMetricsSnapshot,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO deployment_metrics (deployment_id, timestamp, virtual_cash, virtual_portfolio_value, unrealized_pnl, realized_pnl)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (deployment_id, timestamp) DO NOTHING
            "#,
        )
        .bind(snapshot.deployment_id)
        .bind(snapshot.timestamp)
        .bind(snapshot.virtual_cash)
        .bind(snapshot.virtual_portfolio_value)
        .bind(snapshot.unrealized_pnl)
        .bind(snapshot.realized_pnl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_deployment_metrics(
        &self,
        deployment_id: Uuid,
        limit: i64,
    ) -> Result<Vec<DeploymentMetricsSnapshot>, DbError> {
        let rows = sqlx::query_as::<_, DbMetricsSnapshot>(
            "SELECT deployment_id, timestamp, virtual_cash, virtual_portfolio_value, unrealized_pnl, realized_pnl FROM deployment_metrics WHERE deployment_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(deployment_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // klines (bar cache)
    // ------------------------------------------------------------------

    /// Fetches all klines for a given symbol and interval within a date range.
    pub async fn get_klines_by_date_range(
        &self,
        symbol: &str,
        interval: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Vec<Kline>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT open_time, open, high, low, close, volume, close_time
            FROM klines
            WHERE symbol = $1 AND interval = $2 AND open_time >= $3 AND open_time <= $4
            ORDER BY open_time ASC
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        let klines = rows
            .into_iter()
            .map(|row| Kline {
                open_time: row.get("open_time"),
                open: row.get("open"),
                high: row.get("high"),
                low: row.get("low"),
                close: row.get("close"),
                volume: row.get("volume"),
                close_time: row.get("close_time"),
                interval: interval.to_string(),
            })
            .collect();

        Ok(klines)
    }

    /// Saves a single Kline to the database. Idempotent via `ON CONFLICT DO
    /// NOTHING` so it can be called repeatedly without erroring on rows that
    /// already exist.
    pub async fn save_kline(&self, symbol: &str, kline: &Kline) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO klines (symbol, interval, open_time, close_time, open, high, low, close, volume)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (symbol, interval, open_time) DO NOTHING
            "#,
        )
        .bind(symbol)
        .bind(&kline.interval)
        .bind(kline.open_time)
        .bind(kline.close_time)
        .bind(kline.open)
        .bind(kline.high)
        .bind(kline.low)
        .bind(kline.close)
        .bind(kline.volume)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// `trading_datasets` row shape, used only inside the `DatasetCacheStore`
/// impl below.
#[derive(Debug, Clone, sqlx::FromRow)]
struct DbDatasetRow {
    id: Uuid,
    ticker: String,
    data: JsonValue,
    metadata: JsonValue,
    session_id: Option<Uuid>,
    bot_id: Option<Uuid>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[async_trait]
impl DatasetCacheStore for DbRepository {
    async fn lookup(
        &self,
        ticker: &str,
        source: core_types::SentimentSource,
        date: NaiveDate,
    ) -> Result<Option<core_types::DatasetCacheRow>, sentiment::SentimentError> {
        let source_str = enum_to_str(&source).map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;
        let row = sqlx::query_as::<_, DbDatasetRow>(
            r#"
            SELECT id, ticker, data, metadata, session_id, bot_id, start_date, end_date
            FROM trading_datasets
            WHERE ticker = $1 AND data_source = $2 AND start_date <= $3 AND end_date >= $3
            LIMIT 1
            "#,
        )
        .bind(ticker)
        .bind(&source_str)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let data = serde_json::from_value(row.data)
            .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;
        Ok(Some(core_types::DatasetCacheRow {
            ticker: row.ticker,
            data_source: source,
            start_date: row.start_date,
            end_date: row.end_date,
            data,
            metadata: row.metadata,
            session_id: row.session_id,
            bot_id: row.bot_id,
        }))
    }

    async fn upsert(&self, row: core_types::DatasetCacheRow) -> Result<(), sentiment::SentimentError> {
        let source_str =
            enum_to_str(&row.data_source).map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;
        let existing = sqlx::query_as::<_, DbDatasetRow>(
            r#"
            SELECT id, ticker, data, metadata, session_id, bot_id, start_date, end_date
            FROM trading_datasets
            WHERE ticker = $1 AND data_source = $2 AND start_date = $3 AND end_date = $4
            "#,
        )
        .bind(&row.ticker)
        .bind(&source_str)
        .bind(row.start_date)
        .bind(row.end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;

        let new_data = serde_json::to_value(&row.data)
            .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;

        match existing {
            Some(existing) => {
                let mut merged = existing.data;
                if let (JsonValue::Object(ref mut map), JsonValue::Object(incoming)) =
                    (&mut merged, new_data)
                {
                    map.extend(incoming);
                }
                sqlx::query("UPDATE trading_datasets SET data = $1, metadata = $2 WHERE id = $3")
                    .bind(merged)
                    .bind(&row.metadata)
                    .bind(existing.id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO trading_datasets (id, ticker, data_source, start_date, end_date, data, metadata, session_id, bot_id)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&row.ticker)
                .bind(&source_str)
                .bind(row.start_date)
                .bind(row.end_date)
                .bind(new_data)
                .bind(&row.metadata)
                .bind(row.session_id)
                .bind(row.bot_id)
                .execute(&self.pool)
                .await
                .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn associate_with_bot(&self, session_id: Uuid, bot_id: Uuid) -> Result<(), sentiment::SentimentError> {
        sqlx::query("UPDATE trading_datasets SET bot_id = $1 WHERE session_id = $2")
            .bind(bot_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| sentiment::SentimentError::Cache(e.to_string()))?;
        Ok(())
    }
}
