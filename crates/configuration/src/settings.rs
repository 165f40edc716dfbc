use rust_decimal::Decimal;
use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub sentiment_providers: SentimentProvidersConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub live_engine: LiveEngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Telegram alert sink credentials. Empty values disable the alerter
/// (`TelegramAlerter::new` returns `None`), so this is safe to leave unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
}

/// Database connection parameters. The connection string itself comes from
/// the `DATABASE_URL` environment variable (via `dotenvy`); this section
/// only carries pool-sizing knobs that are safe to keep in version-controlled
/// TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

/// Broker selection and paper/live mode. Credentials (API key/secret) are
/// read from the environment at startup and never stored here.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_true")]
    pub paper_trading: bool,
    #[serde(default = "default_broker_name")]
    pub name: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            paper_trading: default_true(),
            name: default_broker_name(),
        }
    }
}

fn default_broker_name() -> String {
    "alpaca".to_string()
}

/// Rate-limit caps for each sentiment/news provider. Credentials for each
/// provider are read from the environment, never stored here.
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentProvidersConfig {
    #[serde(default = "default_rate_limit")]
    pub reddit_requests_per_minute: u32,
    #[serde(default = "default_rate_limit")]
    pub twitter_requests_per_minute: u32,
    #[serde(default = "default_rate_limit")]
    pub news_requests_per_minute: u32,
}

impl Default for SentimentProvidersConfig {
    fn default() -> Self {
        Self {
            reddit_requests_per_minute: default_rate_limit(),
            twitter_requests_per_minute: default_rate_limit(),
            news_requests_per_minute: default_rate_limit(),
        }
    }
}

fn default_rate_limit() -> u32 {
    60
}

/// Bounds for the multi-agent workflow engine's iteration loop.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_wall_time_secs")]
    pub max_wall_time_secs: u64,
    #[serde(default = "default_insights_timeout_secs")]
    pub insights_timeout_secs: u64,
    #[serde(default = "default_terminal_grace_ms")]
    pub terminal_event_grace_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_result_ttl_hours")]
    pub result_ttl_hours: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_wall_time_secs: default_max_wall_time_secs(),
            insights_timeout_secs: default_insights_timeout_secs(),
            terminal_event_grace_ms: default_terminal_grace_ms(),
            heartbeat_interval_secs: default_heartbeat_secs(),
            result_ttl_hours: default_result_ttl_hours(),
        }
    }
}

fn default_max_iterations() -> u32 {
    5
}

fn default_max_wall_time_secs() -> u64 {
    600
}

fn default_insights_timeout_secs() -> u64 {
    30
}

fn default_terminal_grace_ms() -> u64 {
    500
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_result_ttl_hours() -> u64 {
    24
}

/// Bounds for the live trading engine's sync loop.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveEngineConfig {
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default)]
    pub enforce_market_hours: bool,
    #[serde(default = "default_fallback_cash_fraction")]
    pub fallback_position_cash_fraction: Decimal,
}

impl Default for LiveEngineConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            enforce_market_hours: false,
            fallback_position_cash_fraction: default_fallback_cash_fraction(),
        }
    }
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_fallback_cash_fraction() -> Decimal {
    Decimal::new(1, 1) // 0.1 == 10%
}

/// Logging/tracing configuration, consumed by `init_tracing`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_logging: bool,
    #[serde(default = "default_log_dir")]
    pub log_directory: String,
    #[serde(default = "default_log_filename")]
    pub log_filename: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_logging: false,
            log_directory: default_log_dir(),
            log_filename: default_log_filename(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_filename() -> String {
    "tradeforge".to_string()
}

fn default_true() -> bool {
    true
}

/// A single API key/secret pair for one exchange environment.
#[derive(Debug, Clone)]
pub struct ApiKeyPair {
    pub key: String,
    pub secret: String,
}

/// Exchange API credentials for both the production and testnet endpoints.
/// Unlike the rest of `Config`, this is never deserialized from TOML: like
/// `DATABASE_URL`, these are secrets and are read straight from the
/// environment by [`ApiConfig::from_env`], not version-controlled alongside
/// [`BrokerConfig`]'s non-secret settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub production: ApiKeyPair,
    pub testnet: ApiKeyPair,
}

impl ApiConfig {
    /// Reads `BINANCE_PRODUCTION_API_KEY`/`_SECRET` and
    /// `BINANCE_TESTNET_API_KEY`/`_SECRET` from the environment.
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        let var = |name: &str| -> Result<String, crate::error::ConfigError> {
            std::env::var(name)
                .map_err(|_| crate::error::ConfigError::validation(format!("missing environment variable: {name}")))
        };

        Ok(Self {
            production: ApiKeyPair {
                key: var("BINANCE_PRODUCTION_API_KEY")?,
                secret: var("BINANCE_PRODUCTION_API_SECRET")?,
            },
            testnet: ApiKeyPair {
                key: var("BINANCE_TESTNET_API_KEY")?,
                secret: var("BINANCE_TESTNET_API_SECRET")?,
            },
        })
    }
}
