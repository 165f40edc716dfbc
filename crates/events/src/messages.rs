use chrono::{DateTime, Utc};
use core_types::{Execution, Position, Kline};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Enum representing the severity of a log message for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A structured log message to be sent over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// A complete snapshot of the portfolio's current state.
/// This message provides the frontend with all the data needed to render the main dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub total_value: Decimal,
    pub positions: Vec<Position>,
}

/// A kline data message containing symbol and kline information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineData {
    pub symbol: String,
    pub kline: Kline,
}

/// The top-level WebSocket message enum.
/// All communication from the server to the client will be one of these variants.
///
/// The `#[serde(tag = "type", content = "payload")]` attribute is a powerful `serde` feature.
/// It serializes the enum into a clean JSON object, which is easy for the frontend to handle.
/// For example, a `Log` variant would look like:
/// `{
///   "type": "Log",
///   "payload": {
///     "timestamp": "...",
///     "level": "Info",
///     "message": "..."
///   }
/// }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// A structured log message.
    Log(LogMessage),
    /// A full snapshot of the portfolio state.
    PortfolioState(PortfolioState),
    /// A notification that a single trade has been executed.
    TradeExecuted(Execution),
    /// A simple message to confirm to a new client that its WebSocket connection is active.
    Connected,
    /// Real-time kline data for a symbol.
    KlineData(KlineData),
}

/// The wire schema for the multi-agent workflow engine's progress stream
/// (see the iteration-loop event ordering in `workflow`). Every variant
/// carries the session's iteration index where applicable; `complete` and
/// `error` are the only terminal types, and nothing is emitted after them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Sent once a newly opened stream has finished replaying buffered
    /// history; everything after this point is live.
    Ready,
    /// Idle keep-alive, emitted on a fixed interval while a session is
    /// otherwise quiet, so the consumer's connection is not reaped.
    Heartbeat { ts: DateTime<Utc> },
    SupervisorStart { ts: DateTime<Utc>, user_query: String },
    IterationStart { ts: DateTime<Utc>, iteration: u32 },
    CodeGenerationStart { ts: DateTime<Utc>, iteration: u32 },
    CodeGenerationComplete {
        ts: DateTime<Utc>,
        iteration: u32,
        changes_made: Vec<String>,
    },
    InsightsGeneration { ts: DateTime<Utc>, iteration: u32 },
    InsightsComplete {
        ts: DateTime<Utc>,
        iteration: u32,
        insights: JsonValue,
    },
    BacktestStart { ts: DateTime<Utc>, iteration: u32 },
    BacktestComplete {
        ts: DateTime<Utc>,
        iteration: u32,
        total_trades: u32,
        total_return_pct: Decimal,
    },
    AnalysisStart { ts: DateTime<Utc>, iteration: u32 },
    AnalysisComplete {
        ts: DateTime<Utc>,
        iteration: u32,
        needs_refinement: bool,
        issues: Vec<String>,
    },
    Refinement {
        ts: DateTime<Utc>,
        iteration: u32,
        message: String,
    },
    /// Terminal: the workflow finished (successfully or by exhausting its
    /// bounds) and `results[session_id]` already holds the final value.
    Complete {
        ts: DateTime<Utc>,
        session_id: Uuid,
        final_analysis: JsonValue,
    },
    /// Terminal: the workflow could not produce a result.
    Error {
        ts: DateTime<Utc>,
        session_id: Uuid,
        message: String,
    },
}

impl ProgressEvent {
    /// `complete`/`error` are the only terminal types; nothing may be
    /// emitted on a session's stream after one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}