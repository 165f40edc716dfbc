//! The session registry (§4.7): `sessions`/`history`/`results` maps plus the
//! replay-then-stream contract a progress-stream consumer relies on.
//! Generalizes `events::WsMessage`'s tagged-enum wire pattern to
//! `ProgressEvent`, and the per-session event bus is a bounded
//! `tokio::sync::mpsc` channel rather than a `broadcast::channel` — a
//! broadcast channel would silently drop events for a slow/absent consumer,
//! which conflicts with the "no gaps" ordering guarantee.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use events::ProgressEvent;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::result::WorkflowResult;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

struct SessionState {
    history: Vec<ProgressEvent>,
    subscribers: Vec<mpsc::Sender<ProgressEvent>>,
    started: bool,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionState>>,
    results: Mutex<HashMap<Uuid, (WorkflowResult, Instant)>>,
    result_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(result_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
            result_ttl,
        }
    }

    /// *Create session* (§6, step 1): allocates an empty event queue/history.
    pub async fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.lock().await.insert(
            id,
            SessionState {
                history: Vec::new(),
                subscribers: Vec::new(),
                started: false,
            },
        );
        id
    }

    /// Marks a session as started, refusing a second start. Call before
    /// spawning the iteration loop.
    pub async fn mark_started(&self, session_id: Uuid) -> Result<(), WorkflowError> {
        let mut sessions = self.sessions.lock().await;
        let state = sessions
            .get_mut(&session_id)
            .ok_or(WorkflowError::SessionNotFound(session_id))?;
        if state.started {
            return Err(WorkflowError::AlreadyStarted(session_id));
        }
        state.started = true;
        Ok(())
    }

    /// *Open progress stream* (§6, step 2): returns the buffered history for
    /// immediate replay plus a receiver for everything emitted from this
    /// point on. The caller is expected to replay the snapshot, emit `ready`,
    /// then forward from the receiver.
    pub async fn open_stream(
        &self,
        session_id: Uuid,
    ) -> Result<(Vec<ProgressEvent>, mpsc::Receiver<ProgressEvent>), WorkflowError> {
        let mut sessions = self.sessions.lock().await;
        let state = sessions
            .get_mut(&session_id)
            .ok_or(WorkflowError::SessionNotFound(session_id))?;
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        state.subscribers.push(tx);
        Ok((state.history.clone(), rx))
    }

    /// Appends `event` to history and fans it out to every open stream.
    /// Silently a no-op for an unknown session (the loop may outlive a
    /// session that was never created through this registry in a test).
    pub async fn emit(&self, session_id: Uuid, event: ProgressEvent) {
        let subscribers = {
            let mut sessions = self.sessions.lock().await;
            let Some(state) = sessions.get_mut(&session_id) else {
                return;
            };
            state.history.push(event.clone());
            state.subscribers.clone()
        };
        for subscriber in subscribers {
            // A closed receiver just means that stream consumer went away;
            // it must not stop delivery to any other open stream.
            let _ = subscriber.send(event.clone()).await;
        }
    }

    /// *Poll events* (§6, step 4): events from index `from` onward, plus the
    /// running total (so the caller's next `from` is `total`).
    pub async fn poll(&self, session_id: Uuid, from: usize) -> Result<(Vec<ProgressEvent>, usize), WorkflowError> {
        let sessions = self.sessions.lock().await;
        let state = sessions
            .get(&session_id)
            .ok_or(WorkflowError::SessionNotFound(session_id))?;
        let total = state.history.len();
        let events = state.history.get(from.min(total)..).map(|s| s.to_vec()).unwrap_or_default();
        Ok((events, total))
    }

    /// "Complete before save" (§4.7): the result becomes fetchable the
    /// instant this returns, strictly before the terminal event is emitted.
    pub async fn store_result(&self, result: WorkflowResult) {
        let session_id = result.session_id;
        self.results.lock().await.insert(session_id, (result, Instant::now()));
    }

    /// *Fetch result* (§6, step 5): `None` if the session never completed or
    /// its 24h TTL has already been swept.
    pub async fn result(&self, session_id: Uuid) -> Option<WorkflowResult> {
        self.results.lock().await.get(&session_id).map(|(r, _)| r.clone())
    }

    /// Terminal event grace (§4.7): yield briefly so the consumer can flush
    /// the terminal event, then drop every subscriber sender, which ends
    /// each open stream's receiver loop.
    pub async fn close_after_grace(&self, session_id: Uuid, grace: Duration) {
        tokio::time::sleep(grace).await;
        self.sessions.lock().await.remove(&session_id);
    }

    /// Background sweeper evicting `results` entries older than the
    /// configured TTL, mirroring the periodic-task idiom used elsewhere in
    /// the workspace for long-running maintenance loops.
    pub fn spawn_result_sweeper(self: std::sync::Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                let ttl = self.result_ttl;
                self.results
                    .lock()
                    .await
                    .retain(|_, (_, inserted)| inserted.elapsed() < ttl);
            }
        });
    }
}

/// Waits for the next event on `rx`, substituting a synthetic `Heartbeat` if
/// none arrives within `heartbeat_interval` so an idle stream's consumer
/// (e.g. a WebSocket) is never starved long enough to be reaped. Returns
/// `None` once the channel has been closed (the session finished and its
/// terminal-event grace period elapsed).
pub async fn next_event_or_heartbeat(
    rx: &mut mpsc::Receiver<ProgressEvent>,
    heartbeat_interval: Duration,
) -> Option<ProgressEvent> {
    match tokio::time::timeout(heartbeat_interval, rx.recv()).await {
        Ok(event) => event,
        Err(_elapsed) => Some(ProgressEvent::Heartbeat { ts: Utc::now() }),
    }
}
