use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::QueueApi;
use crate::job::QueueJob;
use crate::QueueError;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// How long a failed cancel stays visible.
    pub error_ttl: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            error_ttl: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Updated { count: usize },
    FetchFailed(String),
    CancelSucceeded(String),
    CancelFailed { id: String, error: String },
}

/// Snapshot of the poller for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueView {
    pub jobs: Vec<QueueJob>,
    pub fetch_error: Option<String>,
    pub cancel_error: Option<String>,
    pub cancelling: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl QueueView {
    pub fn is_cancelling(&self, id: &str) -> bool {
        self.cancelling.iter().any(|c| c == id)
    }

    pub fn job(&self, id: &str) -> Option<&QueueJob> {
        self.jobs.iter().find(|j| j.id == id)
    }
}

#[derive(Default)]
struct State {
    jobs: Vec<QueueJob>,
    fetch_error: Option<String>,
    cancel_error: Option<(String, Instant)>,
    cancelling: HashSet<String>,
    last_updated: Option<DateTime<Utc>>,
}

/// Marks one job id as having a cancel in flight until dropped.
struct InFlight<'a> {
    state: &'a Mutex<State>,
    id: String,
}

impl<'a> InFlight<'a> {
    fn acquire(state: &'a Mutex<State>, id: &str) -> Option<Self> {
        state.lock().cancelling.insert(id.to_string()).then(|| InFlight {
            state,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.lock().cancelling.remove(&self.id);
    }
}

/// Read-through cache over the remote queue.
///
/// The job list is only ever replaced by a successful fetch. Cancelling never
/// edits a cached job; a confirmed cancel triggers a fresh fetch instead.
pub struct QueuePoller {
    api: Arc<dyn QueueApi>,
    config: PollerConfig,
    state: Mutex<State>,
    tx_events: Sender<QueueEvent>,
    rx_events: Receiver<QueueEvent>,
}

/// Running poll loop. Stops when stopped or dropped.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Abort the loop. A fetch in progress is abandoned.
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl QueuePoller {
    pub fn new(api: Arc<dyn QueueApi>, config: PollerConfig) -> Self {
        let (tx_events, rx_events) = bounded(EVENT_CAPACITY);
        Self {
            api,
            config,
            state: Mutex::new(State::default()),
            tx_events,
            rx_events,
        }
    }

    /// Event stream for the presentation layer. Holds the latest
    /// `EVENT_CAPACITY` events; older ones are discarded when nobody drains it.
    pub fn events(&self) -> Receiver<QueueEvent> {
        self.rx_events.clone()
    }

    /// Fetch now, then every `poll_interval`. Failed fetches are recorded and
    /// the loop carries on.
    pub fn start(self: &Arc<Self>) -> PollerHandle {
        let poller = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = poller.refresh().await;
            }
        });
        tracing::debug!("queue polling every {:?}", self.config.poll_interval);
        PollerHandle { task }
    }

    /// One fetch. On success the cached list is replaced wholesale.
    pub async fn refresh(&self) -> Result<usize, QueueError> {
        match self.api.list_jobs().await {
            Ok(jobs) => {
                let count = jobs.len();
                {
                    let mut state = self.state.lock();
                    state.jobs = jobs;
                    state.fetch_error = None;
                    state.last_updated = Some(Utc::now());
                }
                tracing::debug!("fetched {} queue jobs", count);
                self.emit(QueueEvent::Updated { count });
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("queue fetch failed: {}", e);
                let message = e.to_string();
                self.state.lock().fetch_error = Some(message.clone());
                self.emit(QueueEvent::FetchFailed(message));
                Err(e)
            }
        }
    }

    /// Ask the server to cancel `id`. Confirmation is the caller's business.
    pub async fn cancel(&self, id: &str) -> Result<(), QueueError> {
        let Some(in_flight) = InFlight::acquire(&self.state, id) else {
            return Err(QueueError::CancelInFlight(id.to_string()));
        };
        let result = self.api.cancel_job(id).await;
        drop(in_flight);

        match result {
            Ok(()) => {
                tracing::info!("cancelled job {}", id);
                self.state.lock().cancel_error = None;
                self.emit(QueueEvent::CancelSucceeded(id.to_string()));
                // The fetch outcome is tracked as fetch_error; the cancel stands.
                let _ = self.refresh().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("cancel of job {} failed: {}", id, e);
                let message = format!("could not cancel job {id}: {e}");
                let expires = Instant::now() + self.config.error_ttl;
                self.state.lock().cancel_error = Some((message, expires));
                self.emit(QueueEvent::CancelFailed {
                    id: id.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn view(&self) -> QueueView {
        let mut state = self.state.lock();
        if matches!(&state.cancel_error, Some((_, expires)) if *expires <= Instant::now()) {
            state.cancel_error = None;
        }
        let mut cancelling: Vec<String> = state.cancelling.iter().cloned().collect();
        cancelling.sort();
        QueueView {
            jobs: state.jobs.clone(),
            fetch_error: state.fetch_error.clone(),
            cancel_error: state.cancel_error.as_ref().map(|(m, _)| m.clone()),
            cancelling,
            last_updated: state.last_updated,
        }
    }

    fn emit(&self, event: QueueEvent) {
        if let Err(TrySendError::Full(event)) = self.tx_events.try_send(event) {
            if let Ok(stale) = self.rx_events.try_recv() {
                tracing::trace!("event queue full, discarding {:?}", stale);
            }
            let _ = self.tx_events.try_send(event);
        }
    }
}
