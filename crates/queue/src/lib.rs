//! Remote encoding queue: API client and polling view.

use thiserror::Error;

pub mod api;
mod job;
mod poller;

pub use api::{HttpQueueApi, QueueApi};
pub use job::{JobStatus, QueueJob};
pub use poller::{PollerConfig, PollerHandle, QueueEvent, QueuePoller, QueueView};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("job {0} is already being cancelled")]
    CancelInFlight(String),
}
