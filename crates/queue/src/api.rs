/// Remote queue API client
///
/// The server owns job state. This side only lists, cancels and checks
/// health; everything shown locally comes from a list response.
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::job::QueueJob;
use crate::QueueError;

/// Remote queue operations
#[async_trait]
pub trait QueueApi: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<QueueJob>, QueueError>;

    async fn cancel_job(&self, id: &str) -> Result<(), QueueError>;

    /// Health endpoint body, or its raw text when it is not JSON
    async fn health(&self) -> Result<serde_json::Value, QueueError>;
}

/// HTTP implementation against `{base}/api/...`
#[derive(Debug, Clone)]
pub struct HttpQueueApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Jobs(Vec<QueueJob>),
    Wrapped { jobs: Vec<QueueJob> },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpQueueApi {
    pub fn new(base_url: &str) -> Result<Self, QueueError> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn server_error(response: reqwest::Response) -> QueueError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        QueueError::Server {
            status,
            message: error_message(status, &body),
        }
    }
}

#[async_trait]
impl QueueApi for HttpQueueApi {
    async fn list_jobs(&self) -> Result<Vec<QueueJob>, QueueError> {
        let response = self.client.get(self.url("/api/queue/list")).send().await?;
        if !response.status().is_success() {
            return Err(Self::server_error(response).await);
        }
        let body = response.text().await?;
        Ok(match serde_json::from_str(&body)? {
            ListResponse::Jobs(jobs) | ListResponse::Wrapped { jobs } => jobs,
        })
    }

    async fn cancel_job(&self, id: &str) -> Result<(), QueueError> {
        let response = self
            .client
            .delete(self.url("/api/queue/cancel"))
            .query(&[("id", id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::server_error(response).await);
        }
        Ok(())
    }

    async fn health(&self) -> Result<serde_json::Value, QueueError> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        if !response.status().is_success() {
            return Err(Self::server_error(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

/// Message for a failed call: the `error` field of a JSON body when there is
/// one, otherwise the HTTP status.
pub fn error_message(status: u16, body: &str) -> String {
    if let Some(message) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.trim().is_empty())
    {
        return message;
    }
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason());
    match reason {
        Some(reason) => format!("HTTP {status} {reason}"),
        None => format!("HTTP {status}"),
    }
}
