use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Remote job status. Statuses this client does not know become `Unknown`
/// so one odd entry never fails the whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    #[default]
    Unknown,
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => Self::Pending,
            "processing" | "running" => Self::Processing,
            "completed" | "done" => Self::Completed,
            "failed" | "error" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether offering a cancel action makes sense.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().map(JobStatus::parse).unwrap_or_default())
    }
}

/// One entry of the remote queue, as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type", alias = "jobType", alias = "job_type", default, deserialize_with = "nullable")]
    pub job_type: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(alias = "progressPercent", alias = "progress_percent", default, deserialize_with = "nullable")]
    pub progress: f64,
    #[serde(alias = "outputPath", alias = "output_path", default, deserialize_with = "nullable")]
    pub output_file: String,
    #[serde(default, deserialize_with = "nullable")]
    pub width: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub height: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub fps: f64,
    #[serde(alias = "encoderId", alias = "encoder_id", default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,
    #[serde(alias = "presetId", alias = "preset_id", default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(alias = "createdAt", default, deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(alias = "updatedAt", default, deserialize_with = "nullable")]
    pub updated_at: String,
    #[serde(alias = "errorMessage", alias = "error_message", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueJob {
    /// Progress as a whole percent in 0..=100.
    pub fn percent(&self) -> u8 {
        if !self.progress.is_finite() {
            return 0;
        }
        self.progress.round().clamp(0.0, 100.0) as u8
    }

    pub fn resolution(&self) -> Option<String> {
        (self.width > 0 && self.height > 0).then(|| format!("{}x{}", self.width, self.height))
    }
}

fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match Id::deserialize(d)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(f) => f.to_string(),
    })
}
