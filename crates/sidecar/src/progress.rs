use serde::{Deserialize, Serialize};

use crate::{assignments, float_or_zero, int_or_zero};

/// Value of the `progress` key that closes each ffmpeg report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    #[default]
    Continue,
    End,
    Other(String),
}

impl ProgressState {
    fn parse(value: &str) -> Self {
        match value {
            "continue" => ProgressState::Continue,
            "end" => ProgressState::End,
            other => ProgressState::Other(other.to_string()),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ProgressState::End)
    }
}

/// One report block from a progress log.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub frame: i64,
    pub fps: f64,
    pub bitrate: String,
    pub out_time: String,
    /// Raw `out_time_ms` value. ffmpeg writes microseconds under this key.
    pub out_time_micros: i64,
    pub speed: String,
    pub progress: ProgressState,
    pub total_size: i64,
    pub stream_quality: Option<f64>,
}

impl ProgressSnapshot {
    /// Encoded output position in seconds.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_micros as f64 / 1_000_000.0
    }

    /// Parses `speed=1.25x` into `1.25`. Zero, negative and `N/A` yield `None`.
    pub fn speed_multiplier(&self) -> Option<f64> {
        let raw = self.speed.trim().trim_end_matches(&['x', 'X'][..]).trim();
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    fn apply(&mut self, key: &str, value: &str) -> bool {
        match key {
            "fps" => self.fps = float_or_zero(value),
            "bitrate" => self.bitrate = value.to_string(),
            "out_time" => self.out_time = value.to_string(),
            "out_time_ms" => self.out_time_micros = int_or_zero(value),
            "speed" => self.speed = value.to_string(),
            "progress" => self.progress = ProgressState::parse(value),
            "total_size" => self.total_size = int_or_zero(value),
            "stream_0_0_q" => self.stream_quality = Some(float_or_zero(value)),
            _ => return false,
        }
        true
    }
}

struct OpenBlock {
    snapshot: ProgressSnapshot,
    has_fields: bool,
}

/// Return the latest snapshot block of a progress log.
///
/// Every `frame` line opens a block and finalizes the one before it. At end of
/// input the open block wins if anything beyond its `frame` header was written;
/// a bare trailing header falls back to the previous finalized block. Keys seen
/// before the first `frame` line belong to no block.
pub fn parse_progress(content: &str) -> Option<ProgressSnapshot> {
    let mut last: Option<ProgressSnapshot> = None;
    let mut open: Option<OpenBlock> = None;

    for (key, value) in assignments(content) {
        if key == "frame" {
            if let Some(done) = open.take() {
                last = Some(done.snapshot);
            }
            open = Some(OpenBlock {
                snapshot: ProgressSnapshot {
                    frame: int_or_zero(value),
                    ..ProgressSnapshot::default()
                },
                has_fields: false,
            });
            continue;
        }
        if let Some(block) = open.as_mut() {
            if block.snapshot.apply(key, value) {
                block.has_fields = true;
            }
        }
    }

    match open {
        Some(block) if block.has_fields || last.is_none() => Some(block.snapshot),
        _ => last,
    }
}
