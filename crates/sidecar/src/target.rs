use serde::{Deserialize, Serialize};

use crate::{assignments, float_or_zero, int_or_zero};

/// Expected shape of a job's output, written once when the job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub queue_id: String,
    pub job_type: String,
    pub output_file: String,
    pub total_duration_secs: f64,
    pub total_frames: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub encoder: String,
    pub preset: String,
    pub fade_effect: Option<String>,
    pub fade_duration: Option<f64>,
    pub fade_offset: Option<f64>,
    pub created_at: String,
}

#[derive(Default)]
struct Fields {
    queue_id: Option<String>,
    job_type: String,
    output_file: String,
    total_duration: Option<f64>,
    total_frames: Option<i64>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    encoder: String,
    preset: String,
    fade_effect: Option<String>,
    fade_duration: Option<f64>,
    fade_offset: Option<f64>,
    created_at: String,
}

/// Parse a target descriptor.
///
/// Returns `None` unless `queue_id`, `total_duration` and `total_frames` are all
/// present and both totals are non-zero.
pub fn parse_target(content: &str) -> Option<TargetDescriptor> {
    let mut f = Fields::default();
    for (key, value) in assignments(content) {
        match key {
            "queue_id" => f.queue_id = Some(value.to_string()),
            "type" => f.job_type = value.to_string(),
            "output_file" => f.output_file = value.to_string(),
            "total_duration" => f.total_duration = Some(float_or_zero(value)),
            "total_frames" => f.total_frames = Some(int_or_zero(value)),
            "width" => f.width = value.parse().ok(),
            "height" => f.height = value.parse().ok(),
            "fps" => f.fps = value.parse().ok(),
            "encoder" => f.encoder = value.to_string(),
            "preset" => f.preset = value.to_string(),
            "fade_effect" => {
                f.fade_effect = match value {
                    "" | "none" => None,
                    other => Some(other.to_string()),
                }
            }
            "fade_duration" => f.fade_duration = value.parse().ok(),
            "fade_offset" => f.fade_offset = value.parse().ok(),
            "created_at" => f.created_at = value.to_string(),
            _ => {}
        }
    }

    let queue_id = f.queue_id.filter(|id| !id.is_empty())?;
    let total_duration_secs = f.total_duration.filter(|d| *d != 0.0)?;
    let total_frames = f.total_frames.filter(|n| *n != 0)?;

    Some(TargetDescriptor {
        queue_id,
        job_type: f.job_type,
        output_file: f.output_file,
        total_duration_secs,
        total_frames,
        width: f.width,
        height: f.height,
        fps: f.fps,
        encoder: f.encoder,
        preset: f.preset,
        fade_effect: f.fade_effect,
        fade_duration: f.fade_duration,
        fade_offset: f.fade_offset,
        created_at: f.created_at,
    })
}
