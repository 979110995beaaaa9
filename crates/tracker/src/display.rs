use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use scanner::ScannedFile;
use serde::Serialize;
use std::time::Duration;

use crate::percent::progress_percent;

/// Presentation-ready view of one tracked file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRow {
    pub name: String,
    pub size: String,
    pub modified: DateTime<Utc>,
    pub percent: Option<u8>,
    pub frames: String,
    pub speed: String,
    #[serde(with = "opt_secs")]
    pub eta: Option<Duration>,
    pub encoder: String,
    pub finished: bool,
}

impl FileRow {
    pub fn from_scanned(file: &ScannedFile) -> Self {
        let snapshot = file.progress.as_ref();
        let target = file.target.as_ref();
        let frames = match (snapshot, target) {
            (Some(p), Some(t)) => format!("{}/{}", p.frame, t.total_frames),
            (Some(p), None) => p.frame.to_string(),
            (None, Some(t)) => format!("0/{}", t.total_frames),
            (None, None) => String::new(),
        };
        let encoder = target
            .map(|t| match (t.encoder.is_empty(), t.preset.is_empty()) {
                (false, false) => format!("{} ({})", t.encoder, t.preset),
                (false, true) => t.encoder.clone(),
                _ => String::new(),
            })
            .unwrap_or_default();
        Self {
            name: file.media.name.clone(),
            size: format_bytes(file.media.size),
            modified: file.media.modified,
            percent: progress_percent(file),
            frames,
            speed: snapshot.map(|p| p.speed.clone()).unwrap_or_default(),
            eta: estimate_remaining(file),
            encoder,
            finished: snapshot.map(|p| p.progress.is_finished()).unwrap_or(false),
        }
    }

    pub fn percent_label(&self) -> String {
        match self.percent {
            Some(p) => format!("{p:>3}%"),
            None => "   -".to_string(),
        }
    }

    pub fn eta_label(&self) -> String {
        if self.finished {
            return "done".to_string();
        }
        self.eta.map(format_duration).unwrap_or_default()
    }
}

/// Time left at the current encoding speed. Needs a running report, a
/// target duration and a parseable speed. Estimates too large for a
/// `Duration` are absent.
pub fn estimate_remaining(file: &ScannedFile) -> Option<Duration> {
    let snapshot = file.progress.as_ref()?;
    let target = file.target.as_ref()?;
    if snapshot.progress.is_finished() || target.total_duration_secs <= 0.0 {
        return None;
    }
    let speed = snapshot.speed_multiplier()?;
    let left = (target.total_duration_secs - snapshot.out_time_secs().max(0.0)).max(0.0);
    Duration::try_from_secs_f64(left / speed).ok()
}

/// Binary units, e.g. `3.0 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    ByteSize::b(bytes).to_string_as(true)
}

/// Whole seconds, e.g. `3m 5s`.
pub fn format_duration(d: Duration) -> String {
    humantime::format_duration(Duration::from_secs(d.as_secs())).to_string()
}

/// Fixed-width text bar, e.g. `[#####.....]` for 50 % at width 10.
pub fn progress_bar(percent: Option<u8>, width: usize) -> String {
    let filled = percent
        .map(|p| (p.min(100) as usize * width + 50) / 100)
        .unwrap_or(0);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

mod opt_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanner::MediaFileEntry;
    use sidecar::{parse_progress, parse_target};

    fn scanned(progress: &str, target: &str, size: u64) -> ScannedFile {
        ScannedFile {
            base_name: "job".into(),
            media: MediaFileEntry {
                name: "job.mkv".into(),
                size,
                modified: Utc::now(),
                mime_type: "video/x-matroska".into(),
            },
            progress: parse_progress(progress),
            target: parse_target(target),
        }
    }

    #[test]
    fn row_for_running_job() {
        let file = scanned(
            "frame=1500\nout_time_ms=60000000\nspeed=2x\nprogress=continue\n",
            "queue_id=3\ntotal_duration=120\ntotal_frames=3000\nencoder=libx264\npreset=slow\n",
            3 * 1024 * 1024,
        );
        let row = FileRow::from_scanned(&file);
        assert_eq!(row.percent, Some(50));
        assert_eq!(row.percent_label(), " 50%");
        assert_eq!(row.frames, "1500/3000");
        assert_eq!(row.size, "3.0 MiB");
        assert_eq!(row.encoder, "libx264 (slow)");
        assert_eq!(row.eta, Some(Duration::from_secs(30)));
        assert_eq!(row.eta_label(), "30s");
        assert!(!row.finished);
    }

    #[test]
    fn row_without_sidecars() {
        let file = scanned("", "", 10);
        let row = FileRow::from_scanned(&file);
        assert_eq!(row.percent, None);
        assert_eq!(row.percent_label(), "   -");
        assert_eq!(row.frames, "");
        assert_eq!(row.eta_label(), "");
    }

    #[test]
    fn finished_row_has_no_eta() {
        let file = scanned(
            "frame=3000\nout_time_ms=120000000\nspeed=2x\nprogress=end\n",
            "queue_id=3\ntotal_duration=120\ntotal_frames=3000\n",
            10,
        );
        let row = FileRow::from_scanned(&file);
        assert_eq!(row.eta, None);
        assert_eq!(row.eta_label(), "done");
    }

    #[test]
    fn absurd_targets_have_no_eta() {
        let huge = scanned(
            "frame=10\nout_time_ms=1000000\nspeed=1x\nprogress=continue\n",
            "queue_id=3\ntotal_duration=1e300\ntotal_frames=3000\n",
            10,
        );
        assert_eq!(estimate_remaining(&huge), None);
        assert_eq!(FileRow::from_scanned(&huge).eta_label(), "");

        let crawling = scanned(
            "frame=10\nout_time_ms=1000000\nspeed=1e-20x\nprogress=continue\n",
            "queue_id=3\ntotal_duration=120\ntotal_frames=3000\n",
            10,
        );
        assert_eq!(estimate_remaining(&crawling), None);
    }

    #[test]
    fn byte_and_duration_formatting() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
        assert_eq!(format_duration(Duration::from_secs(7)), "7s");
        assert_eq!(format_duration(Duration::from_millis(185_400)), "3m 5s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h 2m");
    }

    #[test]
    fn bars() {
        assert_eq!(progress_bar(Some(50), 10), "[#####.....]");
        assert_eq!(progress_bar(Some(100), 4), "[####]");
        assert_eq!(progress_bar(None, 4), "[....]");
    }
}
