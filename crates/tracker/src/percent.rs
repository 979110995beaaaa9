use scanner::ScannedFile;

/// Completion of one file in whole percent, or `None` when nothing is known.
///
/// A finished report is always 100. Otherwise the encoded position is compared
/// with the target duration, rounded and capped at 100.
pub fn progress_percent(file: &ScannedFile) -> Option<u8> {
    let snapshot = file.progress.as_ref();
    let target = file.target.as_ref();
    match (snapshot, target) {
        (None, None) => None,
        (Some(p), _) if p.progress.is_finished() => Some(100),
        (Some(p), Some(t)) if t.total_duration_secs > 0.0 && p.out_time_secs() > 0.0 => {
            let ratio = p.out_time_secs() / t.total_duration_secs * 100.0;
            Some(ratio.round().clamp(0.0, 100.0) as u8)
        }
        _ => Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scanner::MediaFileEntry;
    use sidecar::{parse_progress, parse_target};

    fn file(progress: Option<&str>, target: Option<&str>) -> ScannedFile {
        ScannedFile {
            base_name: "song".into(),
            media: MediaFileEntry {
                name: "song.mp4".into(),
                size: 0,
                modified: Utc::now(),
                mime_type: "video/mp4".into(),
            },
            progress: progress.and_then(parse_progress),
            target: target.and_then(parse_target),
        }
    }

    const TARGET_120S: &str = "queue_id=1\ntotal_duration=120\ntotal_frames=3000\n";

    #[test]
    fn unknown_without_any_sidecar() {
        assert_eq!(progress_percent(&file(None, None)), None);
    }

    #[test]
    fn end_is_always_complete() {
        let p = "frame=1\nout_time_ms=0\nprogress=end\n";
        assert_eq!(progress_percent(&file(Some(p), None)), Some(100));
        assert_eq!(progress_percent(&file(Some(p), Some(TARGET_120S))), Some(100));
    }

    #[test]
    fn halfway() {
        let p = "frame=1\nout_time_ms=60000000\nprogress=continue\n";
        assert_eq!(progress_percent(&file(Some(p), Some(TARGET_120S))), Some(50));
    }

    #[test]
    fn rounds_to_nearest() {
        // 1.0 / 120 s = 0.83 %
        let p = "frame=1\nout_time_ms=1000000\n";
        assert_eq!(progress_percent(&file(Some(p), Some(TARGET_120S))), Some(1));
    }

    #[test]
    fn zero_or_negative_position_is_zero() {
        for us in ["0", "-5000000", "N/A"] {
            let p = format!("frame=1\nout_time_ms={us}\n");
            assert_eq!(progress_percent(&file(Some(&p), Some(TARGET_120S))), Some(0), "{us}");
        }
    }

    #[test]
    fn overshoot_clamps_to_100() {
        let p = "frame=1\nout_time_ms=500000000\nprogress=continue\n";
        assert_eq!(progress_percent(&file(Some(p), Some(TARGET_120S))), Some(100));
    }

    #[test]
    fn missing_half_of_the_pair_is_zero() {
        let p = "frame=1\nout_time_ms=60000000\n";
        assert_eq!(progress_percent(&file(Some(p), None)), Some(0));
        assert_eq!(progress_percent(&file(None, Some(TARGET_120S))), Some(0));
    }
}
