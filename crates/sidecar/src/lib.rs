/// Sidecar text formats written next to encoder output
///
/// Two line-oriented `key=value` formats share this crate:
/// - `<base>_progress.txt`: the append-only stream ffmpeg writes with `-progress`
/// - `<base>_progress_target.txt`: the one-shot descriptor written at job start
mod progress;
mod target;

pub use progress::{parse_progress, ProgressSnapshot, ProgressState};
pub use target::{parse_target, TargetDescriptor};

/// Iterate the `key=value` assignments in `content`.
///
/// Lines are trimmed; blank lines and lines without `=` are skipped. The split
/// happens at the first `=`, so values may themselves contain `=`.
pub(crate) fn assignments(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        line.split_once('=').map(|(k, v)| (k.trim(), v.trim()))
    })
}

/// Integer field: malformed input reads as zero. A float literal is truncated.
pub(crate) fn int_or_zero(value: &str) -> i64 {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
        .unwrap_or(0)
}

pub(crate) fn float_or_zero(value: &str) -> f64 {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
