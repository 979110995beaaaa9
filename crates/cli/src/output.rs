use chrono::{DateTime, Local, Utc};
use queue::{QueueJob, QueueView};
use std::fmt::Write;
use tracker::{progress_bar, FileRow};

const BAR_WIDTH: usize = 20;

/// Table of tracked files for one directory.
pub fn render_files(
    directory: Option<&str>,
    rows: &[FileRow],
    last_error: Option<&str>,
    last_scan: Option<DateTime<Utc>>,
) -> String {
    let mut out = String::new();
    match (directory, last_scan) {
        (Some(dir), Some(at)) => {
            let _ = writeln!(out, "{dir}  (scanned {})", at.with_timezone(&Local).format("%H:%M:%S"));
        }
        (Some(dir), None) => {
            let _ = writeln!(out, "{dir}");
        }
        (None, _) => {
            let _ = writeln!(out, "no directory granted");
        }
    }
    if let Some(err) = last_error {
        let _ = writeln!(out, "scan failed: {err}");
    }
    if rows.is_empty() {
        if directory.is_some() {
            let _ = writeln!(out, "  no output files");
        }
        return out;
    }
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<name_width$}  {} {}  {:>10}  {:>11}  {:>6}  {:>8}  {}",
            row.name,
            progress_bar(row.percent, BAR_WIDTH),
            row.percent_label(),
            row.size,
            row.frames,
            row.speed,
            row.eta_label(),
            row.encoder,
        );
    }
    out
}

pub fn job_line(job: &QueueJob, cancelling: bool) -> String {
    let mut line = format!(
        "{:>6}  {:<10}  {:>3}%  {:<8}  {}",
        job.id,
        job.status.as_str(),
        job.percent(),
        job.job_type,
        job.output_file,
    );
    if let Some(res) = job.resolution() {
        let _ = write!(line, "  {res}");
    }
    if let Some(enc) = &job.encoder {
        let _ = write!(line, "  {enc}");
    }
    if cancelling {
        line.push_str("  (cancelling...)");
    }
    if let Some(err) = &job.error {
        let _ = write!(line, "  error: {err}");
    }
    line
}

pub fn render_queue(view: &QueueView) -> String {
    let mut out = String::new();
    if let Some(err) = &view.fetch_error {
        let _ = writeln!(out, "queue unavailable: {err}");
    }
    if let Some(err) = &view.cancel_error {
        let _ = writeln!(out, "{err}");
    }
    if view.jobs.is_empty() {
        if view.last_updated.is_some() {
            let _ = writeln!(out, "queue is empty");
        }
        return out;
    }
    for job in &view.jobs {
        let _ = writeln!(out, "{}", job_line(job, view.is_cancelling(&job.id)));
    }
    out
}
