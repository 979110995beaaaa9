/// Progress tracking over a user-granted output directory
///
/// `ProgressTracker` owns one directory session: it restores the stored grant,
/// scans for encoder output and keeps the latest results for display.
use thiserror::Error;

pub mod display;
mod handles;
mod percent;
pub mod platform;
mod tracker;

pub use display::{format_bytes, format_duration, progress_bar, FileRow};
pub use handles::Handles;
pub use percent::progress_percent;
pub use platform::{AccessError, DirectoryPlatform, MemoryPlatform, PathPlatform};
#[cfg(feature = "dialog")]
pub use platform::DialogPlatform;
pub use tracker::{ProgressTracker, TrackerState};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("directory selection is not available here")]
    Unsupported,
    #[error("no directory has been granted")]
    NotActive,
    #[error("a scan is already running")]
    ScanInProgress,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Scan(#[from] scanner::ScanError),
}
