use serde::{Deserialize, Serialize};
use sidecar::{parse_progress, parse_target, ProgressSnapshot, TargetDescriptor};
use std::collections::HashMap;

use crate::classify::{classify, mime_type_for, EntryKind};
use crate::{DirectoryAccess, ScanError};

/// One output video found in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFileEntry {
    pub name: String,
    pub size: u64,
    pub modified: chrono::DateTime<chrono::Utc>,
    pub mime_type: String,
}

/// A media file with whatever sidecar data was found for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub base_name: String,
    pub media: MediaFileEntry,
    pub progress: Option<ProgressSnapshot>,
    pub target: Option<TargetDescriptor>,
}

async fn read_sidecar(dir: &dyn DirectoryAccess, name: &str) -> Option<String> {
    match dir.open_entry(name).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("failed to read sidecar {}: {}", name, e);
            None
        }
    }
}

/// Scan `dir` and attach sidecar data to every media file.
///
/// The listing is taken once; sidecars are matched to media by exact base
/// name. Results come back newest first and only after every file has been
/// processed.
pub async fn scan(dir: &dyn DirectoryAccess) -> Result<Vec<ScannedFile>, ScanError> {
    let entries = dir.enumerate().await.map_err(|source| ScanError::Enumerate {
        dir: dir.name().to_string(),
        source,
    })?;

    let mut progress_logs: HashMap<String, String> = HashMap::new();
    let mut targets: HashMap<String, String> = HashMap::new();
    let mut media: Vec<(String, MediaFileEntry)> = Vec::new();

    for entry in entries.into_iter().filter(|e| e.is_file) {
        match classify(&entry.name) {
            EntryKind::Progress { base } => {
                progress_logs.insert(base.to_string(), entry.name.clone());
            }
            EntryKind::Target { base } => {
                targets.insert(base.to_string(), entry.name.clone());
            }
            EntryKind::Media { base } => {
                media.push((
                    base.to_string(),
                    MediaFileEntry {
                        name: entry.name.clone(),
                        mime_type: mime_type_for(&entry.name).to_string(),
                        size: entry.size,
                        modified: entry.modified,
                    },
                ));
            }
            EntryKind::Other => {}
        }
    }

    let mut files = Vec::with_capacity(media.len());
    for (base_name, entry) in media {
        let target = match targets.get(&base_name) {
            Some(name) => read_sidecar(dir, name).await.as_deref().and_then(parse_target),
            None => None,
        };
        let progress = match progress_logs.get(&base_name) {
            Some(name) => read_sidecar(dir, name).await.as_deref().and_then(parse_progress),
            None => None,
        };
        files.push(ScannedFile {
            base_name,
            media: entry,
            progress,
            target,
        });
    }

    files.sort_by(|a, b| {
        b.media
            .modified
            .cmp(&a.media.modified)
            .then_with(|| a.media.name.cmp(&b.media.name))
    });
    tracing::debug!("scanned {}: {} media files", dir.name(), files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDirectory;

    const TARGET: &str = "queue_id=9\ntotal_duration=120\ntotal_frames=3000\n";
    const PROGRESS: &str = "frame=10\nout_time_ms=60000000\nprogress=continue\n";

    #[tokio::test]
    async fn newest_first() {
        let dir = MemoryDirectory::new("out")
            .with_file("t1.mp4", "", 100)
            .with_file("t3.mkv", "", 300)
            .with_file("t2.avi", "", 200);
        let names: Vec<_> = scan(&dir)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.media.name)
            .collect();
        assert_eq!(names, vec!["t3.mkv", "t2.avi", "t1.mp4"]);
    }

    #[tokio::test]
    async fn association_is_by_exact_base_name() {
        let dir = MemoryDirectory::new("out")
            .with_file("song.mp4", "x", 2)
            .with_file("song2.mp4", "y", 1)
            .with_file("song_progress.txt", PROGRESS, 2)
            .with_file("song_progress_target.txt", TARGET, 2);
        let files = scan(&dir).await.unwrap();

        let song = files.iter().find(|f| f.media.name == "song.mp4").unwrap();
        assert_eq!(song.base_name, "song");
        assert_eq!(song.progress.as_ref().unwrap().frame, 10);
        assert_eq!(song.target.as_ref().unwrap().queue_id, "9");
        assert_eq!(song.media.mime_type, "video/mp4");

        let song2 = files.iter().find(|f| f.media.name == "song2.mp4").unwrap();
        assert!(song2.progress.is_none());
        assert!(song2.target.is_none());
    }

    #[tokio::test]
    async fn sidecars_shared_across_containers() {
        let dir = MemoryDirectory::new("out")
            .with_file("clip.mp4", "", 1)
            .with_file("clip.mkv", "", 2)
            .with_file("clip_progress.txt", PROGRESS, 1);
        let files = scan(&dir).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.progress.is_some()));
    }

    #[tokio::test]
    async fn orphan_sidecars_and_other_files_are_ignored() {
        let dir = MemoryDirectory::new("out")
            .with_file("lonely_progress.txt", PROGRESS, 1)
            .with_file("notes.txt", "hi", 1);
        assert!(scan(&dir).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_or_broken_sidecar_means_no_data() {
        let dir = MemoryDirectory::new("out")
            .with_file("a.mp4", "", 1)
            .with_file("a_progress.txt", PROGRESS, 1)
            .with_file("a_progress_target.txt", "queue_id=1\n", 1);
        dir.make_unreadable("a_progress.txt");
        let files = scan(&dir).await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].progress.is_none());
        assert!(files[0].target.is_none());
    }

    #[tokio::test]
    async fn enumeration_failure_is_one_scan_error() {
        let dir = MemoryDirectory::new("out").with_file("a.mp4", "", 1);
        dir.revoke();
        let err = scan(&dir).await.unwrap_err();
        assert!(matches!(err, ScanError::Enumerate { ref dir, .. } if dir == "out"));
    }
}
