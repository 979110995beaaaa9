/// Directory session lifecycle: grant, restore, refresh, forget
use scanner::MemoryDirectory;
use std::sync::Arc;
use std::time::Duration;
use store::{
    HandleStore, JsonKvStore, KeyValueStore, MemoryHandleStore, MemoryKvStore,
    SqliteHandleStore, DIRECTORY_KEY, LAST_DIRECTORY_NAME_KEY,
};
use tracker::{MemoryPlatform, PathPlatform, ProgressTracker, TrackerError, TrackerState};

const TARGET: &str = "queue_id=12\ntype=video\ntotal_duration=120\ntotal_frames=3000\n";
const HALFWAY: &str = "frame=700\nout_time_ms=30000000\nprogress=continue\n\
                       frame=1500\nout_time_ms=60000000\nspeed=1.0x\nprogress=continue\n";

struct Harness {
    platform: Arc<MemoryPlatform>,
    store: Arc<MemoryHandleStore>,
    names: Arc<MemoryKvStore>,
}

impl Harness {
    fn new() -> Self {
        Self {
            platform: Arc::new(MemoryPlatform::new()),
            store: Arc::new(MemoryHandleStore::new()),
            names: Arc::new(MemoryKvStore::new()),
        }
    }

    fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(self.platform.clone(), self.store.clone(), self.names.clone())
    }
}

fn renders() -> Arc<MemoryDirectory> {
    Arc::new(
        MemoryDirectory::new("renders")
            .with_file("old.mp4", "a", 100)
            .with_file("song.mp4", "bb", 300)
            .with_file("song_progress.txt", HALFWAY, 300)
            .with_file("song_progress_target.txt", TARGET, 300)
            .with_file("mid.mkv", "ccc", 200),
    )
}

#[tokio::test]
async fn cold_start_without_grant_is_idle() {
    let h = Harness::new();
    let tracker = h.tracker();
    assert_eq!(tracker.state(), TrackerState::Uninitialized);
    assert_eq!(tracker.restore().await, TrackerState::Idle);
    assert_eq!(tracker.directory_name(), None);
    assert!(matches!(tracker.refresh().await, Err(TrackerError::NotActive)));
}

#[tokio::test]
async fn grant_persists_and_scans_newest_first() {
    let h = Harness::new();
    h.platform.queue_pick(renders());
    let tracker = h.tracker();

    assert!(tracker.grant_access().await.unwrap());
    assert_eq!(tracker.state(), TrackerState::Active);
    assert_eq!(tracker.directory_name().as_deref(), Some("renders"));
    assert!(h.store.get(DIRECTORY_KEY).unwrap().is_some());
    assert_eq!(h.names.get(LAST_DIRECTORY_NAME_KEY).as_deref(), Some("renders"));

    let names: Vec<_> = tracker.files().into_iter().map(|f| f.media.name).collect();
    assert_eq!(names, vec!["song.mp4", "mid.mkv", "old.mp4"]);

    let rows = tracker.rows();
    assert_eq!(rows[0].percent, Some(50));
    assert_eq!(rows[0].frames, "1500/3000");
    assert_eq!(rows[1].percent, None);
    assert!(tracker.last_scan().is_some());
}

#[tokio::test]
async fn cancelled_grant_keeps_prior_state() {
    let h = Harness::new();
    let tracker = h.tracker();
    tracker.restore().await;

    assert!(!tracker.grant_access().await.unwrap());
    assert_eq!(tracker.state(), TrackerState::Idle);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unsupported_platform_never_runs_the_flow() {
    let platform = Arc::new(MemoryPlatform::unsupported());
    platform.queue_pick(renders());
    let store = Arc::new(MemoryHandleStore::new());
    let tracker = ProgressTracker::new(platform.clone(), store.clone(), Arc::new(MemoryKvStore::new()));

    assert!(matches!(tracker.grant_access().await, Err(TrackerError::Unsupported)));
    assert_eq!(tracker.state(), TrackerState::Uninitialized);
    assert!(store.is_empty());
}

#[tokio::test]
async fn restore_reuses_a_live_grant() {
    let h = Harness::new();
    h.platform.queue_pick(renders());
    h.tracker().grant_access().await.unwrap();

    let next_session = h.tracker();
    assert_eq!(next_session.restore().await, TrackerState::Active);
    assert_eq!(next_session.files().len(), 3);
}

#[tokio::test]
async fn revoked_grant_is_cleared_on_restore() {
    let h = Harness::new();
    let dir = renders();
    h.platform.queue_pick(dir.clone());
    h.tracker().grant_access().await.unwrap();
    dir.revoke();
    let before = dir.enumerations();

    let tracker = h.tracker();
    assert_eq!(tracker.restore().await, TrackerState::Idle);
    assert!(h.store.get(DIRECTORY_KEY).unwrap().is_none());
    assert_eq!(tracker.directory_name().as_deref(), Some("renders"));
    assert!(tracker.files().is_empty());
    // One probe, no retries.
    assert_eq!(dir.enumerations(), before + 1);
    assert!(matches!(tracker.refresh().await, Err(TrackerError::NotActive)));
}

#[tokio::test]
async fn deleted_directory_is_cleared_on_restore() {
    let h = Harness::new();
    let dir = renders();
    h.platform.queue_pick(dir.clone());
    h.tracker().grant_access().await.unwrap();
    h.platform.unregister(&dir);

    let tracker = h.tracker();
    assert_eq!(tracker.restore().await, TrackerState::Idle);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn refresh_replaces_results_and_errors_keep_the_grant() {
    let h = Harness::new();
    let dir = renders();
    h.platform.queue_pick(dir.clone());
    let tracker = h.tracker();
    tracker.grant_access().await.unwrap();

    dir.insert("new.avi", "dddd", 400);
    dir.remove("old.mp4");
    assert_eq!(tracker.refresh().await.unwrap(), 3);
    assert_eq!(tracker.files()[0].media.name, "new.avi");

    dir.revoke();
    assert!(matches!(tracker.refresh().await, Err(TrackerError::Scan(_))));
    assert_eq!(tracker.state(), TrackerState::Active);
    assert!(tracker.last_error().is_some());
    assert_eq!(tracker.files().len(), 3, "previous results retained");
    assert!(h.store.get(DIRECTORY_KEY).unwrap().is_some());

    dir.restore_access();
    tracker.refresh().await.unwrap();
    assert!(tracker.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn overlapping_refreshes_are_rejected() {
    let h = Harness::new();
    let dir = renders();
    h.platform.queue_pick(dir.clone());
    let tracker = h.tracker();
    tracker.grant_access().await.unwrap();

    dir.set_enumerate_delay(Some(Duration::from_millis(500)));
    let before = dir.enumerations();
    let (first, second) = tokio::join!(tracker.refresh(), tracker.refresh());

    assert_eq!(first.unwrap(), 3);
    assert!(matches!(second, Err(TrackerError::ScanInProgress)));
    assert_eq!(dir.enumerations(), before + 1);
    assert_eq!(tracker.state(), TrackerState::Active);
}

#[tokio::test(start_paused = true)]
async fn abandoned_refresh_does_not_wedge_the_tracker() {
    let h = Harness::new();
    let dir = renders();
    h.platform.queue_pick(dir.clone());
    let tracker = h.tracker();
    tracker.grant_access().await.unwrap();

    dir.set_enumerate_delay(Some(Duration::from_millis(500)));
    let timed_out = tokio::time::timeout(Duration::from_millis(10), tracker.refresh()).await;
    assert!(timed_out.is_err());
    assert_eq!(tracker.state(), TrackerState::Active);

    dir.set_enumerate_delay(None);
    assert_eq!(tracker.refresh().await.unwrap(), 3);
    assert_eq!(tracker.state(), TrackerState::Active);
}

#[tokio::test]
async fn forget_returns_to_uninitialized() {
    let h = Harness::new();
    h.platform.queue_pick(renders());
    let tracker = h.tracker();
    tracker.grant_access().await.unwrap();

    tracker.forget();
    assert_eq!(tracker.state(), TrackerState::Uninitialized);
    assert!(tracker.files().is_empty());
    assert!(h.store.is_empty());
    assert_eq!(h.names.get(LAST_DIRECTORY_NAME_KEY), None);
    assert_eq!(h.tracker().restore().await, TrackerState::Idle);
}

#[tokio::test]
async fn filesystem_session_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    std::fs::create_dir(&out).unwrap();
    std::fs::write(out.join("clip.mkv"), b"....").unwrap();
    std::fs::write(out.join("clip_progress_target.txt"), TARGET).unwrap();

    let db = tmp.path().join("state").join("handles.db");
    let names = Arc::new(JsonKvStore::new(tmp.path().join("state").join("state.json")));

    let store = Arc::new(SqliteHandleStore::open_or_create(&db).unwrap());
    let tracker = ProgressTracker::new(Arc::new(PathPlatform::with_path(&out)), store, names.clone());
    assert!(tracker.grant_access().await.unwrap());
    assert_eq!(tracker.rows()[0].percent, Some(0));

    std::fs::write(out.join("clip_progress.txt"), HALFWAY).unwrap();
    tracker.refresh().await.unwrap();
    assert_eq!(tracker.rows()[0].percent, Some(50));
    drop(tracker);

    // Next session: only a restore-capable platform.
    let store = Arc::new(SqliteHandleStore::open_or_create(&db).unwrap());
    let tracker = ProgressTracker::new(Arc::new(PathPlatform::restore_only()), store.clone(), names.clone());
    assert_eq!(tracker.restore().await, TrackerState::Active);
    assert_eq!(tracker.files().len(), 1);
    assert!(matches!(tracker.grant_access().await, Err(TrackerError::Unsupported)));

    std::fs::remove_dir_all(&out).unwrap();
    let tracker = ProgressTracker::new(Arc::new(PathPlatform::restore_only()), store.clone(), names);
    assert_eq!(tracker.restore().await, TrackerState::Idle);
    assert_eq!(tracker.directory_name().as_deref(), Some("out"));
    assert!(store.get(DIRECTORY_KEY).unwrap().is_none());
}
