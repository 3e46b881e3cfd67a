//! Poll-cycle behavior of SyncLoop against an in-memory Drive.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pod_drive_sync::models::FileMetadata;
use pod_drive_sync::{
    CycleOutcome, DriveStore, Result, SourceDir, SyncError, SyncLoop, UploadLedger,
};
use tempfile::TempDir;
use time::macros::date;

/// Records uploads and fails on demand.
#[derive(Default)]
struct FakeDrive {
    uploads: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeDrive {
    fn failing(names: &[&str]) -> Self {
        let drive = Self::default();
        drive
            .failing
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        drive
    }

    fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl DriveStore for FakeDrive {
    async fn get_folder(&self, folder_id: &str) -> Result<FileMetadata> {
        Ok(FileMetadata {
            id: folder_id.to_string(),
            name: "Outputs".to_string(),
            mime_type: Some("application/vnd.google-apps.folder".to_string()),
            size: None,
        })
    }

    async fn upload_file(&self, local_path: &Path, parent_id: &str) -> Result<FileMetadata> {
        let name = local_path.file_name().unwrap().to_string_lossy().into_owned();
        if self.failing.lock().unwrap().contains(&name) {
            return Err(SyncError::ApiError {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }

        let size = fs::metadata(local_path)?.len();
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((name.clone(), parent_id.to_string()));
        Ok(FileMetadata {
            id: format!("id-{}", uploads.len()),
            name,
            mime_type: None,
            size: Some(size),
        })
    }
}

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    ledger_path: PathBuf,
}

impl Fixture {
    fn new(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("outputs");
        fs::create_dir(&source).unwrap();
        for name in files {
            fs::write(source.join(name), name.as_bytes()).unwrap();
        }
        let ledger_path = dir.path().join("copied_files.txt");
        Self {
            _dir: dir,
            source,
            ledger_path,
        }
    }

    fn sync_loop(&self, drive: FakeDrive) -> SyncLoop<FakeDrive> {
        let ledger = UploadLedger::load(&self.ledger_path).unwrap();
        SyncLoop::new(
            drive,
            SourceDir::Flat(self.source.clone()),
            "folder123",
            ledger,
            Duration::from_secs(120),
        )
    }

    fn ledger_contents(&self) -> String {
        fs::read_to_string(&self.ledger_path).unwrap()
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn uploads_only_files_missing_from_ledger() {
    let fixture = Fixture::new(&["a.png", "b.png", "c.png"]);
    fs::write(&fixture.ledger_path, "a.png\n").unwrap();

    let mut sync = fixture.sync_loop(FakeDrive::default());
    let outcome = sync.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            uploaded: names(&["b.png", "c.png"]),
            failed: vec![],
        }
    );
    for name in ["a.png", "b.png", "c.png"] {
        assert!(sync.ledger().contains(name));
    }
    assert_eq!(fixture.ledger_contents(), "a.png\nb.png\nc.png\n");

    let uploads = sync.store().uploads.lock().unwrap().clone();
    assert!(uploads.iter().all(|(_, parent)| parent == "folder123"));
}

#[tokio::test]
async fn second_cycle_uploads_nothing() {
    let fixture = Fixture::new(&["a.png", "b.png"]);
    let mut sync = fixture.sync_loop(FakeDrive::default());

    sync.run_cycle().await.unwrap();
    let second = sync.run_cycle().await.unwrap();

    assert_eq!(
        second,
        CycleOutcome::Synced {
            uploaded: vec![],
            failed: vec![],
        }
    );
    assert_eq!(sync.store().uploaded_names(), names(&["a.png", "b.png"]));
}

#[tokio::test]
async fn failed_upload_is_retried_next_cycle() {
    let fixture = Fixture::new(&["a.png", "b.png", "c.png"]);
    let mut sync = fixture.sync_loop(FakeDrive::failing(&["b.png"]));

    let first = sync.run_cycle().await.unwrap();
    assert_eq!(
        first,
        CycleOutcome::Synced {
            uploaded: names(&["a.png", "c.png"]),
            failed: names(&["b.png"]),
        }
    );
    assert!(!sync.ledger().contains("b.png"));
    assert_eq!(fixture.ledger_contents(), "a.png\nc.png\n");

    sync.store().recover();
    let second = sync.run_cycle().await.unwrap();
    assert_eq!(
        second,
        CycleOutcome::Synced {
            uploaded: names(&["b.png"]),
            failed: vec![],
        }
    );
    assert!(sync.ledger().contains("b.png"));
}

#[tokio::test]
async fn new_files_are_picked_up_later() {
    let fixture = Fixture::new(&["a.png"]);
    let mut sync = fixture.sync_loop(FakeDrive::default());
    sync.run_cycle().await.unwrap();

    fs::write(fixture.source.join("b.png"), b"b").unwrap();
    let outcome = sync.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            uploaded: names(&["b.png"]),
            failed: vec![],
        }
    );
}

#[tokio::test]
async fn restart_reuploads_file_missing_from_ledger() {
    let fixture = Fixture::new(&["a.png", "b.png"]);

    // First run: a.png recorded, b.png "uploaded" but the process died before
    // the ledger write.
    fs::write(&fixture.ledger_path, "a.png\n").unwrap();

    let mut restarted = fixture.sync_loop(FakeDrive::default());
    let outcome = restarted.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            uploaded: names(&["b.png"]),
            failed: vec![],
        }
    );
    assert_eq!(restarted.store().uploaded_names(), names(&["b.png"]));
}

#[tokio::test]
async fn missing_source_leaves_ledger_alone() {
    let fixture = Fixture::new(&[]);
    fs::write(&fixture.ledger_path, "a.png\n").unwrap();

    let ledger = UploadLedger::load(&fixture.ledger_path).unwrap();
    let missing = fixture.source.join("not-yet-created");
    let mut sync = SyncLoop::new(
        FakeDrive::default(),
        SourceDir::Flat(missing.clone()),
        "folder123",
        ledger,
        Duration::from_secs(120),
    );

    let outcome = sync.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::SourceMissing(missing));
    assert_eq!(fixture.ledger_contents(), "a.png\n");
    assert!(sync.store().uploaded_names().is_empty());
}

#[tokio::test]
async fn subdirectories_are_not_uploaded() {
    let fixture = Fixture::new(&["a.png"]);
    fs::create_dir(fixture.source.join("grids")).unwrap();
    fs::write(fixture.source.join("grids").join("grid.png"), b"g").unwrap();

    let mut sync = fixture.sync_loop(FakeDrive::default());
    let outcome = sync.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            uploaded: names(&["a.png"]),
            failed: vec![],
        }
    );
}

#[tokio::test]
async fn dated_layout_watches_that_days_folder() {
    let fixture = Fixture::new(&[]);
    let day_dir = fixture.source.join("txt2img-images").join("2024-03-07");
    fs::create_dir_all(&day_dir).unwrap();
    fs::write(day_dir.join("00000-1.png"), b"img").unwrap();
    fs::write(fixture.source.join("stray.png"), b"img").unwrap();

    let ledger = UploadLedger::load(&fixture.ledger_path).unwrap();
    let mut sync = SyncLoop::new(
        FakeDrive::default(),
        SourceDir::Dated(fixture.source.clone()),
        "folder123",
        ledger,
        Duration::from_secs(120),
    );

    let outcome = sync.run_cycle_for(date!(2024 - 03 - 07)).await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Synced {
            uploaded: names(&["00000-1.png"]),
            failed: vec![],
        }
    );

    let next_day = sync.run_cycle_for(date!(2024 - 03 - 08)).await.unwrap();
    assert_eq!(
        next_day,
        CycleOutcome::SourceMissing(fixture.source.join("txt2img-images").join("2024-03-08"))
    );
}

#[tokio::test]
async fn previous_day_gets_a_final_pass_after_midnight() {
    let fixture = Fixture::new(&[]);
    let day_dir = fixture.source.join("txt2img-images").join("2024-03-07");
    fs::create_dir_all(&day_dir).unwrap();
    fs::write(day_dir.join("early.png"), b"img").unwrap();

    let ledger = UploadLedger::load(&fixture.ledger_path).unwrap();
    let mut sync = SyncLoop::new(
        FakeDrive::default(),
        SourceDir::Dated(fixture.source.clone()),
        "folder123",
        ledger,
        Duration::from_secs(120),
    );

    sync.run_cycle_for(date!(2024 - 03 - 07)).await.unwrap();

    // Written after the last cycle of the day.
    fs::write(day_dir.join("late.png"), b"img").unwrap();

    let first_after_midnight = sync.run_cycle_for(date!(2024 - 03 - 08)).await.unwrap();
    assert_eq!(
        first_after_midnight,
        CycleOutcome::Synced {
            uploaded: names(&["late.png"]),
            failed: vec![],
        }
    );
    assert!(sync.ledger().contains("late.png"));

    let later = sync.run_cycle_for(date!(2024 - 03 - 08)).await.unwrap();
    assert_eq!(
        later,
        CycleOutcome::SourceMissing(fixture.source.join("txt2img-images").join("2024-03-08"))
    );
    assert_eq!(sync.store().uploaded_names(), names(&["early.png", "late.png"]));
}

#[tokio::test]
async fn previous_day_is_retried_until_uploads_succeed() {
    let fixture = Fixture::new(&[]);
    let old_dir = fixture.source.join("txt2img-images").join("2024-03-07");
    let new_dir = fixture.source.join("txt2img-images").join("2024-03-08");
    fs::create_dir_all(&old_dir).unwrap();
    fs::create_dir_all(&new_dir).unwrap();

    let ledger = UploadLedger::load(&fixture.ledger_path).unwrap();
    let mut sync = SyncLoop::new(
        FakeDrive::failing(&["late.png"]),
        SourceDir::Dated(fixture.source.clone()),
        "folder123",
        ledger,
        Duration::from_secs(120),
    );

    sync.run_cycle_for(date!(2024 - 03 - 07)).await.unwrap();
    fs::write(old_dir.join("late.png"), b"img").unwrap();
    fs::write(new_dir.join("fresh.png"), b"img").unwrap();

    let first = sync.run_cycle_for(date!(2024 - 03 - 08)).await.unwrap();
    assert_eq!(
        first,
        CycleOutcome::Synced {
            uploaded: names(&["fresh.png"]),
            failed: names(&["late.png"]),
        }
    );

    sync.store().recover();
    let second = sync.run_cycle_for(date!(2024 - 03 - 08)).await.unwrap();
    assert_eq!(
        second,
        CycleOutcome::Synced {
            uploaded: names(&["late.png"]),
            failed: vec![],
        }
    );
    assert!(sync.ledger().contains("late.png"));
}
