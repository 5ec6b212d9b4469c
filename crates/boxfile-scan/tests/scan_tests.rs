use async_trait::async_trait;
use boxfile_core::{DirEntry, FileSystemEntry, Filesystem, LocalFilesystem};
use boxfile_scan::{ScanConfig, ScanOutcome, ScanState, TreeScanner};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Local filesystem that fails stats and listings for chosen names, and can
/// hold every listing until a permit is released.
#[derive(Default)]
struct FlakyFs {
    inner: LocalFilesystem,
    unreadable_prefix: Option<&'static str>,
    unlistable: Option<&'static str>,
    gate: Option<Arc<Semaphore>>,
}

fn has_name(path: &Path, pred: impl Fn(&str) -> bool) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(pred)
}

#[async_trait]
impl Filesystem for FlakyFs {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let _permit = match &self.gate {
            Some(gate) => Some(gate.acquire().await.map_err(io::Error::other)?),
            None => None,
        };
        if let Some(name) = self.unlistable {
            if has_name(path, |n| n == name) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
        }
        self.inner.read_dir(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileSystemEntry> {
        if let Some(prefix) = self.unreadable_prefix {
            if has_name(path, |n| n.starts_with(prefix)) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
        }
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        self.inner.copy_file(from, to).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }
}

fn write_bytes(path: &Path, len: usize) {
    fs::write(path, vec![b'x'; len]).unwrap();
}

/// Config that emits progress on every directory.
fn eager_config(root: &Path) -> ScanConfig {
    ScanConfig::builder()
        .root(root)
        .progress_interval_ms(0u64)
        .build()
        .unwrap()
}

fn wide_tree(dirs: usize) -> TempDir {
    let temp = TempDir::new().unwrap();
    for i in 0..dirs {
        let dir = temp.path().join(format!("dir{i:02}"));
        fs::create_dir(&dir).unwrap();
        write_bytes(&dir.join("f.bin"), 10);
    }
    temp
}

#[tokio::test]
async fn test_scan_scenario_totals() {
    let temp = TempDir::new().unwrap();
    write_bytes(&temp.path().join("a.txt"), 100);
    fs::create_dir(temp.path().join("sub")).unwrap();
    write_bytes(&temp.path().join("sub/b.txt"), 50);

    let outcome = TreeScanner::new().scan(&ScanConfig::new(temp.path())).await;
    let report = outcome.report().expect("scan should complete");

    assert_eq!(report.tree.len(), 1);
    let root = &report.tree[0];
    assert_eq!(root.size, 150);
    assert_eq!(root.file_count, 2);
    assert_eq!(root.folder_count, 1);
    assert_eq!(root.depth, 0);
    assert_eq!(root.children.len(), 1);

    let sub = root.child("sub").unwrap();
    assert_eq!(sub.size, 50);
    assert_eq!(sub.file_count, 1);
    assert_eq!(sub.folder_count, 0);
    assert_eq!(sub.depth, 1);
    assert_eq!(report.total_size, 150);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["operation"], "scan");
    assert_eq!(json["totalSize"], 150);
    assert_eq!(json["foldersScanned"], 2);
    assert_eq!(json["tree"][0]["fileCount"], 2);
    assert!(json.get("cancelled").is_none());
}

#[tokio::test]
async fn test_unreadable_files_contribute_nothing() {
    let temp = TempDir::new().unwrap();
    let mut readable_bytes = 0;
    let mut readable_files = 0;
    for (d, dir) in ["one", "two", "two/three"].iter().enumerate() {
        let dir = temp.path().join(dir);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..4 {
            let len = 10 * (d + 1) + i;
            write_bytes(&dir.join(format!("file{i}.dat")), len);
            readable_bytes += len as u64;
            readable_files += 1;
        }
        write_bytes(&dir.join("locked.dat"), 1000);
    }
    write_bytes(&temp.path().join("locked-root.dat"), 500);

    let scanner = TreeScanner::with_filesystem(Arc::new(FlakyFs {
        unreadable_prefix: Some("locked"),
        ..Default::default()
    }));
    let report = scanner
        .scan(&ScanConfig::new(temp.path()))
        .await
        .into_report()
        .expect("scan should not abort");

    let root = report.root().unwrap();
    assert_eq!(root.size, readable_bytes);
    assert_eq!(root.file_count, readable_files);
    assert_eq!(root.folder_count, 3);
    assert_eq!(report.total_size, readable_bytes);
    assert!(root.totals_consistent());
}

#[tokio::test]
async fn test_unlistable_directory_is_an_empty_node() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sealed/inner")).unwrap();
    write_bytes(&temp.path().join("sealed/inner/x.bin"), 64);
    write_bytes(&temp.path().join("open.bin"), 8);

    let scanner = TreeScanner::with_filesystem(Arc::new(FlakyFs {
        unlistable: Some("sealed"),
        ..Default::default()
    }));
    let report = scanner
        .scan(&ScanConfig::new(temp.path()))
        .await
        .into_report()
        .unwrap();

    let root = report.root().unwrap();
    assert_eq!(root.size, 8);
    assert_eq!(root.folder_count, 1);
    let sealed = root.child("sealed").unwrap();
    assert_eq!(sealed.size, 0);
    assert!(sealed.children.is_empty());
}

#[tokio::test]
async fn test_protected_directories_skipped() {
    let temp = TempDir::new().unwrap();
    for name in ["$RECYCLE.BIN", "System Volume Information", "kept"] {
        let dir = temp.path().join(name);
        fs::create_dir(&dir).unwrap();
        write_bytes(&dir.join("data.bin"), 10);
    }

    let report = TreeScanner::new()
        .scan(&ScanConfig::new(temp.path()))
        .await
        .into_report()
        .unwrap();

    let root = report.root().unwrap();
    assert_eq!(root.folder_count, 1);
    assert_eq!(root.size, 10);
    assert!(root.child("kept").is_some());
    assert!(root.child("$RECYCLE.BIN").is_none());
}

#[tokio::test]
async fn test_cancel_from_progress_callback() {
    let temp = wide_tree(40);
    let scanner = Arc::new(TreeScanner::new());

    let weak = Arc::downgrade(&scanner);
    let cancelled = Arc::new(AtomicBool::new(false));
    let late_events = Arc::new(AtomicUsize::new(0));
    {
        let cancelled = Arc::clone(&cancelled);
        let late_events = Arc::clone(&late_events);
        scanner.set_progress_callback(move |_| {
            if cancelled.load(Ordering::SeqCst) {
                late_events.fetch_add(1, Ordering::SeqCst);
                return;
            }
            if let Some(scanner) = weak.upgrade() {
                scanner.cancel();
            }
            cancelled.store(true, Ordering::SeqCst);
        });
    }

    let outcome = scanner.scan(&eager_config(temp.path())).await;

    assert!(outcome.is_cancelled(), "{outcome:?}");
    assert_eq!(late_events.load(Ordering::SeqCst), 0);
    assert_eq!(scanner.state(), ScanState::Cancelled);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["cancelled"], true);
}

#[tokio::test]
async fn test_scanner_reusable_after_cancel() {
    let temp = wide_tree(3);
    let scanner = TreeScanner::new();
    scanner.cancel();

    // scan() resets the token, so the earlier cancel does not apply.
    let outcome = scanner.scan(&ScanConfig::new(temp.path())).await;
    let report = outcome.report().unwrap();
    assert_eq!(report.root().unwrap().folder_count, 3);
    assert_eq!(report.root().unwrap().size, 30);
}

#[tokio::test]
async fn test_percentage_capped_until_final_event() {
    let temp = wide_tree(12);
    let scanner = TreeScanner::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        scanner.set_progress_callback(move |p| {
            seen.lock().unwrap().push((p.percentage, p.tree.len()));
        });
    }

    // Estimate of 5 folders makes the raw ratio exceed 100%.
    let config = ScanConfig::builder()
        .root(temp.path())
        .progress_interval_ms(0u64)
        .folder_estimate(5u64)
        .build()
        .unwrap();
    let outcome = scanner.scan(&config).await;
    assert!(outcome.report().is_some());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 14, "one event per directory plus the final one");
    let (last, interim) = seen.split_last().unwrap();
    assert_eq!(last.0, 100);
    assert!(interim.iter().all(|(pct, _)| *pct <= 99));
    assert!(interim.iter().any(|(pct, _)| *pct == 99));
    assert!(seen.iter().all(|(_, roots)| *roots == 1));
}

#[tokio::test]
async fn test_progress_is_throttled() {
    let temp = wide_tree(20);
    let scanner = TreeScanner::new();
    let events = Arc::new(AtomicUsize::new(0));
    {
        let events = Arc::clone(&events);
        scanner.set_progress_callback(move |_| {
            events.fetch_add(1, Ordering::SeqCst);
        });
    }

    let config = ScanConfig::builder()
        .root(temp.path())
        .progress_interval_ms(60_000u64)
        .build()
        .unwrap();
    scanner.scan(&config).await.into_report().unwrap();

    // The first directory and the final event.
    assert_eq!(events.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_scan_rejected() {
    let temp = wide_tree(2);
    let gate = Arc::new(Semaphore::new(0));
    let scanner = TreeScanner::with_filesystem(Arc::new(FlakyFs {
        gate: Some(Arc::clone(&gate)),
        ..Default::default()
    }));
    let config = ScanConfig::new(temp.path());

    let (first, second) = tokio::join!(scanner.scan(&config), async {
        let outcome = scanner.scan(&config).await;
        // Listings in the first scan wait until the second has been rejected.
        gate.add_permits(1);
        outcome
    });

    assert!(matches!(
        second,
        ScanOutcome::Failed(boxfile_scan::ScanError::AlreadyRunning)
    ));
    assert!(first.report().is_some(), "{first:?}");
}
