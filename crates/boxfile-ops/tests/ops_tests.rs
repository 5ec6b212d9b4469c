use async_trait::async_trait;
use boxfile_core::{DirEntry, FileSystemEntry, Filesystem, LocalFilesystem};
use boxfile_ops::{
    ArchiveAccessor, ArchiveContent, FileOperation, OperationExecutor, OperationResult, Outcome,
};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Local filesystem with injectable failures.
#[derive(Default)]
struct TestFs {
    inner: LocalFilesystem,
    cross_device: bool,
    fail_stat: Vec<&'static str>,
    fail_copy: Vec<&'static str>,
}

fn named(path: &Path, names: &[&str]) -> bool {
    path.file_name()
        .is_some_and(|n| names.iter().any(|f| n == *f))
}

#[async_trait]
impl Filesystem for TestFs {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.inner.read_dir(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileSystemEntry> {
        if named(path, &self.fail_stat) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if named(from, &self.fail_copy) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.inner.copy_file(from, to).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.cross_device {
            return Err(io::Error::from(io::ErrorKind::CrossesDevices));
        }
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

fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn virtual_path(container: &Path, internal: &str) -> String {
    format!("{}/{internal}", container.display())
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

#[tokio::test]
async fn test_copy_file_round_trip() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src.txt");
    fs::write(&src, "round trip payload").unwrap();
    let dst = temp.path().join("nested/out/dst.txt");

    let result = OperationExecutor::new()
        .execute(FileOperation::copy(path_str(&src), path_str(&dst)))
        .await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["operation"], "copy");
    assert_eq!(json["type"], "file");
    assert_eq!(json["size"], 18);
    assert_eq!(fs::metadata(&dst).unwrap().len(), fs::metadata(&src).unwrap().len());
}

#[tokio::test]
async fn test_copy_directory_reports_skipped_entries() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("tree");
    fs::create_dir_all(src.join("inner")).unwrap();
    fs::write(src.join("ok.txt"), "ok").unwrap();
    fs::write(src.join("inner/locked.txt"), "locked").unwrap();

    let executor = OperationExecutor::new().with_filesystem(Arc::new(TestFs {
        fail_copy: vec!["locked.txt"],
        ..Default::default()
    }));
    let dst = temp.path().join("copy");
    let result = executor
        .execute(FileOperation::copy(path_str(&src), path_str(&dst)))
        .await;

    let Some(Outcome::Copy(transfer)) = result.outcome() else {
        panic!("expected a copy outcome: {result:?}");
    };
    assert_eq!(transfer.skipped, 1);
    assert!(transfer.size.is_none());
    assert!(dst.join("ok.txt").is_file());
    assert!(!dst.join("inner/locked.txt").exists());
}

#[tokio::test]
async fn test_copy_directory_into_itself_fails() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("a");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("f.txt"), "f").unwrap();

    let result = OperationExecutor::new()
        .execute(FileOperation::copy(path_str(&src), path_str(&src.join("b"))))
        .await;

    let failure = result.failure().expect("copy into itself should fail");
    assert_eq!(failure.operation, "copy");
    assert!(failure.error.contains("into itself"), "{}", failure.error);
    assert!(!src.join("b").exists());
}

#[tokio::test]
async fn test_move_cross_device_falls_back_to_copy() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("a.txt");
    fs::write(&src, "moving").unwrap();
    let dst = temp.path().join("elsewhere/a.txt");

    let executor = OperationExecutor::new().with_filesystem(Arc::new(TestFs {
        cross_device: true,
        ..Default::default()
    }));
    let result = executor
        .execute(FileOperation::move_to(path_str(&src), path_str(&dst)))
        .await;

    assert!(result.is_success(), "{result:?}");
    assert!(!src.exists());
    assert_eq!(fs::read_to_string(&dst).unwrap(), "moving");
}

#[tokio::test]
async fn test_move_directory_cross_device() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("dir");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("sub/file.txt"), "x").unwrap();
    let dst = temp.path().join("moved");

    let executor = OperationExecutor::new().with_filesystem(Arc::new(TestFs {
        cross_device: true,
        ..Default::default()
    }));
    let result = executor
        .execute(FileOperation::move_to(path_str(&src), path_str(&dst)))
        .await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["type"], "directory");
    assert!(!src.exists());
    assert!(dst.join("sub/file.txt").is_file());
}

#[tokio::test]
async fn test_move_partial_copy_keeps_source() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("dir");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("good.txt"), "g").unwrap();
    fs::write(src.join("bad.txt"), "b").unwrap();
    let dst = temp.path().join("moved");

    let executor = OperationExecutor::new().with_filesystem(Arc::new(TestFs {
        cross_device: true,
        fail_copy: vec!["bad.txt"],
        ..Default::default()
    }));
    let result = executor
        .execute(FileOperation::move_to(path_str(&src), path_str(&dst)))
        .await;

    let failure = result.failure().expect("move should fail");
    assert!(failure.error.contains("incomplete"), "{}", failure.error);
    assert!(failure.diagnostic.contains("PartialTransfer"));
    assert!(src.join("bad.txt").exists());
    assert!(dst.join("good.txt").exists());
}

#[tokio::test]
async fn test_missing_archive_fails_for_every_operation() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nonexistent.zip");
    let out = temp.path().join("out.txt");
    let executor = OperationExecutor::new();

    let operations = [
        FileOperation::list(path_str(&missing)),
        FileOperation::list(virtual_path(&missing, "any/dir")),
        FileOperation::read(virtual_path(&missing, "file.txt")),
        FileOperation::copy(virtual_path(&missing, "file.txt"), path_str(&out)),
        FileOperation::copy(
            virtual_path(&missing, "file.txt"),
            virtual_path(&temp.path().join("other.zip"), "file.txt"),
        ),
    ];

    for operation in operations {
        let result = executor.execute(operation.clone()).await;
        let failure = result
            .failure()
            .unwrap_or_else(|| panic!("{operation:?} should fail"));
        assert!(
            failure.error.contains("archive does not exist"),
            "{operation:?}: {}",
            failure.error
        );
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn test_disk_to_archive_and_back() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("notes.txt");
    fs::write(&src, "archived text").unwrap();
    let container = temp.path().join("store.zip");
    let executor = OperationExecutor::new();

    let added = executor
        .execute(FileOperation::copy(
            path_str(&src),
            virtual_path(&container, "docs/notes.txt"),
        ))
        .await;
    assert!(added.is_success(), "{added:?}");
    assert!(ArchiveAccessor::exists(&container));

    let restored = temp.path().join("restored/notes.txt");
    let extracted = executor
        .execute(FileOperation::copy(
            virtual_path(&container, "docs/notes.txt"),
            path_str(&restored),
        ))
        .await;
    let json = serde_json::to_value(&extracted).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["size"], 13);
    assert_eq!(fs::read_to_string(restored).unwrap(), "archived text");
}

#[tokio::test]
async fn test_archive_to_archive_cleans_staging() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    fs::create_dir(&staging).unwrap();
    let from = temp.path().join("from.zip");
    let to = temp.path().join("to.zip");
    build_zip(&from, &[("a/photo.txt", b"payload")]);

    let executor = OperationExecutor::new().with_temp_dir(&staging);
    let result = executor
        .execute(FileOperation::copy(
            virtual_path(&from, "a/photo.txt"),
            virtual_path(&to, "b/photo.txt"),
        ))
        .await;
    assert!(result.is_success(), "{result:?}");
    assert_eq!(
        ArchiveAccessor::new().read(&to, "b/photo.txt", false).unwrap(),
        ArchiveContent::Text("payload".to_string())
    );
    assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);

    // The failure path cleans up too.
    let result = executor
        .execute(FileOperation::copy(
            virtual_path(&from, "a/missing.txt"),
            virtual_path(&to, "b/missing.txt"),
        ))
        .await;
    assert!(!result.is_success());
    assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
}

#[tokio::test]
async fn test_list_archive_prefix() {
    let temp = TempDir::new().unwrap();
    let container = temp.path().join("data.zip");
    build_zip(
        &container,
        &[
            ("folder/a.txt", b"a"),
            ("folder/sub/b.txt", b"bb"),
            ("top.txt", b"t"),
        ],
    );

    let result = OperationExecutor::new()
        .execute(FileOperation::list(virtual_path(&container, "folder")))
        .await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["totalItems"], 2);
    assert_eq!(json["summary"]["totalFiles"], 1);
    assert_eq!(json["summary"]["totalDirectories"], 1);
    assert_eq!(json["files"][0]["internalPath"], "folder/a.txt");
    assert_eq!(json["directories"][0]["name"], "sub");

    // A bare container path lists the archive root.
    let root = OperationExecutor::new()
        .execute(FileOperation::list(path_str(&container)))
        .await;
    let json = serde_json::to_value(&root).unwrap();
    assert_eq!(json["totalItems"], 2);
}

#[tokio::test]
async fn test_list_disk_skips_unreadable_entries() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("fine.txt"), "1").unwrap();
    fs::write(temp.path().join("DumpStack.log.tmp"), "2").unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();

    let executor = OperationExecutor::new().with_filesystem(Arc::new(TestFs {
        fail_stat: vec!["DumpStack.log.tmp"],
        ..Default::default()
    }));
    let result = executor
        .execute(FileOperation::list(path_str(temp.path())))
        .await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["totalItems"], 3);
    assert_eq!(json["summary"]["totalFiles"], 1);
    assert_eq!(json["summary"]["totalDirectories"], 1);
    assert_eq!(json["files"][0]["name"], "fine.txt");
    assert_eq!(json["directories"][0]["isDirectory"], true);
}

#[tokio::test]
async fn test_read_image_from_archive_as_data_url() {
    let temp = TempDir::new().unwrap();
    let container = temp.path().join("pics.zip");
    build_zip(&container, &[("img/dot.png", b"\x89PNG"), ("readme.md", b"# hi")]);
    let executor = OperationExecutor::new();

    let result = executor
        .execute(FileOperation::read(virtual_path(&container, "img/dot.png")))
        .await;
    let OperationResult::Success(Outcome::Read(content)) = result else {
        panic!("expected a read outcome");
    };
    assert!(content.is_image);
    assert_eq!(content.size, 4);
    assert_eq!(content.content, "data:image/png;base64,iVBORw==");

    let result = executor
        .execute(FileOperation::read(virtual_path(&container, "readme.md")))
        .await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["content"], "# hi");
    assert_eq!(json["isImage"], false);
}

#[tokio::test]
async fn test_read_archive_text_reports_raw_size() {
    let temp = TempDir::new().unwrap();
    let container = temp.path().join("bytes.zip");
    build_zip(&container, &[("notes.txt", b"ok\xff\xfe!")]);

    let result = OperationExecutor::new()
        .execute(FileOperation::read(virtual_path(&container, "notes.txt")))
        .await;
    let OperationResult::Success(Outcome::Read(content)) = result else {
        panic!("expected a read outcome");
    };
    assert_eq!(content.size, 5);
    assert_eq!(content.content, "ok\u{fffd}\u{fffd}!");
}

#[tokio::test]
async fn test_read_disk_text() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("hello.txt");
    fs::write(&file, "hello disk").unwrap();

    let result = OperationExecutor::new()
        .execute(FileOperation::read(path_str(&file)))
        .await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["operation"], "read");
    assert_eq!(json["content"], "hello disk");
    assert_eq!(json["size"], 10);
}

#[tokio::test]
async fn test_request_json_dispatch() {
    let temp = TempDir::new().unwrap();
    let request = serde_json::json!({
        "operation": "list",
        "folderPath": path_str(temp.path()),
    });
    let operation: FileOperation = serde_json::from_value(request).unwrap();
    let result = OperationExecutor::new().execute(operation).await;
    assert!(result.is_success());

    let drives = OperationExecutor::new().execute(FileOperation::Drives).await;
    let json = serde_json::to_value(&drives).unwrap();
    assert_eq!(json["operation"], "drives");
    assert!(json["drives"].as_array().is_some_and(|d| !d.is_empty()) || cfg!(windows));
}
