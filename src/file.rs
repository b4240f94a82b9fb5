//! The watched file.
//!
//! Change detection is driven purely by modification time: a read happens
//! only when the file's mtime is strictly after the caller's checkpoint, and
//! then the whole file is returned. Truncation goes through the same handle so
//! the path is configured in exactly one place.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Errors from touching the watched file.
///
/// The `Display` text is what a viewer sees in place of content.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("stat {}: {}", .path.display(), .source)]
    Stat { path: PathBuf, source: io::Error },
    #[error("read {}: {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("create {}: {}", .path.display(), .source)]
    Create { path: PathBuf, source: io::Error },
    #[error("truncate {}: {}", .path.display(), .source)]
    Truncate { path: PathBuf, source: io::Error },
}

/// Modification timestamp of the last file state a viewer is known to have.
///
/// Stored as signed nanoseconds since the Unix epoch, which is also the wire
/// encoding (base-16) of the `lastMod` connect parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint(i64);

impl Checkpoint {
    /// Earlier than any real modification time.
    pub const BEGINNING: Checkpoint = Checkpoint(i64::MIN);

    pub fn from_nanos(nanos: i64) -> Self {
        Checkpoint(nanos)
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Checkpoint(i64::try_from(after.as_nanos()).unwrap_or(i64::MAX)),
            Err(before) => Checkpoint(
                i64::try_from(before.duration().as_nanos())
                    .map(|n| -n)
                    .unwrap_or(i64::MIN + 1),
            ),
        }
    }

    /// Parse a base-16 nanosecond count (optionally signed).
    pub fn parse_hex(s: &str) -> Option<Self> {
        i64::from_str_radix(s.trim(), 16).ok().map(Checkpoint)
    }

    /// Checkpoint from the optional `lastMod` query value. Missing or
    /// unparseable values mean "send the next state no matter what".
    pub fn from_query(value: Option<&str>) -> Self {
        value.and_then(Self::parse_hex).unwrap_or(Self::BEGINNING)
    }

    pub fn to_hex(self) -> String {
        if self.0 < 0 {
            format!("-{:x}", self.0.unsigned_abs())
        } else {
            format!("{:x}", self.0)
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::BEGINNING {
            f.write_str("beginning")
        } else {
            f.write_str(&self.to_hex())
        }
    }
}

/// Result of one change check.
#[derive(Debug)]
pub enum ChangeEvent {
    /// mtime is not after the checkpoint.
    Unchanged,
    /// Full contents, read because mtime moved past the checkpoint.
    Content { data: Vec<u8>, modified: Checkpoint },
    /// Stat or read failed; `checkpoint` is the caller's, unchanged.
    Error {
        error: FileError,
        checkpoint: Checkpoint,
    },
}

/// Handle to the single file being streamed.
#[derive(Debug, Clone)]
pub struct WatchedFile {
    path: PathBuf,
}

impl WatchedFile {
    /// Wrap a path without touching the filesystem. The path is cleaned
    /// lexically so every later access sees the same normalized form.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: clean_path(path.as_ref()),
        }
    }

    /// Startup entry point: create the file if it is missing (existing
    /// contents are kept) and resolve it to its canonical path.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = clean_path(path.as_ref());
        std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| FileError::Create {
                path: path.clone(),
                source,
            })?;
        let path = std::fs::canonicalize(&path).map_err(|source| FileError::Stat {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current modification time of the file.
    pub async fn modified(&self) -> Result<Checkpoint, FileError> {
        let stat_error = |source| FileError::Stat {
            path: self.path.clone(),
            source,
        };
        let metadata = fs::metadata(&self.path).await.map_err(stat_error)?;
        let modified = metadata.modified().map_err(stat_error)?;
        Ok(Checkpoint::from_system_time(modified))
    }

    /// Read the whole file if it changed after `checkpoint`.
    ///
    /// A file that shrinks between the stat and the read is returned as
    /// whatever was read; a concurrent truncate is just new content.
    pub async fn read_if_modified(&self, checkpoint: Checkpoint) -> ChangeEvent {
        let modified = match self.modified().await {
            Ok(modified) => modified,
            Err(error) => return ChangeEvent::Error { error, checkpoint },
        };
        if modified <= checkpoint {
            return ChangeEvent::Unchanged;
        }
        match fs::read(&self.path).await {
            Ok(data) => ChangeEvent::Content { data, modified },
            Err(source) => ChangeEvent::Error {
                error: FileError::Read {
                    path: self.path.clone(),
                    source,
                },
                checkpoint,
            },
        }
    }

    /// Current contents and modification time, unconditionally.
    pub async fn snapshot(&self) -> Result<(Vec<u8>, Checkpoint), FileError> {
        let modified = self.modified().await?;
        let data = fs::read(&self.path)
            .await
            .map_err(|source| FileError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok((data, modified))
    }

    /// Empty the file, recreating it if it was removed.
    ///
    /// Opening with `O_TRUNC` bumps the mtime even when the file is already
    /// empty, so every truncate is seen by pollers as exactly one change.
    pub async fn truncate(&self) -> Result<(), FileError> {
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|source| FileError::Truncate {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment where there is one.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn set_mtime(path: &Path, time: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(clean_path(Path::new("/../etc/x")), PathBuf::from("/etc/x"));
        assert_eq!(clean_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(clean_path(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_checkpoint_from_query() {
        assert_eq!(Checkpoint::from_query(None), Checkpoint::BEGINNING);
        assert_eq!(Checkpoint::from_query(Some("zz")), Checkpoint::BEGINNING);
        assert_eq!(Checkpoint::from_query(Some("")), Checkpoint::BEGINNING);
        assert_eq!(
            Checkpoint::from_query(Some("1a")),
            Checkpoint::from_nanos(26)
        );
        assert_eq!(Checkpoint::from_nanos(-26).to_hex(), "-1a");
        assert_eq!(Checkpoint::parse_hex("-1a"), Some(Checkpoint::from_nanos(-26)));
    }

    #[test]
    fn test_checkpoint_from_system_time() {
        let t = UNIX_EPOCH + Duration::from_nanos(1_700_000_000_123_456_789);
        assert_eq!(
            Checkpoint::from_system_time(t).as_nanos(),
            1_700_000_000_123_456_789
        );
        let before = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(
            Checkpoint::from_system_time(before).as_nanos(),
            -1_000_000_000
        );
    }

    #[tokio::test]
    async fn test_read_if_modified_respects_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watched.txt");
        std::fs::write(&path, "hello").unwrap();
        let mtime = UNIX_EPOCH + Duration::from_secs(1_000_000);
        set_mtime(&path, mtime);
        let file = WatchedFile::new(&path);
        let m = Checkpoint::from_system_time(mtime);

        // M <= T
        assert!(matches!(
            file.read_if_modified(m).await,
            ChangeEvent::Unchanged
        ));
        assert!(matches!(
            file.read_if_modified(Checkpoint::from_nanos(m.as_nanos() + 1)).await,
            ChangeEvent::Unchanged
        ));

        // M > T
        match file
            .read_if_modified(Checkpoint::from_nanos(m.as_nanos() - 1))
            .await
        {
            ChangeEvent::Content { data, modified } => {
                assert_eq!(data, b"hello");
                assert_eq!(modified, m);
            }
            other => panic!("expected content, got {:?}", other),
        }
        assert!(matches!(
            file.read_if_modified(Checkpoint::BEGINNING).await,
            ChangeEvent::Content { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_file_keeps_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let file = WatchedFile::new(dir.path().join("missing.txt"));
        let checkpoint = Checkpoint::from_nanos(42);

        match file.read_if_modified(checkpoint).await {
            ChangeEvent::Error {
                error,
                checkpoint: kept,
            } => {
                assert!(matches!(error, FileError::Stat { .. }));
                assert!(error.to_string().starts_with("stat "));
                assert_eq!(kept, checkpoint);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watched.txt");
        std::fs::write(&path, "some output").unwrap();
        set_mtime(&path, UNIX_EPOCH + Duration::from_secs(1_000));
        let file = WatchedFile::new(&path);

        let before = file.modified().await.unwrap();
        file.truncate().await.unwrap();
        match file.read_if_modified(before).await {
            ChangeEvent::Content { data, modified } => {
                assert!(data.is_empty());
                assert!(modified > before);
            }
            other => panic!("expected content, got {:?}", other),
        }

        // Already empty: still one observable change with empty content.
        set_mtime(&path, UNIX_EPOCH + Duration::from_secs(2_000));
        let before = file.modified().await.unwrap();
        file.truncate().await.unwrap();
        match file.read_if_modified(before).await {
            ChangeEvent::Content { data, .. } => assert!(data.is_empty()),
            other => panic!("expected content, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncate_recreates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = WatchedFile::new(dir.path().join("gone.txt"));

        file.truncate().await.unwrap();

        let (data, _) = file.snapshot().await.unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_open_or_create_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "keep me").unwrap();

        let file = WatchedFile::open_or_create(&path).unwrap();
        assert!(file.path().is_absolute());
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "keep me");

        let created = WatchedFile::open_or_create(dir.path().join("new.txt")).unwrap();
        assert_eq!(std::fs::read(created.path()).unwrap(), b"");
    }

    #[test]
    fn test_open_or_create_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = WatchedFile::open_or_create(dir.path().join("nope/log.txt")).unwrap_err();
        assert!(matches!(err, FileError::Create { .. }));
    }
}
