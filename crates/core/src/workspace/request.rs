//! The directory owned by one request.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

/// What a cleanup call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Cleanup had already run; nothing was touched.
    pub already_clean: bool,
    /// Files found in the directory when it was removed.
    pub removed_files: usize,
}

/// Working directory of one request.
///
/// Shared through an `Arc` between the orchestrator and its worker. Cleanup
/// runs at most once; if no holder called [`RequestWorkspace::cleanup`], the
/// last one to drop the workspace does it.
#[derive(Debug)]
pub struct RequestWorkspace {
    request_id: String,
    dir: PathBuf,
    cleaned: AtomicBool,
}

impl RequestWorkspace {
    /// Creates `root/<request_id>`. The directory must not exist yet.
    pub fn create(root: &Path, request_id: &str) -> io::Result<Arc<Self>> {
        std::fs::create_dir_all(root)?;
        let dir = root.join(request_id);
        std::fs::create_dir(&dir)?;
        debug!(request_id, dir = %dir.display(), "Created request workspace");
        Ok(Arc::new(Self {
            request_id: request_id.to_string(),
            dir,
            cleaned: AtomicBool::new(false),
        }))
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Whether `path` lies inside this workspace.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    /// Regular files currently in the workspace, sorted by name.
    pub fn files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// The most recently modified file, ignoring `.part` leftovers.
    pub fn most_recent_file(&self) -> io::Result<Option<PathBuf>> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for path in self.files()? {
            if path.extension().is_some_and(|e| e == "part" || e == "ytdl") {
                continue;
            }
            let modified = std::fs::metadata(&path)?.modified()?;
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }
        Ok(newest.map(|(_, p)| p))
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned.load(Ordering::Acquire)
    }

    /// Removes the workspace directory and everything in it.
    ///
    /// Only the first call does any work. A directory that vanished on its own
    /// is treated as already removed.
    pub fn cleanup(&self) -> CleanupReport {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return CleanupReport {
                already_clean: true,
                removed_files: 0,
            };
        }

        let removed_files = self.files().map(|f| f.len()).unwrap_or(0);
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(
                    request_id = %self.request_id,
                    removed_files,
                    "Cleaned up request workspace"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(request_id = %self.request_id, "Workspace already removed");
            }
            Err(e) => {
                warn!(
                    request_id = %self.request_id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove request workspace"
                );
            }
        }

        CleanupReport {
            already_clean: false,
            removed_files,
        }
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if !self.is_cleaned() {
            warn!(request_id = %self.request_id, "Workspace dropped without cleanup, removing");
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_is_unique_per_request() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), "req-1").unwrap();
        assert!(ws.dir().is_dir());
        assert!(RequestWorkspace::create(root.path(), "req-1").is_err());
        let other = RequestWorkspace::create(root.path(), "req-2").unwrap();
        assert_ne!(ws.dir(), other.dir());
    }

    #[test]
    fn test_cleanup_runs_once() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), "req").unwrap();
        std::fs::write(ws.path_for("a.webm"), b"data").unwrap();
        std::fs::write(ws.path_for("a.mp3"), b"data").unwrap();

        let first = ws.cleanup();
        assert!(!first.already_clean);
        assert_eq!(first.removed_files, 2);
        assert!(!ws.dir().exists());

        let second = ws.cleanup();
        assert!(second.already_clean);
        assert!(ws.is_cleaned());
    }

    #[test]
    fn test_cleanup_tolerates_missing_directory() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), "req").unwrap();
        std::fs::remove_dir_all(ws.dir()).unwrap();

        let report = ws.cleanup();
        assert!(!report.already_clean);
        assert_eq!(report.removed_files, 0);
    }

    #[test]
    fn test_drop_cleans_up_when_last_holder_goes() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), "req").unwrap();
        let dir = ws.dir().to_path_buf();
        std::fs::write(ws.path_for("partial.webm"), b"data").unwrap();

        let worker_copy = Arc::clone(&ws);
        drop(ws);
        assert!(dir.exists());
        drop(worker_copy);
        assert!(!dir.exists());
    }

    #[test]
    fn test_most_recent_file_skips_partials() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), "req").unwrap();
        std::fs::write(ws.path_for("old.mp4"), b"1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(ws.path_for("new.mkv"), b"2").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(ws.path_for("newer.mkv.part"), b"3").unwrap();

        let newest = ws.most_recent_file().unwrap().unwrap();
        assert_eq!(newest, ws.path_for("new.mkv"));
    }

    #[test]
    fn test_most_recent_file_empty() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), "req").unwrap();
        assert!(ws.most_recent_file().unwrap().is_none());
        assert!(ws.contains(&ws.path_for("x")));
        assert!(!ws.contains(root.path()));
    }
}
