//! Exclusive advisory lock guarding the history database.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Held while a merge cycle reads and rewrites the history.
///
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct HistoryLock {
    file: File,
    path: PathBuf,
}

impl HistoryLock {
    /// Take the lock without waiting.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::WouldBlock`] when another process holds it.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.try_lock_exclusive().map_err(|_| {
            io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("history is locked by another process: {}", path.display()),
            )
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), %error, "failed to release history lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_is_refused_until_release() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("history.lock");

        let first = HistoryLock::acquire(&path).expect("first lock");
        let err = HistoryLock::acquire(&path).expect_err("contended");
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

        drop(first);
        HistoryLock::acquire(&path).expect("lock after release");
    }
}
