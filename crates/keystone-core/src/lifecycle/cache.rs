//! Host cache invalidation.

use std::path::PathBuf;
use tracing::{debug, warn};

/// Invalidates whatever the host caches about modules.
pub trait CacheInvalidator: Send + Sync {
    fn clear(&self);
}

impl<F> CacheInvalidator for F
where
    F: Fn() + Send + Sync,
{
    fn clear(&self) {
        self();
    }
}

/// Invalidator that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn clear(&self) {}
}

/// Empties a set of cache directories, keeping the directories themselves.
#[derive(Debug, Clone, Default)]
pub struct CacheDirInvalidator {
    dirs: Vec<PathBuf>,
}

impl CacheDirInvalidator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn clear_dir(dir: &std::path::Path) -> std::io::Result<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}

impl CacheInvalidator for CacheDirInvalidator {
    fn clear(&self) {
        for dir in &self.dirs {
            match Self::clear_dir(dir) {
                Ok(removed) => debug!(dir = %dir.display(), removed, "Cache directory cleared"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to clear cache directory"),
            }
        }
    }
}
