//! Working-Directory Provider (C9).
//!
//! Holds an optional override of the effective working directory. Scoped
//! per chat session in intent — only the Git Session Service writes it —
//! but a single process only ever runs one session at a time, so ownership
//! lives here as a plain `Mutex`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct WorkingDirectoryProvider {
    original: PathBuf,
    override_dir: Mutex<Option<PathBuf>>,
}

impl WorkingDirectoryProvider {
    /// Captures `original` as the directory to restore to on `clear()`.
    pub fn new(original: PathBuf) -> Self {
        Self {
            original,
            override_dir: Mutex::new(None),
        }
    }

    /// Captures the process's actual current directory at construction time.
    pub fn from_process_cwd() -> anyhow::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// The override if set, else the original directory.
    pub fn get(&self) -> PathBuf {
        self.override_dir
            .lock()
            .expect("working-directory override lock poisoned")
            .clone()
            .unwrap_or_else(|| self.original.clone())
    }

    pub fn set(&self, path: impl Into<PathBuf>) {
        *self
            .override_dir
            .lock()
            .expect("working-directory override lock poisoned") = Some(path.into());
    }

    /// Drops the override; `get()` reverts to `getOriginal()`.
    pub fn clear(&self) {
        *self
            .override_dir
            .lock()
            .expect("working-directory override lock poisoned") = None;
    }

    /// The directory captured at process start, regardless of any override.
    pub fn get_original(&self) -> &Path {
        &self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_original_when_no_override_set() {
        let provider = WorkingDirectoryProvider::new(PathBuf::from("/home/user/project"));
        assert_eq!(provider.get(), PathBuf::from("/home/user/project"));
        assert_eq!(provider.get_original(), Path::new("/home/user/project"));
    }

    #[test]
    fn set_then_get_returns_override() {
        let provider = WorkingDirectoryProvider::new(PathBuf::from("/home/user/project"));
        provider.set("/tmp/worktree-1");
        assert_eq!(provider.get(), PathBuf::from("/tmp/worktree-1"));
    }

    #[test]
    fn clear_restores_original_directory() {
        let provider = WorkingDirectoryProvider::new(PathBuf::from("/home/user/project"));
        provider.set("/tmp/worktree-1");
        provider.clear();
        assert_eq!(provider.get(), PathBuf::from("/home/user/project"));
    }

    #[test]
    fn get_original_is_unaffected_by_override() {
        let provider = WorkingDirectoryProvider::new(PathBuf::from("/home/user/project"));
        provider.set("/tmp/worktree-1");
        assert_eq!(provider.get_original(), Path::new("/home/user/project"));
    }
}
