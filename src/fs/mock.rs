// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem for tests.
///
/// Clones share the same storage, so a test can keep one handle and give
/// another to the code under test. Every write is also recorded so tests can
/// inspect files that were removed again afterwards.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    history: Arc<Mutex<Vec<(PathBuf, Vec<u8>)>>>,
    read_only: Arc<Mutex<bool>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Make every subsequent write fail.
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.lock().unwrap() = read_only;
    }

    /// Paths currently present.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    /// Every write performed so far, in order.
    pub fn written(&self) -> Vec<(PathBuf, String)> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .map(|(p, c)| (p.clone(), String::from_utf8_lossy(c).into_owned()))
            .collect()
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(content) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if *self.read_only.lock().unwrap() {
            return Err(anyhow!("Read-only filesystem: {:?}", path));
        }
        self.add_file(path, contents);
        self.history
            .lock()
            .unwrap()
            .push((path.to_path_buf(), contents.to_vec()));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }
}
