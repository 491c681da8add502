//! File-per-key storage backend.

use async_trait::async_trait;
use contextfox_error::{ContextFoxResult, StorageError, StorageErrorKind};
use contextfox_interface::KeyValueStore;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Stores each key as one file under a state directory.
///
/// Keys are escaped into file names, so `story:abc` becomes
/// `story%3Aabc.json`. Writes go to a temp file first and are renamed
/// into place.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_path: PathBuf,
}

impl FileKeyValueStore {
    /// Create a store rooted at `base_path`, creating the directory.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> ContextFoxResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %base_path.display(), "Initialized state store");
        Ok(Self { base_path })
    }

    /// Root directory of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> ContextFoxResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::new(StorageErrorKind::InvalidKey("empty key".into())).into());
        }
        Ok(self
            .base_path
            .join(format!("{}.{}", escape_key(key), EXTENSION)))
    }
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> ContextFoxResult<Option<String>> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "Loaded value");
                Ok(Some(contents))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str) -> ContextFoxResult<()> {
        let path = self.key_path(key)?;
        let temp_path = path.with_extension("tmp");

        tokio::fs::write(&temp_path, value).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %path.display(), "Saved value");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, key: &str) -> ContextFoxResult<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted value");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileDelete(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }

    async fn keys(&self, prefix: &str) -> ContextFoxResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.base_path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                self.base_path.display(),
                e
            )))
        })?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::FileRead(e.to_string())))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(unescape_key)
                .filter(|k| k.starts_with(prefix))
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_escaping_is_reversible() {
        for key in ["story:abc", "settings", "story:a b/c", "story:é"] {
            let escaped = escape_key(key);
            assert!(!escaped.contains('/'));
            assert!(!escaped.contains(':'));
            assert_eq!(unescape_key(&escaped).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_bad_escape_is_rejected() {
        assert_eq!(unescape_key("abc%4"), None);
        assert_eq!(unescape_key("abc%zz"), None);
    }
}
