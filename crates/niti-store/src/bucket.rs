//! Directory-backed object bucket for profile photos.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use niti_core::{Error, Result};

pub struct PhotoBucket {
    root: PathBuf,
}

impl PhotoBucket {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Build an object key: `{email}-{uuid}.{ext}`.
    pub fn object_key(email: &str, original_filename: &str) -> String {
        let ext = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
            .to_lowercase();
        let owner: String = email
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '@' || c == '.' { c } else { '_' })
            .collect();
        format!("{}-{}.{}", owner, uuid::Uuid::new_v4(), ext)
    }

    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::write(&path, bytes)?;
        debug!("Stored object {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an object. Missing objects are not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove object {}: {}", key, e);
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return Err(Error::Storage(format!("invalid object key: {}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let dir = tempfile::TempDir::new().unwrap();
        let bucket = PhotoBucket::new(dir.path()).unwrap();

        let key = PhotoBucket::object_key("a@b.com", "me.PNG");
        assert!(key.starts_with("a@b.com-"));
        assert!(key.ends_with(".png"));

        bucket.put(&key, b"pixels").unwrap();
        assert_eq!(bucket.get(&key).unwrap().as_deref(), Some(&b"pixels"[..]));

        bucket.remove(&key).unwrap();
        assert!(bucket.get(&key).unwrap().is_none());
        bucket.remove(&key).unwrap();
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        let bucket = PhotoBucket::new(dir.path()).unwrap();
        assert!(matches!(bucket.get("../niti.db"), Err(Error::Storage(_))));
    }
}
