//! Addressable handles for finished audio.

use crate::audio::wav::WAV_MIME;
use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const URL_PREFIX: &str = "blob:narrate/";

/// A finished, playable WAV published in a [`ResourceRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResource {
    url: String,
    bytes: Arc<Vec<u8>>,
    mime: &'static str,
    duration: Duration,
}

impl AudioResource {
    /// Handle under which the registry serves this resource.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        self.mime
    }

    /// Playback length of the encoded audio.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Write the WAV bytes to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.bytes())?;
        Ok(())
    }
}

/// Hands out and revokes resource handles.
///
/// Clones share the same table. Nothing is revoked automatically.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    entries: Arc<Mutex<HashMap<String, AudioResource>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register WAV bytes under a fresh `blob:narrate/<uuid>` handle.
    pub fn publish(&self, bytes: Vec<u8>, duration: Duration) -> AudioResource {
        let resource = AudioResource {
            url: format!("{URL_PREFIX}{}", uuid::Uuid::new_v4()),
            bytes: Arc::new(bytes),
            mime: WAV_MIME,
            duration,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(resource.url.clone(), resource.clone());
        }
        resource
    }

    pub fn get(&self, url: &str) -> Option<AudioResource> {
        self.entries.lock().ok()?.get(url).cloned()
    }

    /// Drop the handle. Returns whether it was registered.
    pub fn revoke(&self, url: &str) -> bool {
        self.entries
            .lock()
            .map(|mut entries| entries.remove(url).is_some())
            .unwrap_or(false)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_assigns_unique_blob_urls() {
        let registry = ResourceRegistry::new();
        let a = registry.publish(vec![1, 2, 3], Duration::from_secs(1));
        let b = registry.publish(vec![4], Duration::ZERO);

        assert!(a.url().starts_with("blob:narrate/"));
        assert_ne!(a.url(), b.url());
        assert_eq!(a.mime(), "audio/wav");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a.url()).unwrap().bytes(), &[1, 2, 3]);
    }

    #[test]
    fn revoke_removes_handle_once() {
        let registry = ResourceRegistry::new();
        let resource = registry.publish(vec![0], Duration::ZERO);

        assert!(registry.revoke(resource.url()));
        assert!(!registry.revoke(resource.url()));
        assert!(registry.get(resource.url()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn clones_share_the_table() {
        let registry = ResourceRegistry::new();
        let other = registry.clone();
        let resource = other.publish(vec![9], Duration::ZERO);
        assert!(registry.get(resource.url()).is_some());
    }

    #[test]
    fn save_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("speech.wav");
        let resource = ResourceRegistry::new().publish(b"RIFF".to_vec(), Duration::ZERO);

        resource.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
    }
}
