//! Artifact export
//!
//! An encoded payload becomes a named file through an [`ArtifactExporter`].
//! While the save runs the payload is reachable through a transient
//! [`ArtifactHandle`]: a reference-counted buffer registered under an object
//! URL in a [`HandleRegistry`]. The handle unregisters itself when dropped,
//! so it is released on every exit path of the save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ArtifactError, Result};

/// Encoded export output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where and how much was saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReceipt {
    /// Name the file was saved under
    pub filename: String,
    /// Full location of the saved file
    pub location: String,
    /// Size in bytes
    pub bytes: u64,
}

/// Trait for turning payloads into downloadable files
#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    /// Save a payload under the given filename
    ///
    /// # Arguments
    /// * `payload` - Fully encoded document
    /// * `mime_type` - MIME type of the payload
    /// * `filename` - Suggested filename
    ///
    /// # Returns
    /// * `Result<ArtifactReceipt>` - Where the file ended up, or error
    async fn export(&self, payload: Payload, mime_type: &str, filename: &str)
    -> Result<ArtifactReceipt>;
}

type Handles = HashMap<Uuid, Arc<[u8]>>;

/// Registry of live artifact handles
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    handles: Arc<Mutex<Handles>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and return its handle
    pub fn acquire(&self, data: Arc<[u8]>, mime_type: &str) -> ArtifactHandle {
        let id = Uuid::new_v4();
        self.lock().insert(id, Arc::clone(&data));
        debug!("Acquired artifact handle {} ({} bytes)", id, data.len());
        ArtifactHandle {
            id,
            mime_type: mime_type.to_string(),
            data,
            registry: self.clone(),
        }
    }

    /// Number of handles not yet released
    pub fn live_handles(&self) -> usize {
        self.lock().len()
    }

    /// Resolve an object URL to its payload while the handle is alive
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        let id = url.rsplit('/').next()?;
        let id = Uuid::parse_str(id).ok()?;
        self.lock().get(&id).cloned()
    }

    fn release(&self, id: &Uuid) {
        if self.lock().remove(id).is_some() {
            debug!("Released artifact handle {}", id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transient reference to a registered payload
#[derive(Debug)]
pub struct ArtifactHandle {
    id: Uuid,
    mime_type: String,
    data: Arc<[u8]>,
    registry: HandleRegistry,
}

impl ArtifactHandle {
    /// Object URL of the payload
    pub fn url(&self) -> String {
        format!("blob:wfs-export/{}", self.id)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

/// Saves artifacts into a download directory
///
/// Files are written to a hidden `.part` file first and renamed into place,
/// so a failed save never leaves a partial file under the final name. A taken
/// name gets a ` (n)` suffix before the extension.
pub struct DownloadDirExporter {
    dir: PathBuf,
    registry: HandleRegistry,
}

impl DownloadDirExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            registry: HandleRegistry::new(),
        }
    }

    /// Share an existing handle registry
    pub fn with_registry(mut self, registry: HandleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    fn validate_filename(filename: &str) -> std::result::Result<(), ArtifactError> {
        let invalid = filename.trim().is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\', '\0']);
        if invalid {
            return Err(ArtifactError::InvalidFilename(filename.to_string()));
        }
        Ok(())
    }

    /// First free path for `filename`, appending ` (n)` when taken
    async fn unique_path(&self, filename: &str) -> Result<PathBuf> {
        let candidate = self.dir.join(filename);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

        for n in 1u32.. {
            let name = match &extension {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = self.dir.join(name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(ArtifactError::WriteFailed(format!("no free name for '{filename}'")).into())
    }

    async fn save(&self, handle: &ArtifactHandle, filename: &str) -> Result<ArtifactReceipt> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ArtifactError::WriteFailed(format!("{}: {}", self.dir.display(), e))
        })?;

        let target = self.unique_path(filename).await?;
        let part = self.dir.join(format!(".{}.{}.part", filename, Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&part, handle.data()).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(ArtifactError::WriteFailed(format!("{}: {}", part.display(), e)).into());
        }
        if let Err(e) = tokio::fs::rename(&part, &target).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(ArtifactError::WriteFailed(format!("{}: {}", target.display(), e)).into());
        }

        let saved_as = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        if saved_as != filename {
            warn!("'{}' already exists, saved as '{}'", filename, saved_as);
        }

        Ok(ArtifactReceipt {
            filename: saved_as,
            location: target.display().to_string(),
            bytes: handle.data().len() as u64,
        })
    }
}

#[async_trait]
impl ArtifactExporter for DownloadDirExporter {
    async fn export(
        &self,
        payload: Payload,
        mime_type: &str,
        filename: &str,
    ) -> Result<ArtifactReceipt> {
        Self::validate_filename(filename)?;

        let data: Arc<[u8]> = payload.into_bytes().into();
        let handle = self.registry.acquire(data, mime_type);
        debug!(
            "Saving {} as '{}' ({})",
            handle.url(),
            filename,
            handle.mime_type()
        );

        // `handle` is dropped on return, success or not
        self.save(&handle, filename).await
    }
}
