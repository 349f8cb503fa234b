//! Per-request scratch directory
//!
//! Every artifact a request produces (staged upload, transcoder output)
//! lives in one uniquely named directory that is removed when the
//! workspace is dropped, whichever way the request ends.

use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

use super::container_normalizer::{AudioBuffer, StagedAudio};

const WORKSPACE_PREFIX: &str = "tsi-";

/// Stem of the staged upload; the client's filename is never used
const UPLOAD_STEM: &str = "upload";

pub struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    /// Create a fresh directory under `root` (created if missing)
    pub fn create(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created request workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the upload as `upload.<container>`
    pub async fn stage(&self, buffer: &AudioBuffer) -> std::io::Result<StagedAudio> {
        let path = self
            .dir
            .path()
            .join(format!("{}.{}", UPLOAD_STEM, buffer.container));
        tokio::fs::write(&path, &buffer.bytes).await?;

        Ok(StagedAudio {
            path,
            container: buffer.container.clone(),
        })
    }
}

impl std::fmt::Debug for RequestWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestWorkspace")
            .field("path", &self.dir.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ContainerHint;

    #[tokio::test]
    async fn test_stage_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let workspace = RequestWorkspace::create(root.path()).unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(dir.starts_with(root.path()));

        let buffer = AudioBuffer::new(b"abc".to_vec(), ContainerHint::from_extension("webm"));
        let staged = workspace.stage(&buffer).await.unwrap();
        assert_eq!(staged.path, dir.join("upload.webm"));
        assert_eq!(std::fs::read(&staged.path).unwrap(), b"abc");

        drop(workspace);
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let workspace = RequestWorkspace::create(&nested).unwrap();
        assert!(workspace.path().starts_with(&nested));
    }
}
