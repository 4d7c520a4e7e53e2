use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use uuid::Uuid;

/// Filesystem blob store for uploaded media. Blobs are addressed by a path
/// relative to `root`; `url` is the public prefix they are served under.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
    url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), relative)
    }

    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Writes `bytes` under `dir` with a fresh random name and returns the
    /// relative path.
    pub async fn save(&self, dir: &str, extension: &str, bytes: &[u8]) -> std::io::Result<String> {
        let relative = format!("{dir}/{}.{extension}", Uuid::new_v4());
        let path = self.path(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        log::debug!("Stored {} bytes at {}", bytes.len(), path.display());

        Ok(relative)
    }

    /// Best-effort removal; a missing blob is not an error.
    pub async fn remove(&self, relative: &str) {
        match tokio::fs::remove_file(self.path(relative)).await {
            Ok(()) => log::debug!("Removed {relative}"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove {relative}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_blobs_land_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path(), "/static/media");

        let relative = media.save("uploads/recipe", "png", b"data").await.unwrap();

        assert!(relative.starts_with("uploads/recipe/"));
        assert!(relative.ends_with(".png"));
        assert_eq!(tokio::fs::read(media.path(&relative)).await.unwrap(), b"data");

        media.remove(&relative).await;
        assert!(!media.path(&relative).exists());
        media.remove(&relative).await;
    }

    #[test]
    fn urls_join_prefix_and_path() {
        let media = MediaStore::new("/srv/media", "https://cdn.example.com/media/");

        assert_eq!(
            media.url("uploads/recipe/x.jpg"),
            "https://cdn.example.com/media/uploads/recipe/x.jpg"
        );
    }
}
