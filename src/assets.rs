use std::path::PathBuf;
use chrono::Utc;
use tokio::fs;
use crate::utils::str_utils::StringExtensions;

pub const IMAGES_URL_PREFIX: &str = "/uploads/images";
const IMAGES_SUBDIR: &str = "uploads/images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub url: String,
}

/// Uploaded files under the public content root. Files are named
/// `<unix millis>-<sanitized original name>`; two uploads of the same name in
/// the same millisecond overwrite each other.
#[derive(Debug, Clone)]
pub struct AssetStore {
    content_root: PathBuf,
}

impl AssetStore {
    pub fn new(content_root: PathBuf) -> Self {
        Self { content_root }
    }

    /// Directory served under `/uploads`.
    pub fn uploads_dir(&self) -> PathBuf {
        self.content_root.join("uploads")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.content_root.join(IMAGES_SUBDIR)
    }

    pub async fn save_image(&self, bytes: &[u8], original_filename: &str) -> Result<StoredAsset, std::io::Error> {
        let filename = format!("{}-{}", Utc::now().timestamp_millis(), original_filename.sanitize_filename());
        let images_dir = self.images_dir();
        fs::create_dir_all(&images_dir).await?;
        let path = images_dir.join(&filename);
        fs::write(&path, bytes).await?;
        let url = format!("{}/{}", IMAGES_URL_PREFIX, filename);
        Ok(StoredAsset { path, url })
    }

    /// Maps a public image url back to its file. Anything that is not a plain
    /// file name under the images prefix yields `None`.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let filename = url.strip_prefix(IMAGES_URL_PREFIX)?.strip_prefix('/')?;
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            return None;
        }
        Some(self.images_dir().join(filename))
    }

    pub async fn remove(&self, url: &str) -> Result<(), std::io::Error> {
        let path = self.path_for_url(url).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("not an image asset url: {}", url))
        })?;
        fs::remove_file(&path).await
    }
}
