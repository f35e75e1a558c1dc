use crate::domain::error::DomainError;
use anyhow::{Context, Result};
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const RECIPE_IMAGE_DIR: &str = "uploads/recipe";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Uploaded files on local disk, addressed by paths relative to the media root.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.url_prefix, relative)
    }

    pub fn path_of(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Checks that `data` decodes as an image and writes it under a fresh name.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn store_recipe_image(&self, data: Vec<u8>) -> Result<String> {
        let (format, data) = tokio::task::spawn_blocking(move || {
            let format = decode_check(&data)?;
            Ok::<_, DomainError>((format, data))
        })
        .await
        .context("image validation task failed")??;

        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let relative = format!("{}/{}.{}", RECIPE_IMAGE_DIR, Uuid::new_v4(), extension);
        let path = self.path_of(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!(path = %relative, format = ?format, "Stored recipe image");
        Ok(relative)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, relative: &str) {
        match tokio::fs::remove_file(self.path_of(relative)).await {
            Ok(()) => debug!("Removed media file"),
            Err(e) if e.kind() == ErrorKind::NotFound => debug!("Media file already gone"),
            Err(e) => warn!(error = %e, "Failed to remove media file"),
        }
    }
}

fn decode_check(data: &[u8]) -> Result<ImageFormat, DomainError> {
    let invalid = || DomainError::field("image", INVALID_IMAGE);
    let format = image::guess_format(data).map_err(|_| invalid())?;
    image::load_from_memory_with_format(data, format).map_err(|_| invalid())?;
    Ok(format)
}
