//! Random background image from a local directory.

use crate::config::BackgroundConfig;
use crate::error::FetchError;
use crate::provider::DataProvider;
use crate::types::{BackgroundImage, FeedKind};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Picks a different image from the directory on every fetch.
pub struct BackgroundProvider {
    config: BackgroundConfig,
    previous: Mutex<Option<PathBuf>>,
}

impl BackgroundProvider {
    /// Create a provider. The directory is not checked until the first fetch.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] if no extensions are configured.
    pub fn new(config: BackgroundConfig) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self {
            config,
            previous: Mutex::new(None),
        })
    }

    fn pick(&self, mut candidates: Vec<PathBuf>) -> Result<BackgroundImage, FetchError> {
        let pool_size = candidates.len();
        let mut previous = self
            .previous
            .lock()
            .map_err(|_| FetchError::Unavailable("background state poisoned".into()))?;
        if pool_size > 1 {
            if let Some(prev) = previous.as_ref() {
                candidates.retain(|c| c != prev);
            }
        }
        let chosen = candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| {
                FetchError::Unavailable(format!(
                    "no images in {}",
                    self.config.directory.display()
                ))
            })?;
        *previous = Some(chosen.clone());
        Ok(BackgroundImage {
            path: chosen,
            pool_size,
        })
    }
}

#[async_trait]
impl DataProvider for BackgroundProvider {
    type Output = BackgroundImage;

    async fn fetch(&self) -> Result<BackgroundImage, FetchError> {
        let dir = self.config.directory.clone();
        let extensions = self.config.extensions.clone();
        let candidates = tokio::task::spawn_blocking(move || scan_images(&dir, &extensions))
            .await
            .map_err(|e| FetchError::Unavailable(format!("background scan task failed: {e}")))??;
        tracing::debug!(count = candidates.len(), "background images found");
        self.pick(candidates)
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Background
    }
}

/// Image files directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns [`FetchError::Unavailable`] if the directory cannot be read.
pub fn scan_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, FetchError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        FetchError::Unavailable(format!("cannot read {}: {e}", dir.display()))
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path, extensions))
        .collect();
    images.sort();
    Ok(images)
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}
