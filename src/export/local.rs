use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{ExportSink, timestamped_name, write_jpeg_atomic};
use crate::error::CompositeError;
use crate::settings::Settings;

/// App-private folder of saved memes.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
    quality: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedMeme {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            dir: dir.into(),
            quality,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.memes_dir(), settings.jpeg_quality)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, image: &RgbaImage) -> Result<PathBuf, CompositeError> {
        self.export(image, &timestamped_name("Meme"))
    }

    /// Saved memes, newest first.
    pub fn list(&self) -> Result<Vec<SavedMeme>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut memes = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", self.dir.display()))?;
            let path = entry.path();
            let is_jpeg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !is_jpeg || hidden || !path.is_file() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            memes.push(SavedMeme { path, modified });
        }
        memes.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
        Ok(memes)
    }

    pub fn delete(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or(Path::new(""));
        if parent != self.dir {
            return Err(anyhow!(
                "{} is not in {}",
                path.display(),
                self.dir.display()
            ));
        }
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))
    }
}

impl ExportSink for LocalStore {
    fn export(&self, image: &RgbaImage, file_name: &str) -> Result<PathBuf, CompositeError> {
        let path = write_jpeg_atomic(&self.dir, file_name, image, self.quality)?;
        tracing::info!(path = %path.display(), "meme saved");
        Ok(path)
    }
}
