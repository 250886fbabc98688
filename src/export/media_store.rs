use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use super::{ExportSink, JPEG_MIME, encode_jpeg, timestamped_name, write_jpeg_atomic};
use crate::error::CompositeError;
use crate::settings::Settings;

const INDEX_FILE_NAME: &str = ".media_index.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
}

/// Shared media library other apps can browse.
pub trait MediaStore {
    /// Stores `image` under `entry` and returns where it landed.
    fn insert(&self, entry: &MediaEntry, image: &RgbaImage, quality: u8) -> Result<PathBuf>;
}

/// Media store rooted at a directory, with a JSON-lines index of registered
/// entries next to the files.
#[derive(Debug, Clone)]
pub struct DirectoryMediaStore {
    root: PathBuf,
}

impl DirectoryMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> Result<Vec<MediaEntry>> {
        let path = self.root.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read media index: {}", path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .with_context(|| format!("corrupt media index: {}", path.display()))
            })
            .collect()
    }

    fn record(&self, entry: &MediaEntry) -> Result<()> {
        let path = self.root.join(INDEX_FILE_NAME);
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open media index: {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to update media index: {}", path.display()))
    }
}

impl MediaStore for DirectoryMediaStore {
    fn insert(&self, entry: &MediaEntry, image: &RgbaImage, quality: u8) -> Result<PathBuf> {
        if entry.mime_type != JPEG_MIME {
            return Err(anyhow!("unsupported mime type: {}", entry.mime_type));
        }
        let relative = checked_relative(&entry.relative_path)?;
        let dir = self.root.join(relative);
        let path = write_jpeg_atomic(&dir, &entry.display_name, image, quality)?;
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.display_name.clone());
        self.record(&MediaEntry {
            display_name,
            ..entry.clone()
        })?;
        Ok(path)
    }
}

fn checked_relative(value: &str) -> Result<&Path> {
    let path = Path::new(value.trim_matches('/'));
    if path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Ok(path)
    } else {
        Err(anyhow!("invalid relative path: {}", value))
    }
}

/// Exports composites into a [`MediaStore`] under one relative path category.
pub struct MediaStoreSink<S> {
    store: S,
    relative_path: String,
    quality: u8,
}

impl<S: MediaStore> MediaStoreSink<S> {
    pub fn new(store: S, relative_path: impl Into<String>, quality: u8) -> Self {
        Self {
            store,
            relative_path: relative_path.into(),
            quality,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-exports a meme already saved locally under a fresh `Export_` name.
    pub fn export_saved(&self, saved: &Path) -> Result<PathBuf, CompositeError> {
        let image = image::open(saved)
            .map_err(|err| CompositeError::export(saved, err))?
            .to_rgba8();
        self.export(&image, &timestamped_name("Export"))
    }
}

impl MediaStoreSink<DirectoryMediaStore> {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            DirectoryMediaStore::new(settings.gallery_root()),
            settings.gallery_relative_path.clone(),
            settings.jpeg_quality,
        )
    }
}

impl<S: MediaStore> ExportSink for MediaStoreSink<S> {
    fn export(&self, image: &RgbaImage, file_name: &str) -> Result<PathBuf, CompositeError> {
        let entry = MediaEntry {
            display_name: file_name.to_string(),
            mime_type: JPEG_MIME.to_string(),
            relative_path: self.relative_path.clone(),
        };
        let path = self
            .store
            .insert(&entry, image, self.quality)
            .map_err(|err| CompositeError::export(&self.relative_path, format!("{:#}", err)))?;
        tracing::info!(path = %path.display(), "meme exported to gallery");
        Ok(path)
    }
}

/// Encoded bytes for hosts that register media themselves.
pub fn encode_for_media_store(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    encode_jpeg(image, quality, &mut bytes).with_context(|| "failed to encode jpeg")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::solid;
    use tempfile::tempdir;

    #[test]
    fn export_registers_entry_under_relative_path() {
        let dir = tempdir().expect("tempdir");
        let sink = MediaStoreSink::new(
            DirectoryMediaStore::new(dir.path()),
            "DCIM/MemeMaster",
            100,
        );
        let image = solid(6, 6, [50, 60, 70, 255]);
        let path = sink.export(&image, "Export_1.jpg").expect("export");
        assert_eq!(path, dir.path().join("DCIM/MemeMaster/Export_1.jpg"));

        let entries = sink.store().entries().expect("entries");
        assert_eq!(
            entries,
            vec![MediaEntry {
                display_name: "Export_1.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                relative_path: "DCIM/MemeMaster".to_string(),
            }]
        );
    }

    #[test]
    fn saved_memes_can_be_re_exported() {
        let dir = tempdir().expect("tempdir");
        let saved = dir.path().join("Meme_1.jpg");
        image::DynamicImage::ImageRgba8(solid(5, 3, [255, 255, 255, 255]))
            .to_rgb8()
            .save(&saved)
            .expect("save jpeg");
        let sink = MediaStoreSink::new(DirectoryMediaStore::new(dir.path().join("g")), "DCIM/x", 90);
        let path = sink.export_saved(&saved).expect("export");
        assert!(
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("Export_"))
        );
        assert_eq!(image::open(&path).expect("open").width(), 5);

        let missing = sink.export_saved(&dir.path().join("gone.jpg"));
        assert!(matches!(missing, Err(CompositeError::ExportFailure { .. })));
    }

    #[test]
    fn escaping_relative_paths_fail_the_export() {
        let dir = tempdir().expect("tempdir");
        let sink = MediaStoreSink::new(DirectoryMediaStore::new(dir.path()), "../outside", 100);
        let err = sink
            .export(&solid(2, 2, [0, 0, 0, 255]), "a.jpg")
            .expect_err("escape");
        assert!(matches!(err, CompositeError::ExportFailure { .. }));
        assert!(encode_for_media_store(&solid(2, 2, [0, 0, 0, 255]), 80).is_ok());
    }
}
