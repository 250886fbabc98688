use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::overlay::StickerSource;

const RESOURCE_EXTENSIONS: &[&str] = &["png", "webp", "jpg", "jpeg", "gif", "bmp"];

/// Decodes the raster behind a sticker overlay. Implementations must not touch
/// the network; remote stickers are expected to be cached already.
pub trait StickerLoader {
    fn load(&self, source: &StickerSource) -> Result<RgbaImage>;
}

/// On-disk cache of downloaded stickers, keyed by the md5 of their locator.
/// One per editing session; the downloader fills it, the loader reads it.
#[derive(Debug, Clone)]
pub struct RemoteStickerCache {
    dir: PathBuf,
}

impl RemoteStickerCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, locator: &str) -> PathBuf {
        self.dir
            .join(format!("{:x}", md5::compute(locator.trim().as_bytes())))
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.path_for(locator).is_file()
    }

    pub fn insert(&self, locator: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create sticker cache: {}", self.dir.display())
        })?;
        let path = self.path_for(locator);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| "failed to create temp file for sticker cache")?;
        tmp.write_all(bytes)
            .with_context(|| format!("failed to cache sticker: {}", locator))?;
        tmp.persist(&path)
            .with_context(|| format!("failed to persist sticker: {}", path.display()))?;
        Ok(path)
    }

    /// Removes every cached sticker. Called when the session is torn down.
    pub fn purge(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).with_context(|| {
                format!("failed to purge sticker cache: {}", self.dir.display())
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FsStickerLoader {
    resource_dir: PathBuf,
    cache: RemoteStickerCache,
}

impl FsStickerLoader {
    pub fn new(resource_dir: impl Into<PathBuf>, cache: RemoteStickerCache) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            cache,
        }
    }

    pub fn cache(&self) -> &RemoteStickerCache {
        &self.cache
    }

    fn resolve(&self, source: &StickerSource) -> Result<PathBuf> {
        match source {
            StickerSource::Resource(id) => self.resolve_resource(id),
            StickerSource::File(path) => Ok(path.clone()),
            StickerSource::Remote(locator) => {
                let path = self.cache.path_for(locator);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(anyhow!("remote sticker not cached: {}", locator))
                }
            }
        }
    }

    fn resolve_resource(&self, id: &str) -> Result<PathBuf> {
        let id = id.trim();
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(anyhow!("invalid sticker resource id: {:?}", id));
        }
        let exact = self.resource_dir.join(id);
        if exact.is_file() {
            return Ok(exact);
        }
        RESOURCE_EXTENSIONS
            .iter()
            .map(|ext| self.resource_dir.join(format!("{}.{}", id, ext)))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                anyhow!(
                    "sticker resource '{}' not found in {}",
                    id,
                    self.resource_dir.display()
                )
            })
    }
}

impl StickerLoader for FsStickerLoader {
    fn load(&self, source: &StickerSource) -> Result<RgbaImage> {
        let path = self.resolve(source)?;
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read sticker: {}", path.display()))?;
        decode_sticker(&bytes).with_context(|| format!("failed to decode {}", path.display()))
    }
}

pub fn decode_sticker(bytes: &[u8]) -> Result<RgbaImage> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {}
        Some(kind) => return Err(anyhow!("not an image ({})", kind.mime_type())),
        None => return Err(anyhow!("unrecognized sticker data")),
    }
    let image = image::load_from_memory(bytes).with_context(|| "failed to decode sticker")?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::solid;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        solid(width, height, [1, 2, 3, 255])
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn resources_resolve_with_or_without_extension() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("panda.png"), png_bytes(4, 2)).expect("write");
        let loader = FsStickerLoader::new(dir.path(), RemoteStickerCache::new(dir.path().join("c")));

        let image = loader
            .load(&StickerSource::Resource("panda".to_string()))
            .expect("by name");
        assert_eq!(image.dimensions(), (4, 2));
        assert!(loader
            .load(&StickerSource::Resource("panda.png".to_string()))
            .is_ok());
        assert!(loader
            .load(&StickerSource::Resource("../panda".to_string()))
            .is_err());
        assert!(loader
            .load(&StickerSource::Resource("missing".to_string()))
            .is_err());
    }

    #[test]
    fn remote_stickers_come_from_the_cache() {
        let dir = tempdir().expect("tempdir");
        let cache = RemoteStickerCache::new(dir.path().join("cache"));
        let loader = FsStickerLoader::new(dir.path(), cache.clone());
        let source = StickerSource::Remote("https://example.com/a.png".to_string());

        assert!(loader.load(&source).is_err());
        cache
            .insert("https://example.com/a.png", &png_bytes(3, 3))
            .expect("insert");
        assert!(cache.contains("https://example.com/a.png"));
        assert_eq!(loader.load(&source).expect("cached").dimensions(), (3, 3));

        cache.purge().expect("purge");
        assert!(!cache.contains("https://example.com/a.png"));
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("notes.png");
        fs::write(&path, b"definitely not a png").expect("write");
        let loader = FsStickerLoader::new(dir.path(), RemoteStickerCache::new(dir.path()));
        assert!(loader.load(&StickerSource::File(path)).is_err());
        assert!(decode_sticker(b"%PDF-1.4\n").is_err());
    }
}
