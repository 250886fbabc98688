mod local;
mod media_store;

use image::RgbaImage;
use image::codecs::jpeg::JpegEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CompositeError;

pub use local::{LocalStore, SavedMeme};
pub use media_store::{
    DirectoryMediaStore, MediaEntry, MediaStore, MediaStoreSink, encode_for_media_store,
};

pub const JPEG_MIME: &str = "image/jpeg";

/// Destination for a finished composite. The image stays owned by the caller,
/// so a failed export can be retried without compositing again.
pub trait ExportSink {
    fn export(&self, image: &RgbaImage, file_name: &str) -> Result<PathBuf, CompositeError>;
}

pub fn encode_jpeg<W: Write>(image: &RgbaImage, quality: u8, writer: W) -> image::ImageResult<()> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
    encoder.encode_image(&rgb)
}

/// `<prefix>_<unix millis>.jpg`
pub fn timestamped_name(prefix: &str) -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{}_{}.jpg", prefix, millis)
}

/// Encodes into a temp file next to the destination, then moves it into place
/// under a name that does not clobber an existing file.
pub(crate) fn write_jpeg_atomic(
    dir: &Path,
    file_name: &str,
    image: &RgbaImage,
    quality: u8,
) -> Result<PathBuf, CompositeError> {
    let file_name = sanitize_file_name(file_name)
        .ok_or_else(|| CompositeError::export(dir.join(file_name), "invalid file name"))?;
    fs::create_dir_all(dir).map_err(|err| CompositeError::export(dir, err))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".export-")
        .suffix(".jpg")
        .tempfile_in(dir)
        .map_err(|err| CompositeError::export(dir, err))?;
    encode_jpeg(image, quality, tmp.as_file_mut())
        .map_err(|err| CompositeError::export(dir.join(&file_name), err))?;
    tmp.as_file_mut()
        .flush()
        .map_err(|err| CompositeError::export(dir.join(&file_name), err))?;

    let mut target = dir.join(&file_name);
    let mut attempt = 1;
    loop {
        match tmp.persist_noclobber(&target) {
            Ok(_) => return Ok(target),
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                tmp = err.file;
                target = dir.join(numbered_name(&file_name, attempt));
                attempt += 1;
            }
            Err(err) => return Err(CompositeError::export(&target, err.error)),
        }
    }
}

fn sanitize_file_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return None;
    }
    if Path::new(name).extension().is_some() {
        Some(name.to_string())
    } else {
        Some(format!("{}.jpg", name))
    }
}

fn numbered_name(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", stem, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::solid;
    use tempfile::tempdir;

    #[test]
    fn writes_decodable_jpeg_of_same_size() {
        let dir = tempdir().expect("tempdir");
        let image = solid(40, 30, [200, 10, 10, 255]);
        let path = write_jpeg_atomic(dir.path(), "out", &image, 100).expect("write");
        assert_eq!(path, dir.path().join("out.jpg"));
        let decoded = image::open(&path).expect("decode").to_rgb8();
        assert_eq!(decoded.dimensions(), (40, 30));
        let px = decoded.get_pixel(20, 15);
        assert!(px[0] > 180 && px[1] < 40 && px[2] < 40, "{px:?}");
    }

    #[test]
    fn existing_files_are_not_clobbered() {
        let dir = tempdir().expect("tempdir");
        let image = solid(4, 4, [0, 0, 0, 255]);
        let first = write_jpeg_atomic(dir.path(), "Meme_1.jpg", &image, 90).expect("first");
        let second = write_jpeg_atomic(dir.path(), "Meme_1.jpg", &image, 90).expect("second");
        assert_ne!(first, second);
        assert_eq!(second, dir.path().join("Meme_1_1.jpg"));
        let leftovers = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".export-"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempdir().expect("tempdir");
        let image = solid(2, 2, [0, 0, 0, 255]);
        for name in ["../escape.jpg", "a/b.jpg", "", ".hidden"] {
            let err = write_jpeg_atomic(dir.path(), name, &image, 100).expect_err(name);
            assert!(matches!(err, CompositeError::ExportFailure { .. }));
        }
    }

    #[test]
    fn timestamped_names_have_prefix_and_extension() {
        let name = timestamped_name("Meme");
        assert!(name.starts_with("Meme_") && name.ends_with(".jpg"), "{name}");
    }
}
