use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};

pub mod compose;
pub mod error;
pub mod export;
mod ext;
pub mod geometry;
pub mod logging;
pub mod overlay;
mod paths;
pub mod scene;
pub mod session;
pub mod settings;
pub mod stickers;
mod test_util;

pub use compose::{CompositeOutcome, CompositeStyle, Compositor};
pub use error::CompositeError;
pub use export::{DirectoryMediaStore, ExportSink, LocalStore, MediaStoreSink};
pub use geometry::{Container, FitMapping, resolve_fit, to_image_space, to_screen_space};
pub use overlay::{Offset, Overlay, OverlayId, OverlayKind, StickerSource, TextColor};
pub use scene::Scene;
pub use session::{EditorSession, Gesture};
pub use settings::Settings;
pub use stickers::{FsStickerLoader, RemoteStickerCache, StickerLoader};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub base: Option<PathBuf>,
    pub scene: Option<PathBuf>,
    pub out_path: Option<PathBuf>,
    pub gallery: bool,
    pub list: bool,
    pub settings_path: Option<PathBuf>,
}

/// Composes the scene onto the base image and exports it. Returns the lines
/// to print.
pub fn run(config: Config) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let store = LocalStore::from_settings(&settings);

    if config.list {
        return list_saved(&store);
    }

    let base_path = config
        .base
        .as_deref()
        .ok_or_else(|| anyhow!("--base is required"))?;
    let scene_path = config
        .scene
        .as_deref()
        .ok_or_else(|| anyhow!("--scene is required"))?;
    let scene = Scene::load(scene_path)?;
    let compositor = compositor_from_settings(&settings);
    let outcome = compose_file(&compositor, base_path, &scene)?;

    let mut lines = Vec::new();
    for skipped in &outcome.skipped {
        lines.push(format!("warning: {}", skipped));
    }
    let saved = match config.out_path.as_deref() {
        Some(out) => save_to(out, &outcome.image, settings.jpeg_quality)?,
        None => store.save(&outcome.image)?,
    };
    lines.push(format!("saved: {}", saved.display()));

    if config.gallery {
        let sink = MediaStoreSink::from_settings(&settings);
        let exported = sink.export(&outcome.image, &export::timestamped_name("Export"))?;
        lines.push(format!("exported: {}", exported.display()));
    }
    Ok(lines.join("\n"))
}

pub fn compositor_from_settings(settings: &Settings) -> Compositor<FsStickerLoader> {
    let loader = FsStickerLoader::new(
        settings.sticker_resource_dir(),
        RemoteStickerCache::new(settings.remote_cache_dir()),
    );
    Compositor::new(CompositeStyle::from_settings(settings), loader)
}

pub fn compose_file<L: StickerLoader>(
    compositor: &Compositor<L>,
    base_path: &Path,
    scene: &Scene,
) -> Result<CompositeOutcome> {
    let base = image::open(base_path)
        .with_context(|| format!("failed to decode base image: {}", base_path.display()))?
        .to_rgba8();
    let outcome = compositor.composite_with_report(
        &base,
        &scene.overlays,
        scene.container,
        scene.density,
    )?;
    Ok(outcome)
}

fn save_to(out: &Path, image: &image::RgbaImage, quality: u8) -> Result<PathBuf> {
    let dir = out
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = out
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid output path: {}", out.display()))?;
    let path = LocalStore::new(dir, quality).export(image, file_name)?;
    Ok(path)
}

fn list_saved(store: &LocalStore) -> Result<String> {
    let memes = store.list()?;
    if memes.is_empty() {
        return Ok(format!("no saved memes in {}", store.dir().display()));
    }
    Ok(memes
        .iter()
        .map(|meme| meme.path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n"))
}
