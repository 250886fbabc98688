mod font;
mod raster;
mod text;

use anyhow::{Result, anyhow};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::OnceLock;
use tiny_skia::{Pixmap, Transform};

use crate::error::CompositeError;
use crate::geometry::{self, Container, FitMapping};
use crate::overlay::{Offset, Overlay, OverlayKind, StickerSource, TextColor};
use crate::settings::Settings;
use crate::stickers::StickerLoader;

pub use font::{FontMetrics, ResolvedTextFont, load_font_metrics};

use font::TextFonts;

/// Nominal on-screen sizes, in dp, of the things the editor draws.
#[derive(Debug, Clone)]
pub struct CompositeStyle {
    pub text_size: f32,
    /// Used for text overlays that carry no color of their own.
    pub text_color: TextColor,
    pub shadow_radius: f32,
    pub shadow_color: TextColor,
    pub sticker_base_width: f32,
    pub font_family: Option<String>,
    pub font_path: Option<PathBuf>,
}

impl Default for CompositeStyle {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CompositeStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            text_size: settings.text_size,
            text_color: settings.text_default_color,
            shadow_radius: settings.shadow_radius,
            shadow_color: settings.shadow_color,
            sticker_base_width: settings.sticker_base_width,
            font_family: settings.font_family.clone(),
            font_path: settings.font_path.clone(),
        }
    }
}

pub struct CompositeOutcome {
    pub image: RgbaImage,
    /// Overlays left out because their resources were unavailable.
    pub skipped: Vec<CompositeError>,
}

/// Burns overlays into a full-resolution copy of a base image.
pub struct Compositor<L> {
    style: CompositeStyle,
    loader: L,
    fonts: OnceLock<TextFonts>,
}

impl<L: StickerLoader> Compositor<L> {
    pub fn new(style: CompositeStyle, loader: L) -> Self {
        Self {
            style,
            loader,
            fonts: OnceLock::new(),
        }
    }

    pub fn style(&self) -> &CompositeStyle {
        &self.style
    }

    pub fn composite(
        &self,
        base: &RgbaImage,
        overlays: &[Overlay],
        container: Container,
        density: f32,
    ) -> Result<RgbaImage, CompositeError> {
        self.composite_with_report(base, overlays, container, density)
            .map(|outcome| outcome.image)
    }

    pub fn composite_with_report(
        &self,
        base: &RgbaImage,
        overlays: &[Overlay],
        container: Container,
        density: f32,
    ) -> Result<CompositeOutcome, CompositeError> {
        geometry::check_density(density)?;
        let fit = geometry::resolve_fit(
            container.width,
            container.height,
            base.width() as f32,
            base.height() as f32,
        )?;
        for overlay in overlays {
            if let Some(reason) = overlay.validate() {
                return Err(CompositeError::InvalidOverlay {
                    id: overlay.id,
                    reason,
                });
            }
        }

        let mut canvas = raster::to_pixmap(base).ok_or_else(|| {
            CompositeError::geometry(format!(
                "cannot allocate {}x{} canvas",
                base.width(),
                base.height()
            ))
        })?;
        tracing::debug!(
            overlays = overlays.len(),
            fit_scale = fit.scale,
            offset_x = fit.offset_x,
            offset_y = fit.offset_y,
            "compositing"
        );

        let mut skipped = Vec::new();
        for overlay in overlays {
            let anchor = geometry::to_image_space(overlay.position, density, &fit);
            let transform = overlay_transform(anchor, overlay, &fit);
            match &overlay.kind {
                OverlayKind::Text { content, color } => {
                    let color = color.unwrap_or(self.style.text_color);
                    self.draw_text(&mut canvas, content, color, density, transform);
                }
                OverlayKind::Sticker { source } => {
                    if let Err(err) = self.draw_sticker(&mut canvas, source, density, transform) {
                        let err = CompositeError::OverlayResourceUnavailable {
                            id: overlay.id,
                            reason: format!("{}: {:#}", source, err),
                        };
                        tracing::warn!(error = %err, "skipping overlay");
                        skipped.push(err);
                    }
                }
            }
        }

        Ok(CompositeOutcome {
            image: raster::to_rgba(&canvas),
            skipped,
        })
    }

    fn fonts(&self) -> &TextFonts {
        self.fonts.get_or_init(|| {
            TextFonts::load(
                self.style.font_path.as_deref(),
                self.style.font_family.as_deref(),
            )
        })
    }

    fn draw_text(
        &self,
        canvas: &mut Pixmap,
        content: &str,
        color: TextColor,
        density: f32,
        transform: Transform,
    ) {
        if content.trim().is_empty() {
            return;
        }
        let fonts = self.fonts();
        let layout = text::layout_text(
            content,
            self.style.text_size * density,
            self.style.shadow_radius * density,
            fonts.metrics(),
        );
        let svg = text::text_svg(
            content,
            color,
            self.style.shadow_color,
            &layout,
            fonts.family(),
        );
        if let Err(err) = text::draw_text(canvas, &svg, &layout, fonts, transform) {
            tracing::warn!(error = %err, "text overlay not rendered");
        }
    }

    fn draw_sticker(
        &self,
        canvas: &mut Pixmap,
        source: &StickerSource,
        density: f32,
        transform: Transform,
    ) -> Result<()> {
        let image = self.loader.load(source)?;
        let sticker = raster::to_pixmap(&image).ok_or_else(|| anyhow!("sticker is empty"))?;
        drop(image);
        let fit_width = self.style.sticker_base_width * density / sticker.width() as f32;
        raster::draw_raster(canvas, &sticker, transform.pre_scale(fit_width, fit_width));
        Ok(())
    }
}

/// Maps content measured in physical screen pixels, with its origin at the
/// overlay's top-left, into native image pixels.
fn overlay_transform(anchor: Offset, overlay: &Overlay, fit: &FitMapping) -> Transform {
    let scale = overlay.scale / fit.scale;
    Transform::from_translate(anchor.x, anchor.y)
        .pre_concat(Transform::from_rotate(overlay.rotation))
        .pre_scale(scale, scale)
}
