use serde::{Deserialize, Serialize};

use crate::error::CompositeError;
use crate::overlay::Offset;

/// On-screen editing area, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub width: f32,
    pub height: f32,
}

impl Container {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// How an image is displayed inside a container under "fit" scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitMapping {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl FitMapping {
    /// Displayed image rectangle as `(left, top, right, bottom)` in container pixels.
    pub fn display_rect(&self, image_w: f32, image_h: f32) -> (f32, f32, f32, f32) {
        (
            self.offset_x,
            self.offset_y,
            self.offset_x + image_w * self.scale,
            self.offset_y + image_h * self.scale,
        )
    }
}

pub fn resolve_fit(
    container_w: f32,
    container_h: f32,
    image_w: f32,
    image_h: f32,
) -> Result<FitMapping, CompositeError> {
    if !is_extent(container_w) || !is_extent(container_h) {
        return Err(CompositeError::geometry(format!(
            "container must have positive extent, got {}x{}",
            container_w, container_h
        )));
    }
    if !is_extent(image_w) || !is_extent(image_h) {
        return Err(CompositeError::geometry(format!(
            "image must have positive extent, got {}x{}",
            image_w, image_h
        )));
    }

    let container_aspect = container_w / container_h;
    let image_aspect = image_w / image_h;
    let mapping = if image_aspect > container_aspect {
        let scale = container_w / image_w;
        FitMapping {
            scale,
            offset_x: 0.0,
            offset_y: (container_h - image_h * scale) / 2.0,
        }
    } else {
        let scale = container_h / image_h;
        FitMapping {
            scale,
            offset_x: (container_w - image_w * scale) / 2.0,
            offset_y: 0.0,
        }
    };
    Ok(mapping)
}

pub(crate) fn check_density(density: f32) -> Result<(), CompositeError> {
    if is_extent(density) {
        Ok(())
    } else {
        Err(CompositeError::geometry(format!(
            "density must be positive, got {}",
            density
        )))
    }
}

/// Screen position (dp) to native image pixels. Results may lie outside the image.
pub fn to_image_space(position: Offset, density: f32, fit: &FitMapping) -> Offset {
    let screen_x = position.x * density;
    let screen_y = position.y * density;
    let relative_x = screen_x - fit.offset_x;
    let relative_y = screen_y - fit.offset_y;
    Offset::new(relative_x / fit.scale, relative_y / fit.scale)
}

pub fn to_screen_space(position: Offset, density: f32, fit: &FitMapping) -> Offset {
    let screen_x = position.x * fit.scale + fit.offset_x;
    let screen_y = position.y * fit.scale + fit.offset_y;
    Offset::new(screen_x / density, screen_y / density)
}

fn is_extent(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
