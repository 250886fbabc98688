use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Position an overlay lands at when it is first added, in dp.
pub const DEFAULT_POSITION: Offset = Offset { x: 100.0, y: 100.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

impl Offset {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Straight (non-premultiplied) RGBA8 text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TextColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextColor {
    pub const WHITE: TextColor = TextColor::rgb(0xff, 0xff, 0xff);
    pub const BLACK: TextColor = TextColor::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    /// `#rrggbb`, used for SVG paint attributes. Alpha goes to `*-opacity`.
    pub fn hex_rgb(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for TextColor {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let hex = value
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("color must start with '#': {}", value))?;
        if !hex.is_ascii() {
            return Err(anyhow!("invalid color: {}", value));
        }
        let channel = |idx: usize| {
            u8::from_str_radix(&hex[idx..idx + 2], 16)
                .map_err(|_| anyhow!("invalid color: {}", value))
        };
        match hex.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(anyhow!("color must be #rrggbb or #rrggbbaa: {}", value)),
        }
    }
}

impl TryFrom<String> for TextColor {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TextColor> for String {
    fn from(color: TextColor) -> Self {
        if color.a == 0xff {
            color.hex_rgb()
        } else {
            format!("{}{:02x}", color.hex_rgb(), color.a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerSource {
    /// Bundled sticker, looked up by name in the resource directory.
    Resource(String),
    File(PathBuf),
    /// Locator of a downloaded sticker; read back from the remote cache.
    Remote(String),
}

impl fmt::Display for StickerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(id) => write!(f, "resource:{}", id),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Remote(locator) => write!(f, "remote:{}", locator),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayKind {
    Text {
        content: String,
        /// Falls back to the configured default text color when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<TextColor>,
    },
    Sticker {
        source: StickerSource,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub kind: OverlayKind,
    #[serde(default = "default_position")]
    pub position: Offset,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub rotation: f32,
}

fn default_position() -> Offset {
    DEFAULT_POSITION
}

fn default_scale() -> f32 {
    1.0
}

impl Overlay {
    pub fn new(id: OverlayId, kind: OverlayKind) -> Self {
        Self {
            id,
            kind,
            position: DEFAULT_POSITION,
            scale: 1.0,
            rotation: 0.0,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Offset::new(x, y);
        self
    }

    pub fn scaled(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn rotated(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Reason the overlay cannot be composited, if any.
    pub fn validate(&self) -> Option<String> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Some(format!("scale must be positive, got {}", self.scale));
        }
        if !self.position.is_finite() {
            return Some(format!(
                "position must be finite, got ({}, {})",
                self.position.x, self.position.y
            ));
        }
        if !self.rotation.is_finite() {
            return Some(format!("rotation must be finite, got {}", self.rotation));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_rgb_and_rgba() {
        let color: TextColor = "#ff8000".parse().expect("rgb");
        assert_eq!(color, TextColor::rgb(0xff, 0x80, 0x00));
        let color: TextColor = "#10203040".parse().expect("rgba");
        assert_eq!(color, TextColor::rgba(0x10, 0x20, 0x30, 0x40));
    }

    #[test]
    fn color_rejects_malformed_values() {
        assert!("ff8000".parse::<TextColor>().is_err());
        assert!("#ff80".parse::<TextColor>().is_err());
        assert!("#gg0000".parse::<TextColor>().is_err());
        assert!("#ffé000".parse::<TextColor>().is_err());
    }

    #[test]
    fn color_maps_channels_directly() {
        let color = TextColor::rgba(12, 34, 56, 255).to_skia().to_color_u8();
        assert_eq!(
            (color.red(), color.green(), color.blue(), color.alpha()),
            (12, 34, 56, 255)
        );
    }

    #[test]
    fn overlay_json_uses_defaults() {
        let overlay: Overlay = serde_json::from_str(
            r#"{"id": 3, "kind": {"type": "text", "content": "hi"}}"#,
        )
        .expect("parse overlay");
        assert_eq!(overlay.id, OverlayId(3));
        assert_eq!(overlay.position, DEFAULT_POSITION);
        assert_eq!(overlay.scale, 1.0);
        assert_eq!(overlay.rotation, 0.0);
        assert_eq!(
            overlay.kind,
            OverlayKind::Text {
                content: "hi".to_string(),
                color: None,
            }
        );
    }

    #[test]
    fn sticker_kind_serializes_as_tagged_json() {
        let kind = OverlayKind::Sticker {
            source: StickerSource::Remote("https://example.com/cat.png".to_string()),
        };
        let json = serde_json::to_string_pretty(&kind).expect("serialize");
        insta::assert_snapshot!(json, @r#"
        {
          "type": "sticker",
          "source": {
            "remote": "https://example.com/cat.png"
          }
        }
        "#);
    }

    #[test]
    fn validate_flags_bad_scale_and_position() {
        let text = OverlayKind::Text {
            content: "x".to_string(),
            color: Some(TextColor::WHITE),
        };
        let overlay = Overlay::new(OverlayId(1), text.clone());
        assert!(overlay.validate().is_none());
        assert!(overlay.clone().scaled(0.0).validate().is_some());
        assert!(overlay.clone().scaled(f32::NAN).validate().is_some());
        assert!(overlay.clone().at(f32::INFINITY, 0.0).validate().is_some());
        assert!(overlay.rotated(f32::NAN).validate().is_some());
    }
}
