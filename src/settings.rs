use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::TextColor;
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub text_size: f32,
    pub text_default_color: TextColor,
    pub shadow_radius: f32,
    pub shadow_color: TextColor,
    pub font_family: Option<String>,
    pub font_path: Option<PathBuf>,
    pub sticker_base_width: f32,
    pub sticker_resource_dir: Option<PathBuf>,
    pub remote_cache_dir: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub memes_dir: Option<PathBuf>,
    pub gallery_root: Option<PathBuf>,
    pub gallery_relative_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_size: 28.0,
            text_default_color: TextColor::WHITE,
            shadow_radius: 2.0,
            shadow_color: TextColor::BLACK,
            font_family: None,
            font_path: None,
            sticker_base_width: 100.0,
            sticker_resource_dir: None,
            remote_cache_dir: None,
            jpeg_quality: 100,
            memes_dir: None,
            gallery_root: None,
            gallery_relative_path: "DCIM/MemeMaster".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    text: Option<TextSettings>,
    sticker: Option<StickerSettings>,
    export: Option<ExportSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TextSettings {
    size: Option<f32>,
    default_color: Option<String>,
    shadow_radius: Option<f32>,
    shadow_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StickerSettings {
    base_width: Option<f32>,
    resource_dir: Option<String>,
    remote_cache_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSettings {
    jpeg_quality: Option<u8>,
    memes_dir: Option<String>,
    gallery_root: Option<String>,
    gallery_relative_path: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    pub fn memes_dir(&self) -> PathBuf {
        self.memes_dir.clone().unwrap_or_else(paths::memes_dir)
    }

    pub fn sticker_resource_dir(&self) -> PathBuf {
        self.sticker_resource_dir
            .clone()
            .unwrap_or_else(paths::sticker_resource_dir)
    }

    pub fn remote_cache_dir(&self) -> PathBuf {
        self.remote_cache_dir
            .clone()
            .unwrap_or_else(paths::remote_sticker_cache_dir)
    }

    pub fn gallery_root(&self) -> PathBuf {
        self.gallery_root.clone().unwrap_or_else(paths::gallery_root)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(text) = incoming.text {
            if let Some(size) = text.size {
                if size > 0.0 {
                    self.text_size = size;
                }
            }
            if let Some(color) = non_empty(text.default_color) {
                self.text_default_color = color.parse()?;
            }
            if let Some(radius) = text.shadow_radius {
                if radius >= 0.0 {
                    self.shadow_radius = radius;
                }
            }
            if let Some(color) = non_empty(text.shadow_color) {
                self.shadow_color = color.parse()?;
            }
            if let Some(family) = non_empty(text.font_family) {
                self.font_family = Some(family);
            }
            if let Some(path) = text.font_path.as_deref().and_then(paths::normalize_dir) {
                self.font_path = Some(path);
            }
        }
        if let Some(sticker) = incoming.sticker {
            if let Some(width) = sticker.base_width {
                if width > 0.0 {
                    self.sticker_base_width = width;
                }
            }
            if let Some(dir) = sticker.resource_dir.as_deref().and_then(paths::normalize_dir) {
                self.sticker_resource_dir = Some(dir);
            }
            if let Some(dir) = sticker
                .remote_cache_dir
                .as_deref()
                .and_then(paths::normalize_dir)
            {
                self.remote_cache_dir = Some(dir);
            }
        }
        if let Some(export) = incoming.export {
            if let Some(quality) = export.jpeg_quality {
                if (1..=100).contains(&quality) {
                    self.jpeg_quality = quality;
                }
            }
            if let Some(dir) = export.memes_dir.as_deref().and_then(paths::normalize_dir) {
                self.memes_dir = Some(dir);
            }
            if let Some(dir) = export.gallery_root.as_deref().and_then(paths::normalize_dir) {
                self.gallery_root = Some(dir);
            }
            if let Some(relative) = non_empty(export.gallery_relative_path) {
                self.gallery_relative_path = relative.trim_matches('/').to_string();
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::settings_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn bundled_defaults_match_builtin_defaults() {
        let mut settings = Settings::default();
        settings.merge_str(DEFAULT_SETTINGS_TOML).expect("merge");
        let builtin = Settings::default();
        assert_eq!(settings.text_size, builtin.text_size);
        assert_eq!(settings.text_default_color, builtin.text_default_color);
        assert_eq!(settings.shadow_radius, builtin.shadow_radius);
        assert_eq!(settings.sticker_base_width, builtin.sticker_base_width);
        assert_eq!(settings.jpeg_quality, 100);
        assert_eq!(settings.gallery_relative_path, "DCIM/MemeMaster");
        assert!(settings.font_path.is_none());
        assert!(settings.memes_dir.is_none());
    }

    #[test]
    fn later_layers_override_and_invalid_values_are_ignored() {
        let mut settings = Settings::default();
        settings
            .merge_str(
                r##"
                [text]
                size = 32.0
                shadow_color = "#202020"
                [sticker]
                base_width = -5.0
                [export]
                jpeg_quality = 0
                gallery_relative_path = "/Pictures/Memes/"
                "##,
            )
            .expect("merge");
        assert_eq!(settings.text_size, 32.0);
        assert_eq!(settings.shadow_color, TextColor::rgb(0x20, 0x20, 0x20));
        assert_eq!(settings.sticker_base_width, 100.0);
        assert_eq!(settings.jpeg_quality, 100);
        assert_eq!(settings.gallery_relative_path, "Pictures/Memes");
    }

    #[test]
    fn bad_color_is_an_error() {
        let mut settings = Settings::default();
        let err = settings
            .merge_str("[text]\ndefault_color = \"white\"\n")
            .expect_err("bad color");
        assert!(err.to_string().contains("white"));
    }

    #[test]
    fn load_settings_seeds_home_and_reads_extra_file() {
        with_temp_home(|home| {
            let extra = home.join("extra.toml");
            fs::write(&extra, "[export]\nmemes_dir = \"~/saved\"\n").expect("write extra");
            let settings = load_settings(Some(&extra)).expect("load");
            assert!(home.join(".meme-forge/settings.toml").exists());
            assert_eq!(settings.memes_dir(), home.join("saved"));

            let missing = home.join("missing.toml");
            assert!(load_settings(Some(&missing)).is_err());
        });
    }
}
