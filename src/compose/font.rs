use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

// Used when no face is available; typical sans-serif proportions.
const FALLBACK_ASCENT_EM: f32 = 0.8;
const FALLBACK_DESCENT_EM: f32 = 0.2;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub struct ResolvedTextFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Font database plus the face used for text metrics.
pub(crate) struct TextFonts {
    pub(crate) db: Arc<fontdb::Database>,
    pub(crate) resolved: Option<ResolvedTextFont>,
}

impl TextFonts {
    pub(crate) fn load(font_path: Option<&Path>, font_family: Option<&str>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let resolved = match resolve_text_font(&db, font_path, font_family, fallback_fonts()) {
            Ok(resolved) => {
                db.load_font_data(resolved.metrics.data().to_vec());
                tracing::debug!(family = %resolved.family, "text font resolved");
                Some(resolved)
            }
            Err(err) => {
                tracing::warn!(error = %err, "no usable text font, using estimated metrics");
                None
            }
        };
        Self {
            db: Arc::new(db),
            resolved,
        }
    }

    pub(crate) fn metrics(&self) -> Option<&FontMetrics> {
        self.resolved.as_ref().map(|resolved| &resolved.metrics)
    }

    pub(crate) fn family(&self) -> &str {
        self.resolved
            .as_ref()
            .map(|resolved| resolved.family.as_str())
            .unwrap_or("sans-serif")
    }
}

#[cfg(target_os = "macos")]
fn fallback_fonts() -> &'static [&'static str] {
    &["Helvetica Neue", "Arial", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn fallback_fonts() -> &'static [&'static str] {
    &["Arial", "Segoe UI", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn fallback_fonts() -> &'static [&'static str] {
    &["Roboto", "NotoSans", "DejaVu Sans", "sans-serif"]
}

pub fn resolve_text_font(
    db: &fontdb::Database,
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedTextFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path)?;
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedTextFont { metrics, family });
    }

    if let Some(family) = font_family {
        return load_font_metrics_from_family(db, family);
    }

    for candidate in fallback {
        if let Ok(resolved) = load_font_metrics_from_family(db, candidate) {
            return Ok(resolved);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

/// Distance from the top of the line box to the baseline.
pub(crate) fn ascent_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(font) => font.ascender.max(0) as f32 * font_size / font.units_per_em.max(1) as f32,
        None => FALLBACK_ASCENT_EM * font_size,
    }
}

pub(crate) fn descent_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(font) => {
            (font.descender as f32).abs() * font_size / font.units_per_em.max(1) as f32
        }
        None => FALLBACK_DESCENT_EM * font_size,
    }
}

pub(crate) fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    let parsed = font.and_then(|font| {
        Face::parse(&font.data, font.face_index)
            .ok()
            .map(|face| (font, face))
    });
    let Some((font, face)) = parsed else {
        return text.chars().map(estimated_advance_em).sum::<f32>() * font_size;
    };
    let units: u32 = text
        .chars()
        .filter(|ch| *ch != '\n')
        .map(|ch| {
            face.glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(font.space_advance) as u32
        })
        .sum();
    units as f32 * font_size / font.units_per_em.max(1) as f32
}

// Caption text is mostly Latin capitals; anything else gets a full em.
fn estimated_advance_em(ch: char) -> f32 {
    match ch {
        '\n' => 0.0,
        ch if ch.is_whitespace() => 0.25,
        'A'..='Z' | '0'..='9' => 0.65,
        ch if ch.is_ascii() => 0.5,
        _ => 1.0,
    }
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                ascender: face.ascender(),
                descender: face.descender(),
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: &str,
) -> Result<ResolvedTextFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = load_font_metrics_from_data(&data, Some(family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedTextFont {
        metrics,
        family: resolved_family,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
