use anyhow::{Context, Result};
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree};

use super::font::{FontMetrics, TextFonts, ascent_px, descent_px, measure_text_width_px};
use crate::overlay::TextColor;

const LINE_SPACING: f32 = 1.2;

/// Placement of a text block in its own coordinate space, where `(0, 0)` is
/// the top-left of the first line and lengths are physical on-screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextLayout {
    pub font_size: f32,
    pub baseline: f32,
    pub line_height: f32,
    pub width: f32,
    pub height: f32,
    pub shadow_sigma: f32,
    /// Room kept around the block so the shadow is not cut off.
    pub margin: f32,
}

pub(crate) fn layout_text(
    content: &str,
    font_size: f32,
    shadow_radius: f32,
    font: Option<&FontMetrics>,
) -> TextLayout {
    let ascent = ascent_px(font_size, font);
    let descent = descent_px(font_size, font);
    let line_height = (ascent + descent).max(font_size) * LINE_SPACING;
    let lines: Vec<&str> = content.lines().collect();
    let line_count = lines.len().max(1) as f32;
    let width = lines
        .iter()
        .map(|line| measure_text_width_px(line, font_size, font))
        .fold(0.0, f32::max);
    let shadow_sigma = shadow_radius.max(0.0) / 2.0;
    TextLayout {
        font_size,
        baseline: ascent,
        line_height,
        width: width.max(1.0),
        height: ascent + descent + line_height * (line_count - 1.0),
        shadow_sigma,
        margin: (shadow_sigma * 3.0).ceil() + font_size * 0.5,
    }
}

pub(crate) fn text_svg(
    content: &str,
    color: TextColor,
    shadow: TextColor,
    layout: &TextLayout,
    family: &str,
) -> String {
    let m = layout.margin;
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="{x} {y} {w} {h}">"#,
        x = -m,
        y = -m,
        w = layout.width + m * 2.0,
        h = layout.height + m * 2.0,
    ));
    let filter_attr = if layout.shadow_sigma > 0.0 {
        svg.push_str(&format!(
            r#"<filter id="shadow" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="0" dy="0" stdDeviation="{sigma}" flood-color="{color}" flood-opacity="{opacity}"/></filter>"#,
            sigma = layout.shadow_sigma,
            color = shadow.hex_rgb(),
            opacity = shadow.opacity(),
        ));
        r#" filter="url(#shadow)""#
    } else {
        ""
    };
    svg.push_str(&format!(
        r#"<text x="0" y="{y}" font-size="{size}" font-family="{family}" fill="{fill}" fill-opacity="{opacity}" xml:space="preserve"{filter}>"#,
        y = layout.baseline,
        size = layout.font_size,
        family = escape_xml(family),
        fill = color.hex_rgb(),
        opacity = color.opacity(),
        filter = filter_attr,
    ));
    // Absolute baselines: an empty tspan contributes no `dy`, so relative
    // offsets would pull lines after a blank one upward.
    for (idx, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        svg.push_str(&format!(
            r#"<tspan x="0" y="{y}">{text}</tspan>"#,
            y = layout.baseline + layout.line_height * idx as f32,
            text = escape_xml(line)
        ));
    }
    svg.push_str("</text></svg>");
    svg
}

/// Rasterizes `svg` onto `canvas`; `transform` maps the text block's
/// top-left to the overlay anchor.
pub(crate) fn draw_text(
    canvas: &mut Pixmap,
    svg: &str,
    layout: &TextLayout,
    fonts: &TextFonts,
    transform: Transform,
) -> Result<()> {
    let options = Options {
        fontdb: fonts.db.clone(),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse text overlay")?;
    let transform = transform.pre_translate(-layout.margin, -layout.margin);
    resvg::render(&tree, transform, &mut canvas.as_mut());
    Ok(())
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_sits_one_ascent_below_the_anchor() {
        let layout = layout_text("Hello", 56.0, 4.0, None);
        assert_eq!(layout.baseline, ascent_px(56.0, None));
        assert_eq!(layout.font_size, 56.0);
        assert_eq!(layout.shadow_sigma, 2.0);
        assert!(layout.width > 0.0);
    }

    #[test]
    fn multi_line_text_grows_downward() {
        let one = layout_text("top", 20.0, 0.0, None);
        let two = layout_text("top\nbottom", 20.0, 0.0, None);
        assert!((two.height - one.height - two.line_height).abs() < 1e-4);
    }

    #[test]
    fn svg_escapes_content_and_carries_colors() {
        let layout = layout_text("<b>&\"", 28.0, 2.0, None);
        let svg = text_svg(
            "<b>&\"",
            TextColor::rgba(255, 0, 0, 128),
            TextColor::BLACK,
            &layout,
            "Sans & Co",
        );
        assert!(svg.contains("&lt;b&gt;&amp;&quot;"));
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains(r#"font-family="Sans &amp; Co""#));
        assert!(svg.contains("feDropShadow"));
    }

    #[test]
    fn blank_lines_keep_their_height() {
        let layout = layout_text("\n\nLOW", 20.0, 0.0, None);
        let svg = text_svg("\n\nLOW", TextColor::WHITE, TextColor::BLACK, &layout, "sans-serif");
        let third = layout.baseline + layout.line_height * 2.0;
        assert!(svg.contains(&format!(r#"<tspan x="0" y="{third}">LOW</tspan>"#)), "{svg}");
        assert_eq!(svg.matches("<tspan").count(), 1);
        assert!((layout.height - (third + descent_px(20.0, None))).abs() < 1e-3);
    }

    #[test]
    fn zero_radius_skips_the_shadow_filter() {
        let layout = layout_text("plain", 28.0, 0.0, None);
        let svg = text_svg("plain", TextColor::WHITE, TextColor::BLACK, &layout, "sans-serif");
        assert!(!svg.contains("filter"));
        let tree = Tree::from_str(&svg, &Options::default());
        assert!(tree.is_ok());
    }
}
