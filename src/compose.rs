use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::card::{GradientPosition, LayoutRun, Point, RenderRequest, RunColor};
use crate::font::BrandFont;
use crate::settings::Settings;

const WATERMARK_FONT_SIZE: f32 = 28.0;
const WATERMARK_BOTTOM_MARGIN: f32 = 60.0;
const SHADOW_BLUR: f32 = 4.0;
const GRADIENT_MAX_OPACITY: f32 = 0.9;

/// Anchor for the text block when the caller did not override it: centered
/// horizontally, inside the darkened band.
pub fn default_text_position(settings: &Settings, gradient: GradientPosition) -> Point {
    let width = settings.canvas_width as f32;
    let height = settings.canvas_height as f32;
    match gradient {
        GradientPosition::Bottom => Point::new(width / 2.0, height * 0.72),
        GradientPosition::Top => Point::new(width / 2.0, height * 0.08),
    }
}

/// Paint all layers over the fixed canvas and encode the raster as PNG.
/// Layer order is fixed: background transform, darkening gradient, text runs,
/// watermark. A failure at any point is an error, never a blank canvas.
pub fn compose(
    source: &RgbaImage,
    layout: &[LayoutRun],
    font_size: f32,
    request: &RenderRequest,
    settings: &Settings,
    font: Option<&BrandFont>,
) -> Result<Vec<u8>> {
    let width = settings.canvas_width;
    let height = settings.canvas_height;
    let svg = build_svg(source, layout, font_size, request, settings, font)?;
    rasterize(&svg, width, height, font)
}

fn build_svg(
    source: &RgbaImage,
    layout: &[LayoutRun],
    font_size: f32,
    request: &RenderRequest,
    settings: &Settings,
    font: Option<&BrandFont>,
) -> Result<String> {
    let width = settings.canvas_width as f32;
    let height = settings.canvas_height as f32;
    let family = font.map(|font| font.family.as_str()).unwrap_or("sans-serif");

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));

    svg.push_str("<defs>");
    let (y1, y2) = match request.gradient_position {
        GradientPosition::Bottom => ("0", "1"),
        GradientPosition::Top => ("1", "0"),
    };
    svg.push_str(&format!(
        r##"<linearGradient id="shade" x1="0" y1="{y1}" x2="0" y2="{y2}"><stop offset="0" stop-color="#000000" stop-opacity="0"/><stop offset="1" stop-color="#000000" stop-opacity="{opacity}"/></linearGradient>"##,
        y1 = y1,
        y2 = y2,
        opacity = GRADIENT_MAX_OPACITY
    ));
    svg.push_str(&format!(
        r##"<filter id="shadow" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="0" dy="2" stdDeviation="{blur}" flood-color="#000000" flood-opacity="1"/></filter>"##,
        blur = SHADOW_BLUR
    ));
    svg.push_str("</defs>");

    // Background, crop-to-fill with the caller's pan/zoom applied.
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(anyhow!("source image has zero dimensions"));
    }
    let cover = (width / src_w as f32).max(height / src_h as f32) * request.scale.max(0.01);
    let draw_w = src_w as f32 * cover;
    let draw_h = src_h as f32 * cover;
    let draw_x = (width - draw_w) / 2.0 + request.position.x;
    let draw_y = (height - draw_h) / 2.0 + request.position.y;
    let background = encode_png(source)?;
    svg.push_str(&format!(
        r#"<image href="data:image/png;base64,{uri}" xlink:href="data:image/png;base64,{uri}" x="{x}" y="{y}" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = BASE64.encode(&background),
        x = draw_x,
        y = draw_y,
        w = draw_w,
        h = draw_h
    ));

    if request.apply_gradient {
        let band = height / 3.0;
        let band_y = match request.gradient_position {
            GradientPosition::Bottom => height - band,
            GradientPosition::Top => 0.0,
        };
        svg.push_str(&format!(
            r#"<rect x="0" y="{y}" width="{w}" height="{h}" fill="url(#shade)"/>"#,
            y = band_y,
            w = width,
            h = band
        ));
    }

    if request.apply_text {
        for run in layout {
            let fill = match run.color_class {
                RunColor::Normal => settings.text_color.as_str(),
                RunColor::Accent => settings.accent_color.as_str(),
            };
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" font-weight="bold" fill="{fill}" dominant-baseline="text-before-edge" filter="url(#shadow)">{word}</text>"#,
                x = run.x,
                y = run.y,
                size = font_size,
                family = escape_xml(family),
                fill = fill,
                word = escape_xml(&run.word)
            ));
        }
    }

    if request.apply_watermark {
        let anchor = request
            .watermark_position
            .unwrap_or(Point::new(width / 2.0, height - WATERMARK_BOTTOM_MARGIN));
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" font-weight="bold" fill="{fill}" fill-opacity="0.85" text-anchor="middle" filter="url(#shadow)">{text}</text>"#,
            x = anchor.x,
            y = anchor.y,
            size = WATERMARK_FONT_SIZE,
            family = escape_xml(family),
            fill = settings.text_color,
            text = escape_xml(&settings.watermark)
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}

fn rasterize(svg: &str, width: u32, height: u32, font: Option<&BrandFont>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(font) = font {
        db.load_font_data(font.metrics.data().to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse card SVG")?;
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| anyhow!("empty canvas size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let raster = RgbaImage::from_raw(width, height, pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build canvas buffer"))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(raster)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .with_context(|| "failed to encode card PNG")?;
    Ok(bytes)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut cursor, image::ImageFormat::Png)
        .with_context(|| "failed to encode source for embedding")?;
    Ok(bytes)
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
    use crate::card::RenderRequest;
    use image::Rgba;

    fn small_source() -> RgbaImage {
        RgbaImage::from_pixel(120, 90, Rgba([20, 60, 140, 255]))
    }

    #[test]
    fn composed_card_matches_canvas_size() {
        let settings = Settings::default();
        let request = RenderRequest::new("ignored");
        let bytes = compose(&small_source(), &[], 100.0, &request, &settings, None).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 1080);
        assert_eq!(decoded.height(), 1350);
    }

    #[test]
    fn gradient_darkens_the_bottom_band() {
        let settings = Settings::default();
        let mut request = RenderRequest::new("ignored");
        request.apply_text = false;
        request.apply_watermark = false;

        request.apply_gradient = false;
        let plain = compose(&small_source(), &[], 100.0, &request, &settings, None).unwrap();
        request.apply_gradient = true;
        let shaded = compose(&small_source(), &[], 100.0, &request, &settings, None).unwrap();

        let plain = image::load_from_memory(&plain).unwrap().to_rgba8();
        let shaded = image::load_from_memory(&shaded).unwrap().to_rgba8();
        let probe = |img: &RgbaImage| {
            let pixel = img.get_pixel(540, 1340);
            pixel[0] as u32 + pixel[1] as u32 + pixel[2] as u32
        };
        assert!(probe(&shaded) < probe(&plain));
        // Top edge is untouched by a bottom gradient.
        assert_eq!(plain.get_pixel(540, 10), shaded.get_pixel(540, 10));
    }

    #[test]
    fn svg_defs_carry_opaque_black_shade_and_shadow() {
        let settings = Settings::default();
        let request = RenderRequest::new("ignored");
        let svg = build_svg(&small_source(), &[], 100.0, &request, &settings, None).unwrap();
        assert!(svg.contains(r##"stop-color="#000000""##));
        assert!(svg.contains(r##"flood-color="#000000""##));
        assert!(svg.contains("url(#shade)"));
    }

    #[test]
    fn default_text_anchor_tracks_gradient_edge() {
        let settings = Settings::default();
        let bottom = default_text_position(&settings, GradientPosition::Bottom);
        let top = default_text_position(&settings, GradientPosition::Top);
        assert_eq!(bottom.x, 540.0);
        assert!(bottom.y > settings.canvas_height as f32 * 2.0 / 3.0);
        assert!(top.y < settings.canvas_height as f32 / 3.0);
    }

    #[test]
    fn svg_escapes_editorial_text() {
        assert_eq!(escape_xml(r#"<A & "B">"#), "&lt;A &amp; &quot;B&quot;&gt;");
    }
}
