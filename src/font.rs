use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::settings::Settings;

/// Deterministic width factors used when no typeface could be measured.
/// Layout must stay computable on headless workers with no fonts at all.
pub const FALLBACK_GLYPH_FACTOR: f32 = 0.45;
pub const FALLBACK_SPACE_FACTOR: f32 = 0.2;

static REGISTRY: OnceLock<Option<BrandFont>> = OnceLock::new();

/// The brand typeface, loaded once per process. `None` when neither the
/// configured font nor a system sans-serif could be resolved; every consumer
/// then falls back to estimated widths.
pub fn brand_font(settings: &Settings) -> Option<&'static BrandFont> {
    REGISTRY
        .get_or_init(|| match resolve_brand_font(settings) {
            Ok(font) => Some(font),
            Err(err) => {
                tracing::warn!("no usable typeface, using estimated metrics: {err}");
                None
            }
        })
        .as_ref()
}

pub struct BrandFont {
    pub metrics: FontMetrics,
    pub family: String,
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
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

    /// Glyph-advance width of one word (no internal whitespace) in px.
    pub fn word_width_px(&self, word: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return fallback_word_width_px(word, font_size);
        };
        let mut advance = 0u32;
        for ch in word.chars() {
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * (font_size / self.units_per_em.max(1) as f32)
    }

    pub fn space_width_px(&self, font_size: f32) -> f32 {
        self.space_advance as f32 * (font_size / self.units_per_em.max(1) as f32)
    }
}

pub fn word_width_px(word: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(metrics) => metrics.word_width_px(word, font_size),
        None => fallback_word_width_px(word, font_size),
    }
}

pub fn space_width_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(metrics) => metrics.space_width_px(font_size),
        None => font_size * FALLBACK_SPACE_FACTOR,
    }
}

fn fallback_word_width_px(word: &str, font_size: f32) -> f32 {
    word.chars().count() as f32 * font_size * FALLBACK_GLYPH_FACTOR
}

fn resolve_brand_font(settings: &Settings) -> Result<BrandFont> {
    if let Some(path) = settings.font_path.as_deref() {
        let metrics = load_font_metrics(Path::new(path))?;
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .or_else(|| settings.font_family.clone())
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(BrandFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = settings.font_family.as_deref() {
        if let Ok(font) = load_from_family(&db, family) {
            return Ok(font);
        }
    }
    load_from_family(&db, "sans-serif")
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn load_from_family(db: &fontdb::Database, family: &str) -> Result<BrandFont> {
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
    let (data, _index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = load_font_metrics_from_data(&data, Some(family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(BrandFont {
        metrics,
        family: resolved_family,
    })
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(data, index) else {
            continue;
        };
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
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_width_is_length_times_factor() {
        let width = word_width_px("YUICHIRO", 100.0, None);
        assert_eq!(width, 8.0 * 100.0 * 0.45);
    }

    #[test]
    fn fallback_space_is_fifth_of_font_size() {
        assert_eq!(space_width_px(100.0, None), 20.0);
        assert_eq!(space_width_px(30.0, None), 6.0);
    }
}
