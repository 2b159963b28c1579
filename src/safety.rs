use image::RgbaImage;

use crate::card::Classification;

/// Pluggable verdict over a decoded source image. Implementations are pure
/// inspections: no side effects, no failures. When a classifier cannot reach
/// a confident verdict it answers `Unknown`, never an error; the render
/// service decides what `Unknown` means.
pub trait Classify: Send + Sync {
    fn classify(&self, image: &RgbaImage) -> Classification;
}

/// Default best-effort heuristic. Degenerate frames are `Unknown`; otherwise
/// a sparse pixel grid is scored for skin-tone dominance and only an
/// overwhelming ratio is flagged `Unsafe`.
pub struct HeuristicClassifier {
    unsafe_ratio: f32,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self { unsafe_ratio: 0.72 }
    }
}

impl Classify for HeuristicClassifier {
    fn classify(&self, image: &RgbaImage) -> Classification {
        let (width, height) = image.dimensions();
        if width < 64 || height < 64 {
            return Classification::Unknown;
        }
        let aspect = width.max(height) as f32 / width.min(height) as f32;
        if aspect > 4.0 {
            return Classification::Unknown;
        }

        let step_x = (width / 64).max(1);
        let step_y = (height / 64).max(1);
        let mut sampled = 0u32;
        let mut skin = 0u32;
        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                let pixel = image.get_pixel(x, y);
                if pixel[3] >= 16 {
                    sampled += 1;
                    if is_skin_tone(pixel[0], pixel[1], pixel[2]) {
                        skin += 1;
                    }
                }
                x += step_x;
            }
            y += step_y;
        }

        if sampled == 0 {
            return Classification::Unknown;
        }
        if skin as f32 / sampled as f32 > self.unsafe_ratio {
            Classification::Unsafe
        } else {
            Classification::Clean
        }
    }
}

// RGB skin-tone rule from the classic Kovac color model.
fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let (rf, gf, bf) = (r as i16, g as i16, b as i16);
    r > 95
        && g > 40
        && b > 20
        && rf - gf > 15
        && rf > bf
        && (rf.max(gf).max(bf) - rf.min(gf).min(bf)) > 15
}
