use crate::card::{LayoutRun, Point, RunColor};
use crate::font::{self, FontMetrics};

pub const BASE_FONT_SIZE: f32 = 100.0;
pub const MIN_FONT_SIZE: f32 = 30.0;
const SHRINK_STEP: f32 = 0.9;

pub fn font_size_for_scale(text_scale: f32) -> f32 {
    (BASE_FONT_SIZE * text_scale).max(MIN_FONT_SIZE)
}

pub fn default_line_spacing(text_scale: f32) -> f32 {
    font_size_for_scale(text_scale) * 1.2
}

pub struct LayoutParams<'a> {
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub text_scale: f32,
    pub base_position: Point,
    pub line_spacing: f32,
    pub purple_word_indices: &'a [usize],
    pub disable_auto_scaling: bool,
    pub font: Option<&'a FontMetrics>,
}

/// Place every word of the headline and title line groups. Pure: same inputs
/// (including font availability) always yield the same coordinates, and no
/// pixels are touched here.
///
/// Each line is centered as a whole on `base_position.x`; words inside it run
/// left to right. When auto-scaling is on and the widest line overflows the
/// canvas, the whole layout is recomputed at a smaller scale until it fits or
/// the minimum font size is reached. Words are never truncated; a line still
/// overflowing at the floor is emitted as-is and may clip.
pub fn layout(
    headline_lines: &[String],
    title_lines: &[String],
    params: &LayoutParams<'_>,
) -> Vec<LayoutRun> {
    layout_with_size(headline_lines, title_lines, params).0
}

/// Like [`layout`], but also reports the effective font size after
/// auto-scaling so the compositor draws at the size the widths were measured
/// with.
pub fn layout_with_size(
    headline_lines: &[String],
    title_lines: &[String],
    params: &LayoutParams<'_>,
) -> (Vec<LayoutRun>, f32) {
    let lines: Vec<Vec<&str>> = headline_lines
        .iter()
        .chain(title_lines.iter())
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|words| !words.is_empty())
        .collect();
    if lines.is_empty() {
        return (Vec::new(), font_size_for_scale(params.text_scale));
    }

    let mut scale = params.text_scale;
    loop {
        let font_size = font_size_for_scale(scale);
        let (runs, widest) = place_lines(&lines, font_size, params);
        let fits = widest <= params.canvas_width;
        if params.disable_auto_scaling || fits || font_size <= MIN_FONT_SIZE {
            return (runs, font_size);
        }
        scale *= SHRINK_STEP;
    }
}

fn place_lines(
    lines: &[Vec<&str>],
    font_size: f32,
    params: &LayoutParams<'_>,
) -> (Vec<LayoutRun>, f32) {
    let space = font::space_width_px(font_size, params.font);
    let mut runs = Vec::new();
    let mut widest = 0.0f32;
    let mut word_index = 0usize;

    for (line_index, words) in lines.iter().enumerate() {
        let widths: Vec<f32> = words
            .iter()
            .map(|word| font::word_width_px(word, font_size, params.font))
            .collect();
        let total: f32 =
            widths.iter().sum::<f32>() + (words.len().saturating_sub(1)) as f32 * space;
        widest = widest.max(total);

        let mut x = params.base_position.x - total / 2.0;
        let y = params.base_position.y + line_index as f32 * params.line_spacing;
        for (word, width) in words.iter().zip(&widths) {
            let color_class = if params.purple_word_indices.contains(&word_index) {
                RunColor::Accent
            } else {
                RunColor::Normal
            };
            runs.push(LayoutRun {
                line: line_index,
                word: (*word).to_string(),
                x,
                y,
                width_px: *width,
                color_class,
            });
            x += width + space;
            word_index += 1;
        }
    }

    (runs, widest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(canvas_width: f32) -> LayoutParams<'static> {
        LayoutParams {
            canvas_width,
            canvas_height: 1350.0,
            text_scale: 1.0,
            base_position: Point::new(canvas_width / 2.0, 900.0),
            line_spacing: 120.0,
            purple_word_indices: &[],
            disable_auto_scaling: false,
            font: None,
        }
    }

    fn line_width(runs: &[LayoutRun], line: usize) -> f32 {
        let words: Vec<&LayoutRun> = runs.iter().filter(|run| run.line == line).collect();
        let first = words.first().unwrap();
        let last = words.last().unwrap();
        last.x + last.width_px - first.x
    }

    #[test]
    fn headline_then_title_scenario() {
        let headline = vec!["SCUM OF THE BRAVE CASTS YUICHIRO".to_string()];
        let title = vec!["UMEHARA, KATSUYUKI".to_string()];
        let params = params(10_000.0);
        let runs = layout(&headline, &title, &params);

        assert_eq!(runs.iter().filter(|run| run.line == 0).count(), 6);
        assert_eq!(runs.iter().filter(|run| run.line == 1).count(), 2);

        let y0 = runs.iter().find(|run| run.line == 0).unwrap().y;
        let y1 = runs.iter().find(|run| run.line == 1).unwrap().y;
        assert_eq!(y1, y0 + 120.0);

        // 6 words, 27 glyphs total, font size 100, fallback metrics.
        let expected = 27.0 * 100.0 * 0.45 + 5.0 * 20.0;
        assert!((line_width(&runs, 0) - expected).abs() < 1e-3);
    }

    #[test]
    fn lines_are_centered_on_base_x() {
        let headline = vec!["BRAND NEW VISUAL REVEALED".to_string()];
        let params = params(10_000.0);
        let runs = layout(&headline, &[], &params);
        let first = runs.first().unwrap();
        let midpoint = first.x + line_width(&runs, 0) / 2.0;
        assert!((midpoint - params.base_position.x).abs() < 1e-3);
    }

    #[test]
    fn accent_indices_count_across_line_groups() {
        let headline = vec!["ONE TWO THREE".to_string()];
        let title = vec!["FOUR FIVE".to_string()];
        let mut params = params(10_000.0);
        params.purple_word_indices = &[1, 3];
        let runs = layout(&headline, &title, &params);

        let colors: Vec<RunColor> = runs.iter().map(|run| run.color_class).collect();
        assert_eq!(
            colors,
            vec![
                RunColor::Normal,
                RunColor::Accent,
                RunColor::Normal,
                RunColor::Accent,
                RunColor::Normal,
            ]
        );
        assert_eq!(runs[3].word, "FOUR");
        assert_eq!(runs[3].line, 1);
    }

    #[test]
    fn auto_scaling_shrinks_until_the_line_fits() {
        let headline = vec!["A VERY LONG HEADLINE THAT CANNOT FIT AT FULL SIZE".to_string()];
        let mut params = params(1080.0);
        params.base_position = Point::new(540.0, 900.0);
        let runs = layout(&headline, &[], &params);
        assert!(line_width(&runs, 0) <= 1080.0 + 1e-3);

        params.disable_auto_scaling = true;
        let unscaled = layout(&headline, &[], &params);
        assert!(line_width(&unscaled, 0) > 1080.0);
    }

    #[test]
    fn shrink_stops_at_the_floor_without_truncating() {
        let headline =
            vec!["AN ABSURDLY LONG HEADLINE THAT OVERFLOWS EVEN AT THE MINIMUM FONT SIZE AND THEN SOME MORE WORDS".to_string()];
        let mut params = params(200.0);
        params.base_position = Point::new(100.0, 900.0);
        let word_count = headline[0].split_whitespace().count();
        let runs = layout(&headline, &[], &params);
        // Every word survives; the line is wider than the canvas.
        assert_eq!(runs.len(), word_count);
        assert!(line_width(&runs, 0) > 200.0);
    }

    #[test]
    fn font_size_floors_at_thirty() {
        assert_eq!(font_size_for_scale(0.1), 30.0);
        assert_eq!(font_size_for_scale(1.0), 100.0);
        assert_eq!(font_size_for_scale(1.5), 150.0);
    }

    #[test]
    fn layout_is_deterministic() {
        let headline = vec!["SAME INPUT SAME OUTPUT".to_string()];
        let params = params(1080.0);
        let first = layout(&headline, &[], &params);
        let second = layout(&headline, &[], &params);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_lines_are_dropped() {
        let headline = vec!["".to_string(), "   ".to_string()];
        let title = vec!["TITLE".to_string()];
        let params = params(1080.0);
        let runs = layout(&headline, &title, &params);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].line, 0);
    }
}
