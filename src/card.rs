use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Clean,
    Unsafe,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientPosition {
    Top,
    #[default]
    Bottom,
}

/// One render invocation. Built by the caller, immutable for the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub source_url: String,
    #[serde(default)]
    pub anime_title: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default = "default_unit")]
    pub scale: f32,
    #[serde(default)]
    pub position: Point,
    #[serde(default = "default_true")]
    pub apply_text: bool,
    #[serde(default = "default_true")]
    pub apply_gradient: bool,
    #[serde(default = "default_true")]
    pub apply_watermark: bool,
    #[serde(default)]
    pub gradient_position: GradientPosition,
    #[serde(default = "default_unit")]
    pub text_scale: f32,
    #[serde(default)]
    pub text_position: Option<Point>,
    #[serde(default)]
    pub purple_word_indices: Vec<usize>,
    #[serde(default)]
    pub watermark_position: Option<Point>,
    #[serde(default)]
    pub disable_auto_scaling: bool,
    #[serde(default)]
    pub classification: Option<Classification>,
    #[serde(default)]
    pub bypass_safety: bool,
    #[serde(default)]
    pub skip_upload: bool,
}

fn default_unit() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl RenderRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            anime_title: String::new(),
            headline: String::new(),
            slug: String::new(),
            scale: 1.0,
            position: Point::default(),
            apply_text: true,
            apply_gradient: true,
            apply_watermark: true,
            gradient_position: GradientPosition::default(),
            text_scale: 1.0,
            text_position: None,
            purple_word_indices: Vec::new(),
            watermark_position: None,
            disable_auto_scaling: false,
            classification: None,
            bypass_safety: false,
            skip_upload: false,
        }
    }

    /// Replay a persisted recipe over this request. Text fields and the
    /// safety/upload flags stay as the caller set them.
    pub fn with_settings(mut self, settings: &ImageSettings) -> Self {
        self.scale = settings.image_scale;
        self.position = settings.image_position;
        self.apply_text = settings.is_apply_text;
        self.apply_gradient = settings.is_apply_gradient;
        self.apply_watermark = settings.is_apply_watermark;
        self.gradient_position = settings.gradient_position;
        self.text_scale = settings.text_scale;
        self.text_position = settings.text_position;
        self.purple_word_indices = settings.purple_word_indices.clone();
        self.watermark_position = settings.watermark_position;
        self
    }
}

/// The durable recipe stored next to a content record: everything that
/// affects pixels except the source image and the text itself. Re-rendering
/// the same background with the same recipe reproduces the same card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    #[serde(default = "default_unit")]
    pub image_scale: f32,
    #[serde(default)]
    pub image_position: Point,
    #[serde(default = "default_true")]
    pub is_apply_text: bool,
    #[serde(default = "default_true")]
    pub is_apply_gradient: bool,
    #[serde(default = "default_true")]
    pub is_apply_watermark: bool,
    #[serde(default)]
    pub gradient_position: GradientPosition,
    #[serde(default = "default_unit")]
    pub text_scale: f32,
    #[serde(default)]
    pub text_position: Option<Point>,
    #[serde(default)]
    pub purple_word_indices: Vec<usize>,
    #[serde(default)]
    pub watermark_position: Option<Point>,
}

impl ImageSettings {
    pub fn from_request(request: &RenderRequest) -> Self {
        Self {
            image_scale: request.scale,
            image_position: request.position,
            is_apply_text: request.apply_text,
            is_apply_gradient: request.apply_gradient,
            is_apply_watermark: request.apply_watermark,
            gradient_position: request.gradient_position,
            text_scale: request.text_scale,
            text_position: request.text_position,
            purple_word_indices: request.purple_word_indices.clone(),
            watermark_position: request.watermark_position,
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self::from_request(&RenderRequest::new(""))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunColor {
    Normal,
    Accent,
}

/// One positioned, colored word ready to be drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRun {
    pub line: usize,
    pub word: String,
    pub x: f32,
    pub y: f32,
    pub width_px: f32,
    pub color_class: RunColor,
}

/// Outbound-only: both variants serialize as a bare string (URL or base64),
/// so the type deliberately has no `Deserialize` — the two shapes are not
/// distinguishable on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProcessedImage {
    Url(String),
    Inline(String),
}

impl ProcessedImage {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            ProcessedImage::Url(url) => Some(url),
            ProcessedImage::Inline(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&str> {
        match self {
            ProcessedImage::Inline(encoded) => Some(encoded),
            ProcessedImage::Url(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub processed_image: ProcessedImage,
    pub layout: Vec<LayoutRun>,
}
