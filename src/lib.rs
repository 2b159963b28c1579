use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;

pub mod card;
pub mod compose;
pub mod fetch;
pub mod font;
pub mod layout;
pub mod logging;
pub mod render;
pub mod safety;
pub mod server;
pub mod settings;
pub mod storage;

pub use card::{
    Classification, GradientPosition, ImageSettings, LayoutRun, Point, ProcessedImage,
    RenderRequest, RenderResult, RunColor,
};
pub use render::{RenderError, Renderer};
pub use storage::{ObjectStore, S3Store, UnconfiguredStore};

#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub title: String,
    pub headline: String,
    pub slug: String,
    pub scale: f32,
    pub position_x: f32,
    pub position_y: f32,
    pub text_scale: f32,
    pub no_text: bool,
    pub no_gradient: bool,
    pub no_watermark: bool,
    pub gradient_top: bool,
    pub purple_words: Vec<usize>,
    pub disable_auto_scaling: bool,
    pub bypass_safety: bool,
    pub recipe_path: Option<String>,
    pub settings_path: Option<String>,
    pub out: Option<String>,
    pub upload: bool,
}

/// One-shot CLI render. Returns what should be printed: the storage URL, the
/// written file path, or the inline base64 payload.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let mut request = RenderRequest::new(config.source_url.clone());
    request.anime_title = config.title.clone();
    request.headline = config.headline.clone();
    request.slug = config.slug.clone();
    request.scale = config.scale;
    request.position = Point::new(config.position_x, config.position_y);
    request.apply_text = !config.no_text;
    request.apply_gradient = !config.no_gradient;
    request.apply_watermark = !config.no_watermark;
    request.gradient_position = if config.gradient_top {
        GradientPosition::Top
    } else {
        GradientPosition::Bottom
    };
    request.text_scale = config.text_scale;
    request.purple_word_indices = config.purple_words.clone();
    request.disable_auto_scaling = config.disable_auto_scaling;
    request.bypass_safety = config.bypass_safety;
    request.skip_upload = !config.upload;

    if let Some(path) = config.recipe_path.as_deref() {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read recipe: {path}"))?;
        let recipe: ImageSettings = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse recipe: {path}"))?;
        request = request.with_settings(&recipe);
    }

    if config.upload && settings.storage.is_none() {
        return Err(anyhow!(
            "--upload requires a [storage] section or NEWSCARD_STORAGE_* environment"
        ));
    }

    let renderer = build_renderer(settings)?;
    let result = renderer
        .render(&request)
        .await
        .map_err(|err| anyhow!("{} ({})", err.reason(), err))?;

    match (config.out.as_deref(), &result.processed_image) {
        (Some(path), ProcessedImage::Inline(encoded)) => {
            let bytes = BASE64.decode(encoded).context("inline payload is not base64")?;
            std::fs::write(path, bytes)
                .with_context(|| format!("failed to write card: {path}"))?;
            Ok(path.to_string())
        }
        (Some(path), ProcessedImage::Url(url)) => {
            // Uploaded and also requested locally; report both.
            Ok(format!("{url}\n{path} not written (card was uploaded)"))
        }
        (None, ProcessedImage::Url(url)) => Ok(url.clone()),
        (None, ProcessedImage::Inline(encoded)) => Ok(encoded.clone()),
    }
}

/// Renderer over whatever storage is configured; preview-only deployments
/// get a store that refuses to persist.
pub fn build_renderer(settings: settings::Settings) -> Result<Renderer<Box<dyn ObjectStore>>> {
    let store: Box<dyn ObjectStore> = match settings.storage.as_ref() {
        Some(storage) => Box::new(S3Store::new(storage)),
        None => Box::new(UnconfiguredStore),
    };
    Ok(Renderer::new(settings, store))
}
