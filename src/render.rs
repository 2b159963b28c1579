use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::{debug, warn};

use crate::card::{Classification, ProcessedImage, RenderRequest, RenderResult};
use crate::compose;
use crate::fetch::fetch_source;
use crate::font;
use crate::layout::{self, LayoutParams};
use crate::safety::{Classify, HeuristicClassifier};
use crate::settings::Settings;
use crate::storage::ObjectStore;

/// Everything a render can fail with. Callers treat any of these as a null
/// result; `reason()` is the stable machine-readable string they log.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unsafe/unknown source, bypass not set")]
    SafetyBlocked,

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

impl RenderError {
    pub fn reason(&self) -> &'static str {
        match self {
            RenderError::Fetch(_) => "fetch failed",
            RenderError::Decode(_) => "decode failed",
            RenderError::SafetyBlocked => "unsafe/unknown source, bypass not set",
            RenderError::Encode(_) => "encode failed",
            RenderError::Upload(_) => "upload failed",
        }
    }
}

/// The engine's single entry point: fetch, gate, lay out, paint, encode,
/// persist or return inline. Stateless across calls except the process-wide
/// font registry; independent renders may run concurrently.
pub struct Renderer<S> {
    settings: Settings,
    store: S,
    http: reqwest::Client,
    classifier: Box<dyn Classify>,
}

impl<S: ObjectStore> Renderer<S> {
    pub fn new(settings: Settings, store: S) -> Self {
        Self {
            settings,
            store,
            http: reqwest::Client::new(),
            classifier: Box::new(HeuristicClassifier::default()),
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classify>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let fetched = fetch_source(&self.http, &request.source_url)
            .await
            .map_err(|err| RenderError::Fetch(err.to_string()))?;
        // Decode with the sniffed mime as a format hint; unrecognized types
        // fall back to content detection inside the decoder.
        let decoded = match image::ImageFormat::from_mime_type(&fetched.mime) {
            Some(format) => image::load_from_memory_with_format(&fetched.bytes, format),
            None => image::load_from_memory(&fetched.bytes),
        }
        .map_err(|err| RenderError::Decode(err.to_string()))?
        .to_rgba8();

        let classification = match request.classification {
            Some(given) => given,
            None => self.classifier.classify(&decoded),
        };
        if classification != Classification::Clean && !request.bypass_safety {
            warn!(
                source = %request.source_url,
                ?classification,
                "blocking render of unverified source"
            );
            return Err(RenderError::SafetyBlocked);
        }

        let headline_lines = split_lines(&request.headline);
        let title_lines = split_lines(&request.anime_title);
        let base_position = request
            .text_position
            .unwrap_or_else(|| compose::default_text_position(&self.settings, request.gradient_position));
        let brand_font = font::brand_font(&self.settings);
        let params = LayoutParams {
            canvas_width: self.settings.canvas_width as f32,
            canvas_height: self.settings.canvas_height as f32,
            text_scale: request.text_scale,
            base_position,
            line_spacing: layout::default_line_spacing(request.text_scale),
            purple_word_indices: &request.purple_word_indices,
            disable_auto_scaling: request.disable_auto_scaling,
            font: brand_font.map(|font| &font.metrics),
        };
        let (runs, font_size) = layout::layout_with_size(&headline_lines, &title_lines, &params);
        debug!(words = runs.len(), font_size, "layout computed");

        let png = compose::compose(
            &decoded,
            &runs,
            font_size,
            request,
            &self.settings,
            brand_font,
        )
        .map_err(|err| RenderError::Encode(err.to_string()))?;

        let processed_image = if request.skip_upload {
            ProcessedImage::Inline(BASE64.encode(&png))
        } else {
            let key = upload_key(&request.slug);
            let url = self
                .store
                .put(&key, png, "image/png")
                .await
                .map_err(|err| RenderError::Upload(err.to_string()))?;
            ProcessedImage::Url(url)
        };

        Ok(RenderResult {
            processed_image,
            layout: runs,
        })
    }
}

fn upload_key(slug: &str) -> String {
    let slug = slug.trim();
    if slug.is_empty() {
        "cards/card.png".to_string()
    } else {
        format!("cards/{slug}.png")
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Point;
    use crate::storage::{StorageError, StoreFuture};
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    struct RecordingStore {
        keys: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                keys: Mutex::new(Vec::new()),
            }
        }

        fn keys(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }
    }

    impl ObjectStore for RecordingStore {
        fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> StoreFuture<'_> {
            self.keys.lock().unwrap().push(key.to_string());
            let url = format!("https://cdn.test/{key}");
            Box::pin(async move { Ok::<_, StorageError>(url) })
        }
    }

    fn png_data_uri(width: u32, height: u32) -> String {
        let image = RgbaImage::from_pixel(width, height, Rgba([30, 80, 160, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&bytes))
    }

    fn renderer() -> Renderer<RecordingStore> {
        Renderer::new(Settings::default(), RecordingStore::new())
    }

    fn base_request() -> RenderRequest {
        let mut request = RenderRequest::new(png_data_uri(200, 260));
        request.headline = "CASTS YUICHIRO".to_string();
        request.anime_title = "UMEHARA".to_string();
        request.slug = "umehara-cast".to_string();
        request.text_position = Some(Point::new(540.0, 900.0));
        request
    }

    #[tokio::test]
    async fn unsafe_without_bypass_is_blocked() {
        let mut request = base_request();
        request.classification = Some(Classification::Unsafe);
        let err = renderer().render(&request).await.unwrap_err();
        assert!(matches!(err, RenderError::SafetyBlocked));
        assert_eq!(err.reason(), "unsafe/unknown source, bypass not set");
    }

    #[tokio::test]
    async fn unsafe_with_bypass_renders() {
        let mut request = base_request();
        request.classification = Some(Classification::Unsafe);
        request.bypass_safety = true;
        request.skip_upload = true;
        let result = renderer().render(&request).await.unwrap();
        assert!(result.processed_image.as_inline().is_some());
    }

    #[tokio::test]
    async fn unknown_is_blocked_like_unsafe() {
        let mut request = base_request();
        request.classification = Some(Classification::Unknown);
        let err = renderer().render(&request).await.unwrap_err();
        assert!(matches!(err, RenderError::SafetyBlocked));
    }

    #[tokio::test]
    async fn skip_upload_never_touches_the_store() {
        let renderer = renderer();
        let mut request = base_request();
        request.classification = Some(Classification::Clean);
        request.skip_upload = true;

        let result = renderer.render(&request).await.unwrap();
        assert!(renderer.store.keys().is_empty());

        let inline = result.processed_image.as_inline().unwrap();
        let png = BASE64.decode(inline).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1350));
    }

    #[tokio::test]
    async fn upload_uses_slug_derived_key() {
        let renderer = renderer();
        let mut request = base_request();
        request.classification = Some(Classification::Clean);

        let result = renderer.render(&request).await.unwrap();
        assert_eq!(renderer.store.keys(), vec!["cards/umehara-cast.png"]);
        assert_eq!(
            result.processed_image.as_url(),
            Some("https://cdn.test/cards/umehara-cast.png")
        );
        assert!(!result.layout.is_empty());
    }

    #[tokio::test]
    async fn undecodable_bytes_report_decode_failure() {
        let mut request = base_request();
        request.source_url =
            format!("data:image/png;base64,{}", BASE64.encode(b"not an image"));
        let err = renderer().render(&request).await.unwrap_err();
        assert_eq!(err.reason(), "decode failed");
    }

    #[tokio::test]
    async fn unreachable_source_reports_fetch_failure() {
        let mut request = base_request();
        request.source_url = "ftp://nowhere.invalid/image.png".to_string();
        let err = renderer().render(&request).await.unwrap_err();
        assert_eq!(err.reason(), "fetch failed");
    }

    #[test]
    fn reason_strings_are_stable() {
        insta::assert_snapshot!(
            RenderError::SafetyBlocked.reason(),
            @"unsafe/unknown source, bypass not set"
        );
    }
}
