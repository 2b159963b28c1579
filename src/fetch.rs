use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

pub struct FetchedSource {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Pull raw source bytes from a remote URL or an inline `data:` URI. Non-2xx
/// responses are failures; the engine never substitutes a fallback asset.
pub async fn fetch_source(client: &reqwest::Client, url: &str) -> Result<FetchedSource> {
    if url.starts_with("data:") {
        return parse_data_uri(url);
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch source: {url}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("source responded with status {status}: {url}"));
    }
    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("failed to read source body: {url}"))?
        .to_vec();

    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .or(header_mime)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(FetchedSource { bytes, mime })
}

fn parse_data_uri(uri: &str) -> Result<FetchedSource> {
    let rest = uri.strip_prefix("data:").unwrap_or(uri);
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("malformed data URI: missing payload"))?;
    if !header.ends_with(";base64") {
        return Err(anyhow!("unsupported data URI encoding (expected base64)"));
    }
    let mime = header.trim_end_matches(";base64");
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    let bytes = BASE64
        .decode(payload.trim())
        .context("invalid base64 payload in data URI")?;
    Ok(FetchedSource {
        bytes,
        mime: mime.to_string(),
    })
}
