use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub accent_color: String,
    pub text_color: String,
    pub watermark: String,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub storage: Option<StorageSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_region() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accent_color: "#A855F7".to_string(),
            text_color: "#FFFFFF".to_string(),
            watermark: "@newscard".to_string(),
            font_path: None,
            font_family: None,
            canvas_width: 1080,
            canvas_height: 1350,
            storage: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    brand: Option<BrandSettings>,
    canvas: Option<CanvasSettings>,
    storage: Option<StorageSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct BrandSettings {
    accent_color: Option<String>,
    text_color: Option<String>,
    watermark: Option<String>,
    font_path: Option<String>,
    font_family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CanvasSettings {
    width: Option<u32>,
    height: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let compiled: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).context("failed to parse built-in settings")?;
    settings.merge(compiled);

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    if settings.storage.is_none() {
        settings.storage = storage_from_env();
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(brand) = incoming.brand {
            if let Some(color) = brand.accent_color {
                if !color.trim().is_empty() {
                    self.accent_color = color;
                }
            }
            if let Some(color) = brand.text_color {
                if !color.trim().is_empty() {
                    self.text_color = color;
                }
            }
            if let Some(handle) = brand.watermark {
                if !handle.trim().is_empty() {
                    self.watermark = handle;
                }
            }
            if let Some(path) = brand.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(family) = brand.font_family {
                if !family.trim().is_empty() {
                    self.font_family = Some(family);
                }
            }
        }
        if let Some(canvas) = incoming.canvas {
            if let Some(width) = canvas.width {
                if width > 0 {
                    self.canvas_width = width;
                }
            }
            if let Some(height) = canvas.height {
                if height > 0 {
                    self.canvas_height = height;
                }
            }
        }
        if let Some(storage) = incoming.storage {
            self.storage = Some(storage);
        }
    }
}

fn storage_from_env() -> Option<StorageSettings> {
    let endpoint_url = std::env::var("NEWSCARD_STORAGE_ENDPOINT").ok()?;
    let access_key_id = std::env::var("NEWSCARD_STORAGE_ACCESS_KEY_ID").ok()?;
    let secret_access_key = std::env::var("NEWSCARD_STORAGE_SECRET_ACCESS_KEY").ok()?;
    let bucket = std::env::var("NEWSCARD_STORAGE_BUCKET").ok()?;
    Some(StorageSettings {
        endpoint_url,
        access_key_id,
        secret_access_key,
        bucket,
        region: std::env::var("NEWSCARD_STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
        public_base_url: std::env::var("NEWSCARD_STORAGE_PUBLIC_BASE_URL").ok(),
    })
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".newscard"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_defaults_parse() {
        let settings = Settings::default();
        assert_eq!(settings.canvas_width, 1080);
        assert_eq!(settings.canvas_height, 1350);
        assert!(settings.accent_color.starts_with('#'));
    }

    #[test]
    fn merge_keeps_defaults_for_blank_values() {
        let mut settings = Settings::default();
        let incoming: SettingsFile = toml::from_str(
            r#"
            [brand]
            accent_color = ""
            watermark = "@override"
            "#,
        )
        .unwrap();
        settings.merge(incoming);
        assert_eq!(settings.accent_color, "#A855F7");
        assert_eq!(settings.watermark, "@override");
    }

    #[test]
    fn storage_section_parses() {
        let incoming: SettingsFile = toml::from_str(
            r#"
            [storage]
            endpoint_url = "https://account.r2.cloudflarestorage.com"
            access_key_id = "key"
            secret_access_key = "secret"
            bucket = "cards"
            "#,
        )
        .unwrap();
        let mut settings = Settings::default();
        settings.merge(incoming);
        let storage = settings.storage.unwrap();
        assert_eq!(storage.region, "auto");
        assert!(storage.public_base_url.is_none());
    }
}
