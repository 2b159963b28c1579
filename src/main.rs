use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    name = "newscard",
    version,
    about = "Render branded social cards from a source image and editorial text"
)]
struct Cli {
    /// Source image URL or data: URI
    #[arg(short = 'u', long = "source-url")]
    source_url: Option<String>,

    /// Title text (second line group)
    #[arg(short = 't', long = "title", default_value = "")]
    title: String,

    /// Headline text (first line group; may be empty)
    #[arg(short = 'H', long = "headline", default_value = "")]
    headline: String,

    /// Artifact name used for the storage key
    #[arg(short = 's', long = "slug", default_value = "")]
    slug: String,

    /// Background zoom factor
    #[arg(long = "scale", default_value_t = 1.0)]
    scale: f32,

    /// Background pan, x offset in canvas px
    #[arg(long = "position-x", default_value_t = 0.0)]
    position_x: f32,

    /// Background pan, y offset in canvas px
    #[arg(long = "position-y", default_value_t = 0.0)]
    position_y: f32,

    /// Text scale factor
    #[arg(long = "text-scale", default_value_t = 1.0)]
    text_scale: f32,

    /// Skip the text layer
    #[arg(long = "no-text")]
    no_text: bool,

    /// Skip the darkening gradient
    #[arg(long = "no-gradient")]
    no_gradient: bool,

    /// Skip the watermark
    #[arg(long = "no-watermark")]
    no_watermark: bool,

    /// Place the gradient over the top edge instead of the bottom
    #[arg(long = "gradient-top")]
    gradient_top: bool,

    /// Zero-based word indices to render in the accent color (comma separated)
    #[arg(long = "purple-words", value_delimiter = ',')]
    purple_words: Vec<usize>,

    /// Draw text at the requested scale even if it overflows
    #[arg(long = "disable-auto-scaling")]
    disable_auto_scaling: bool,

    /// Render even when the source is classified unsafe/unknown
    #[arg(long = "bypass-safety")]
    bypass_safety: bool,

    /// Apply a persisted ImageSettings JSON recipe
    #[arg(long = "recipe")]
    recipe: Option<String>,

    /// Write the card PNG to this path instead of printing base64
    #[arg(short = 'o', long = "out")]
    out: Option<String>,

    /// Persist to object storage and print the public URL
    #[arg(long = "upload")]
    upload: bool,

    /// Run the HTTP render service on this address (e.g. 127.0.0.1:8391)
    #[arg(long = "serve")]
    serve: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    newscard::logging::init(cli.verbose)?;

    if let Some(addr) = cli.serve {
        let settings_path = cli.read_settings.as_deref().map(Path::new);
        let settings = newscard::settings::load_settings(settings_path)?;
        let renderer = newscard::build_renderer(settings)?;
        return newscard::server::run_server(renderer, addr).await;
    }

    let source_url = cli
        .source_url
        .ok_or_else(|| anyhow!("--source-url is required unless --serve is set"))?;

    let output = newscard::run(newscard::Config {
        source_url,
        title: cli.title,
        headline: cli.headline,
        slug: cli.slug,
        scale: cli.scale,
        position_x: cli.position_x,
        position_y: cli.position_y,
        text_scale: cli.text_scale,
        no_text: cli.no_text,
        no_gradient: cli.no_gradient,
        no_watermark: cli.no_watermark,
        gradient_top: cli.gradient_top,
        purple_words: cli.purple_words,
        disable_auto_scaling: cli.disable_auto_scaling,
        bypass_safety: cli.bypass_safety,
        recipe_path: cli.recipe,
        settings_path: cli.read_settings,
        out: cli.out,
        upload: cli.upload,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
