use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use photomark::{
    Config,
    export::{self, ExportOptions, NamingPolicy, ResizePolicy},
    files,
    interaction::PreviewSession,
    startup_checks,
    templates::TemplateStore,
    watermark::{
        DynWatermarkRenderer, FontResolver, OutputFormat, StyleDescriptor, TextWatermarker,
        WatermarkStyle,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Overrides `app.log_level` from the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark one image and write the result
    Apply {
        input: PathBuf,

        /// Output file; defaults to the configured naming next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Watermark images and folders into an output directory
    Export {
        /// Image files or folders (searched recursively)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        out_dir: PathBuf,

        /// original, prefix or suffix
        #[arg(long)]
        naming: Option<String>,

        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        suffix: Option<String>,

        /// original, width:N, height:N or N%
        #[arg(long, default_value = "original")]
        resize: ResizePolicy,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Manage saved templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Check whether a preview pointer position hits the rendered watermark
    HitTest {
        input: PathBuf,

        /// Pointer x in preview widget pixels
        #[arg(long)]
        x: f32,

        /// Pointer y in preview widget pixels
        #[arg(long)]
        y: f32,

        /// Use the estimated box instead of rendering first
        #[arg(long)]
        estimate: bool,

        /// Also write the rendered preview image here as PNG
        #[arg(long)]
        preview: Option<PathBuf>,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Show which face a font family resolves to
    Fonts {
        family: String,

        #[arg(long)]
        bold: bool,

        #[arg(long)]
        italic: bool,

        #[arg(long, default_value_t = 30)]
        size: u32,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// Save the given style as a named template
    Save {
        name: String,

        #[command(flatten)]
        style: StyleArgs,
    },
    /// Print a template's settings as JSON
    Load { name: String },
    /// Delete a template
    Delete { name: String },
    /// List template names
    List,
    /// Make a saved template the default
    SetDefault { name: String },
}

/// Style overrides on top of the startup settings (last, then default, then built-in).
#[derive(Args, Debug, Default)]
struct StyleArgs {
    /// Start from a saved template instead of the startup settings
    #[arg(long)]
    template: Option<String>,

    #[arg(long)]
    text: Option<String>,

    #[arg(long)]
    font: Option<String>,

    #[arg(long)]
    bold: Option<bool>,

    #[arg(long)]
    italic: Option<bool>,

    #[arg(long)]
    size: Option<u32>,

    /// Fill colour as #RRGGBB
    #[arg(long)]
    color: Option<String>,

    /// Opacity between 0 and 1
    #[arg(long)]
    opacity: Option<f32>,

    /// Degrees, counter-clockwise, -180 to 180
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<i32>,

    /// Horizontal anchor between 0 and 1
    #[arg(long)]
    h_anchor: Option<f32>,

    /// Vertical anchor between 0 and 1
    #[arg(long)]
    v_anchor: Option<f32>,

    #[arg(long)]
    shadow: Option<bool>,

    #[arg(long)]
    stroke: Option<bool>,

    #[arg(long)]
    stroke_width: Option<u32>,

    #[arg(long)]
    stroke_color: Option<String>,

    /// single, tile or diagonal
    #[arg(long, value_parser = parse_watermark_style)]
    style: Option<WatermarkStyle>,

    /// png or jpeg
    #[arg(long)]
    format: Option<OutputFormat>,

    /// JPEG quality, 0 to 100
    #[arg(long)]
    quality: Option<u8>,
}

fn parse_watermark_style(s: &str) -> Result<WatermarkStyle, String> {
    match s.to_lowercase().as_str() {
        "single" => Ok(WatermarkStyle::Single),
        "tile" => Ok(WatermarkStyle::Tile),
        "diagonal" => Ok(WatermarkStyle::Diagonal),
        other => Err(format!("unknown watermark style: {}", other)),
    }
}

impl StyleArgs {
    /// Flags win over the chosen template or startup settings, which win over the config.
    fn resolve(
        &self,
        store: &TemplateStore,
        config: &Config,
    ) -> Result<StyleDescriptor, Box<dyn std::error::Error>> {
        let mut style = match &self.template {
            Some(name) => store.load_template(name)?,
            None => store.startup_settings_or(config.default_style()),
        };

        if let Some(text) = &self.text {
            style.text = text.clone();
        }
        if let Some(font) = &self.font {
            style.font_family = font.clone();
        }
        if let Some(color) = &self.color {
            style.color = color.clone();
        }
        if let Some(stroke_color) = &self.stroke_color {
            style.stroke_color = stroke_color.clone();
        }
        style.bold = self.bold.unwrap_or(style.bold);
        style.italic = self.italic.unwrap_or(style.italic);
        style.font_size = self.size.unwrap_or(style.font_size);
        style.opacity = self.opacity.unwrap_or(style.opacity);
        style.rotation = self.rotation.unwrap_or(style.rotation);
        style.horizontal_anchor = self.h_anchor.unwrap_or(style.horizontal_anchor);
        style.vertical_anchor = self.v_anchor.unwrap_or(style.vertical_anchor);
        style.shadow = self.shadow.unwrap_or(style.shadow);
        style.stroke = self.stroke.unwrap_or(style.stroke);
        style.stroke_width = self.stroke_width.unwrap_or(style.stroke_width);
        style.style = self.style.unwrap_or(style.style);
        style.output_format = self.format.unwrap_or(style.output_format);
        style.quality = self.quality.unwrap_or(style.quality);

        Ok(style.normalized())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    // Config supplies the default log level
    let log_level = cli.log_level.as_deref().unwrap_or(&config.app.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting {}", config.app.name);
    info!("Configuration loaded from: {:?}", cli.config);

    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => {}
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            }
            warn!("Non-critical startup checks failed, continuing");
        }
    }

    let store = TemplateStore::from_config(&config.storage);
    let resolver = Arc::new(FontResolver::from_config(&config.fonts));
    let renderer: DynWatermarkRenderer = Arc::new(TextWatermarker::new(resolver.clone()));

    match cli.command {
        Commands::Apply {
            input,
            output,
            style,
        } => {
            let style = style.resolve(&store, &config)?;
            apply(&config, &store, renderer, &input, output, style).await
        }
        Commands::Export {
            inputs,
            out_dir,
            naming,
            prefix,
            suffix,
            resize,
            style,
        } => {
            let style = style.resolve(&store, &config)?;
            let naming = naming_policy(&config, naming, prefix, suffix);
            let options = ExportOptions::for_style(out_dir, &style)
                .with_naming(naming)
                .with_resize(resize);
            run_export(&store, renderer, &inputs, style, options).await
        }
        Commands::Template(cmd) => handle_template_command(&config, &store, cmd),
        Commands::HitTest {
            input,
            x,
            y,
            estimate,
            preview,
            style,
        } => {
            let style = style.resolve(&store, &config)?;
            let point = (x, y);
            hit_test(&config, renderer, &input, point, estimate, preview, style).await
        }
        Commands::Fonts {
            family,
            bold,
            italic,
            size,
        } => {
            let face = resolver.resolve(&family, bold, italic, size);
            println!("{:?}", face.source);
            Ok(())
        }
    }
}

async fn apply(
    config: &Config,
    store: &TemplateStore,
    renderer: DynWatermarkRenderer,
    input: &Path,
    output: Option<PathBuf>,
    style: StyleDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = match output {
        Some(path) => path,
        None => {
            let dir = input.parent().unwrap_or_else(|| Path::new("."));
            files::output_path(input, dir, &config.naming_policy(), style.output_format)
                .ok_or("input has no file name")?
        }
    };

    let bounding_box = tokio::task::spawn_blocking({
        let input = input.to_path_buf();
        let output = output.clone();
        let style = style.clone();
        move || export::apply_to_file(renderer.as_ref(), &input, &output, &style)
    })
    .await??;

    match bounding_box {
        Some(bounding_box) => println!("{}", serde_json::to_string(&bounding_box)?),
        None => println!("null"),
    }
    info!("Wrote {:?}", output);

    remember_settings(store, &style);
    Ok(())
}

async fn run_export(
    store: &TemplateStore,
    renderer: DynWatermarkRenderer,
    inputs: &[PathBuf],
    style: StyleDescriptor,
    options: ExportOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let sources = files::collect_images(inputs);
    if sources.is_empty() {
        warn!("No supported images found");
    }

    let report = export::export_batch(renderer, sources, style.clone(), options).await?;
    for (source, reason) in &report.failed {
        eprintln!("Skipped {}: {}", source.display(), reason);
    }
    println!("Exported {} of {} images", report.success_count(), report.total());

    if report.success_count() > 0 {
        remember_settings(store, &style);
    }
    Ok(())
}

fn handle_template_command(
    config: &Config,
    store: &TemplateStore,
    cmd: TemplateCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        TemplateCommands::Save { name, style } => {
            let settings = style.resolve(store, config)?;
            store.save_template(&name, &settings)?;
            println!("Saved template '{}'", name);
        }
        TemplateCommands::Load { name } => {
            let record = store.load_record(&name)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        TemplateCommands::Delete { name } => {
            if store.delete_template(&name)? {
                println!("Deleted template '{}'", name);
            } else {
                eprintln!("Error: Template '{}' not found", name);
                std::process::exit(1);
            }
        }
        TemplateCommands::List => {
            let names = store.list_templates()?;
            if names.is_empty() {
                println!("No templates saved");
            } else {
                for name in names {
                    println!("  {}", name);
                }
            }
        }
        TemplateCommands::SetDefault { name } => {
            let settings = store.load_template(&name)?;
            store.save_default_template(&settings)?;
            println!("Template '{}' is now the default", name);
        }
    }

    Ok(())
}

async fn hit_test(
    config: &Config,
    renderer: DynWatermarkRenderer,
    input: &Path,
    point: (f32, f32),
    estimate: bool,
    preview: Option<PathBuf>,
    style: StyleDescriptor,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = image::open(input)?;
    let widget = (config.preview.width, config.preview.height);
    let mut session = PreviewSession::new(renderer, source, widget, style);

    if !estimate {
        session.render_in_background().await?;
    }

    if let (Some(path), Some(image)) = (&preview, session.preview_image()) {
        export::check_destination(input, path)?;
        export::formats::save(&image, path, OutputFormat::Png, 100)?;
        info!("Wrote preview {:?}", path);
    }

    let hit_box = session.hit_box();
    let hit = session.pointer_down(point);
    let output = serde_json::json!({
        "geometry": {
            "preview": session.geometry().preview,
            "offset": session.geometry().offset,
        },
        "hit_box": hit_box,
        "rendered": session.is_current(),
        "hit": hit,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn naming_policy(
    config: &Config,
    naming: Option<String>,
    prefix: Option<String>,
    suffix: Option<String>,
) -> NamingPolicy {
    let mut export_config = config.export.clone();
    if let Some(naming) = naming {
        export_config.naming = naming;
    }
    if let Some(prefix) = prefix {
        export_config.prefix = prefix;
    }
    if let Some(suffix) = suffix {
        export_config.suffix = suffix;
    }

    Config {
        export: export_config,
        ..config.clone()
    }
    .naming_policy()
}

fn remember_settings(store: &TemplateStore, style: &StyleDescriptor) {
    if let Err(e) = store.save_last_settings(style) {
        warn!("Failed to save last settings: {}", e);
    }
}
