use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use casepreview::cache::{BinaryCache, DocumentIdentity};
use casepreview::fetch::SourceFetcher;
use casepreview::overlay::{AnnotationSource, JsonAnnotationFile, ScrollBehavior, ScrollContainer};
use casepreview::panic_handler;
use casepreview::preview::{CacheStatus, PreviewError, PreviewLoader};
use casepreview::render::{DECODE_TIMEOUT, DocumentDecoder};
use casepreview::settings::{self, Settings};

/// Preview case documents: cached download, page render and annotation overlay
#[derive(Parser, Debug)]
#[command(name = "casepreview")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log file
    #[arg(long, global = true, default_value = "casepreview.log")]
    log_file: PathBuf,

    /// Log level, overrides the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one page of a document to PNG with its annotations
    Render {
        /// Document id used for the cache key
        #[arg(long)]
        id: String,

        /// Display name of the document
        #[arg(long)]
        name: String,

        /// URL or local path of the document
        #[arg(long)]
        source: String,

        /// Page to render (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Render scale
        #[arg(long, conflicts_with = "high_fidelity")]
        scale: Option<f32>,

        /// Use the high-fidelity scale
        #[arg(long)]
        high_fidelity: bool,

        /// Annotation export (JSON)
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// Annotation to highlight and scroll to
        #[arg(long)]
        highlight: Option<String>,

        /// Output PNG
        #[arg(long)]
        out: PathBuf,
    },

    /// Inspect or empty the document cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show cache occupancy
    Stats,
    /// Remove every cached document
    Clear,
}

/// Remembers where the page would be scrolled to
#[derive(Default)]
struct ScrollReport {
    target: Option<f32>,
}

impl ScrollContainer for ScrollReport {
    fn scroll_to(&mut self, top: f32, _behavior: ScrollBehavior) {
        self.target = Some(top);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }
    if let Some(level) = &cli.log_level {
        settings::set_log_level(level);
    }
    let settings = settings::get_settings();

    let level = settings
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("Failed to create log file {}", cli.log_file.display()))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting casepreview");
    let result = run(cli.command, &settings);
    if let Err(e) = &result {
        error!("Command failed: {e:?}");
    }
    info!("Shutting down casepreview");
    result
}

fn run(command: Command, settings: &Settings) -> Result<()> {
    let cache_dir = settings.cache_directory();
    let cache = BinaryCache::on_disk(&cache_dir, settings.cache_config());

    match command {
        Command::Render {
            id,
            name,
            source,
            page,
            scale,
            high_fidelity,
            annotations,
            highlight,
            out,
        } => {
            let scale = match (scale, high_fidelity) {
                (Some(scale), _) => scale,
                (None, true) => settings.render.high_fidelity_scale,
                (None, false) => settings.render.default_scale,
            };
            let doc = DocumentIdentity::new(id, name, source);
            let markers = match annotations {
                Some(path) => JsonAnnotationFile::new(path).markers_for(&doc.id)?,
                None => Vec::new(),
            };

            let loader = PreviewLoader::new(cache.clone(), Arc::new(SourceFetcher::new()?), decoder()?)
                .with_scroll_offset(settings.overlay.scroll_offset);
            let mut panel = loader
                .open_panel(&doc, markers, highlight.clone())
                .map_err(user_facing)?;

            let mut scroll = ScrollReport::default();
            let request = panel.request_page(page, scale);
            let shown = panel
                .wait_for(request, DECODE_TIMEOUT, &mut scroll)
                .map_err(user_facing)?
                .context("Render was superseded")?;

            let image = panel
                .render_snapshot()
                .to_image()
                .context("Rendered surface has inconsistent dimensions")?;
            image
                .save(&out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            panel.close();

            let source = match panel.cache_status() {
                CacheStatus::Cached => "cache",
                CacheStatus::Downloaded => "download",
            };
            println!(
                "Rendered page {page} ({}x{}) from {source} to {}",
                image.width(),
                image.height(),
                out.display()
            );
            println!("{} annotation(s) on page", shown.markers.len());
            if let Some(highlight) = highlight {
                match scroll.target {
                    Some(top) => println!("Scroll to {highlight}: {top:.0}px"),
                    None => println!("Highlight {highlight} is not on page {page}"),
                }
            }
        }

        Command::Cache { action } => match action {
            CacheAction::Stats => {
                let stats = cache.stats();
                println!("Cache directory: {}", cache_dir.display());
                println!(
                    "Memory tier: {}/{} items",
                    stats.memory_items, stats.memory_capacity
                );
                if stats.durable_available {
                    let policy = cache.config().policy;
                    println!(
                        "Durable tier: {}/{} items, {}/{} bytes",
                        stats.durable_items, policy.max_items, stats.durable_bytes, policy.max_bytes
                    );
                } else {
                    println!("Durable tier: unavailable");
                }
            }
            CacheAction::Clear => {
                cache.clear();
                cache.flush();
                println!("Cache cleared");
            }
        },
    }

    cache.flush();
    Ok(())
}

/// Keep the diagnostic chain but lead with what a user should read
fn user_facing(e: PreviewError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

#[cfg(feature = "pdf")]
fn decoder() -> Result<Arc<dyn DocumentDecoder>> {
    Ok(Arc::new(casepreview::render::MupdfDecoder))
}

#[cfg(not(feature = "pdf"))]
fn decoder() -> Result<Arc<dyn DocumentDecoder>> {
    anyhow::bail!("Built without the `pdf` feature, cannot render documents")
}
