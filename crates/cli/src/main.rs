//! Pinterestify command line: run a renovation design and browse saved designs.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use pinterestify_core::design::{
    compose_style, Preferences, RenovationAnalysis, RenovationStyle, RoomType, SavedDesign,
    MAX_ROOM_LOCATIONS, POPULAR_STORES,
};
use pinterestify_core::generation::GeminiBackend;
use pinterestify_core::image::ImageHandle;
use pinterestify_core::pipeline::{
    HistoryStack, Orchestrator, PipelineConfig, ProcessingStatus, RunWarning,
};
use pinterestify_core::state::db::{default_db_path, DEFAULT_QUOTA_BYTES};
use pinterestify_core::state::{HistoryStore, SessionContext, SqliteMedium};

const DEFAULT_LOG_FILTER: &str = "pinterestify_cli=info,pinterestify_core=info";
const VERBOSE_LOG_FILTER: &str = "pinterestify_cli=debug,pinterestify_core=debug";

#[derive(Parser)]
#[command(author, version, about = "Pinterestify - AI room renovation designs")]
struct Args {
    #[command(flatten)]
    storage: StorageArgs,

    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Args)]
struct StorageArgs {
    /// History database location
    #[arg(long, global = true, env = "PINTERESTIFY_DB")]
    db: Option<PathBuf>,

    /// Byte quota for saved designs (0 disables the limit)
    #[arg(long, global = true, default_value_t = DEFAULT_QUOTA_BYTES)]
    quota_bytes: u64,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Generate a renovation design for a room photo
    Run(RunArgs),
    /// Browse saved designs
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// List the preset styles
    Styles,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Photo of the room
    #[arg(long)]
    image: PathBuf,
    /// Preset style name or a free-text style description
    #[arg(long, default_value = "")]
    style: String,
    /// Extra style notes appended to a preset
    #[arg(long)]
    notes: Option<String>,
    /// Inspiration photo
    #[arg(long)]
    inspiration: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = RoomTypeArg::WholeRoom)]
    room_type: RoomTypeArg,
    /// Room function, repeatable (up to three)
    #[arg(long = "location")]
    locations: Vec<String>,
    /// Room size, e.g. "12x10 ft"
    #[arg(long, default_value = "")]
    size: String,
    /// Primary usage of the room
    #[arg(long, default_value = "")]
    purpose: String,
    /// Total budget in INR, e.g. "₹25,000"
    #[arg(long)]
    budget: String,
    /// Preferred store, repeatable
    #[arg(long = "store")]
    stores: Vec<String>,
    /// Furniture to keep
    #[arg(long, default_value = "")]
    existing: String,
    /// Where to write the generated image
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List saved designs, newest first
    List,
    /// Show one saved design
    Show {
        id: String,
        /// Write the generated image here
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved design
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoomTypeArg {
    WholeRoom,
    SingleWall,
}

impl From<RoomTypeArg> for RoomType {
    fn from(arg: RoomTypeArg) -> Self {
        match arg {
            RoomTypeArg::WholeRoom => RoomType::WholeRoom,
            RoomTypeArg::SingleWall => RoomType::SingleWall,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn open_history(storage: &StorageArgs) -> Result<HistoryStore> {
    let path = storage.db.clone().unwrap_or_else(default_db_path);
    let quota = Some(storage.quota_bytes).filter(|q| *q > 0);
    tracing::debug!(path = %path.display(), ?quota, "Opening design history");
    let medium = SqliteMedium::open_at(&path)
        .with_context(|| format!("Failed to open history at {}", path.display()))?
        .with_quota(quota);
    Ok(HistoryStore::new(medium))
}

fn read_image(path: &Path) -> Result<ImageHandle> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or(mime_guess::mime::IMAGE_JPEG);
    if mime.type_() != mime_guess::mime::IMAGE {
        bail!("{} does not look like an image ({})", path.display(), mime);
    }
    Ok(ImageHandle::from_bytes(mime.essence_str(), &bytes))
}

fn write_image(image: &ImageHandle, out: Option<PathBuf>, stem: &str) -> Result<PathBuf> {
    let path = out.unwrap_or_else(|| PathBuf::from(format!("{}.{}", stem, image.extension())));
    let bytes = image.decode().context("Generated image is not valid base64")?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write image {}", path.display()))?;
    Ok(path)
}

fn print_status(status: &ProcessingStatus) {
    println!(
        "   [{:>3}%] analysis: {:?} | vision: {:?} | polishing: {:?}",
        status.progress_percent(),
        status.analysis,
        status.vision,
        status.polishing
    );
}

fn print_analysis(analysis: &RenovationAnalysis) {
    println!("\n{}", analysis.style_analysis);

    if !analysis.color_palette.is_empty() {
        println!("\nPalette: {}", analysis.color_palette.join("  "));
    }

    if !analysis.design_tips.is_empty() {
        println!("\nDesign tips:");
        for tip in &analysis.design_tips {
            println!("   - {}", tip);
        }
    }

    if !analysis.functional_additions.is_empty() {
        println!("\nIf budget allows:");
        for addition in &analysis.functional_additions {
            println!("   - {}", addition);
        }
    }

    if !analysis.products.is_empty() {
        println!("\nShopping list:");
        for product in &analysis.products {
            let location = product
                .coordinates
                .map(|c| format!(" @ ({:.0}%, {:.0}%)", c.x, c.y))
                .unwrap_or_default();
            println!(
                "   {} [{}] {}{}",
                product.name, product.category, product.price_estimate, location
            );
            println!("      search: {}", product.search_query);
        }
    }
}

fn print_design_summary(design: &SavedDesign) {
    let style: String = design.design.style.chars().take(40).collect();
    println!(
        "{}  {}  {:<40}  {}",
        design.id,
        design.timestamp.format("%Y-%m-%d %H:%M"),
        style,
        design.design.budget
    );
}

async fn run_design(storage: &StorageArgs, run: RunArgs, config: PipelineConfig) -> Result<()> {
    if run.locations.len() > MAX_ROOM_LOCATIONS {
        bail!("At most {} locations can be combined", MAX_ROOM_LOCATIONS);
    }

    let inspiration = run.inspiration.as_deref().map(read_image).transpose()?;
    let preset = RenovationStyle::from_name(&run.style);
    let custom = match (preset, &run.notes) {
        (Some(_), Some(notes)) => notes.clone(),
        (Some(_), None) => String::new(),
        (None, notes) => [run.style.as_str(), notes.as_deref().unwrap_or_default()]
            .join(" ")
            .trim()
            .to_string(),
    };
    let Some(style) = compose_style(preset, &custom, inspiration.is_some()) else {
        bail!("Pick a --style or provide an --inspiration image");
    };

    // Upload → style → preferences
    let mut session = SessionContext::<HistoryStack>::default();
    session.capture_image(read_image(&run.image)?)?;
    session.select_room_type(run.room_type.into());
    session.select_room_locations(run.locations)?;
    session.set_room_size(run.size);
    session.set_room_purpose(run.purpose);
    session.confirm_style(style, inspiration)?;

    let backend = Arc::new(GeminiBackend::from_env(config.models.clone())?);
    let history = Arc::new(open_history(storage)?);
    let orchestrator = Orchestrator::new(config, backend, history, session.into_shared());

    let mut status = orchestrator.subscribe_status();
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current != ProcessingStatus::default() {
                print_status(&current);
            }
        }
    });

    println!("Designing your room...");
    let preferences = Preferences::new(run.budget, run.stores, run.existing);
    let outcome = orchestrator.submit_preferences(preferences).await;
    progress.abort();

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            let session = orchestrator.session().lock().await;
            if let Some(message) = &session.state().error {
                eprintln!("{}", message);
            }
            return Err(e.into());
        }
    };

    for warning in &report.warnings {
        match warning {
            RunWarning::DegradedResult { stage, reason } => {
                eprintln!("warning: {} step degraded: {}", stage.as_str(), reason)
            }
            RunWarning::PersistenceFailure { reason } => {
                eprintln!("warning: design not saved to history: {}", reason)
            }
        }
    }

    let session = orchestrator.session().lock().await;
    let state = session.state();
    if let Some(image) = &state.generated_image {
        let stem = report.saved_design_id.as_deref().unwrap_or("design");
        let path = write_image(image, run.out, &format!("pinterestify-{}", stem))?;
        println!("\nRendered room written to {}", path.display());
    }
    if let Some(analysis) = &state.analysis_data {
        print_analysis(analysis);
    }
    if let Some(id) = &report.saved_design_id {
        println!("\nSaved as {}", id);
    }

    Ok(())
}

fn run_history(storage: &StorageArgs, command: HistoryCommand) -> Result<()> {
    let history = open_history(storage)?;

    match command {
        HistoryCommand::List => {
            let designs = history.list();
            if designs.is_empty() {
                println!("No saved designs yet.");
            }
            for design in &designs {
                print_design_summary(design);
            }
        }
        HistoryCommand::Show { id, out, json } => {
            let Some(design) = history.get(&id)? else {
                bail!("No saved design with id {}", id);
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&design.design.analysis_data)?
                );
            } else {
                print_design_summary(&design);
                println!("Style: {}", design.design.style);
                if !design.design.room_locations.is_empty() {
                    println!("Rooms: {}", design.design.room_locations.join(" + "));
                }
                print_analysis(&design.design.analysis_data);
            }
            if out.is_some() {
                let path = write_image(&design.design.generated_image, out, &design.id)?;
                println!("Rendered room written to {}", path.display());
            }
        }
        HistoryCommand::Delete { id } => {
            let remaining = history.delete(&id)?;
            println!("{} saved design(s) remaining.", remaining.len());
        }
    }

    Ok(())
}

fn list_styles() {
    for style in RenovationStyle::all() {
        println!("{}\n   {}", style.display_name(), style.description());
    }
    println!("\nStores: {}", POPULAR_STORES.join(", "));
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let Args {
        storage,
        config,
        verbose,
        command,
    } = Args::parse();
    init_logging(verbose);

    let config = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    tracing::debug!(models = ?config.models, dwell_ms = config.results_dwell_ms, "Pipeline configured");

    match command {
        CliCommand::Run(run) => run_design(&storage, run, config).await,
        CliCommand::History { command } => run_history(&storage, command),
        CliCommand::Styles => {
            list_styles();
            Ok(())
        }
    }
}
