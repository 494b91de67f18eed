// FSE+ attendance sheet generator
// Fills a scanned or PDF template with event details and attendee names,
// seven attendees per sheet, and merges the sheets into one document.

mod config;
mod error;
mod fonts;
mod intra;
mod layout;
mod merge;
mod roster;
mod schedule;
mod sheet;
mod source;
mod text;

use clap::Parser;
use config::Config;
use error::AppError;
use intra::IntraClient;
use layout::load_page_layout;
use roster::{split_into_pages, Attendee, NAMES_PER_PAGE};
use sheet::SheetRenderer;
use source::Source;
use std::path::PathBuf;

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate FSE+ attendance sheets from a template")]
struct Args {
    /// YAML configuration file
    config: PathBuf,

    /// Output folder (overrides output_folder from the config)
    #[arg(short, long)]
    output_folder: Option<PathBuf>,

    /// Page layout file (overrides pageLayout from the config)
    #[arg(short, long)]
    layout: Option<PathBuf>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (mut config, overrides) = Config::load(&args.config)?;
    if let Some(folder) = args.output_folder {
        config.output_folder = folder;
    }
    if let Some(layout) = args.layout {
        config.page_layout_path = layout;
    }

    let source = Source::determine(&config)?;
    log::info!("Attendee source: {:?}", source);

    // API runs derive the schedule from the item before anything is drawn
    let client = match source.api_target() {
        Some(_) => Some(IntraClient::connect(&config.api)?),
        None => None,
    };
    let config = match (&client, source.api_target()) {
        (Some(client), Some((kind, id))) => {
            if !config.api.test_path.is_empty() {
                if let Err(e) = client.test_connection(&config.api.test_path) {
                    log::warn!("API connection test failed: {}", e);
                }
            }
            let item = client.fetch_item(kind, id)?;
            schedule::apply_item(config, &overrides, kind, &item)?
        }
        _ => schedule::apply_custom(config, &overrides),
    };

    let layout = load_page_layout(&config.page_layout_path)?;

    let attendees: Vec<Attendee> = match (&client, source.api_target(), source.csv_path()) {
        (Some(client), Some((kind, id)), _) => client.fetch_attendees(kind, id)?,
        (_, _, Some(path)) => roster::load_csv(path)?,
        _ => Vec::new(),
    };
    if attendees.is_empty() {
        return Err(AppError::AttendeeError(source.no_attendees_message()));
    }

    let pages = split_into_pages(&attendees, NAMES_PER_PAGE);
    let renderer = SheetRenderer::new(&config, &layout)?;
    let sheets = renderer.render_all(&pages)?;

    let combined = config
        .output_folder
        .join(source.combined_output_name(&config.date_string));
    merge::write_combined(&sheets, &combined, renderer.page_size())?;
    log::info!("Combined {} sheets into {}", sheets.len(), combined.display());

    println!("✓ Generated: {}", combined.display());
    println!("  Sheets: {} in {}", sheets.len(), config.output_folder.display());
    println!("  Attendees: {}", attendees.len());
    if !config.date_string.is_empty() {
        println!("  Date: {}", config.date_string);
    }

    Ok(())
}
