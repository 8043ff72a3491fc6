pub mod book;
pub mod cast;
pub mod cli;
pub mod config;
pub mod date;
pub mod decision;
pub mod error;
pub mod extract;
pub mod geo;
pub mod geodata;
pub mod io_utils;
pub mod lock;
pub mod number;
pub mod processor;
pub mod sampler;
pub mod table;

use std::{env, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    book::Book,
    cli::{CastArgs, Cli, Commands, DetectArgs, GeodataArgs, InputArgs},
    config::ProcessingConfig,
    extract::ExtractOptions,
    geo::GeoCatalog,
    processor::{FieldProcessor, FieldSummary},
    table::SummaryTable,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_cast", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect(args) => handle_detect(&args),
        Commands::Cast(args) => handle_cast(&args),
        Commands::Geodata(args) => handle_geodata(&args),
    }
}

fn handle_detect(args: &DetectArgs) -> Result<()> {
    let (processor, mut book) = prepare(&args.input)?;
    let summaries = process_book(&processor, &mut book)?;
    print!("{}", SummaryTable::from_summaries(&summaries).render());
    Ok(())
}

fn handle_cast(args: &CastArgs) -> Result<()> {
    let (processor, mut book) = prepare(&args.input)?;
    let summaries = process_book(&processor, &mut book)?;
    io_utils::write_report(args.output.as_deref(), &book)
        .with_context(|| format!("Writing processed book '{}'", book.title))?;
    if let Some(path) = &args.output {
        info!("Wrote {} cast field(s) to {:?}", summaries.len(), path);
    }
    Ok(())
}

fn handle_geodata(args: &GeodataArgs) -> Result<()> {
    let (processor, mut book) = prepare(&args.input)?;
    let (sheet_idx, field_id) = book
        .sheets
        .iter()
        .enumerate()
        .find_map(|(idx, sheet)| sheet.field(&args.field).map(|field| (idx, field.id)))
        .ok_or_else(|| anyhow!("Column '{}' not found in {:?}", args.field, args.input.input))?;
    let sheet = &mut book.sheets[sheet_idx];

    let summary = processor
        .process_field(sheet, field_id)?
        .completed()
        .ok_or_else(|| anyhow!("Field '{}' is busy", args.field))?;
    debug!("Field '{}' decided as {}", summary.title, summary.decision);
    let geodata = processor
        .process_geodata(sheet, field_id)?
        .completed()
        .ok_or_else(|| anyhow!("Geodata for field '{}' is busy", args.field))?;
    io_utils::write_report(args.output.as_deref(), &geodata)
        .with_context(|| format!("Writing geodata for field '{}'", args.field))?;
    Ok(())
}

fn prepare(args: &InputArgs) -> Result<(FieldProcessor, Book)> {
    let config = load_config(args)?;
    let catalog = match &args.geo {
        Some(path) => GeoCatalog::load(path)?,
        None => GeoCatalog::default(),
    };
    let processor = FieldProcessor::new(Arc::new(catalog), config)
        .context("Building field processor")?;

    let options = ExtractOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        has_headers: !args.no_header,
        ..ExtractOptions::default()
    };
    let book = extract::extract_csv(&args.input, &options)
        .with_context(|| format!("Extracting {:?}", args.input))?;
    Ok((processor, book))
}

fn load_config(args: &InputArgs) -> Result<ProcessingConfig> {
    let mut config = match &args.config {
        Some(path) => ProcessingConfig::load(path)?,
        None => ProcessingConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(confidence) = args.confidence {
        config.confidence_level = confidence;
    }
    config.validate().context("Validating sampling options")?;
    debug!("Sampling configuration: {config:?}");
    Ok(config)
}

fn process_book(processor: &FieldProcessor, book: &mut Book) -> Result<Vec<FieldSummary>> {
    processor
        .process_book(book)?
        .completed()
        .ok_or_else(|| anyhow!("Book '{}' is busy", book.title))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
