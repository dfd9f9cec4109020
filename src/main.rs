// src/main.rs
use chrono::NaiveDate;
use clap::Parser;
use statement_parser::config::ParserConfig;
use statement_parser::extractors::date::resolve_reporting_date;
use statement_parser::layouts::brokerage::BrokerageLayout;
use statement_parser::layouts::goals::GoalsLayout;
use statement_parser::layouts::insurance::InsuranceLayout;
use statement_parser::layouts::{spreadsheet, Layout, StatementTables, TextLayout};
use statement_parser::models::StatementContext;
use statement_parser::source::{PageTextProvider, TextDumpProvider, XlsxReader};
use statement_parser::storage::{file_stem, StorageManager};
use statement_parser::utils::{self, marker_debug, AppError};
use std::path::{Path, PathBuf};

/// Command Line Interface for the statement parser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Statement layout of every input file
    #[arg(short, long, value_enum)]
    layout: Layout,

    /// Statement files: text exports with form-feed page breaks, or xlsx
    /// for the spreadsheet layout
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Password for encrypted PDF sources (optional). Text exports and xlsx
    /// files are read without it; a password given for them is ignored
    /// with a warning
    #[arg(short, long)]
    password: Option<String>,

    /// JSON file overriding layout vocabularies and patterns (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for extracted tables
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Reporting date (YYYY-MM-DD); overrides the date in file names
    #[arg(long)]
    statement_date: Option<NaiveDate>,

    /// Debug mode - save an annotated marker listing per statement
    #[arg(short, long)]
    debug: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments and set up logging (reads RUST_LOG env var)
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::info!(
        "Starting processing of {} {} statements into {}",
        args.files.len(),
        args.layout,
        args.output_dir
    );

    // 2. Load layout configuration
    let config = match &args.config {
        Some(path) => ParserConfig::from_file(path)?,
        None => ParserConfig::default(),
    };

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 4. Compile the layout once for every file
    let text_layout: Option<Box<dyn TextLayout>> = match args.layout {
        Layout::Goals => Some(Box::new(GoalsLayout::from_config(&config.goals)?)),
        Layout::Insurance => Some(Box::new(InsuranceLayout::from_config(&config.insurance)?)),
        Layout::Brokerage => Some(Box::new(BrokerageLayout::from_config(&config.brokerage)?)),
        Layout::Spreadsheet => None,
    };

    // 5. Process each file
    let mut success_count = 0;
    let mut failure_count = 0;

    for path in &args.files {
        tracing::info!("Processing {} statement: {}", args.layout, path.display());

        let result = match &text_layout {
            Some(layout) => process_text_statement(layout.as_ref(), path, &args, &storage),
            None => process_spreadsheet(path, &args, &config, &storage),
        };

        match result {
            Ok(rows) => {
                tracing::info!("Extracted {} rows from {}", rows, path.display());
                success_count += 1;
            }
            Err(AppError::Extraction(e)) if e.is_structural() => {
                tracing::error!("Layout not recognised in {}: {}", path.display(), e);
                failure_count += 1;
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", path.display(), e);
                failure_count += 1;
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to extract any tables from {} statements",
            failure_count
        )));
    }

    Ok(())
}

fn process_text_statement(
    layout: &dyn TextLayout,
    path: &Path,
    args: &Args,
    storage: &StorageManager,
) -> Result<usize, AppError> {
    let pages = TextDumpProvider::new().page_texts(path, args.password.as_deref())?;
    let lines = layout.line_sequence(&pages);
    let file_name = file_name(path);

    if args.debug {
        let listing_path = storage
            .layout_dir(layout.layout())?
            .join(format!("{}_markers.txt", file_stem(&file_name)));
        if let Err(e) = marker_debug::create_debug_listing(&lines, layout.markers(), &listing_path) {
            tracing::warn!("Failed to create marker listing: {}", e);
        }
    }

    let reporting_date = resolve_reporting_date(
        args.statement_date,
        &file_name,
        layout.statement_date_pattern().map(|re| (&lines, re)),
    )?;
    let ctx = StatementContext::new(reporting_date, file_name);

    let tables = layout.extract_tables(&lines, &ctx)?;
    save(storage, layout.layout(), &ctx, &tables)
}

fn process_spreadsheet(
    path: &Path,
    args: &Args,
    config: &ParserConfig,
    storage: &StorageManager,
) -> Result<usize, AppError> {
    if args.debug {
        tracing::debug!("No marker listing for spreadsheet input");
    }
    let file_name = file_name(path);
    let reporting_date = resolve_reporting_date(args.statement_date, &file_name, None)?;
    let ctx = StatementContext::new(reporting_date, file_name);

    let tables = spreadsheet::extract(&XlsxReader::new(path), &config.spreadsheet, &ctx)?;
    save(storage, Layout::Spreadsheet, &ctx, &tables)
}

fn save(
    storage: &StorageManager,
    layout: Layout,
    ctx: &StatementContext,
    tables: &StatementTables,
) -> Result<usize, AppError> {
    storage.save_tables(layout, ctx, tables)?;
    storage.save_metadata(layout, ctx, tables)?;
    Ok(tables.row_count())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
