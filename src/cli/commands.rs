//! CLI commands implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{self, Settings};
use crate::export;
use crate::extract::{extract_for_slot, ExtractionClient, ExtractionUpdate};
use crate::imaging::{ingest_file, CameraSession, Captured, CommandFrameGrabber};
use crate::merge::{DraftForm, FormField};
use crate::models::{ImageSlot, RmaStatus};
use crate::store::RecordStore;

#[derive(Parser)]
#[command(name = "rma")]
#[command(about = "RMA case tracking for display panels")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and default configuration
    Init,

    /// Create a new RMA record (defaults applied for unset fields)
    Add {
        /// From Market or Factory
        #[arg(long)]
        source: Option<String>,
        /// Panel size, e.g. 65"
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        odf: Option<String>,
        #[arg(long)]
        bom: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        /// Model P/N (Panel Part No)
        #[arg(long)]
        model: Option<String>,
        /// Defect category
        #[arg(long)]
        defect: Option<String>,
        #[arg(long)]
        ver: Option<String>,
        /// Week/Cycle code
        #[arg(long)]
        wc: Option<String>,
        /// OC serial number
        #[arg(long)]
        serial: Option<String>,
        #[arg(long)]
        remark: Option<String>,
        /// Case date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List records, optionally filtered
    List {
        /// Substring match on id, serial, customer, or model
        query: Option<String>,
    },

    /// Show one record in full
    Show { id: String },

    /// Edit a single field of a record
    Edit {
        id: String,
        /// Field name (odf, bom, serial, model, defect, ...)
        field: String,
        value: String,
    },

    /// Capture an image into a record slot and run its extraction
    Capture {
        id: String,
        /// Slot: defect, factory, or serial
        slot: String,
        /// Image file to ingest
        #[arg(long)]
        file: Option<PathBuf>,
        /// Grab a still from the configured camera instead
        #[arg(long)]
        camera: bool,
    },

    /// Clear an image slot
    Clear {
        id: String,
        /// Slot: defect, factory, or serial
        slot: String,
    },

    /// Generate a detailed AI defect analysis into the remark field
    Analyze { id: String },

    /// Delete a record
    Delete { id: String },

    /// Set the review status of a record
    Status {
        id: String,
        /// One of: pending, approved, rejected, processing
        status: String,
    },

    /// Export all records to a styled spreadsheet with embedded photos
    Export {
        /// Output path (defaults to a date-stamped file in the current dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(config::default_data_dir);
    let settings = Settings::load(&data_dir)?;
    let store = RecordStore::open(Settings::records_path(&data_dir));

    match cli.command {
        Commands::Init => init(&data_dir, &settings),
        Commands::Add {
            source,
            size,
            odf,
            bom,
            brand,
            model,
            defect,
            ver,
            wc,
            serial,
            remark,
            date,
        } => {
            let mut draft = DraftForm::new();
            let values = [
                (FormField::Source, source),
                (FormField::Size, size),
                (FormField::Odf, odf),
                (FormField::Bom, bom),
                (FormField::Brand, brand),
                (FormField::ModelPn, model),
                (FormField::DefectDescription, defect),
                (FormField::Ver, ver),
                (FormField::Wc, wc),
                (FormField::OcSerialNumber, serial),
                (FormField::Remark, remark),
                (FormField::Date, date),
            ];
            for (field, value) in values {
                if let Some(value) = value {
                    draft.set_user(field, value);
                }
            }
            let id = store.next_id()?;
            store.upsert(draft.into_record(id.clone()))?;
            println!("Created RMA record {}", style(format!("NO. {}", id)).bold());
            Ok(())
        }
        Commands::List { query } => list(&store, query.as_deref()),
        Commands::Show { id } => show(&store, &id),
        Commands::Edit { id, field, value } => edit(&store, &id, &field, value),
        Commands::Capture {
            id,
            slot,
            file,
            camera,
        } => capture(&store, &settings, &id, &slot, file, camera).await,
        Commands::Clear { id, slot } => clear(&store, &id, &slot),
        Commands::Analyze { id } => analyze(&store, &settings, &id).await,
        Commands::Delete { id } => {
            store.delete(&id)?;
            println!("Deleted record {}", id);
            Ok(())
        }
        Commands::Status { id, status } => set_status(&store, &id, &status),
        Commands::Export { out } => export_records(&store, out),
    }
}

fn init(data_dir: &std::path::Path, settings: &Settings) -> anyhow::Result<()> {
    settings.save(data_dir)?;
    println!(
        "Initialized data directory at {}",
        style(data_dir.display()).green()
    );
    if !settings.extraction.has_credential() {
        println!(
            "{} no {} set; extraction will run in simulated mode",
            style("note:").yellow(),
            config::API_KEY_ENV
        );
    }
    Ok(())
}

fn parse_slot(slot: &str) -> anyhow::Result<ImageSlot> {
    ImageSlot::parse(slot)
        .ok_or_else(|| anyhow!("Unknown slot '{}'. Valid: defect, factory, serial", slot))
}

fn list(store: &RecordStore, query: Option<&str>) -> anyhow::Result<()> {
    let records = store.list()?;
    let filtered: Vec<_> = records
        .iter()
        .filter(|r| query.map_or(true, |q| r.matches_query(q)))
        .collect();

    if filtered.is_empty() {
        println!("No records.");
        return Ok(());
    }

    println!(
        "{:<5} {:<11} {:<11} {:<20} {:<18} {:<17} {:<7}",
        style("NO").bold(),
        style("DATE").bold(),
        style("STATUS").bold(),
        style("MODEL P/N").bold(),
        style("DEFECT").bold(),
        style("OC SERIAL").bold(),
        style("IMAGES").bold(),
    );
    for r in &filtered {
        let markers: String = ImageSlot::ALL
            .iter()
            .map(|slot| {
                if r.images.get(*slot).is_some() {
                    match slot {
                        ImageSlot::DefectSymptom => 'D',
                        ImageSlot::FactoryBatch => 'F',
                        ImageSlot::OcSerial => 'S',
                    }
                } else {
                    '-'
                }
            })
            .collect();
        println!(
            "{:<5} {:<11} {:<11} {:<20} {:<18} {:<17} {:<7}",
            r.id,
            r.date,
            r.status.as_str(),
            truncate(&r.model_pn, 20),
            truncate(&r.defect_description, 18),
            truncate(&r.oc_serial_number, 17),
            markers,
        );
    }
    println!("Total entries: {}", filtered.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn show(store: &RecordStore, id: &str) -> anyhow::Result<()> {
    let record = store
        .get(id)?
        .ok_or_else(|| anyhow!("No record with id {}", id))?;

    println!("{}", style(format!("RMA Record NO. {}", record.id)).bold());
    println!("  status:           {}", record.status.as_str());
    println!("  created:          {}", record.created_at.to_rfc3339());
    println!("  date:             {}", record.date);
    println!("  customer country: {}", record.customer_country);
    println!("  customer:         {}", record.customer);
    println!("  source:           {}", record.source);
    println!("  size:             {}", record.size);
    println!("  odf:              {}", record.odf);
    println!("  bom:              {}", record.bom);
    println!("  brand:            {}", record.brand);
    println!("  model p/n:        {}", record.model_pn);
    println!("  defect:           {}", record.defect_description);
    println!("  ver:              {}", record.ver);
    println!("  w/c:              {}", record.wc);
    println!("  oc serial:        {}", record.oc_serial_number);
    println!("  remark:           {}", record.remark);
    for slot in ImageSlot::ALL {
        let state = match record.images.get(slot) {
            Some(payload) => format!("{} ({} b64 chars)", payload.mime_type, payload.data.len()),
            None => "empty".to_string(),
        };
        println!("  image {:<11} {}", format!("{}:", slot.as_str()), state);
    }
    Ok(())
}

fn edit(store: &RecordStore, id: &str, field: &str, value: String) -> anyhow::Result<()> {
    let field = FormField::parse(field)
        .ok_or_else(|| anyhow!("Unknown field '{}'. Valid: odf, bom, serial, model, defect, size, source, brand, ver, wc, remark, date, country, customer", field))?;
    let mut record = store
        .get(id)?
        .ok_or_else(|| anyhow!("No record with id {}", id))?;

    let mut draft = DraftForm::from_record(&record);
    draft.set_user(field, value);
    draft.apply_to_record(&mut record);
    store.upsert(record)?;
    println!("Updated {} on record {}", field.as_str(), id);
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message.to_string());
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(spinner_style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn capture(
    store: &RecordStore,
    settings: &Settings,
    id: &str,
    slot: &str,
    file: Option<PathBuf>,
    camera: bool,
) -> anyhow::Result<()> {
    let slot = parse_slot(slot)?;
    let mut record = store
        .get(id)?
        .ok_or_else(|| anyhow!("No record with id {}", id))?;
    let profile = settings.imaging.profile_for(slot);

    let captured: Captured = if camera {
        let grabber = CommandFrameGrabber::open(settings.camera.clone())?;
        let mut session = CameraSession::new(grabber);
        let result = session.capture_still(profile);
        session.release();
        result?
    } else if let Some(path) = file {
        match ingest_file(&path, profile).with_context(|| format!("reading {}", path.display()))? {
            Some(captured) => captured,
            None => {
                println!(
                    "{} {} is not an image; slot left unchanged",
                    style("skipped:").yellow(),
                    path.display()
                );
                return Ok(());
            }
        }
    } else {
        bail!("Specify an image source: --file <path> or --camera");
    };

    println!(
        "Captured {} into {} ({} bytes encoded)",
        captured.source_name,
        slot.as_str(),
        captured.payload.data.len()
    );

    let mut draft = DraftForm::from_record(&record);
    draft.attach_image(slot, captured.payload.clone());

    // Capture immediately and unconditionally triggers the slot's extraction.
    let client = ExtractionClient::new(settings.extraction.clone());
    let bar = spinner("Extracting fields from image...");
    match extract_for_slot(&client, slot, &captured.payload).await {
        Ok(update) => {
            bar.finish_and_clear();
            describe_update(&update);
            draft.apply(update);
        }
        Err(e) => {
            bar.finish_and_clear();
            eprintln!(
                "{} {} — image saved; fill the fields manually or re-capture",
                style("extraction failed:").red(),
                e
            );
        }
    }

    draft.apply_to_record(&mut record);
    store.upsert(record)?;
    Ok(())
}

fn describe_update(update: &ExtractionUpdate) {
    match update {
        ExtractionUpdate::DefectCategory(category) => {
            println!("Detected defect category: {}", style(category).cyan());
        }
        ExtractionUpdate::OcLabel(details) => {
            println!(
                "OC label: serial={} wc={} model={} ver={}",
                details.oc_serial_number, details.wc, details.model_pn, details.ver
            );
        }
        ExtractionUpdate::FactoryLabel(details) => {
            println!(
                "Factory label: odf={} size={} bom={}",
                details.odf, details.size, details.bom
            );
        }
        ExtractionUpdate::DefectAnalysis(_) => {
            println!("Analysis added to remarks.");
        }
    }
}

fn clear(store: &RecordStore, id: &str, slot: &str) -> anyhow::Result<()> {
    let slot = parse_slot(slot)?;
    let mut record = store
        .get(id)?
        .ok_or_else(|| anyhow!("No record with id {}", id))?;
    record.images.clear(slot);
    store.upsert(record)?;
    println!("Cleared {} on record {}", slot.as_str(), id);
    Ok(())
}

async fn analyze(store: &RecordStore, settings: &Settings, id: &str) -> anyhow::Result<()> {
    let mut record = store
        .get(id)?
        .ok_or_else(|| anyhow!("No record with id {}", id))?;
    let Some(payload) = record.images.get(ImageSlot::DefectSymptom).cloned() else {
        bail!("Capture the defect symptom image first (rma capture {} defect ...)", id);
    };

    let client = ExtractionClient::new(settings.extraction.clone());
    let bar = spinner("Analyzing defect...");
    let analysis = client
        .analyze_defect(&payload, &record.defect_description)
        .await;
    bar.finish_and_clear();
    let analysis = analysis?;

    let mut draft = DraftForm::from_record(&record);
    draft.apply(ExtractionUpdate::DefectAnalysis(analysis));
    draft.apply_to_record(&mut record);
    store.upsert(record)?;
    println!("{} analysis added to remarks", style("done:").green());
    Ok(())
}

fn set_status(store: &RecordStore, id: &str, status: &str) -> anyhow::Result<()> {
    let status = RmaStatus::parse(status).ok_or_else(|| {
        anyhow!("Unknown status '{}'. Valid: pending, approved, rejected, processing", status)
    })?;
    let mut record = store
        .get(id)?
        .ok_or_else(|| anyhow!("No record with id {}", id))?;
    record.status = status;
    store.upsert(record)?;
    println!("Record {} is now {}", id, style(status.as_str()).bold());
    Ok(())
}

fn export_records(store: &RecordStore, out: Option<PathBuf>) -> anyhow::Result<()> {
    let records = store.list()?;
    let bytes = export::encode(&records).context("export failed")?;

    let path = out.unwrap_or_else(|| PathBuf::from(export::export_filename(Local::now())));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("writing workbook to {}", path.display()))?;
    println!(
        "Exported {} record(s) to {}",
        records.len(),
        style(path.display()).green()
    );
    Ok(())
}
