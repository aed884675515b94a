//! CLI tool splitting facesheet batches into one PDF per patient

use clap::Parser;
use facesheet_splitter::normalize::name_case;
use facesheet_splitter::{split_batch, BatchOptions, FileOutcome, SplitOptions};
use log::{error, warn};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Split facesheet batch PDFs into one PDF per patient",
    arg_required_else_help = true
)]
struct Args {
    /// Facesheet batch PDFs to split
    #[clap(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving the per-patient PDFs
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Skip a batch entirely when its first page is not a recognized facesheet
    #[clap(long)]
    strict: bool,

    /// Classify and report without writing any files
    #[clap(long)]
    dry_run: bool,

    /// Print one JSON summary line per input
    #[clap(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = BatchOptions {
        split: SplitOptions {
            require_leading_facesheet: args.strict,
            ..SplitOptions::default()
        },
        dry_run: args.dry_run,
    };

    let batch = split_batch(&args.inputs, &args.output_dir, &options);
    for outcome in &batch.files {
        report(outcome, args.json);
    }

    if batch.write_failures() > 0 {
        warn!(
            "{} of {} inputs could not be fully written",
            batch.write_failures(),
            args.inputs.len()
        );
    }
    if batch.failed_inputs() > 0 {
        error!(
            "{} of {} inputs could not be read",
            batch.failed_inputs(),
            args.inputs.len()
        );
    }
    process::exit(batch.exit_code());
}

fn report(outcome: &FileOutcome, json: bool) {
    if json {
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{}", line),
            Err(e) => error!(
                "{}: could not serialize summary: {}",
                outcome.input().display(),
                e
            ),
        }
        return;
    }

    let summary = match outcome {
        FileOutcome::Split(summary) => summary,
        FileOutcome::Failed { input, error } => {
            println!("File: {}", input.display());
            println!("Failed: {}", error);
            println!();
            return;
        }
    };

    println!("File: {}", summary.input.display());
    println!("Pages: {}", summary.page_count);
    println!("Patients found: {}", summary.records.len());
    if !summary.dropped_pages.is_empty() {
        println!("Unattributed pages: {:?}", summary.dropped_pages);
    }
    for record in &summary.records {
        let name = name_case(&format!("{}, {}", record.last_name, record.first_name));
        let dob = record
            .date_of_birth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown DOB".to_string());
        println!(
            "  {} ({}, {}) {} pages {:?}{}",
            name,
            dob,
            record.facility,
            record.pages.len(),
            record.pages,
            if record.is_valid() { "" } else { " [skipped]" }
        );
    }
    if !summary.outputs.is_empty() {
        println!("Outputs:");
    }
    for output in &summary.outputs {
        println!("  {}", output.display());
    }
    if let Some(e) = &summary.write_error {
        println!("Write failed: {}", e);
    }
    println!("Processing time: {}ms", summary.processing_time_ms);
    println!();
}
