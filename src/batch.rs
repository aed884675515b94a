//! Batch driver over many input files
//!
//! Each input is split on its own. An input that cannot be opened or parsed
//! is recorded as a failure and the batch moves on to the next one.

use crate::record::PatientRecord;
use crate::{split_pdf, write_records, PdfError, SplitOptions, SplitResult};
use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Options for a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub split: SplitOptions,
    /// Plan outputs without writing anything
    pub dry_run: bool,
}

/// Report for an input that was split
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub page_count: u32,
    pub starts_on_facesheet: bool,
    pub dropped_pages: Vec<u32>,
    pub records: Vec<PatientRecord>,
    /// Written files, or the planned paths on a dry run
    pub outputs: Vec<PathBuf>,
    /// Set when the input was split but its outputs could not be written
    pub write_error: Option<String>,
    pub processing_time_ms: u64,
}

/// Outcome of one input of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Split(FileReport),
    Failed { input: PathBuf, error: String },
}

impl FileOutcome {
    pub fn input(&self) -> &Path {
        match self {
            FileOutcome::Split(report) => &report.input,
            FileOutcome::Failed { input, .. } => input,
        }
    }
}

/// Outcomes of a batch, in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    /// Inputs that could not be opened or parsed
    pub fn failed_inputs(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Failed { .. }))
            .count()
    }

    /// Inputs that were split but not fully written
    pub fn write_failures(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Split(r) if r.write_error.is_some()))
            .count()
    }

    /// Process exit status: 1 when any input could not be opened or parsed
    pub fn exit_code(&self) -> i32 {
        if self.failed_inputs() > 0 {
            1
        } else {
            0
        }
    }
}

/// Split every input into per-patient PDFs under `out_dir`
pub fn split_batch<P: AsRef<Path>>(
    inputs: &[P],
    out_dir: &Path,
    options: &BatchOptions,
) -> BatchReport {
    let files = inputs
        .iter()
        .map(|input| split_one(input.as_ref(), out_dir, options))
        .collect();
    BatchReport { files }
}

fn split_one(input: &Path, out_dir: &Path, options: &BatchOptions) -> FileOutcome {
    info!("splitting {}", input.display());

    let result = match split_pdf(input, &options.split) {
        Ok(result) => result,
        Err(e) => {
            error!("{}: {}", input.display(), e);
            return FileOutcome::Failed {
                input: input.to_path_buf(),
                error: e.to_string(),
            };
        }
    };

    if !result.segmentation.starts_on_facesheet {
        warn!(
            "{}: PDF doesn't start on a new patient facesheet",
            input.display()
        );
    }

    let (outputs, write_error) = match place_outputs(&result, out_dir, options.dry_run) {
        Ok(outputs) => (outputs, None),
        Err(e) => {
            error!("{}: writing outputs failed: {}", input.display(), e);
            (Vec::new(), Some(e.to_string()))
        }
    };

    FileOutcome::Split(FileReport {
        input: input.to_path_buf(),
        page_count: result.page_count,
        starts_on_facesheet: result.segmentation.starts_on_facesheet,
        dropped_pages: result.segmentation.dropped_pages.clone(),
        records: result.segmentation.records.clone(),
        outputs,
        write_error,
        processing_time_ms: result.processing_time_ms,
    })
}

fn place_outputs(
    result: &SplitResult,
    out_dir: &Path,
    dry_run: bool,
) -> Result<Vec<PathBuf>, PdfError> {
    if dry_run {
        return Ok(result
            .planned_outputs()
            .into_iter()
            .map(|o| out_dir.join(o.file_name))
            .collect());
    }
    Ok(write_records(result, out_dir)?
        .into_iter()
        .map(|w| w.path)
        .collect())
}
