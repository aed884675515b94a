//! Facesheet batch splitting using lopdf
//!
//! This crate provides:
//! - Facility detection on each page of a scanned/OCR'd facesheet batch
//! - Facility-specific extraction of patient name, date of birth and sex
//! - Segmentation of the page sequence into one record per patient
//! - Re-assembly of each record's pages into its own PDF

pub mod associate;
pub mod batch;
pub mod detector;
pub mod extract;
pub mod geometry;
pub mod layout;
pub mod normalize;
pub mod record;
pub mod segment;
pub mod writer;

pub use associate::just_below;
pub use batch::{split_batch, BatchOptions, BatchReport, FileOutcome, FileReport};
pub use detector::{detect_facility, Facility};
pub use extract::PageExtractor;
pub use geometry::{BoundingBox, Point};
pub use layout::{LayoutConfig, LayoutEngine, LopdfLayout, TextRegion};
pub use record::{parse_name, PatientRecord, Sex};
pub use segment::{classify_page, classify_pages, segment, PageClassification, Segmentation};
pub use writer::extract_pages;

use log::{debug, info, warn};
use lopdf::Document;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Options for splitting a batch
#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    /// Abandon a document whose first page is not a recognized facesheet
    pub require_leading_facesheet: bool,
    /// Line and region grouping
    pub layout: LayoutConfig,
}

/// A record scheduled for output
#[derive(Debug, Clone, Serialize)]
pub struct PlannedOutput {
    /// File name including the `.pdf` extension, unique within one document
    pub file_name: String,
    /// Sanitized stem the file name was built from
    pub stem: String,
    /// 1 for `stem.pdf`, n for `stem-n.pdf`
    pub sequence: usize,
    pub record: PatientRecord,
}

/// Result of splitting one document
pub struct SplitResult {
    /// The loaded source document
    pub document: Document,
    /// Page count
    pub page_count: u32,
    /// Per-page classification, in page order
    pub pages: Vec<PageClassification>,
    /// Records and dropped pages
    pub segmentation: Segmentation,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl SplitResult {
    /// Valid records with their output file names
    pub fn planned_outputs(&self) -> Vec<PlannedOutput> {
        plan_outputs(&self.segmentation.records)
    }
}

/// `stem.pdf` for sequence 1, `stem-n.pdf` after that
fn numbered_file_name(stem: &str, sequence: usize) -> String {
    if sequence <= 1 {
        format!("{}.pdf", stem)
    } else {
        format!("{}-{}.pdf", stem, sequence)
    }
}

/// Assign each valid record a file name no other record of the list uses
///
/// Invalid records are logged and left out. A repeated stem takes the next
/// free numeric suffix (`Doe.pdf`, `Doe-2.pdf`), skipping names that another
/// stem already produced. Names compare case-insensitively.
pub fn plan_outputs(records: &[PatientRecord]) -> Vec<PlannedOutput> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut outputs = Vec::new();

    for record in records {
        if !record.is_valid() {
            warn!(
                "skipping record on pages {:?}: facility {}, last name {:?}",
                record.pages, record.facility, record.last_name
            );
            continue;
        }

        let stem = record.file_stem();
        let mut sequence = 1;
        while !taken.insert(numbered_file_name(&stem, sequence).to_lowercase()) {
            sequence += 1;
        }

        outputs.push(PlannedOutput {
            file_name: numbered_file_name(&stem, sequence),
            stem,
            sequence,
            record: record.clone(),
        });
    }

    outputs
}

/// A patient PDF written to disk
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub pages: Vec<u32>,
}

/// Split a facesheet batch file
pub fn split_pdf<P: AsRef<Path>>(path: P, options: &SplitOptions) -> Result<SplitResult, PdfError> {
    let buffer = fs::read(path)?;
    split_pdf_mem(&buffer, options)
}

/// Split a facesheet batch held in memory
pub fn split_pdf_mem(buffer: &[u8], options: &SplitOptions) -> Result<SplitResult, PdfError> {
    let document = Document::load_mem(buffer)?;
    split_document(document, options)
}

/// Split an already loaded document
pub fn split_document(document: Document, options: &SplitOptions) -> Result<SplitResult, PdfError> {
    let start = std::time::Instant::now();

    if document.is_encrypted() {
        return Err(PdfError::Encrypted);
    }

    // Layout is sequential over the document; classification runs in parallel
    let layout = LopdfLayout::with_config(&document, options.layout.clone());
    let page_count = layout.page_count();
    let regions: Vec<Vec<TextRegion>> = (1..=page_count)
        .map(|page| {
            layout.ordered_text_regions(page).unwrap_or_else(|e| {
                warn!("page {}: layout failed, treating as unrecognized: {}", page, e);
                Vec::new()
            })
        })
        .collect();

    let pages = classify_pages(&regions);
    let mut segmentation = segment(&pages);

    if options.require_leading_facesheet && !segmentation.starts_on_facesheet {
        segmentation.records.clear();
        segmentation.dropped_pages = (1..=page_count).collect();
    }

    Ok(SplitResult {
        document,
        page_count,
        pages,
        segmentation,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Write every valid record of `result` as its own PDF under `out_dir`
///
/// Files are created exclusively: when a planned name already exists in
/// `out_dir` the record moves to the next free suffix, so earlier outputs
/// are never overwritten.
pub fn write_records<P: AsRef<Path>>(
    result: &SplitResult,
    out_dir: P,
) -> Result<Vec<WrittenFile>, PdfError> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let planned = result.planned_outputs();
    let mut taken: HashSet<String> = planned
        .iter()
        .map(|o| o.file_name.to_lowercase())
        .collect();

    let mut written = Vec::new();
    for output in planned {
        let bytes = extract_pages(&result.document, &output.record.pages)?;
        let (path, mut file) = create_unique(out_dir, &output, &mut taken)?;
        file.write_all(&bytes)?;
        info!(
            "wrote facesheet for {} ({} pages) to {}",
            output.record.last_name,
            output.record.pages.len(),
            path.display()
        );
        written.push(WrittenFile {
            path,
            pages: output.record.pages,
        });
    }

    Ok(written)
}

/// Create the planned file, or the next numbered name not yet on disk
fn create_unique(
    out_dir: &Path,
    output: &PlannedOutput,
    taken: &mut HashSet<String>,
) -> Result<(PathBuf, File), PdfError> {
    let mut sequence = output.sequence;
    let mut path = out_dir.join(&output.file_name);

    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already exists", path.display());
                let mut name = numbered_file_name(&output.stem, sequence);
                while !taken.insert(name.to_lowercase()) {
                    sequence += 1;
                    name = numbered_file_name(&output.stem, sequence);
                }
                path = out_dir.join(name);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF is encrypted")]
    Encrypted,
    #[error("Invalid PDF structure")]
    InvalidStructure,
    #[error("No pages selected")]
    EmptySelection,
    #[error("Page {0} is out of range")]
    PageOutOfRange(u32),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}
