//! Page classification and record segmentation
//!
//! Classification is a pure function of one page's regions and runs in
//! parallel. Segmentation folds the classifications, in page order, into
//! contiguous per-patient records.

use crate::detector::{detect_facility, Facility};
use crate::extract::PageExtractor;
use crate::layout::TextRegion;
use crate::record::{PatientRecord, Sex};
use chrono::NaiveDate;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

/// What one page says about record boundaries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageClassification {
    /// 1-indexed page number
    pub page: u32,
    pub facility: Facility,
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Sex,
}

impl PageClassification {
    /// A page that opens no record
    pub fn unknown(page: u32) -> Self {
        Self {
            page,
            facility: Facility::Unknown,
            name: None,
            date_of_birth: None,
            sex: Sex::Undetermined,
        }
    }

    pub fn starts_record(&self) -> bool {
        self.facility.is_known()
    }
}

/// Normalize a page's regions, detect its facility and extract its fields
pub fn classify_page(page: u32, regions: &[TextRegion]) -> PageClassification {
    let regions: Vec<TextRegion> = regions.iter().map(TextRegion::normalized).collect();
    let facility = detect_facility(&regions);
    let extractor = PageExtractor::new(facility, &regions);

    PageClassification {
        page,
        facility,
        name: extractor.extract_name(),
        date_of_birth: extractor.extract_dob(),
        sex: extractor.extract_sex(),
    }
}

/// Classify every page in parallel; `pages[i]` holds the regions of page `i + 1`
pub fn classify_pages(pages: &[Vec<TextRegion>]) -> Vec<PageClassification> {
    pages
        .par_iter()
        .enumerate()
        .map(|(i, regions)| classify_page(i as u32 + 1, regions))
        .collect()
}

/// Outcome of segmenting one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Segmentation {
    /// Closed records, in the order their first pages appear
    pub records: Vec<PatientRecord>,
    /// Pages seen before any record was open
    pub dropped_pages: Vec<u32>,
    /// False when page 1 is not a recognized facesheet
    pub starts_on_facesheet: bool,
}

/// Single-pass fold of page classifications into patient records
#[derive(Debug, Default)]
pub struct RecordSegmenter {
    active: Option<PatientRecord>,
    closed: Vec<PatientRecord>,
    dropped: Vec<u32>,
    first_page: Option<bool>,
}

impl RecordSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one page; pages must arrive in increasing order
    pub fn push(&mut self, page: &PageClassification) {
        if self.first_page.is_none() {
            let recognized = page.starts_record();
            if !recognized {
                warn!(
                    "document does not start on a recognized facesheet (page {})",
                    page.page
                );
            }
            self.first_page = Some(recognized);
        }

        if page.starts_record() {
            let record = PatientRecord::open(
                page.facility,
                page.name.as_deref(),
                page.date_of_birth,
                page.sex,
                page.page,
            );
            debug!(
                "page {}: {} record for {:?}",
                page.page, page.facility, record.last_name
            );
            if let Some(previous) = self.active.replace(record) {
                self.closed.push(previous);
            }
            return;
        }

        match self.active.as_mut() {
            Some(record) => {
                debug!("page {}: continues {:?}", page.page, record.last_name);
                record.pages.push(page.page);
            }
            None => {
                debug!("page {}: dropped, no open record", page.page);
                self.dropped.push(page.page);
            }
        }
    }

    /// Close the open record and return the result
    pub fn finish(mut self) -> Segmentation {
        if let Some(record) = self.active.take() {
            self.closed.push(record);
        }

        Segmentation {
            records: self.closed,
            dropped_pages: self.dropped,
            starts_on_facesheet: self.first_page.unwrap_or(false),
        }
    }
}

/// Segment classified pages given in page order
///
/// Pages before the first recognized facesheet are dropped and later
/// facesheets still open records; `starts_on_facesheet` reports whether page 1
/// was one. Discarding the whole document in that case is the caller's
/// choice, see [`crate::SplitOptions::require_leading_facesheet`].
pub fn segment<'a, I>(pages: I) -> Segmentation
where
    I: IntoIterator<Item = &'a PageClassification>,
{
    let mut segmenter = RecordSegmenter::new();
    for page in pages {
        segmenter.push(page);
    }
    segmenter.finish()
}
