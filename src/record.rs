//! Patient record model

use crate::detector::Facility;
use chrono::NaiveDate;
use serde::Serialize;

/// Patient sex as printed on the facesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Sex {
    #[default]
    Undetermined,
    Female,
    Male,
}

impl Sex {
    /// Interpret a captured sex value by its first letter
    pub fn parse(value: &str) -> Sex {
        match value.trim().to_lowercase().chars().next() {
            Some('m') => Sex::Male,
            Some('f') => Sex::Female,
            _ => Sex::Undetermined,
        }
    }
}

/// Split a "Last, First" name on its first comma
///
/// Returns `None` for empty or whitespace-only input. A name without a comma is
/// all last name.
pub fn parse_name(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.split_once(',') {
        Some((last, first)) => Some((last.trim().to_string(), first.trim().to_string())),
        None => Some((raw.to_string(), String::new())),
    }
}

/// One patient's run of pages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientRecord {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Sex,
    pub facility: Facility,
    /// 1-indexed source pages, in document order
    pub pages: Vec<u32>,
}

impl PatientRecord {
    /// Open a record from the fields extracted off its first page
    pub fn open(
        facility: Facility,
        name: Option<&str>,
        date_of_birth: Option<NaiveDate>,
        sex: Sex,
        first_page: u32,
    ) -> Self {
        let (last_name, first_name) = name.and_then(parse_name).unwrap_or_default();
        Self {
            first_name,
            last_name,
            date_of_birth,
            sex,
            facility,
            pages: vec![first_page],
        }
    }

    /// Whether the record can be written out
    pub fn is_valid(&self) -> bool {
        !self.last_name.trim().is_empty() && self.facility.is_known()
    }

    /// Output file name without extension
    ///
    /// Derived from the last name with leading and trailing non-alphanumerics
    /// trimmed and commas and path separators turned into hyphens. Falls back to
    /// `facesheet-` followed by the concatenated page numbers.
    pub fn file_stem(&self) -> String {
        let trimmed = self
            .last_name
            .trim_matches(|c: char| !c.is_alphanumeric())
            .replace([',', '/', '\\'], "-");

        if trimmed.is_empty() {
            let pages: String = self.pages.iter().map(|p| p.to_string()).collect();
            format!("facesheet-{}", pages)
        } else {
            trimmed
        }
    }
}
