//! Facility-specific extraction of patient name, date of birth and sex
//!
//! Each facility's rules are static data selected by an exhaustive match in
//! [`Facility::rules`]. `Unknown` has no rules and every extraction on it comes
//! back empty.

use crate::associate::just_below;
use crate::detector::Facility;
use crate::layout::TextRegion;
use crate::normalize::clean;
use crate::record::Sex;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

static MH_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^Patient Name:(.+)$").unwrap());

static METHODIST_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(\w[a-zA-Z,\- ]+)\s+\(MRN:").unwrap());

static DOB_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^dob: (\d\d/\d\d/\d{4})$").unwrap());

static CORNERSTONE_DOB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)xxx-xx-9999 (\d\d/\d\d/\d\d) ").unwrap());

static SEX_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^Sex:([\w ]+)$").unwrap());

/// Two-digit years below this land in the 2000s, the rest in the 1900s
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 30;

/// How a facility's layout exposes the patient name
pub enum NameRule {
    /// Capture group 1 of a label-anchored pattern
    Pattern(&'static Lazy<Regex>),
    /// Text of the region just below a label region with this exact text
    BelowLabel(&'static str),
}

/// Year width of a captured `MM/DD/YY[YY]` date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearDigits {
    Two,
    Four,
}

pub struct DobRule {
    pub pattern: &'static Lazy<Regex>,
    pub year: YearDigits,
}

/// Extraction rules of one facility layout
pub struct FacilityRules {
    pub name: NameRule,
    pub dob: Option<DobRule>,
    pub sex: Option<&'static Lazy<Regex>>,
}

static MEMORIAL_HERMANN_RULES: FacilityRules = FacilityRules {
    name: NameRule::Pattern(&MH_NAME_RE),
    dob: Some(DobRule {
        pattern: &DOB_LABEL_RE,
        year: YearDigits::Four,
    }),
    sex: Some(&SEX_LABEL_RE),
};

// No reliable sex field on these sheets
static CORNERSTONE_RULES: FacilityRules = FacilityRules {
    name: NameRule::BelowLabel("patient"),
    dob: Some(DobRule {
        pattern: &CORNERSTONE_DOB_RE,
        year: YearDigits::Two,
    }),
    sex: None,
};

static METHODIST_RULES: FacilityRules = FacilityRules {
    name: NameRule::Pattern(&METHODIST_NAME_RE),
    dob: Some(DobRule {
        pattern: &DOB_LABEL_RE,
        year: YearDigits::Four,
    }),
    sex: Some(&SEX_LABEL_RE),
};

impl Facility {
    /// Extraction rules for this facility, `None` for `Unknown`
    pub fn rules(self) -> Option<&'static FacilityRules> {
        match self {
            Facility::Unknown => None,
            Facility::MemorialHermann => Some(&MEMORIAL_HERMANN_RULES),
            Facility::Cornerstone => Some(&CORNERSTONE_RULES),
            Facility::Methodist => Some(&METHODIST_RULES),
        }
    }
}

/// Field extractor bound to one page's normalized regions
pub struct PageExtractor<'a> {
    facility: Facility,
    regions: &'a [TextRegion],
}

impl<'a> PageExtractor<'a> {
    pub fn new(facility: Facility, regions: &'a [TextRegion]) -> Self {
        Self { facility, regions }
    }

    /// Raw "Last, First" name string
    pub fn extract_name(&self) -> Option<String> {
        match &self.facility.rules()?.name {
            NameRule::Pattern(re) => self
                .first_capture(re)
                .map(|c| clean(&c))
                .filter(|c| !c.is_empty()),
            NameRule::BelowLabel(label) => self.name_below_label(label),
        }
    }

    pub fn extract_dob(&self) -> Option<NaiveDate> {
        let rule = self.facility.rules()?.dob.as_ref()?;
        let captured = self.first_capture(rule.pattern)?;
        let parsed = parse_date(&captured, rule.year);
        if parsed.is_none() {
            debug!("{}: unparsable date of birth {:?}", self.facility, captured);
        }
        parsed
    }

    pub fn extract_sex(&self) -> Sex {
        self.facility
            .rules()
            .and_then(|rules| rules.sex)
            .and_then(|re| self.first_capture(re))
            .map(|c| Sex::parse(&c))
            .unwrap_or_default()
    }

    /// Group 1 of the first region (in reading order) matching `re`
    fn first_capture(&self, re: &Regex) -> Option<String> {
        self.regions.iter().find_map(|region| {
            re.captures(region.text.trim())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    fn name_below_label(&self, label: &str) -> Option<String> {
        let label_region = self
            .regions
            .iter()
            .find(|r| r.text.trim().eq_ignore_ascii_case(label))?;

        match just_below(label_region, self.regions) {
            Some(value) => Some(clean(&value.text)).filter(|v| !v.is_empty()),
            None => {
                warn!(
                    "{}: no region below the {:?} label",
                    self.facility, label_region.text
                );
                None
            }
        }
    }
}

/// Parse an `MM/DD/YY` or `MM/DD/YYYY` capture
fn parse_date(captured: &str, year: YearDigits) -> Option<NaiveDate> {
    let captured = captured.trim();
    match year {
        YearDigits::Four => NaiveDate::parse_from_str(captured, "%m/%d/%Y").ok(),
        YearDigits::Two => {
            let date = NaiveDate::parse_from_str(captured, "%m/%d/%y").ok()?;
            let yy = date.year().rem_euclid(100);
            let century = if yy < TWO_DIGIT_YEAR_PIVOT { 2000 } else { 1900 };
            date.with_year(century + yy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn region(text: &str, top: f32) -> TextRegion {
        TextRegion::new(text, BoundingBox::new(72.0, 300.0, top, top - 12.0))
    }

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_memorial_hermann_fields() {
        let regions = vec![
            region("Memorial Hermann Hospital", 760.0),
            region("Patient Name:  DOE,   JANE ", 700.0),
            region("DOB: 04/02/1971\nSex: Female", 660.0),
        ];
        let ex = PageExtractor::new(Facility::MemorialHermann, &regions);
        assert_eq!(ex.extract_name().as_deref(), Some("DOE, JANE"));
        assert_eq!(ex.extract_dob(), ymd(1971, 4, 2));
        assert_eq!(ex.extract_sex(), Sex::Female);
    }

    #[test]
    fn test_sex_variants() {
        for (text, expected) in [
            ("Sex: Female", Sex::Female),
            ("Sex: F", Sex::Female),
            ("sex:m", Sex::Male),
            ("Gender: M", Sex::Undetermined),
        ] {
            let regions = vec![region(text, 700.0)];
            let ex = PageExtractor::new(Facility::MemorialHermann, &regions);
            assert_eq!(ex.extract_sex(), expected, "text {:?}", text);
        }
    }

    #[test]
    fn test_malformed_dob_is_none() {
        for text in ["DOB: 13/45/1971", "DOB: 04/02/71", "DOB: 04/02/1971 extra"] {
            let regions = vec![region(text, 700.0)];
            let ex = PageExtractor::new(Facility::MemorialHermann, &regions);
            assert_eq!(ex.extract_dob(), None, "text {:?}", text);
        }
    }

    #[test]
    fn test_first_match_wins() {
        let regions = vec![
            region("Patient Name: FIRST, ONE", 700.0),
            region("Patient Name: SECOND, TWO", 600.0),
        ];
        let ex = PageExtractor::new(Facility::MemorialHermann, &regions);
        assert_eq!(ex.extract_name().as_deref(), Some("FIRST, ONE"));
    }

    #[test]
    fn test_cornerstone_fields() {
        let regions = vec![
            region("Cornerstone Hospital", 760.0),
            region("PATIENT", 700.0),
            region("DOE, JANE", 670.0),
            region("xxx-xx-9999 04/02/71 F", 600.0),
            region("Sex: Female", 560.0),
        ];
        let ex = PageExtractor::new(Facility::Cornerstone, &regions);
        assert_eq!(ex.extract_name().as_deref(), Some("DOE, JANE"));
        assert_eq!(ex.extract_dob(), ymd(1971, 4, 2));
        assert_eq!(ex.extract_sex(), Sex::Undetermined);
    }

    #[test]
    fn test_cornerstone_missing_label_or_value() {
        let regions = vec![region("Cornerstone Hospital", 760.0)];
        let ex = PageExtractor::new(Facility::Cornerstone, &regions);
        assert_eq!(ex.extract_name(), None);

        // Label is the lowest region on the page
        let regions = vec![region("Cornerstone Hospital", 760.0), region("Patient", 40.0)];
        let ex = PageExtractor::new(Facility::Cornerstone, &regions);
        assert_eq!(ex.extract_name(), None);
    }

    #[test]
    fn test_methodist_name() {
        let regions = vec![
            region("Houston Methodist", 760.0),
            region("Maya, Delfina (MRN: 110302983) DOB: 1212411944", 700.0),
        ];
        let ex = PageExtractor::new(Facility::Methodist, &regions);
        assert_eq!(ex.extract_name().as_deref(), Some("Maya, Delfina"));
        assert_eq!(ex.extract_dob(), None);
    }

    #[test]
    fn test_unknown_is_inert() {
        let regions = vec![
            region("Patient Name: DOE, JANE", 700.0),
            region("DOB: 04/02/1971", 660.0),
            region("Sex: F", 640.0),
        ];
        let ex = PageExtractor::new(Facility::Unknown, &regions);
        assert_eq!(ex.extract_name(), None);
        assert_eq!(ex.extract_dob(), None);
        assert_eq!(ex.extract_sex(), Sex::Undetermined);
    }

    #[test]
    fn test_two_digit_years() {
        assert_eq!(parse_date("04/02/71", YearDigits::Two), ymd(1971, 4, 2));
        assert_eq!(parse_date("12/31/05", YearDigits::Two), ymd(2005, 12, 31));
        assert_eq!(parse_date("01/01/29", YearDigits::Two), ymd(2029, 1, 1));
        assert_eq!(parse_date("01/01/30", YearDigits::Two), ymd(1930, 1, 1));
        assert_eq!(parse_date("06/15/45", YearDigits::Two), ymd(1945, 6, 15));
        assert_eq!(parse_date("02/29/00", YearDigits::Two), ymd(2000, 2, 29));
        assert_eq!(parse_date("02/30/05", YearDigits::Two), None);
        assert_eq!(parse_date("ab/cd/ef", YearDigits::Two), None);
    }
}
