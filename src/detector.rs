//! Facility detection
//!
//! A page is attributed to a facility when one of its regions mentions that
//! facility's keyword. Regions are scanned in reading order and, within a
//! region, facilities are tried in declaration order of [`Facility`], so the
//! first region carrying any keyword decides.

use crate::layout::TextRegion;
use serde::Serialize;
use std::fmt;

/// Source institution whose facesheet layout a page follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Facility {
    /// Not a recognized facesheet; a continuation page or noise
    #[default]
    Unknown,
    MemorialHermann,
    Cornerstone,
    Methodist,
}

impl Facility {
    /// Known facilities in detection priority order
    pub const KNOWN: [Facility; 3] = [
        Facility::MemorialHermann,
        Facility::Cornerstone,
        Facility::Methodist,
    ];

    /// Lower-case keyword identifying the facility on a page
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Facility::Unknown => None,
            Facility::MemorialHermann => Some("memorial"),
            Facility::Cornerstone => Some("cornerstone"),
            Facility::Methodist => Some("methodist"),
        }
    }

    pub fn is_known(self) -> bool {
        self != Facility::Unknown
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facility::Unknown => "unknown",
            Facility::MemorialHermann => "memorial_hermann",
            Facility::Cornerstone => "cornerstone",
            Facility::Methodist => "methodist",
        };
        f.write_str(name)
    }
}

/// Classify a page from its normalized, ordered regions
pub fn detect_facility(regions: &[TextRegion]) -> Facility {
    for region in regions {
        let text = region.text.to_lowercase();
        for facility in Facility::KNOWN {
            if facility.keyword().is_some_and(|k| text.contains(k)) {
                return facility;
            }
        }
    }

    Facility::Unknown
}
