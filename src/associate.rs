//! Spatial association of a label region with its value region

use crate::layout::TextRegion;

/// Find the region most likely holding the value printed under `label`
///
/// Candidates must lie entirely below the label's bottom edge. Among those the
/// one whose top-left corner is nearest the label's top-left corner wins; on a
/// tie the earliest candidate wins. `label` itself is never returned, and an
/// empty qualifying set yields `None`.
pub fn just_below<'a>(label: &TextRegion, candidates: &'a [TextRegion]) -> Option<&'a TextRegion> {
    let origin = label.bbox.top_left();
    let mut closest: Option<(&'a TextRegion, f32)> = None;

    for candidate in candidates {
        if std::ptr::eq(candidate, label) || !candidate.bbox.is_below(&label.bbox) {
            continue;
        }

        let dist = origin.distance(&candidate.bbox.top_left());
        if closest.map_or(true, |(_, best)| dist < best) {
            closest = Some((candidate, dist));
        }
    }

    closest.map(|(region, _)| region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn region(text: &str, left: f32, top: f32) -> TextRegion {
        TextRegion::new(
            text,
            BoundingBox::new(left, left + 80.0, top, top - 12.0),
        )
    }

    #[test]
    fn test_picks_nearest_below() {
        let regions = vec![
            region("Cornerstone Hospital", 72.0, 760.0),
            region("PATIENT", 72.0, 660.0),
            region("ACCOUNT", 300.0, 660.0),
            region("DOE, JANE", 72.0, 630.0),
            region("12345", 300.0, 630.0),
            region("Admitted", 72.0, 500.0),
        ];

        let found = just_below(&regions[1], &regions).map(|r| r.text.as_str());
        assert_eq!(found, Some("DOE, JANE"));
    }

    #[test]
    fn test_none_when_nothing_below() {
        let regions = vec![
            region("Heading", 72.0, 760.0),
            region("PATIENT", 72.0, 100.0),
        ];
        assert_eq!(just_below(&regions[1], &regions), None);
        assert_eq!(just_below(&regions[1], &[]), None);
    }

    #[test]
    fn test_overlapping_region_does_not_qualify() {
        // Starts below the label's top but straddles its bottom edge
        let label = region("PATIENT", 72.0, 660.0);
        let straddling = region("noise", 72.0, 652.0);
        let candidates = vec![straddling];
        assert_eq!(just_below(&label, &candidates), None);
    }

    #[test]
    fn test_label_copy_is_excluded() {
        let label = region("PATIENT", 72.0, 660.0);
        let candidates = vec![label.clone(), region("DOE, JANE", 72.0, 620.0)];
        let found = just_below(&label, &candidates).map(|r| r.text.as_str());
        assert_eq!(found, Some("DOE, JANE"));
    }

    #[test]
    fn test_ties_resolve_to_first_and_repeat() {
        let label = region("PATIENT", 100.0, 660.0);
        // Mirror images left and right of the label, same distance
        let candidates = vec![
            region("left", 70.0, 620.0),
            region("right", 130.0, 620.0),
        ];

        let first = just_below(&label, &candidates).map(|r| r.text.as_str());
        assert_eq!(first, Some("left"));
        for _ in 0..5 {
            assert_eq!(just_below(&label, &candidates).map(|r| r.text.as_str()), first);
        }
    }
}
