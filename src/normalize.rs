//! Text normalization applied to every region before pattern matching

use unicode_normalization::UnicodeNormalization;

/// Unicode compatibility composition (NFKC)
///
/// PDF text frequently carries ligatures, full-width forms and other
/// compatibility characters; after this pass they compare equal to their
/// plain counterparts.
pub fn normalize(raw: &str) -> String {
    raw.nfkc().collect()
}

/// Trim and collapse internal whitespace runs to a single space
pub fn clean(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Upper-case the first letter of every word, lower-case the rest
pub fn name_case(raw: &str) -> String {
    let cleaned = clean(raw);
    let mut out = String::with_capacity(cleaned.len());
    let mut upper = true;

    for c in cleaned.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c.is_whitespace();
    }

    out
}
