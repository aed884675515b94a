//! Page layout: positioned text extraction and grouping into text regions
//!
//! The classification core only sees ordered [`TextRegion`]s through the
//! [`LayoutEngine`] trait. [`LopdfLayout`] is the bundled engine: it walks the
//! page content stream with lopdf, groups glyph runs into lines and lines into
//! regions, and orders the regions for reading.
//!
//! Engines must report boxes in PDF user space (origin bottom-left, Y up).

use crate::geometry::BoundingBox;
use crate::normalize::normalize;
use crate::PdfError;
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;

/// A block of text on one page with its bounding box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    pub text: String,
    pub bbox: BoundingBox,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }

    /// Copy of this region with NFKC-normalized text
    pub fn normalized(&self) -> TextRegion {
        TextRegion {
            text: normalize(&self.text),
            bbox: self.bbox,
        }
    }
}

/// Source of ordered text regions for each page of a document
pub trait LayoutEngine {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Regions of a 1-indexed page in reading order
    fn ordered_text_regions(&self, page: u32) -> Result<Vec<TextRegion>, PdfError>;
}

/// Tuning for line and region grouping
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Max baseline difference for two items to share a line (points)
    pub line_y_tolerance: f32,
    /// Max vertical gap between lines of one region, as a multiple of font size
    pub block_gap_ratio: f32,
    /// Portion of the font size above the baseline
    pub ascent_ratio: f32,
    /// Portion of the font size below the baseline
    pub descent_ratio: f32,
    /// Horizontal gap, as a fraction of text width, that separates two columns
    pub column_gap_ratio: f32,
    /// Pages with fewer items are always treated as a single column
    pub min_items_for_columns: usize,
    /// Average glyph width as a fraction of font size
    pub char_width_ratio: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_y_tolerance: 3.0,
            block_gap_ratio: 1.0,
            ascent_ratio: 0.8,
            descent_ratio: 0.2,
            column_gap_ratio: 0.20,
            min_items_for_columns: 20,
            char_width_ratio: 0.5,
        }
    }
}

/// A text item with position information
#[derive(Debug, Clone)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Baseline Y position (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Estimated width of the text
    pub width: f32,
    /// Rendered font size
    pub font_size: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

/// A line of text (grouped text items)
#[derive(Debug, Clone)]
pub struct TextLine {
    pub items: Vec<TextItem>,
    pub y: f32,
    pub page: u32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn font_size(&self) -> f32 {
        self.items.iter().map(|i| i.font_size).fold(0.0, f32::max)
    }

    fn bounding_box(&self, config: &LayoutConfig) -> BoundingBox {
        let left = self.items.iter().map(|i| i.x).fold(f32::INFINITY, f32::min);
        let right = self
            .items
            .iter()
            .map(|i| i.x + i.width)
            .fold(f32::NEG_INFINITY, f32::max);
        let size = self.font_size();
        BoundingBox::new(
            left,
            right,
            self.y + size * config.ascent_ratio,
            self.y - size * config.descent_ratio,
        )
    }
}

/// Layout engine over a loaded lopdf document
pub struct LopdfLayout<'a> {
    doc: &'a Document,
    pages: BTreeMap<u32, ObjectId>,
    config: LayoutConfig,
}

impl<'a> LopdfLayout<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self::with_config(doc, LayoutConfig::default())
    }

    pub fn with_config(doc: &'a Document, config: LayoutConfig) -> Self {
        Self {
            doc,
            pages: doc.get_pages(),
            config,
        }
    }

    /// Raw positioned text items of one page, in content stream order
    pub fn page_items(&self, page: u32) -> Result<Vec<TextItem>, PdfError> {
        let page_id = *self
            .pages
            .get(&page)
            .ok_or(PdfError::PageOutOfRange(page))?;
        extract_page_text_items(self.doc, page_id, page, &self.config)
    }
}

impl LayoutEngine for LopdfLayout<'_> {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn ordered_text_regions(&self, page: u32) -> Result<Vec<TextRegion>, PdfError> {
        let items = self.page_items(page)?;
        Ok(group_into_regions(items, &self.config))
    }
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Text and graphics state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    leading: Option<f32>,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

    fn new() -> Self {
        Self {
            ctm: Self::IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: None,
            text_matrix: Self::IDENTITY,
            line_matrix: Self::IDENTITY,
            in_text_block: false,
        }
    }

    /// Move to the start of a line offset by `(tx, ty)` in text space
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.leading.unwrap_or(self.font_size * 1.2);
        self.move_line(0.0, -leading);
    }

    fn make_item(&self, text: String, page: u32, config: &LayoutConfig) -> TextItem {
        let rendered_size = effective_font_size(self.font_size, &self.text_matrix);
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        let width = text.trim().chars().count() as f32 * rendered_size * config.char_width_ratio;
        TextItem {
            text,
            x: combined[4],
            y: combined[5],
            width,
            font_size: rendered_size,
            page,
        }
    }
}

/// Extract text items from a single page
fn extract_page_text_items(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
    config: &LayoutConfig,
) -> Result<Vec<TextItem>, PdfError> {
    use lopdf::content::Content;

    let mut items = Vec::new();

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Parse(e.to_string()))?;

    let content = Content::decode(&content_data).map_err(|e| PdfError::Parse(e.to_string()))?;

    let mut state = TextState::new();

    for op in &content.operations {
        let mut shown: Option<String> = None;

        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let m = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    state.ctm = multiply_matrices(&m, &state.ctm);
                }
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = TextState::IDENTITY;
                state.line_matrix = TextState::IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(get_number) {
                    state.leading = Some(leading);
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = Some(-ty);
                    }
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        state.text_matrix[i] = get_number(operand)
                            .unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    state.line_matrix = state.text_matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if state.in_text_block {
                    shown = op
                        .operands
                        .first()
                        .and_then(|o| decode_operand(o, doc, &fonts, &state.font));
                }
            }
            "TJ" => {
                if state.in_text_block {
                    if let Some(Ok(array)) = op.operands.first().map(|o| o.as_array()) {
                        let joined: String = array
                            .iter()
                            .filter_map(|o| decode_operand(o, doc, &fonts, &state.font))
                            .collect();
                        shown = Some(joined);
                    }
                }
            }
            "'" => {
                state.next_line();
                shown = op
                    .operands
                    .first()
                    .and_then(|o| decode_operand(o, doc, &fonts, &state.font));
            }
            "\"" => {
                state.next_line();
                shown = op
                    .operands
                    .get(2)
                    .and_then(|o| decode_operand(o, doc, &fonts, &state.font));
            }
            _ => {}
        }

        if let Some(text) = shown {
            if !text.trim().is_empty() {
                items.push(state.make_item(text, page_num, config));
            }
        }
    }

    Ok(items)
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Font size scaled by the text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Decode a string operand using the current font's encoding
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // UTF-16BE with BOM, otherwise Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Horizontal slice of a page holding one column of text
#[derive(Debug, Clone)]
struct Column {
    x_min: f32,
    x_max: f32,
}

impl Column {
    fn holds(&self, item: &TextItem) -> bool {
        item.x >= self.x_min && item.x < self.x_max
    }
}

/// Split a page into at most two columns on a wide X gap
fn detect_columns(items: &[TextItem], config: &LayoutConfig) -> Vec<Column> {
    if items.is_empty() {
        return vec![];
    }

    let x_min = items.iter().map(|i| i.x).fold(f32::INFINITY, f32::min);
    let x_max = items
        .iter()
        .map(|i| i.x + i.width)
        .fold(f32::NEG_INFINITY, f32::max);
    let single = vec![Column {
        x_min,
        x_max: x_max + 1.0,
    }];

    if items.len() < config.min_items_for_columns {
        return single;
    }

    let mut xs: Vec<f32> = items.iter().map(|i| i.x).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let gap_threshold = (x_max - x_min) * config.column_gap_ratio;
    let widest = xs
        .windows(2)
        .map(|w| (w[1] - w[0], (w[0] + w[1]) / 2.0))
        .filter(|(gap, _)| *gap > gap_threshold)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let Some((_, boundary)) = widest else {
        return single;
    };

    let columns = vec![
        Column {
            x_min,
            x_max: boundary,
        },
        Column {
            x_min: boundary,
            x_max: x_max + 1.0,
        },
    ];

    // Each column needs at least a fifth of the items to count
    let min_items = items.len() / 5;
    let substantial = columns
        .iter()
        .all(|col| items.iter().filter(|i| col.holds(i)).count() >= min_items);

    if substantial {
        columns
    } else {
        single
    }
}

/// Merge consecutive items sharing a baseline into lines
///
/// Stream order is kept: only an item on the same baseline as the most recent
/// line joins it.
pub fn group_into_lines(items: Vec<TextItem>, config: &LayoutConfig) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for item in items {
        let same_line = lines.last().is_some_and(|last| {
            last.page == item.page && (last.y - item.y).abs() < config.line_y_tolerance
        });

        if let Some(last) = lines.last_mut().filter(|_| same_line) {
            last.items.push(item);
            continue;
        }

        let (y, page) = (item.y, item.page);
        lines.push(TextLine {
            items: vec![item],
            y,
            page,
        });
    }

    for line in &mut lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    lines
}

/// Stack vertically adjacent, horizontally overlapping lines into regions
fn group_lines_into_regions(lines: Vec<TextLine>, config: &LayoutConfig) -> Vec<TextRegion> {
    struct Block {
        bbox: BoundingBox,
        lines: Vec<String>,
        font_size: f32,
    }

    let mut blocks: Vec<Block> = Vec::new();

    for line in lines {
        let bbox = line.bounding_box(config);
        let font_size = line.font_size();
        let text = line.text();

        let joins = blocks.last().is_some_and(|b| {
            let gap = b.bbox.bottom - bbox.top;
            gap >= -config.line_y_tolerance
                && gap <= config.block_gap_ratio * b.font_size.max(font_size)
                && b.bbox.overlaps_horizontally(&bbox)
        });

        if let Some(block) = blocks.last_mut().filter(|_| joins) {
            block.bbox = block.bbox.union(&bbox);
            block.lines.push(text);
            block.font_size = block.font_size.max(font_size);
            continue;
        }

        blocks.push(Block {
            bbox,
            lines: vec![text],
            font_size,
        });
    }

    let mut regions: Vec<TextRegion> = blocks
        .into_iter()
        .map(|b| TextRegion::new(b.lines.join("\n"), b.bbox))
        .collect();

    // Top of the column first; stable so equal tops keep stream order
    regions.sort_by(|a, b| {
        b.bbox
            .top
            .partial_cmp(&a.bbox.top)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    regions
}

/// Group the items of one page into ordered regions, column by column
pub fn group_into_regions(items: Vec<TextItem>, config: &LayoutConfig) -> Vec<TextRegion> {
    let columns = detect_columns(&items, config);

    if columns.len() <= 1 {
        return group_lines_into_regions(group_into_lines(items, config), config);
    }

    let mut regions = Vec::new();
    for column in &columns {
        let col_items: Vec<TextItem> = items.iter().filter(|i| column.holds(i)).cloned().collect();
        regions.extend(group_lines_into_regions(
            group_into_lines(col_items, config),
            config,
        ));
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, x: f32, y: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            y,
            width: text.len() as f32 * 6.0,
            font_size: 12.0,
            page: 1,
        }
    }

    #[test]
    fn test_group_into_lines() {
        let config = LayoutConfig::default();
        let items = vec![
            item("Hello", 100.0, 700.0),
            item("World", 160.0, 700.0),
            item("Next line", 100.0, 680.0),
        ];

        let lines = group_into_lines(items, &config);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello World");
        assert_eq!(lines[1].text(), "Next line");
    }

    #[test]
    fn test_adjacent_lines_form_one_region() {
        let config = LayoutConfig::default();
        let items = vec![
            item("Patient Name: DOE, JANE", 72.0, 700.0),
            item("DOB: 04/02/1971", 72.0, 686.0),
            item("Insurance", 72.0, 600.0),
        ];

        let regions = group_into_regions(items, &config);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "Patient Name: DOE, JANE\nDOB: 04/02/1971");
        assert_eq!(regions[1].text, "Insurance");
        assert!(regions[0].bbox.top > regions[1].bbox.top);
        assert!((regions[0].bbox.top - 709.6).abs() < 1e-3);
        assert!((regions[0].bbox.bottom - 683.6).abs() < 1e-3);
    }

    #[test]
    fn test_regions_ordered_top_down() {
        let config = LayoutConfig::default();
        // Footer drawn before the header in the stream
        let items = vec![item("Footer", 72.0, 40.0), item("Header", 72.0, 750.0)];

        let regions = group_into_regions(items, &config);
        let texts: Vec<&str> = regions.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Header", "Footer"]);
    }

    #[test]
    fn test_two_columns_read_left_first() {
        let config = LayoutConfig::default();
        let mut items = Vec::new();
        for row in 0..12 {
            let y = 700.0 - row as f32 * 14.0;
            items.push(item("left", 50.0, y));
            items.push(item("right", 400.0, y));
        }

        let regions = group_into_regions(items, &config);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].text.starts_with("left"));
        assert!(regions[1].text.starts_with("right"));
    }

    #[test]
    fn test_normalized_region() {
        let region = TextRegion::new(
            "\u{FF23}ornerstone",
            BoundingBox::new(0.0, 10.0, 10.0, 0.0),
        );
        assert_eq!(region.normalized().text, "Cornerstone");
        assert_eq!(region.normalized().bbox, region.bbox);
    }
}
