//! Page text extraction from PDF using lopdf
//!
//! Each page's content stream is walked for text-showing operators. Text
//! items on the same baseline are joined into lines, and a page's lines are
//! joined with newlines, so the report's line structure survives into the
//! segmenter and block parser.

use crate::ReportError;
use log::{debug, warn};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// Items closer than this vertically are on the same line
const LINE_Y_TOLERANCE: f32 = 3.0;

/// A text item with position information
#[derive(Debug, Clone)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
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
            .map(|i| i.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extract the plain text of every page of a PDF file, in page order
pub fn extract_page_texts<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ReportError> {
    let doc = Document::load(path)?;
    page_texts_from_doc(&doc)
}

/// Extract the plain text of every page from a PDF memory buffer
pub fn extract_page_texts_mem(buffer: &[u8]) -> Result<Vec<String>, ReportError> {
    let doc = Document::load_mem(buffer)?;
    page_texts_from_doc(&doc)
}

fn page_texts_from_doc(doc: &Document) -> Result<Vec<String>, ReportError> {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ReportError::NoPages);
    }

    let texts = pages
        .iter()
        .map(|(&page_num, &page_id)| match extract_page_text_items(doc, page_id, page_num) {
            Ok(items) => {
                let lines = group_into_lines(items);
                debug!("Page {}: {} lines", page_num, lines.len());
                lines
                    .iter()
                    .map(TextLine::text)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Err(e) => {
                warn!("Page {}: could not read content ({}), treating as empty", page_num, e);
                String::new()
            }
        })
        .collect();

    Ok(texts)
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

/// Text state while walking a content stream
struct TextCursor {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextCursor {
    const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

    fn new() -> Self {
        Self {
            ctm: Self::IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            text_matrix: Self::IDENTITY,
            line_matrix: Self::IDENTITY,
            in_text_block: false,
        }
    }

    fn next_line(&mut self) {
        // approximate leading
        self.line_matrix[5] -= self.font_size * 1.2;
        self.text_matrix = self.line_matrix;
    }

    fn position(&self) -> (f32, f32) {
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        (combined[4], combined[5])
    }
}

/// Extract text items from a single page
fn extract_page_text_items(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<Vec<TextItem>, ReportError> {
    use lopdf::content::Content;

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut items = Vec::new();
    let mut cursor = TextCursor::new();

    for op in &content.operations {
        let shown = match op.operator.as_str() {
            "q" => {
                cursor.ctm_stack.push(cursor.ctm);
                None
            }
            "Q" => {
                if let Some(saved) = cursor.ctm_stack.pop() {
                    cursor.ctm = saved;
                }
                None
            }
            "cm" if op.operands.len() >= 6 => {
                let mut m = TextCursor::IDENTITY;
                for (slot, operand) in m.iter_mut().zip(&op.operands) {
                    if let Some(v) = get_number(operand) {
                        *slot = v;
                    }
                }
                cursor.ctm = multiply_matrices(&m, &cursor.ctm);
                None
            }
            "BT" => {
                cursor.in_text_block = true;
                cursor.text_matrix = TextCursor::IDENTITY;
                cursor.line_matrix = TextCursor::IDENTITY;
                None
            }
            "ET" => {
                cursor.in_text_block = false;
                None
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Ok(name) = op.operands[0].as_name() {
                    cursor.font = String::from_utf8_lossy(name).to_string();
                }
                if let Some(size) = get_number(&op.operands[1]) {
                    cursor.font_size = size;
                }
                None
            }
            "Td" | "TD" if op.operands.len() >= 2 => {
                cursor.line_matrix[4] += get_number(&op.operands[0]).unwrap_or(0.0);
                cursor.line_matrix[5] += get_number(&op.operands[1]).unwrap_or(0.0);
                cursor.text_matrix = cursor.line_matrix;
                None
            }
            "Tm" if op.operands.len() >= 6 => {
                for (i, operand) in op.operands.iter().take(6).enumerate() {
                    cursor.text_matrix[i] =
                        get_number(operand).unwrap_or(TextCursor::IDENTITY[i]);
                }
                cursor.line_matrix = cursor.text_matrix;
                None
            }
            "T*" => {
                cursor.next_line();
                None
            }
            "Tj" if cursor.in_text_block => op
                .operands
                .first()
                .and_then(|o| decode_operand(o, doc, &fonts, &cursor.font)),
            "TJ" if cursor.in_text_block => op.operands.first().and_then(|o| o.as_array().ok()).map(
                |array| {
                    array
                        .iter()
                        .filter_map(|o| decode_operand(o, doc, &fonts, &cursor.font))
                        .collect::<String>()
                },
            ),
            "'" => {
                cursor.next_line();
                op.operands
                    .first()
                    .and_then(|o| decode_operand(o, doc, &fonts, &cursor.font))
            }
            _ => None,
        };

        if let Some(text) = shown.filter(|t| !t.trim().is_empty()) {
            let (x, y) = cursor.position();
            items.push(TextItem {
                text,
                x,
                y,
                page: page_num,
            });
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

/// Decode a string operand through the current font's encoding
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

    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    // Latin-1
    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Group text items into lines.
///
/// Stream order is kept as reading order; consecutive items on the same
/// page whose baselines are within tolerance are merged, then sorted left
/// to right.
pub fn group_into_lines(items: Vec<TextItem>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for item in items {
        match lines.last_mut() {
            Some(last) if last.page == item.page && (last.y - item.y).abs() < LINE_Y_TOLERANCE => {
                last.items.push(item);
            }
            _ => {
                let (y, page) = (item.y, item.page);
                lines.push(TextLine {
                    items: vec![item],
                    y,
                    page,
                });
            }
        }
    }

    for line in &mut lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    lines
}
