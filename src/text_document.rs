//! Plain-text document source.
//!
//! Text is laid out on fixed US-Letter pages with a monospace grid so every
//! word gets a stable bounding box. Rendering paints "greeked" bars where
//! the words sit, which is enough for scroll geometry and selection overlays
//! without a font rasterizer. A form feed forces a page break.

use crate::document::{DocumentError, DocumentSource, PageSize, Raster, Rect, Word, check_page};
use image::{Rgb, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const PAGE_MARGIN: f32 = 72.0;
const CHAR_WIDTH: f32 = 7.2;
const LINE_HEIGHT: f32 = 14.4;

const PAPER: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);
const INK: Rgb<u8> = Rgb([0x44, 0x44, 0x44]);

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

fn columns_per_line() -> usize {
    ((PAGE_WIDTH - 2.0 * PAGE_MARGIN) / CHAR_WIDTH).floor() as usize
}

fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - 2.0 * PAGE_MARGIN) / LINE_HEIGHT).floor() as usize
}

#[derive(Debug, Clone, Default)]
struct TextPage {
    lines: Vec<Vec<Word>>,
}

impl TextPage {
    fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                line.iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct TextDocument {
    pages: Vec<TextPage>,
}

impl TextDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => DocumentError::NotFound {
                path: path.to_path_buf(),
            },
            _ => DocumentError::Corrupt {
                path: path.to_path_buf(),
                detail: err.to_string(),
            },
        })?;
        let text = String::from_utf8(bytes).map_err(|err| DocumentError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("not valid UTF-8: {err}"),
        })?;
        let doc = Self::from_text(&text);
        info!(
            path = %path.display(),
            pages = doc.pages.len(),
            chars = text.len(),
            "Laid out text document"
        );
        Ok(doc)
    }

    /// Lay out already-loaded text.
    pub fn from_text(text: &str) -> Self {
        let normalized: String = text.nfc().collect();
        let columns = columns_per_line().max(1);
        let max_lines = lines_per_page().max(1);

        let mut pages = Vec::new();
        let mut current = TextPage::default();

        for (sheet_idx, sheet) in normalized.split('\u{0C}').enumerate() {
            if sheet_idx > 0 && !current.lines.is_empty() {
                pages.push(std::mem::take(&mut current));
            }
            for source_line in sheet.lines() {
                for wrapped in wrap_line(source_line, columns) {
                    if current.lines.len() == max_lines {
                        pages.push(std::mem::take(&mut current));
                    }
                    let line_idx = current.lines.len();
                    current.lines.push(place_words(&wrapped, line_idx));
                }
            }
        }

        if !current.lines.is_empty() || pages.is_empty() {
            pages.push(current);
        }
        debug!(pages = pages.len(), columns, max_lines, "Paginated text");
        Self { pages }
    }
}

/// Greedy word wrap; yields `(column, word)` runs per output line. An empty
/// source line still produces one blank output line.
fn wrap_line(line: &str, columns: usize) -> Vec<Vec<(usize, String)>> {
    let mut out = Vec::new();
    let mut current: Vec<(usize, String)> = Vec::new();
    let mut col = 0usize;

    for m in RE_WORD.find_iter(line) {
        let word = m.as_str();
        let len = word.chars().count();
        let needed = if current.is_empty() { len } else { col + 1 + len };
        if !current.is_empty() && needed > columns {
            out.push(std::mem::take(&mut current));
            col = 0;
        }
        let start = if current.is_empty() { 0 } else { col + 1 };
        current.push((start, word.to_string()));
        col = start + len;
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

fn place_words(runs: &[(usize, String)], line_idx: usize) -> Vec<Word> {
    let top = PAGE_MARGIN + line_idx as f32 * LINE_HEIGHT;
    runs.iter()
        .map(|(col, text)| {
            let x0 = PAGE_MARGIN + *col as f32 * CHAR_WIDTH;
            let x1 = x0 + text.chars().count() as f32 * CHAR_WIDTH;
            Word {
                bbox: Rect::new(x0, top, x1, top + LINE_HEIGHT * 0.85),
                text: text.clone(),
            }
        })
        .collect()
}

impl DocumentSource for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, DocumentError> {
        check_page(index, self.pages.len())?;
        Ok(PageSize::new(PAGE_WIDTH, PAGE_HEIGHT))
    }

    fn page_text(&self, index: usize) -> Result<String, DocumentError> {
        check_page(index, self.pages.len())?;
        Ok(self.pages[index].text())
    }

    fn page_words(&self, index: usize) -> Result<Vec<Word>, DocumentError> {
        check_page(index, self.pages.len())?;
        Ok(self.pages[index].lines.iter().flatten().cloned().collect())
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<Raster, DocumentError> {
        check_page(index, self.pages.len())?;
        let (width, height) = PageSize::new(PAGE_WIDTH, PAGE_HEIGHT).scaled(scale);
        if width == 0 || height == 0 {
            return Err(DocumentError::Render {
                page: index,
                detail: format!("degenerate raster size {width}x{height} at scale {scale}"),
            });
        }

        let mut img = RgbImage::from_pixel(width, height, PAPER);
        for word in self.pages[index].lines.iter().flatten() {
            let r = word.bbox.scaled(scale);
            // Bar through the middle of the glyph box.
            let band = (r.y1 - r.y0) * 0.2;
            let x0 = r.x0.max(0.0) as u32;
            let x1 = (r.x1.ceil() as u32).min(width);
            let y0 = (r.y0 + band).max(0.0) as u32;
            let y1 = ((r.y1 - band).ceil() as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, INK);
                }
            }
        }

        Ok(Raster {
            pixels: img.into_raw(),
            width,
            height,
            stride: width * 3,
            has_alpha: false,
        })
    }
}
