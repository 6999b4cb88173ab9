//! Document source capability consumed by the reader.
//!
//! The core never parses document bytes. Anything that can report page
//! geometry, page text, ordered word boxes and rasterize a page at a scale
//! can back the viewer. Two adapters live next to this module: a plain-text
//! layout (`text_document`) and a MuPDF one behind the `pdf` feature.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors surfaced by document sources.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("document {} could not be read: {detail}", path.display())]
    Corrupt { path: PathBuf, detail: String },

    #[error("unsupported document type: {}", path.display())]
    Unsupported { path: PathBuf },

    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("failed to render page {page}: {detail}")]
    Render { page: usize, detail: String },
}

/// Intrinsic page size in document units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel size of the page once rendered at `scale`.
    pub fn scaled(&self, scale: f32) -> (u32, u32) {
        let w = (self.width * scale).round().max(0.0) as u32;
        let h = (self.height * scale).round().max(0.0) as u32;
        (w, h)
    }
}

/// Axis-aligned box in document units (`x0 <= x1`, `y0 <= y1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn scaled(&self, scale: f32) -> Rect {
        Rect {
            x0: self.x0 * scale,
            y0: self.y0 * scale,
            x1: self.x1 * scale,
            y1: self.y1 * scale,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.x0 <= x && x <= self.x1 && self.y0 <= y && y <= self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) * 0.5, (self.y0 + self.y1) * 0.5)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One word on a page, in the order the source reports (reading order).
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub bbox: Rect,
    pub text: String,
}

/// Raw rasterized page.
#[derive(Clone)]
pub struct Raster {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row; may exceed `width * channels`.
    pub stride: u32,
    pub has_alpha: bool,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("has_alpha", &self.has_alpha)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Raster {
    pub fn channels(&self) -> u32 {
        if self.has_alpha { 4 } else { 3 }
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Repack into a tightly strided RGBA image, e.g. for PNG export.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        let channels = self.channels() as usize;
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let row_bytes = width * channels;
        if row_bytes > stride || self.pixels.len() < stride.saturating_mul(height) {
            return None;
        }

        let mut out = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            let row = &self.pixels[y * stride..y * stride + row_bytes];
            if channels == 4 {
                out.extend_from_slice(row);
            } else {
                for px in row.chunks_exact(3) {
                    out.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
                }
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, out)
    }
}

/// Read-only access to an opened document.
///
/// Implementations are expected to be cheap to query repeatedly for text
/// and word boxes; rendering may be slow and always runs to completion.
pub trait DocumentSource {
    fn page_count(&self) -> usize;
    fn page_size(&self, index: usize) -> Result<PageSize, DocumentError>;
    fn page_text(&self, index: usize) -> Result<String, DocumentError>;
    fn page_words(&self, index: usize) -> Result<Vec<Word>, DocumentError>;
    fn render_page(&self, index: usize, scale: f32) -> Result<Raster, DocumentError>;
}

pub(crate) fn check_page(index: usize, count: usize) -> Result<(), DocumentError> {
    if index >= count {
        return Err(DocumentError::PageOutOfRange { index, count });
    }
    Ok(())
}

/// Open a document, picking the adapter from the file extension.
pub fn open_document(path: &Path) -> Result<Arc<dyn DocumentSource>, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        return open_pdf(path);
    }

    info!(path = %path.display(), "Opening document with text layout");
    let doc = crate::text_document::TextDocument::open(path)?;
    Ok(Arc::new(doc))
}

#[cfg(feature = "pdf")]
fn open_pdf(path: &Path) -> Result<Arc<dyn DocumentSource>, DocumentError> {
    info!(path = %path.display(), "Opening document with MuPDF");
    let doc = crate::pdf_document::PdfDocument::open(path)?;
    Ok(Arc::new(doc))
}

#[cfg(not(feature = "pdf"))]
fn open_pdf(path: &Path) -> Result<Arc<dyn DocumentSource>, DocumentError> {
    tracing::warn!(
        path = %path.display(),
        "PDF support is disabled; rebuild with `--features pdf`"
    );
    Err(DocumentError::Unsupported {
        path: path.to_path_buf(),
    })
}
