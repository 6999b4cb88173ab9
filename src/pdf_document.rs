//! MuPDF-backed document source (enabled with the `pdf` feature).

use crate::document::{DocumentError, DocumentSource, PageSize, Raster, Rect, Word, check_page};
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, TextPageFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct PdfDocument {
    path: PathBuf,
    doc: Document,
    sizes: Vec<PageSize>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let corrupt = |err: mupdf::error::Error| DocumentError::Corrupt {
            path: path.to_path_buf(),
            detail: err.to_string(),
        };

        let doc = Document::open(path.to_string_lossy().as_ref()).map_err(corrupt)?;
        let page_count = doc.page_count().map_err(corrupt)?.max(0) as usize;

        let mut sizes = Vec::with_capacity(page_count);
        for i in 0..page_count {
            let page = doc.load_page(i as i32).map_err(corrupt)?;
            let b = page.bounds().map_err(corrupt)?;
            sizes.push(PageSize::new(b.x1 - b.x0, b.y1 - b.y0));
        }
        info!(path = %path.display(), pages = page_count, "Opened PDF");

        Ok(Self {
            path: path.to_path_buf(),
            doc,
            sizes,
        })
    }

    fn render_error(&self, page: usize, err: mupdf::error::Error) -> DocumentError {
        DocumentError::Render {
            page,
            detail: format!("{}: {err}", self.path.display()),
        }
    }

    /// Walk text lines, grouping characters into whitespace-separated words.
    /// Word height comes from the line box; the right edge from the origin of
    /// the character that follows the word (or the line end).
    fn collect_words(&self, index: usize) -> Result<Vec<Word>, DocumentError> {
        let page = self
            .doc
            .load_page(index as i32)
            .map_err(|err| self.render_error(index, err))?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|err| self.render_error(index, err))?;

        let mut words = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let bbox = line.bounds();
                let chars: Vec<(char, f32)> = line
                    .chars()
                    .filter_map(|ch| ch.char().map(|c| (c, ch.origin().x)))
                    .collect();

                let mut start: Option<usize> = None;
                for i in 0..=chars.len() {
                    let is_space = chars.get(i).map(|(c, _)| c.is_whitespace()).unwrap_or(true);
                    match (start, is_space) {
                        (None, false) => start = Some(i),
                        (Some(s), true) => {
                            let x0 = chars[s].1;
                            let x1 = chars.get(i).map(|(_, x)| *x).unwrap_or(bbox.x1);
                            let text: String = chars[s..i].iter().map(|(c, _)| *c).collect();
                            words.push(Word {
                                bbox: Rect::new(x0, bbox.y0, x1.max(x0), bbox.y1),
                                text,
                            });
                            start = None;
                        }
                        _ => {}
                    }
                }
            }
        }
        debug!(page = index, words = words.len(), "Extracted PDF words");
        Ok(words)
    }
}

impl DocumentSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, DocumentError> {
        check_page(index, self.sizes.len())?;
        Ok(self.sizes[index])
    }

    fn page_text(&self, index: usize) -> Result<String, DocumentError> {
        check_page(index, self.sizes.len())?;
        let page = self
            .doc
            .load_page(index as i32)
            .map_err(|err| self.render_error(index, err))?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|err| self.render_error(index, err))?;

        let mut out = String::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                out.extend(line.chars().filter_map(|ch| ch.char()));
                out.push('\n');
            }
            out.push('\n');
        }
        Ok(out.trim().to_string())
    }

    fn page_words(&self, index: usize) -> Result<Vec<Word>, DocumentError> {
        check_page(index, self.sizes.len())?;
        self.collect_words(index)
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<Raster, DocumentError> {
        check_page(index, self.sizes.len())?;
        let page = self
            .doc
            .load_page(index as i32)
            .map_err(|err| self.render_error(index, err))?;
        let rgb = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&Matrix::new_scale(scale, scale), &rgb, false, false)
            .map_err(|err| self.render_error(index, err))?;

        let n = pixmap.n() as u32;
        if n != 3 && n != 4 {
            return Err(DocumentError::Render {
                page: index,
                detail: format!("unsupported pixmap format: {n} channels"),
            });
        }

        Ok(Raster {
            pixels: pixmap.samples().to_vec(),
            width: pixmap.width(),
            height: pixmap.height(),
            stride: pixmap.stride() as u32,
            has_alpha: n == 4,
        })
    }
}
