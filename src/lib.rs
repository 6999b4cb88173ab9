//! Core of the PDF voice reader: a windowed page render cache and a
//! pausable narration engine driving an external synthesize -> play
//! pipeline.

pub mod cancellation;
pub mod chunker;
pub mod config;
pub mod document;
pub mod fit;
pub mod narration;
pub mod page_window;
#[cfg(feature = "pdf")]
pub mod pdf_document;
pub mod reader;
pub mod text_document;
pub mod word_locator;
