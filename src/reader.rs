//! The reader: one document, its page window, word selection and narration.
//!
//! This is the surface a front end drives. View changes and pointer input go
//! in; `ReaderEvent`s come out through [`Reader::drain_events`], narration
//! events through the receiver returned by [`Reader::new`].

use crate::chunker::chunk_text;
use crate::config::AppConfig;
use crate::document::{DocumentError, DocumentSource, Raster, Word, open_document};
use crate::fit::{FitMode, Viewport};
use crate::narration::pipeline::SpeechBackend;
use crate::narration::{
    NarrationEngine, NarrationError, NarrationEvent, NarrationState, SessionId,
};
use crate::page_window::{PageWindowCache, ViewportEvent};
use crate::word_locator::{Point, Selection, SelectionRange, SelectionTracker, nearest_word};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Narration(#[from] NarrationError),
    #[error("no document is open")]
    NoDocument,
    #[error("nothing to read")]
    NothingToRead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    FirstVisibleChanged(usize),
    SelectionMade { page: usize, text: String },
    WordClicked { page: usize, word: usize },
}

/// What to narrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// One page.
    Page(usize),
    /// From the start of a page to the end of the document.
    FromPage(usize),
    /// The last drag selection.
    Selection,
    /// From a word to the end of the document.
    FromWord { page: usize, word: usize },
}

pub struct Reader {
    doc: Option<Arc<dyn DocumentSource>>,
    path: Option<PathBuf>,
    pages: PageWindowCache,
    words: HashMap<usize, Arc<Vec<Word>>>,
    selection: SelectionTracker,
    narration: NarrationEngine,
    events: VecDeque<ReaderEvent>,
    chunk_target_len: usize,
}

impl Reader {
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn SpeechBackend>,
    ) -> (Self, Receiver<NarrationEvent>) {
        let (narration, narration_events) = NarrationEngine::new(backend);
        narration.set_wpm(config.wpm);
        let reader = Self {
            doc: None,
            path: None,
            pages: PageWindowCache::new(
                config.viewport(),
                config.fit_mode,
                config.zoom,
                config.raster_budget_bytes(),
            ),
            words: HashMap::new(),
            selection: SelectionTracker::new(),
            narration,
            events: VecDeque::new(),
            chunk_target_len: config.chunk_target_len.max(1),
        };
        (reader, narration_events)
    }

    /// Open a document from disk. On failure the current document stays.
    pub fn open(&mut self, path: &Path) -> Result<usize, ReaderError> {
        let doc = open_document(path)?;
        self.set_document(doc);
        self.path = Some(path.to_path_buf());
        info!(path = %path.display(), pages = self.page_count(), "Opened document");
        Ok(self.page_count())
    }

    pub fn set_document(&mut self, doc: Arc<dyn DocumentSource>) {
        self.pages.set_document(doc.clone());
        self.doc = Some(doc);
        self.path = None;
        self.words.clear();
        self.selection.clear();
        self.flush();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn page_count(&self) -> usize {
        self.doc.as_ref().map(|d| d.page_count()).unwrap_or(0)
    }

    fn document(&self) -> Result<&Arc<dyn DocumentSource>, ReaderError> {
        self.doc.as_ref().ok_or(ReaderError::NoDocument)
    }

    pub fn page_window(&self) -> &PageWindowCache {
        &self.pages
    }

    pub fn current_page(&self) -> usize {
        self.pages.first_visible()
    }

    pub fn raster(&self, page: usize) -> Option<Arc<Raster>> {
        self.pages.raster(page)
    }

    fn record(&mut self, first_visible: Option<usize>) {
        if let Some(page) = first_visible {
            debug!(page, "First visible page changed");
            self.events.push_back(ReaderEvent::FirstVisibleChanged(page));
        }
    }

    pub fn drain_events(&mut self) -> Vec<ReaderEvent> {
        self.events.drain(..).collect()
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.selection.clear();
        let changed = self.pages.set_zoom(zoom);
        self.record(changed);
    }

    pub fn set_fit_mode(&mut self, mode: FitMode) {
        self.selection.clear();
        let changed = self.pages.set_fit_mode(mode);
        self.record(changed);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        let changed = self.pages.set_viewport(viewport);
        self.record(changed);
    }

    /// Queue a scroll; applied on the next [`Reader::flush`].
    pub fn scroll_to(&mut self, top: f32) {
        self.pages.notify(ViewportEvent::Scrolled { top });
    }

    pub fn notify(&mut self, event: ViewportEvent) {
        self.pages.notify(event);
    }

    pub fn flush(&mut self) {
        let changed = self.pages.flush();
        self.record(changed);
    }

    pub fn go_to_page(&mut self, page: usize) -> f32 {
        let (top, changed) = self.pages.go_to_page(page);
        self.record(changed);
        top
    }

    /// Word boxes for a page, fetched once per document.
    pub fn page_words(&mut self, page: usize) -> Result<Arc<Vec<Word>>, ReaderError> {
        if let Some(words) = self.words.get(&page) {
            return Ok(words.clone());
        }
        let words = Arc::new(self.document()?.page_words(page)?);
        self.words.insert(page, words.clone());
        Ok(words)
    }

    pub fn set_selection_mode(&mut self, enabled: bool) {
        self.selection.set_enabled(enabled);
        debug!(enabled, "Selection mode changed");
    }

    pub fn selection_mode(&self) -> bool {
        self.selection.is_enabled()
    }

    /// Pointer press at a page-local raster position.
    pub fn press(&mut self, page: usize, point: Point) -> Result<(), ReaderError> {
        if !self.selection.is_enabled() {
            return Ok(());
        }
        let words = self.page_words(page)?;
        self.selection
            .press(page, &words, point, self.pages.render_scale());
        Ok(())
    }

    pub fn drag(&mut self, point: Point) -> Result<(), ReaderError> {
        let Some(page) = self.selection.drag_page() else {
            return Ok(());
        };
        let words = self.page_words(page)?;
        self.selection.drag(&words, point, self.pages.render_scale());
        Ok(())
    }

    pub fn release(&mut self) -> Result<Option<Selection>, ReaderError> {
        let Some(page) = self.selection.drag_page() else {
            return Ok(None);
        };
        let words = self.page_words(page)?;
        let selection = self.selection.release(&words);
        if let Some(sel) = &selection {
            self.events.push_back(ReaderEvent::SelectionMade {
                page: sel.page,
                text: sel.text.clone(),
            });
        }
        Ok(selection)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.last_selection()
    }

    pub fn highlighted(&self, page: usize) -> Option<SelectionRange> {
        self.selection.highlighted(page)
    }

    /// Resolve a double click to the nearest word on the page.
    pub fn double_click(&mut self, page: usize, point: Point) -> Result<Option<usize>, ReaderError> {
        let words = self.page_words(page)?;
        let hit = nearest_word(&words, point, self.pages.render_scale());
        if let Some(word) = hit {
            self.events.push_back(ReaderEvent::WordClicked { page, word });
        }
        Ok(hit)
    }

    /// Text for a read mode, one entry per page covered.
    fn page_segments(&mut self, mode: ReadMode) -> Result<Vec<String>, ReaderError> {
        let doc = self.document()?.clone();
        let count = doc.page_count();
        let segments: Vec<String> = match mode {
            ReadMode::Page(page) => vec![doc.page_text(page)?],
            ReadMode::FromPage(page) => (page.min(count)..count)
                .map(|i| doc.page_text(i))
                .collect::<Result<_, _>>()?,
            ReadMode::Selection => vec![
                self.selection
                    .last_selection()
                    .map(|s| s.text.clone())
                    .ok_or(ReaderError::NothingToRead)?,
            ],
            ReadMode::FromWord { page, word } => {
                let words = self.page_words(page)?;
                let mut segments = vec![
                    words
                        .iter()
                        .skip(word)
                        .map(|w| w.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" "),
                ];
                for i in (page + 1).min(count)..count {
                    segments.push(doc.page_text(i)?);
                }
                segments
            }
        };
        Ok(segments)
    }

    /// Plain text for a read mode, pages separated by newlines.
    pub fn collect_text(&mut self, mode: ReadMode) -> Result<String, ReaderError> {
        Ok(self.page_segments(mode)?.join("\n"))
    }

    /// Narration chunks for a read mode. Pages are chunked separately, so a
    /// chunk never spans a page break.
    pub fn collect_chunks(&mut self, mode: ReadMode) -> Result<Vec<String>, ReaderError> {
        let target = self.chunk_target_len;
        Ok(self
            .page_segments(mode)?
            .iter()
            .flat_map(|text| chunk_text(text, target))
            .collect())
    }

    /// Chunk the text for `mode` and start narrating it.
    pub fn start_read(&mut self, mode: ReadMode) -> Result<SessionId, ReaderError> {
        let chunks = self.collect_chunks(mode)?;
        if chunks.is_empty() {
            return Err(ReaderError::NothingToRead);
        }
        info!(?mode, chunks = chunks.len(), "Starting read");
        self.start_narration(chunks, 0)
    }

    pub fn start_narration(
        &mut self,
        chunks: Vec<String>,
        from: usize,
    ) -> Result<SessionId, ReaderError> {
        Ok(self.narration.start(chunks, from)?)
    }

    pub fn set_voice(&mut self, path: &Path) -> Result<(), ReaderError> {
        Ok(self.narration.set_voice(path)?)
    }

    pub fn set_wpm(&self, wpm: u32) {
        self.narration.set_wpm(wpm);
    }

    pub fn pause(&self) {
        self.narration.pause();
    }

    pub fn resume(&mut self) {
        self.narration.resume();
    }

    pub fn stop(&self) {
        self.narration.stop();
    }

    pub fn narration_state(&self) -> NarrationState {
        self.narration.state()
    }

    /// Wait for the current narration session's worker to exit.
    pub fn wait_narration(&mut self) {
        self.narration.join();
    }
}
