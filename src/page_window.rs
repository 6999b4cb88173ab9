//! Windowed page render cache.
//!
//! Pages are stacked vertically. Only a bounded window of pages around the
//! first visible one holds a live raster; every other page is a placeholder
//! whose size matches what the raster would be at the current scale, so the
//! scroll geometry never jumps when rasters come and go.
//!
//! Rendered rasters are also kept in a byte-budgeted LRU store keyed by
//! `(page, scale in hundredths)`. Scrolling back to a page or returning to a
//! previous zoom level reuses them instead of asking the document again.

use crate::document::{DocumentSource, PageSize, Raster};
use crate::fit::{FitMode, Viewport, clamp_scale, fit_scale, round_scale, scale_key};
use lru::LruCache;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pages kept rendered at once.
pub const WINDOW_SIZE: usize = 10;
/// Extra pages preloaded on each side of the window.
pub const PRELOAD_MARGIN: usize = 2;
/// Outer margin of the page column (pixels).
pub const CONTENT_MARGIN: f32 = 20.0;
/// Gap between consecutive pages (pixels).
pub const PAGE_SPACING: f32 = 16.0;
/// How far back the first-visible scan starts from the last result.
const BACKTRACK_PAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterKey {
    pub page: usize,
    /// Scale in hundredths.
    pub scale: u32,
}

impl RasterKey {
    pub fn new(page: usize, scale: f32) -> Self {
        Self {
            page,
            scale: scale_key(scale),
        }
    }
}

/// UI events that require recomputing the visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportEvent {
    Scrolled { top: f32 },
    Resized(Viewport),
    Wheel,
    Paint,
}

/// LRU store of rendered rasters bounded by total pixel bytes.
struct RasterStore {
    entries: LruCache<RasterKey, Arc<Raster>>,
    budget_bytes: usize,
    used_bytes: usize,
}

impl RasterStore {
    fn new(budget_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            budget_bytes,
            used_bytes: 0,
        }
    }

    fn get(&mut self, key: &RasterKey) -> Option<Arc<Raster>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: RasterKey, raster: Arc<Raster>) {
        let bytes = raster.byte_len();
        if bytes > self.budget_bytes {
            return;
        }
        if let Some(old) = self.entries.put(key, raster) {
            self.used_bytes = self.used_bytes.saturating_sub(old.byte_len());
        }
        self.used_bytes += bytes;

        while self.used_bytes > self.budget_bytes {
            let Some((evicted, raster)) = self.entries.pop_lru() else {
                break;
            };
            self.used_bytes = self.used_bytes.saturating_sub(raster.byte_len());
            debug!(
                page = evicted.page,
                scale = evicted.scale,
                used_bytes = self.used_bytes,
                "Evicted raster from store"
            );
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.used_bytes = 0;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PendingRefresh {
    scroll_top: Option<f32>,
    viewport: Option<Viewport>,
}

pub struct PageWindowCache {
    doc: Option<Arc<dyn DocumentSource>>,
    sizes: Vec<PageSize>,
    live: BTreeMap<usize, Arc<Raster>>,
    store: RasterStore,
    failed: HashSet<RasterKey>,
    fit_mode: FitMode,
    zoom: f32,
    viewport: Viewport,
    scale: f32,
    scroll_top: f32,
    /// Top edge of every slot, plus one entry for the end of the last slot.
    offsets: Vec<f32>,
    last_first_visible: usize,
    reported_first: Option<usize>,
    pending: Option<PendingRefresh>,
    passes: usize,
}

impl PageWindowCache {
    pub fn new(viewport: Viewport, fit_mode: FitMode, zoom: f32, budget_bytes: usize) -> Self {
        let zoom = clamp_scale(zoom);
        Self {
            doc: None,
            sizes: Vec::new(),
            live: BTreeMap::new(),
            store: RasterStore::new(budget_bytes),
            failed: HashSet::new(),
            fit_mode,
            zoom,
            viewport,
            scale: zoom,
            scroll_top: 0.0,
            offsets: vec![CONTENT_MARGIN],
            last_first_visible: 0,
            reported_first: None,
            pending: None,
            passes: 0,
        }
    }

    /// Install a new document. Every raster is dropped and one placeholder
    /// per page is sized at the new scale; the first window is rendered on
    /// the next `flush`.
    pub fn set_document(&mut self, doc: Arc<dyn DocumentSource>) {
        let count = doc.page_count();
        let mut sizes = Vec::with_capacity(count);
        for i in 0..count {
            match doc.page_size(i) {
                Ok(size) => sizes.push(size),
                Err(err) => {
                    warn!(page = i, "Missing page size, reusing previous page: {err}");
                    let fallback = sizes.last().copied().unwrap_or(PageSize::new(0.0, 0.0));
                    sizes.push(fallback);
                }
            }
        }

        self.doc = Some(doc);
        self.sizes = sizes;
        self.live.clear();
        self.store.clear();
        self.failed.clear();
        self.scroll_top = 0.0;
        self.last_first_visible = 0;
        self.reported_first = None;
        self.scale = self.compute_scale();
        self.rebuild_offsets();
        self.pending = Some(PendingRefresh::default());
        info!(
            pages = count,
            scale = self.scale,
            fit = %self.fit_mode,
            "Installed document in page window"
        );
    }

    pub fn page_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Scale rasters are actually rendered at.
    pub fn render_scale(&self) -> f32 {
        round_scale(self.scale)
    }

    pub fn fit_mode(&self) -> FitMode {
        self.fit_mode
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn first_visible(&self) -> usize {
        self.last_first_visible
    }

    /// Number of coalesced recomputation passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn live_pages(&self) -> Vec<usize> {
        self.live.keys().copied().collect()
    }

    pub fn raster(&self, page: usize) -> Option<Arc<Raster>> {
        self.live.get(&page).cloned()
    }

    pub fn stored_bytes(&self) -> usize {
        self.store.used_bytes
    }

    pub fn stored_rasters(&self) -> usize {
        self.store.entries.len()
    }

    /// Manual zoom; leaves any fit mode.
    pub fn set_zoom(&mut self, zoom: f32) -> Option<usize> {
        self.zoom = clamp_scale(zoom);
        self.fit_mode = FitMode::None;
        self.rescale(true);
        self.refresh()
    }

    pub fn set_fit_mode(&mut self, mode: FitMode) -> Option<usize> {
        self.fit_mode = mode;
        self.rescale(true);
        self.refresh()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Option<usize> {
        self.viewport = viewport;
        self.rescale(false);
        self.refresh()
    }

    fn compute_scale(&self) -> f32 {
        let base = self
            .sizes
            .first()
            .copied()
            .unwrap_or(PageSize::new(0.0, 0.0));
        fit_scale(self.fit_mode, self.viewport, base, self.zoom)
    }

    /// Recompute the scale. Live rasters are discarded when forced or when
    /// the rounded scale moved; placeholder geometry follows immediately
    /// because slot heights derive from the scale.
    fn rescale(&mut self, force: bool) {
        let new_scale = self.compute_scale();
        let changed = scale_key(new_scale) != scale_key(self.scale);
        self.scale = new_scale;
        if changed {
            self.failed.clear();
        }
        if force || changed {
            debug!(
                scale = new_scale,
                dropped = self.live.len(),
                "Scale changed; unloading live pages"
            );
            self.live.clear();
            self.rebuild_offsets();
        }
    }

    fn placeholder_height(&self, page: usize) -> f32 {
        self.sizes
            .get(page)
            .map(|size| size.scaled(self.render_scale()).1 as f32)
            .unwrap_or(0.0)
    }

    /// Height of a page slot: the live raster or the placeholder.
    pub fn slot_height(&self, page: usize) -> f32 {
        match self.live.get(&page) {
            Some(raster) => raster.height as f32,
            None => self.placeholder_height(page),
        }
    }

    fn rebuild_offsets(&mut self) {
        let mut offsets = Vec::with_capacity(self.sizes.len() + 1);
        let mut y = CONTENT_MARGIN;
        for page in 0..self.sizes.len() {
            offsets.push(y);
            y += self.slot_height(page) + PAGE_SPACING;
        }
        offsets.push(y);
        self.offsets = offsets;
    }

    /// Vertical offset of a page's top edge in content coordinates.
    pub fn page_top(&self, page: usize) -> f32 {
        let idx = page.min(self.sizes.len());
        self.offsets.get(idx).copied().unwrap_or(CONTENT_MARGIN)
    }

    pub fn content_height(&self) -> f32 {
        if self.sizes.is_empty() {
            return 0.0;
        }
        self.page_top(self.sizes.len()) - PAGE_SPACING + CONTENT_MARGIN
    }

    /// First page whose bottom edge is at or below `scroll_top`.
    ///
    /// The scan resumes a few pages before the previous answer; if that
    /// starting page is already below the viewport top it restarts from the
    /// last page starting at or above `scroll_top`.
    pub fn find_first_visible(&self, scroll_top: f32) -> usize {
        let count = self.sizes.len();
        let mut start = self.last_first_visible.saturating_sub(BACKTRACK_PAGES);
        if start >= count || self.page_top(start) > scroll_top {
            start = self.offsets[..count]
                .partition_point(|top| *top <= scroll_top)
                .saturating_sub(1);
        }

        let mut y = self.page_top(start);
        for i in start..count {
            let h = self.slot_height(i);
            if y + h >= scroll_top {
                return i;
            }
            y += h + PAGE_SPACING;
        }
        0
    }

    /// Materialize `[first - margin, first + WINDOW - 1 + margin]` (clamped)
    /// and unload everything else. Returns `Some(first)` when the first
    /// visible page differs from the last reported one; the first pass after
    /// `set_document` always reports.
    pub fn load_window(&mut self, first: usize) -> Option<usize> {
        let doc = self.doc.clone()?;
        let count = self.sizes.len();
        if count == 0 {
            return None;
        }

        let changed = self.reported_first != Some(first);
        self.reported_first = Some(first);
        self.last_first_visible = first;

        let start = first.saturating_sub(PRELOAD_MARGIN).min(count - 1);
        let end = (start + WINDOW_SIZE - 1 + PRELOAD_MARGIN * 2).min(count - 1);
        let scale = self.render_scale();
        let mut reshaped = false;

        for page in start..=end {
            if self.live.contains_key(&page) {
                continue;
            }
            let key = RasterKey::new(page, scale);
            if self.failed.contains(&key) {
                continue;
            }
            if let Some(raster) = self.store.get(&key) {
                reshaped |= raster.height as f32 != self.placeholder_height(page);
                self.live.insert(page, raster);
                continue;
            }
            match doc.render_page(page, scale) {
                Ok(raster) => {
                    let raster = Arc::new(raster);
                    reshaped |= raster.height as f32 != self.placeholder_height(page);
                    self.store.insert(key, raster.clone());
                    self.live.insert(page, raster);
                }
                Err(err) => {
                    warn!(page, scale, "Page render failed; keeping placeholder: {err}");
                    self.failed.insert(key);
                }
            }
        }

        let stale: Vec<usize> = self
            .live
            .keys()
            .copied()
            .filter(|page| *page < start || *page > end)
            .collect();
        for page in stale {
            if let Some(raster) = self.live.remove(&page) {
                reshaped |= raster.height as f32 != self.placeholder_height(page);
            }
        }
        if reshaped {
            self.rebuild_offsets();
        }

        debug!(
            first,
            start,
            end,
            live = self.live.len(),
            stored_bytes = self.store.used_bytes,
            "Loaded page window"
        );
        if changed { Some(first) } else { None }
    }

    /// Record a viewport event. Any number of events collapse into a single
    /// recomputation on the next `flush`.
    pub fn notify(&mut self, event: ViewportEvent) {
        let pending = self.pending.get_or_insert_with(PendingRefresh::default);
        match event {
            ViewportEvent::Scrolled { top } => pending.scroll_top = Some(top),
            ViewportEvent::Resized(viewport) => pending.viewport = Some(viewport),
            ViewportEvent::Wheel | ViewportEvent::Paint => {}
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Run the deferred pass, if any.
    pub fn flush(&mut self) -> Option<usize> {
        let pending = self.pending.take()?;
        if let Some(viewport) = pending.viewport {
            self.viewport = viewport;
            self.rescale(false);
        }
        if let Some(top) = pending.scroll_top {
            self.scroll_top = if top.is_finite() { top.max(0.0) } else { 0.0 };
        }
        self.refresh()
    }

    fn refresh(&mut self) -> Option<usize> {
        if self.doc.is_none() {
            return None;
        }
        self.passes += 1;
        let first = self.find_first_visible(self.scroll_top);
        self.load_window(first)
    }

    /// Scroll so page `page` sits at the viewport top. Returns the new
    /// scroll offset and the first-visible change, if any.
    pub fn go_to_page(&mut self, page: usize) -> (f32, Option<usize>) {
        if self.sizes.is_empty() {
            return (0.0, None);
        }
        let page = page.min(self.sizes.len() - 1);
        self.scroll_top = self.page_top(page);
        self.pending = None;
        let changed = self.refresh();
        info!(page, scroll_top = self.scroll_top, "Jumped to page");
        (self.scroll_top, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentError, Word};
    use std::cell::RefCell;

    struct FakeDoc {
        pages: usize,
        renders: RefCell<Vec<(usize, f32)>>,
        broken: Vec<usize>,
        tall: Vec<usize>,
    }

    impl FakeDoc {
        fn new(pages: usize) -> Arc<Self> {
            Arc::new(Self {
                pages,
                renders: RefCell::new(Vec::new()),
                broken: Vec::new(),
                tall: Vec::new(),
            })
        }

        fn renders_of(&self, page: usize) -> usize {
            self.renders.borrow().iter().filter(|(p, _)| *p == page).count()
        }
    }

    impl DocumentSource for FakeDoc {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn page_size(&self, _index: usize) -> Result<PageSize, DocumentError> {
            Ok(PageSize::new(100.0, 200.0))
        }

        fn page_text(&self, _index: usize) -> Result<String, DocumentError> {
            Ok(String::new())
        }

        fn page_words(&self, _index: usize) -> Result<Vec<Word>, DocumentError> {
            Ok(Vec::new())
        }

        fn render_page(&self, index: usize, scale: f32) -> Result<Raster, DocumentError> {
            self.renders.borrow_mut().push((index, scale));
            if self.broken.contains(&index) {
                return Err(DocumentError::Render {
                    page: index,
                    detail: "boom".into(),
                });
            }
            let height = if self.tall.contains(&index) { 400.0 } else { 200.0 };
            let (w, h) = PageSize::new(100.0, height).scaled(scale);
            Ok(Raster {
                pixels: vec![0; (w * h * 3) as usize],
                width: w,
                height: h,
                stride: w * 3,
                has_alpha: false,
            })
        }
    }

    fn cache_with(doc: Arc<FakeDoc>) -> PageWindowCache {
        let mut cache = PageWindowCache::new(
            Viewport::new(800.0, 600.0),
            FitMode::None,
            1.0,
            usize::MAX,
        );
        cache.set_document(doc);
        cache
    }

    fn expected_window(first: usize, count: usize) -> Vec<usize> {
        let start = first.saturating_sub(PRELOAD_MARGIN);
        let end = (start + WINDOW_SIZE - 1 + 2 * PRELOAD_MARGIN).min(count - 1);
        (start..=end).collect()
    }

    #[test]
    fn window_matches_expected_range() {
        let doc = FakeDoc::new(50);
        let mut cache = cache_with(doc);
        for first in [0, 1, 5, 20, 40, 49] {
            cache.load_window(first);
            assert_eq!(cache.live_pages(), expected_window(first, 50), "first={first}");
        }
    }

    #[test]
    fn short_document_window_is_clamped() {
        let doc = FakeDoc::new(3);
        let mut cache = cache_with(doc);
        cache.load_window(0);
        assert_eq!(cache.live_pages(), vec![0, 1, 2]);
    }

    #[test]
    fn same_page_same_rounded_scale_renders_once() {
        let doc = FakeDoc::new(40);
        let mut cache = cache_with(doc.clone());
        cache.load_window(0);
        cache.load_window(30);
        assert!(!cache.live_pages().contains(&0));
        cache.load_window(0);
        assert_eq!(doc.renders_of(0), 1);

        cache.set_zoom(1.501);
        cache.set_zoom(1.499);
        let at_150 = doc
            .renders
            .borrow()
            .iter()
            .filter(|(p, s)| *p == 0 && (*s - 1.5).abs() < 1e-6)
            .count();
        assert_eq!(at_150, 1);
    }

    #[test]
    fn zoom_change_unloads_and_resizes_placeholders_immediately() {
        let doc = FakeDoc::new(30);
        let mut cache = cache_with(doc.clone());
        assert_eq!(cache.slot_height(25), 200.0);
        cache.flush();
        assert_eq!(cache.live_pages(), expected_window(0, 30));

        cache.set_zoom(2.0);
        assert_eq!(cache.slot_height(25), 400.0);
        assert_eq!(cache.raster(0).map(|r| r.height), Some(400));
        assert_eq!(doc.renders_of(0), 2);
    }

    #[test]
    fn first_visible_reported_only_on_change() {
        let doc = FakeDoc::new(30);
        let mut cache = cache_with(doc);
        assert_eq!(cache.load_window(0), Some(0));
        assert_eq!(cache.load_window(0), None);
        assert_eq!(cache.load_window(4), Some(4));
        assert_eq!(cache.load_window(4), None);
    }

    #[test]
    fn first_visible_tracks_scroll_in_both_directions() {
        let doc = FakeDoc::new(60);
        let mut cache = cache_with(doc);
        // page i spans [20 + 216 i, 20 + 216 i + 200]
        assert_eq!(cache.find_first_visible(0.0), 0);
        assert_eq!(cache.find_first_visible(20.0 + 216.0 * 7.0), 7);
        // bottom edge of page 6 is just above the top of page 7
        assert_eq!(cache.find_first_visible(20.0 + 216.0 * 7.0 - 17.0), 6);

        cache.go_to_page(40);
        assert_eq!(cache.first_visible(), 40);
        cache.notify(ViewportEvent::Scrolled { top: 20.0 + 216.0 * 3.0 });
        assert_eq!(cache.flush(), Some(3));
    }

    #[test]
    fn scroll_past_end_falls_back_to_first_page() {
        let doc = FakeDoc::new(4);
        let cache = cache_with(doc);
        assert_eq!(cache.find_first_visible(1.0e9), 0);
    }

    #[test]
    fn events_coalesce_into_one_pass() {
        let doc = FakeDoc::new(40);
        let mut cache = cache_with(doc);
        cache.flush();
        let before = cache.passes();

        for top in [100.0, 500.0, 900.0, 20.0 + 216.0 * 10.0] {
            cache.notify(ViewportEvent::Scrolled { top });
            cache.notify(ViewportEvent::Wheel);
        }
        cache.notify(ViewportEvent::Paint);
        assert_eq!(cache.flush(), Some(10));
        assert_eq!(cache.passes(), before + 1);
        assert_eq!(cache.flush(), None);
        assert_eq!(cache.passes(), before + 1);
    }

    #[test]
    fn resize_event_refits_width_mode() {
        let doc = FakeDoc::new(5);
        let mut cache = PageWindowCache::new(
            Viewport::new(260.0, 600.0),
            FitMode::Width,
            1.0,
            usize::MAX,
        );
        cache.set_document(doc);
        cache.flush();
        assert!((cache.scale() - 2.0).abs() < 1e-6);

        cache.notify(ViewportEvent::Resized(Viewport::new(160.0, 600.0)));
        cache.flush();
        assert!((cache.scale() - 1.0).abs() < 1e-6);
        assert_eq!(cache.raster(0).map(|r| r.width), Some(100));
    }

    #[test]
    fn failed_render_stays_placeholder_and_is_not_retried() {
        let doc = Arc::new(FakeDoc {
            pages: 10,
            renders: RefCell::new(Vec::new()),
            broken: vec![2],
            tall: Vec::new(),
        });
        let mut cache = cache_with(doc.clone());
        cache.load_window(0);
        assert!(!cache.live_pages().contains(&2));
        assert!(cache.live_pages().contains(&3));
        assert_eq!(cache.slot_height(2), 200.0);

        cache.load_window(1);
        assert_eq!(doc.renders_of(2), 1);
    }

    #[test]
    fn byte_budget_bounds_the_store_but_not_the_window() {
        let doc = FakeDoc::new(40);
        let one_page = 100 * 200 * 3;
        let mut cache = PageWindowCache::new(
            Viewport::new(800.0, 600.0),
            FitMode::None,
            1.0,
            one_page * 4,
        );
        cache.set_document(doc);
        cache.load_window(0);
        assert_eq!(cache.live_pages().len(), WINDOW_SIZE + 2 * PRELOAD_MARGIN);
        assert_eq!(cache.stored_rasters(), 4);
        assert!(cache.stored_bytes() <= one_page * 4);
    }

    #[test]
    fn go_to_page_aligns_top_and_clamps() {
        let doc = FakeDoc::new(20);
        let mut cache = cache_with(doc);
        let (top, changed) = cache.go_to_page(5);
        assert_eq!(top, 20.0 + 216.0 * 5.0);
        assert_eq!(changed, Some(5));
        assert_eq!(cache.live_pages(), expected_window(5, 20));

        let (top, _) = cache.go_to_page(99);
        assert_eq!(top, cache.page_top(19));
        assert_eq!(cache.first_visible(), 19);
    }

    #[test]
    fn new_document_resets_everything() {
        let mut cache = cache_with(FakeDoc::new(20));
        assert_eq!(cache.go_to_page(10).1, Some(10));
        let other = FakeDoc::new(1);
        cache.set_document(other);
        assert!(cache.live_pages().is_empty());
        assert_eq!(cache.stored_rasters(), 0);
        assert_eq!(cache.first_visible(), 0);
        assert_eq!(cache.content_height(), 20.0 + 200.0 + 20.0);
        assert!(cache.has_pending());
        assert_eq!(cache.flush(), Some(0));
        assert_eq!(cache.live_pages(), vec![0]);
    }

    #[test]
    fn failed_render_is_retried_after_scale_change() {
        let doc = Arc::new(FakeDoc {
            pages: 5,
            renders: RefCell::new(Vec::new()),
            broken: vec![2],
            tall: Vec::new(),
        });
        let mut cache = cache_with(doc.clone());
        cache.load_window(0);
        cache.set_zoom(2.0);
        cache.set_zoom(1.0);
        let attempts: Vec<f32> = doc
            .renders
            .borrow()
            .iter()
            .filter(|(p, _)| *p == 2)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(attempts, vec![1.0, 2.0, 1.0]);
    }

    #[test]
    fn offsets_follow_live_raster_heights() {
        let doc = Arc::new(FakeDoc {
            pages: 40,
            renders: RefCell::new(Vec::new()),
            broken: Vec::new(),
            tall: vec![1],
        });
        let mut cache = cache_with(doc);
        assert_eq!(cache.page_top(2), 20.0 + 2.0 * 216.0);

        cache.load_window(0);
        assert_eq!(cache.slot_height(1), 400.0);
        assert_eq!(cache.page_top(2), 20.0 + 216.0 + 416.0);
        assert_eq!(cache.find_first_visible(20.0 + 216.0 + 300.0), 1);
        assert_eq!(cache.find_first_visible(20.0 + 216.0 + 416.0), 2);

        cache.load_window(30);
        assert!(!cache.live_pages().contains(&1));
        assert_eq!(cache.page_top(2), 20.0 + 2.0 * 216.0);
        for page in [0, 10, 39] {
            let stacked: f32 = (0..page).map(|i| cache.slot_height(i) + PAGE_SPACING).sum();
            assert_eq!(cache.page_top(page), CONTENT_MARGIN + stacked);
        }
    }
}
