//! Hit-testing words on a rendered page and assembling drag selections.

use crate::document::{Rect, Word};
use tracing::debug;

/// Point in page raster pixels (i.e. already at render scale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Index of the word under `point`, or failing that the word whose box
/// centre is closest. `None` only when the page has no words.
pub fn nearest_word(words: &[Word], point: Point, scale: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, word) in words.iter().enumerate() {
        let r = word.bbox.scaled(scale);
        if r.contains(point.x, point.y) {
            return Some(idx);
        }
        let (cx, cy) = r.center();
        let d = (cx - point.x).powi(2) + (cy - point.y).powi(2);
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((idx, d));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Inclusive word-index range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    /// Order by index value regardless of drag direction.
    pub fn normalized(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }
}

/// Words of `range` joined by single spaces; `None` when that is empty.
pub fn selection_text(words: &[Word], range: SelectionRange) -> Option<String> {
    if range.start >= words.len() {
        return None;
    }
    let end = range.end.min(words.len() - 1);
    let text = words[range.start..=end]
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Boxes to paint for a selection, in raster pixels.
pub fn highlight_rects(words: &[Word], range: SelectionRange, scale: f32) -> Vec<Rect> {
    if words.is_empty() {
        return Vec::new();
    }
    let end = range.end.min(words.len() - 1);
    (range.start..=end)
        .filter_map(|idx| words.get(idx))
        .map(|w| w.bbox.scaled(scale))
        .collect()
}

/// A finished drag selection on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub page: usize,
    pub range: SelectionRange,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    page: usize,
    anchor: Option<usize>,
    head: Option<usize>,
}

/// Press/drag/release state for word selection. Inert unless enabled.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    enabled: bool,
    drag: Option<Drag>,
    last: Option<Selection>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling drops any drag in progress and the last selection.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.drag = None;
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Page the current drag started on.
    pub fn drag_page(&self) -> Option<usize> {
        self.drag.map(|d| d.page)
    }

    pub fn last_selection(&self) -> Option<&Selection> {
        self.last.as_ref()
    }

    /// Range to highlight on `page`: the live drag, else the last selection.
    pub fn highlighted(&self, page: usize) -> Option<SelectionRange> {
        if let Some(Drag {
            page: p,
            anchor: Some(a),
            head: Some(h),
        }) = self.drag
        {
            return (p == page).then(|| SelectionRange::normalized(a, h));
        }
        self.last
            .as_ref()
            .filter(|s| s.page == page)
            .map(|s| s.range)
    }

    /// Begin a drag. The previous selection is dropped.
    pub fn press(&mut self, page: usize, words: &[Word], point: Point, scale: f32) -> bool {
        if !self.enabled {
            return false;
        }
        self.last = None;
        let hit = nearest_word(words, point, scale);
        self.drag = Some(Drag {
            page,
            anchor: hit,
            head: hit,
        });
        true
    }

    pub fn drag(&mut self, words: &[Word], point: Point, scale: f32) {
        if !self.enabled {
            return;
        }
        if let Some(drag) = self.drag.as_mut() {
            drag.head = nearest_word(words, point, scale);
        }
    }

    /// Finish the drag. Yields a selection only when the covered words
    /// produce non-empty text.
    pub fn release(&mut self, words: &[Word]) -> Option<Selection> {
        if !self.enabled {
            return None;
        }
        let drag = self.drag.take()?;
        let (Some(anchor), Some(head)) = (drag.anchor, drag.head) else {
            return None;
        };
        let range = SelectionRange::normalized(anchor, head);
        let text = selection_text(words, range)?;
        let selection = Selection {
            page: drag.page,
            range,
            text,
        };
        debug!(
            page = selection.page,
            start = range.start,
            end = range.end,
            chars = selection.text.len(),
            "Selection made"
        );
        self.last = Some(selection.clone());
        Some(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> Word {
        Word {
            bbox: Rect::new(x0, y0, x1, y1),
            text: text.to_string(),
        }
    }

    fn sample_line() -> Vec<Word> {
        vec![
            word(0.0, 0.0, 10.0, 10.0, "alpha"),
            word(20.0, 0.0, 30.0, 10.0, "beta"),
            word(40.0, 0.0, 50.0, 10.0, "gamma"),
            word(0.0, 20.0, 10.0, 30.0, "delta"),
        ]
    }

    #[test]
    fn inside_a_box_is_an_exact_hit() {
        let words = sample_line();
        assert_eq!(nearest_word(&words, Point::new(25.0, 5.0), 1.0), Some(1));
        // Scaled boxes: beta spans x 40..60 at scale 2
        assert_eq!(nearest_word(&words, Point::new(45.0, 10.0), 2.0), Some(1));
    }

    #[test]
    fn outside_every_box_takes_the_closest_centre() {
        let words = sample_line();
        assert_eq!(nearest_word(&words, Point::new(200.0, 4.0), 1.0), Some(2));
        assert_eq!(nearest_word(&words, Point::new(3.0, 40.0), 1.0), Some(3));
    }

    #[test]
    fn empty_page_resolves_to_none() {
        assert_eq!(nearest_word(&[], Point::new(1.0, 1.0), 1.0), None);
    }

    #[test]
    fn drag_direction_does_not_matter() {
        let words = sample_line();
        let mut down = SelectionTracker::new();
        down.set_enabled(true);
        down.press(0, &words, Point::new(5.0, 5.0), 1.0);
        down.drag(&words, Point::new(45.0, 5.0), 1.0);
        let a = down.release(&words).expect("selection");

        let mut up = SelectionTracker::new();
        up.set_enabled(true);
        up.press(0, &words, Point::new(45.0, 5.0), 1.0);
        up.drag(&words, Point::new(5.0, 5.0), 1.0);
        let b = up.release(&words).expect("selection");

        assert_eq!(a, b);
        assert_eq!(a.range, SelectionRange { start: 0, end: 2 });
        assert_eq!(a.text, "alpha beta gamma");
    }

    #[test]
    fn blank_words_are_not_a_selection() {
        let words = vec![word(0.0, 0.0, 5.0, 5.0, " "), word(6.0, 0.0, 9.0, 5.0, "")];
        let mut tracker = SelectionTracker::new();
        tracker.set_enabled(true);
        tracker.press(0, &words, Point::new(1.0, 1.0), 1.0);
        tracker.drag(&words, Point::new(7.0, 1.0), 1.0);
        assert_eq!(tracker.release(&words), None);
        assert!(tracker.last_selection().is_none());
    }

    #[test]
    fn new_drag_drops_previous_selection() {
        let words = sample_line();
        let mut tracker = SelectionTracker::new();
        tracker.set_enabled(true);
        tracker.press(0, &words, Point::new(5.0, 5.0), 1.0);
        tracker.drag(&words, Point::new(25.0, 5.0), 1.0);
        assert!(tracker.release(&words).is_some());
        assert_eq!(tracker.highlighted(0), Some(SelectionRange { start: 0, end: 1 }));

        let blank = vec![word(0.0, 0.0, 5.0, 5.0, " ")];
        tracker.press(0, &blank, Point::new(1.0, 1.0), 1.0);
        assert!(tracker.last_selection().is_none());
        assert_eq!(tracker.release(&blank), None);
        assert_eq!(tracker.highlighted(0), None);
    }

    #[test]
    fn disabled_tracker_ignores_input() {
        let words = sample_line();
        let mut tracker = SelectionTracker::new();
        assert!(!tracker.press(0, &words, Point::new(5.0, 5.0), 1.0));
        assert_eq!(tracker.release(&words), None);
    }

    #[test]
    fn highlight_follows_drag_then_last_selection() {
        let words = sample_line();
        let mut tracker = SelectionTracker::new();
        tracker.set_enabled(true);
        tracker.press(3, &words, Point::new(45.0, 5.0), 1.0);
        tracker.drag(&words, Point::new(25.0, 5.0), 1.0);
        assert_eq!(tracker.highlighted(3), Some(SelectionRange { start: 1, end: 2 }));
        assert_eq!(tracker.highlighted(2), None);
        tracker.release(&words);
        assert_eq!(tracker.highlighted(3), Some(SelectionRange { start: 1, end: 2 }));

        let rects = highlight_rects(&words, SelectionRange { start: 1, end: 2 }, 2.0);
        assert_eq!(rects[0], Rect::new(40.0, 0.0, 60.0, 20.0));

        tracker.set_enabled(false);
        assert_eq!(tracker.highlighted(3), None);
    }
}
