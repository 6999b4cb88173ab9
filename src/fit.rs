//! Mapping from fit mode and viewport to a render scale.

use crate::document::PageSize;
use serde::{Deserialize, Serialize};

/// Minimum allowed render scale.
pub const MIN_SCALE: f32 = 0.6;
/// Maximum allowed render scale.
pub const MAX_SCALE: f32 = 3.0;
/// Horizontal/vertical room reserved around a fitted page (pixels).
pub const FIT_MARGIN: f32 = 60.0;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    #[default]
    Width,
    Page,
    /// Manual zoom.
    None,
}

impl std::fmt::Display for FitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FitMode::Width => "width",
            FitMode::Page => "page",
            FitMode::None => "none",
        };
        write!(f, "{}", label)
    }
}

/// Viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

pub fn clamp_scale(scale: f32) -> f32 {
    if !scale.is_finite() {
        return MIN_SCALE;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Round to two decimals; used for cache keys.
pub fn round_scale(scale: f32) -> f32 {
    (scale * 100.0).round() / 100.0
}

/// Scale key as hundredths so it can be hashed.
pub fn scale_key(scale: f32) -> u32 {
    (scale * 100.0).round().max(0.0) as u32
}

pub fn fit_scale(mode: FitMode, viewport: Viewport, page: PageSize, manual_zoom: f32) -> f32 {
    let width_fit = || (viewport.width - FIT_MARGIN) / page.width;
    let scale = match mode {
        FitMode::Width if page.width > 0.0 => width_fit(),
        FitMode::Page if page.width > 0.0 && page.height > 0.0 => {
            width_fit().min((viewport.height - FIT_MARGIN) / page.height)
        }
        _ => manual_zoom,
    };
    clamp_scale(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn width_mode_fills_viewport_minus_margin() {
        let s = fit_scale(FitMode::Width, Viewport::new(1284.0, 700.0), LETTER, 1.0);
        assert!((s - 2.0).abs() < 1e-6);
    }

    #[test]
    fn page_mode_takes_the_tighter_axis() {
        let s = fit_scale(FitMode::Page, Viewport::new(1284.0, 852.0), LETTER, 1.0);
        // width fit 2.0, height fit (852-60)/792 = 1.0
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn manual_zoom_is_used_verbatim_within_bounds() {
        let s = fit_scale(FitMode::None, Viewport::new(100.0, 100.0), LETTER, 1.37);
        assert!((s - 1.37).abs() < 1e-6);
    }

    #[test]
    fn results_are_clamped() {
        let tiny = fit_scale(FitMode::Width, Viewport::new(80.0, 80.0), LETTER, 1.0);
        assert_eq!(tiny, MIN_SCALE);
        let huge = fit_scale(FitMode::None, Viewport::new(80.0, 80.0), LETTER, 9.0);
        assert_eq!(huge, MAX_SCALE);
    }

    #[test]
    fn degenerate_page_falls_back_to_manual_zoom() {
        let s = fit_scale(
            FitMode::Width,
            Viewport::new(800.0, 600.0),
            PageSize::new(0.0, 0.0),
            1.5,
        );
        assert!((s - 1.5).abs() < 1e-6);
    }

    #[test]
    fn scale_keys_round_to_hundredths() {
        assert_eq!(scale_key(1.234), 123);
        assert_eq!(scale_key(1.236), 124);
        assert!((round_scale(1.236) - 1.24).abs() < 1e-6);
    }
}
