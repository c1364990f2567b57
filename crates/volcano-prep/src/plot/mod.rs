//! PNG rendering of prepared results.
//!
//! - [`BarPlot`]: horizontal fold-change bars per gene
//! - [`VolcanoPlot`]: fold change against `-log10(p)` with significance lines
//!
//! Both take an already-validated table; rendering errors surface as
//! [`VolcanoError::Plot`].

mod bar;
mod volcano;

pub use bar::BarPlot;
pub use volcano::VolcanoPlot;

use crate::error::{Result, VolcanoError};
use crate::utils::{float_values, require_numeric_column};
use plotters::style::RGBColor;
use polars::prelude::DataFrame;
use std::fmt::Display;
use std::ops::Range;

/// File name of the bar plot inside the output directory.
pub const BAR_PLOT_FILE: &str = "barplot.png";
/// File name of the volcano plot inside the output directory.
pub const VOLCANO_PLOT_FILE: &str = "volcano_plot.png";

pub(crate) fn plot_error(e: impl Display) -> VolcanoError {
    VolcanoError::Plot(e.to_string())
}

/// Anchors of a red-yellow-blue diverging scale, low to high.
const RD_YL_BU: [(u8, u8, u8); 5] = [
    (165, 0, 38),
    (244, 109, 67),
    (255, 255, 191),
    (116, 173, 209),
    (49, 54, 149),
];

/// Colour at position `t` (clamped to `[0, 1]`) of the diverging scale.
pub(crate) fn diverging_color(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let scaled = t * (RD_YL_BU.len() - 1) as f64;
    let lo = (scaled.floor() as usize).min(RD_YL_BU.len() - 2);
    let frac = scaled - lo as f64;

    let (a, b) = (RD_YL_BU[lo], RD_YL_BU[lo + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Colours for label categories, most significant first.
pub(crate) const RANK_PALETTE: [RGBColor; 6] = [
    RGBColor(214, 39, 40),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(127, 127, 127),
    RGBColor(31, 119, 180),
    RGBColor(148, 103, 189),
];

/// Axis range covering `values` with a 5% margin on each side.
pub(crate) fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() {
        return 0.0..1.0;
    }
    let margin = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - margin)..(max + margin)
}

/// Numeric column values with missing entries as `None`.
pub(crate) fn numeric_column(frame: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    float_values(require_numeric_column(frame, column)?)
}
