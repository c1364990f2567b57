use super::{diverging_color, numeric_column, padded_range, plot_error};
use crate::config::PlotConfig;
use crate::error::Result;
use crate::utils::{require_column, string_values};
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::debug;

/// Pixels reserved per bar when the table is tall.
const ROW_PIXELS: u32 = 14;

/// Horizontal bars of a value column per gene, coloured on a diverging scale.
#[derive(Debug, Clone)]
pub struct BarPlot {
    pub gene_column: String,
    pub value_column: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for BarPlot {
    fn default() -> Self {
        Self::from_config(&PlotConfig::default())
    }
}

impl BarPlot {
    pub fn from_config(config: &PlotConfig) -> Self {
        Self {
            gene_column: config.gene_column.clone(),
            value_column: config.fold_change_column.clone(),
            title: "log2 Fold Change - RNAs Expression".to_string(),
            width: config.width,
            height: config.height,
        }
    }

    /// `(gene, value)` pairs in table order; rows missing either are skipped.
    fn bars(&self, frame: &DataFrame) -> Result<Vec<(String, f64)>> {
        let genes = string_values(require_column(frame, &self.gene_column)?)?;
        let values = numeric_column(frame, &self.value_column)?;
        Ok(genes
            .into_iter()
            .zip(values)
            .filter_map(|(gene, value)| Some((gene?, value.filter(|v| v.is_finite())?)))
            .collect())
    }

    pub fn render(&self, frame: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bars = self.bars(frame)?;
        let height = self.height.max(ROW_PIXELS * bars.len() as u32 + 120);

        let x_range = padded_range(bars.iter().map(|(_, v)| *v).chain([0.0]));
        let (lo, hi) = bars
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
        let span = if hi > lo { hi - lo } else { 1.0 };

        let root = BitMapBackend::new(path, (self.width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(110)
            .build_cartesian_2d(x_range, 0.0..bars.len().max(1) as f64)
            .map_err(plot_error)?;

        let names: Vec<&str> = bars.iter().map(|(g, _)| g.as_str()).collect();
        let gene_label = |y: &f64| {
            names
                .get(y.floor().max(0.0) as usize)
                .map(|g| g.to_string())
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .y_labels(names.len().clamp(1, 60))
            .y_label_formatter(&gene_label)
            .x_desc("Expression Change")
            .y_desc("RNA sequence")
            .draw()
            .map_err(plot_error)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
                let color = diverging_color((v - lo) / span);
                Rectangle::new([(0.0, i as f64 + 0.1), (*v, i as f64 + 0.9)], color.filled())
            }))
            .map_err(plot_error)?;

        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, 0.0), (0.0, bars.len() as f64)],
                BLACK.stroke_width(1),
            )))
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
        debug!("Bar plot of {} genes written to {}", bars.len(), path.display());
        Ok(())
    }
}
