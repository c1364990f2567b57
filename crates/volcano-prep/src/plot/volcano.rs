use super::{RANK_PALETTE, numeric_column, padded_range, plot_error};
use crate::config::PlotConfig;
use crate::error::Result;
use crate::utils::{require_column, string_values};
use crate::volcano::{OrderedLabels, neg_log10};
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::debug;

/// Number of dashes drawn per significance line.
const DASHES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f64,
    y: f64,
    rank: Option<usize>,
}

/// Scatter of fold change against `-log10(p)`.
#[derive(Debug, Clone)]
pub struct VolcanoPlot {
    pub x_column: String,
    pub y_column: String,
    pub gene_column: String,
    /// Probability drawn as a horizontal line at `-log10(p_threshold)`.
    pub p_threshold: f64,
    /// Fold changes drawn as vertical lines.
    pub fold_change_bounds: (f64, f64),
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for VolcanoPlot {
    fn default() -> Self {
        Self::from_config(&PlotConfig::default(), crate::volcano::DEFAULT_NEG_LOG10_COLUMN)
    }
}

impl VolcanoPlot {
    pub fn from_config(config: &PlotConfig, log_column: &str) -> Self {
        Self {
            x_column: config.fold_change_column.clone(),
            y_column: log_column.to_string(),
            gene_column: config.gene_column.clone(),
            p_threshold: config.p_threshold,
            fold_change_bounds: config.fold_change_bounds,
            title: "Volcano Plot".to_string(),
            width: config.width,
            height: config.height,
        }
    }

    fn points(&self, frame: &DataFrame, labels: Option<(&str, &OrderedLabels)>) -> Result<Vec<Point>> {
        let xs = numeric_column(frame, &self.x_column)?;
        let ys = numeric_column(frame, &self.y_column)?;
        let ranks: Vec<Option<usize>> = match labels {
            Some((column, ordered)) => string_values(require_column(frame, column)?)?
                .into_iter()
                .map(|label| label.and_then(|l| ordered.rank(&l)))
                .collect(),
            None => vec![None; frame.height()],
        };

        Ok(xs
            .into_iter()
            .zip(ys)
            .zip(ranks)
            .filter_map(|((x, y), rank)| Some(Point { x: x?, y: y?, rank }))
            .collect())
    }

    fn annotations(&self, top: &DataFrame) -> Result<Vec<(String, f64, f64)>> {
        let genes = string_values(require_column(top, &self.gene_column)?)?;
        let xs = numeric_column(top, &self.x_column)?;
        let ys = numeric_column(top, &self.y_column)?;
        Ok(genes
            .into_iter()
            .zip(xs)
            .zip(ys)
            .filter_map(|((g, x), y)| Some((g?, x?, y?)))
            .collect())
    }

    /// Render to `path`.
    ///
    /// Points are coloured by label rank when `labels` names the label
    /// column and its categories; genes in `top` are annotated by name.
    pub fn render(
        &self,
        frame: &DataFrame,
        labels: Option<(&str, &OrderedLabels)>,
        top: Option<&DataFrame>,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let mut points = self.points(frame, labels)?;
        let mut notes = match top {
            Some(top) => self.annotations(top)?,
            None => Vec::new(),
        };

        let cap = clamp_infinite(points.iter_mut().map(|p| &mut p.y));
        for note in &mut notes {
            if note.2.is_infinite() {
                note.2 = cap;
            }
        }

        let p_line = neg_log10(Some(self.p_threshold));
        let (fc_low, fc_high) = self.fold_change_bounds;
        let x_range = padded_range(points.iter().map(|p| p.x).chain([fc_low, fc_high]));
        let y_range = padded_range(points.iter().map(|p| p.y).chain([0.0, p_line]));

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range.clone(), y_range.clone())
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("log2(Fold Change)")
            .y_desc(self.y_column.as_str())
            .draw()
            .map_err(plot_error)?;

        let guides = [
            ((x_range.start, p_line), (x_range.end, p_line)),
            ((fc_low, y_range.start), (fc_low, y_range.end)),
            ((fc_high, y_range.start), (fc_high, y_range.end)),
        ];
        for (from, to) in guides {
            chart
                .draw_series(dashes(from, to).into_iter().map(|segment| {
                    PathElement::new(segment, BLACK.stroke_width(1))
                }))
                .map_err(plot_error)?;
        }

        match labels {
            Some((_, ordered)) => {
                for (rank, category) in ordered.categories().iter().enumerate() {
                    let color = RANK_PALETTE[rank % RANK_PALETTE.len()];
                    chart
                        .draw_series(
                            points
                                .iter()
                                .filter(|p| p.rank == Some(rank))
                                .map(|p| Circle::new((p.x, p.y), 3, color.filled())),
                        )
                        .map_err(plot_error)?
                        .label(category.as_str())
                        .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
                }
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(BLACK)
                    .draw()
                    .map_err(plot_error)?;
            }
            None => {
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|p| Circle::new((p.x, p.y), 3, BLACK.filled())),
                    )
                    .map_err(plot_error)?;
            }
        }

        chart
            .draw_series(notes.iter().map(|(gene, x, y)| {
                Text::new(gene.clone(), (*x, *y), ("sans-serif", 12).into_font())
            }))
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
        debug!(
            "Volcano plot of {} points ({} annotated) written to {}",
            points.len(),
            notes.len(),
            path.display()
        );
        Ok(())
    }
}

/// Replace infinite values with the largest finite one; returns that cap.
fn clamp_infinite<'a>(values: impl Iterator<Item = &'a mut f64>) -> f64 {
    let mut values: Vec<&mut f64> = values.collect();
    let cap = values
        .iter()
        .map(|v| **v)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    for v in values.iter_mut() {
        if v.is_infinite() {
            **v = if v.is_sign_positive() { cap } else { 0.0 };
        }
    }
    cap
}

/// Every other piece of the segment `from -> to` cut into [`DASHES`] pieces.
fn dashes(from: (f64, f64), to: (f64, f64)) -> Vec<Vec<(f64, f64)>> {
    let at = |t: f64| (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
    (0..DASHES)
        .step_by(2)
        .map(|i| {
            let start = i as f64 / DASHES as f64;
            let end = (i + 1) as f64 / DASHES as f64;
            vec![at(start), at(end)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volcano::label_by_thresholds;
    use polars::prelude::*;

    fn processed() -> (DataFrame, OrderedLabels) {
        let frame = df![
            "row" => ["Actb", "Gapdh", "Sox2"],
            "log2FoldChange" => [Some(2.5), Some(-0.3), None],
            "-log10(p-value)" => [f64::INFINITY, 0.5, 1.2],
            "padj" => [0.0, 0.3, 0.06],
        ]
        .unwrap();
        label_by_thresholds(frame, "padj", "significance", &[0.05], &["significant", "not"]).unwrap()
    }

    #[test]
    fn test_points_with_ranks() {
        let (frame, ordered) = processed();
        let points = VolcanoPlot::default()
            .points(&frame, Some(("significance", &ordered)))
            .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].rank, Some(0));
        assert_eq!(points[1].rank, Some(1));
    }

    #[test]
    fn test_points_without_labels() {
        let (frame, _) = processed();
        let points = VolcanoPlot::default().points(&frame, None).unwrap();
        assert!(points.iter().all(|p| p.rank.is_none()));
    }

    #[test]
    fn test_clamp_infinite() {
        let mut ys = vec![f64::INFINITY, 0.5, 3.0];
        let cap = clamp_infinite(ys.iter_mut());
        assert_eq!(cap, 3.0);
        assert_eq!(ys, vec![3.0, 0.5, 3.0]);
    }

    #[test]
    fn test_annotations_skip_missing() {
        let (frame, _) = processed();
        let notes = VolcanoPlot::default().annotations(&frame).unwrap();
        let genes: Vec<&str> = notes.iter().map(|(g, _, _)| g.as_str()).collect();
        assert_eq!(genes, vec!["Actb", "Gapdh"]);
    }

    #[test]
    fn test_dashes_alternate() {
        let pieces = dashes((0.0, 0.0), (1.0, 0.0));
        assert_eq!(pieces.len(), DASHES / 2);
        assert_eq!(pieces[0], vec![(0.0, 0.0), (1.0 / DASHES as f64, 0.0)]);
    }
}
