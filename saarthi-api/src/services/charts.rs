//! Chart rendering
//!
//! `ChartRenderer` draws one chart panel for a table into a PNG file. The
//! production implementation rasterises with plotters; rendering is CPU-bound
//! and synchronous, so callers run it on the blocking pool.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use thiserror::Error;

use crate::models::AssetKind;
use crate::services::statistics::{
    box_stats, correlation_matrix, degenerate_padding, histogram, kde_curve, value_counts,
    BoxStats, CorrelationMatrix, GridLayout,
};
use crate::services::table::{CategoricalColumn, NumericColumn, Table};

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Drawing(String),

    #[error("No {0} columns to plot")]
    NoColumns(&'static str),

    #[error("Axis range {0}..{1} cannot be drawn")]
    Range(f64, f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E> From<DrawingAreaErrorKind<E>> for RenderError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

/// Draws chart panels to image files
pub trait ChartRenderer: Send + Sync {
    /// Render the `kind` panel for `table` into `out`
    fn render(&self, kind: AssetKind, table: &Table, out: &Path) -> Result<(), RenderError>;
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const FONT: &str = "sans-serif";
const HEATMAP_SIZE: (u32, u32) = (1200, 1000);
const BOX_PLOT_SIZE: (u32, u32) = (1000, 600);
const GRID_WIDTH: u32 = 1500;
const GRID_ROW_HEIGHT: u32 = 400;
const LABEL_MAX_CHARS: usize = 18;

/// Categorical palette
const PALETTE: [RGBColor; 10] = [
    RGBColor(76, 114, 176),
    RGBColor(221, 132, 82),
    RGBColor(85, 168, 104),
    RGBColor(196, 78, 82),
    RGBColor(129, 114, 179),
    RGBColor(147, 120, 96),
    RGBColor(218, 139, 195),
    RGBColor(140, 140, 140),
    RGBColor(204, 185, 116),
    RGBColor(100, 181, 205),
];

const COOL: RGBColor = RGBColor(59, 76, 192);
const NEUTRAL: RGBColor = RGBColor(221, 221, 221);
const WARM: RGBColor = RGBColor(180, 4, 38);

/// Plotters bitmap renderer
#[derive(Debug, Default, Clone, Copy)]
pub struct PlottersRenderer;

impl PlottersRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, kind: AssetKind, table: &Table, out: &Path) -> Result<(), RenderError> {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let numeric: Vec<&NumericColumn> = table.numeric_columns().collect();
        let categorical: Vec<&CategoricalColumn> = table.categorical_columns().collect();

        match kind {
            AssetKind::CorrelationMatrix => {
                require(!numeric.is_empty(), "numeric")?;
                draw_heatmap(&correlation_matrix(&numeric), out)
            }
            AssetKind::BoxPlot => {
                require(!numeric.is_empty(), "numeric")?;
                draw_box_plots(&numeric, out)
            }
            AssetKind::Histogram => {
                require(!numeric.is_empty(), "numeric")?;
                draw_histograms(&numeric, out)
            }
            AssetKind::CountPlot => {
                require(!categorical.is_empty(), "categorical")?;
                draw_count_plots(&categorical, out)
            }
        }
    }
}

fn require(present: bool, family: &'static str) -> Result<(), RenderError> {
    if present {
        Ok(())
    } else {
        Err(RenderError::NoColumns(family))
    }
}

/// Diverging blue-grey-red scale; `t` in [0, 1]
pub fn coolwarm(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let (from, to, f) = if t < 0.5 {
        (COOL, NEUTRAL, t * 2.0)
    } else {
        (NEUTRAL, WARM, (t - 0.5) * 2.0)
    };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

/// Axis range that is never degenerate
pub fn padded_range(min: f64, max: f64) -> (f64, f64) {
    if !(min.is_finite() && max.is_finite()) {
        (0.0, 1.0)
    } else if max > min {
        let pad = (max / 2.0 - min / 2.0) * 0.1;
        (min - pad, max + pad)
    } else {
        let pad = degenerate_padding(min);
        (min - pad, max + pad)
    }
}

/// Divisor that brings `[lo, hi]` to a span plotters can lay ticks on
///
/// 1 for ordinary data, a power of ten when `hi - lo` is near `f64::MAX`.
pub fn axis_scale(lo: f64, hi: f64) -> f64 {
    if !(lo.is_finite() && hi.is_finite()) || (hi - lo).abs() < f64::MAX / 4.0 {
        return 1.0;
    }
    let magnitude = lo.abs().max(hi.abs());
    10f64.powi(magnitude.log10().floor() as i32)
}

/// Plotters never finishes laying out ticks on a non-finite span
fn axis_range((lo, hi): (f64, f64)) -> Result<(f64, f64), RenderError> {
    if lo < hi && (hi - lo).is_finite() {
        Ok((lo, hi))
    } else {
        Err(RenderError::Range(lo, hi))
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn scaled(values: &[f64], scale: f64) -> Vec<f64> {
    values.iter().map(|v| v / scale).collect()
}

fn scale_caption(scale: f64) -> Option<String> {
    (scale != 1.0).then(|| format!("x 1e{}", scale.log10().round()))
}

/// Shorten long category labels
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_MAX_CHARS {
        label.to_string()
    } else {
        let head: String = label.chars().take(LABEL_MAX_CHARS - 2).collect();
        format!("{}..", head)
    }
}

fn centered(size: u32) -> TextStyle<'static> {
    (FONT, size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center))
}

fn draw_heatmap(matrix: &CorrelationMatrix, out: &Path) -> Result<(), RenderError> {
    let root = BitMapBackend::new(out, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (plot_area, bar_area) = root.split_horizontally((HEATMAP_SIZE.0 - 160) as i32);

    let n = matrix.labels.len();
    let defined: Vec<f64> = matrix.values.iter().flatten().flatten().copied().collect();
    let lo = defined.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = defined.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (vmin, vmax) = if defined.is_empty() {
        (-1.0, 1.0)
    } else if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    };
    let scale = |v: f64| (v - vmin) / (vmax - vmin);

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(20)
        .x_label_area_size(160)
        .y_label_area_size(160)
        .build_cartesian_2d(0f64..n as f64, 0f64..n as f64)?;

    // Row 0 is drawn at the top
    let cells = matrix.values.iter().enumerate().flat_map(|(i, row)| {
        row.iter().enumerate().filter_map(move |(j, v)| {
            let y = (n - 1 - i) as f64;
            v.map(|v| (j as f64, y, v))
        })
    });
    for (x, y, v) in cells {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x, y), (x + 1.0, y + 1.0)],
            coolwarm(scale(v)).filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{:.2}", v),
            (x + 0.5, y + 0.5),
            centered(16),
        )))?;
    }

    for (i, label) in matrix.labels.iter().enumerate() {
        let short = truncate_label(label);
        let (bx, by) = chart.backend_coord(&(i as f64 + 0.5, 0.0));
        draw_diagonal_label(&root, &short, (bx, by + 12), 14)?;

        let (lx, ly) = chart.backend_coord(&(0.0, (n - 1 - i) as f64 + 0.5));
        root.draw(&Text::new(
            short,
            (lx - 8, ly),
            (FONT, 14)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Right, VPos::Center)),
        ))?;
    }

    draw_colorbar(&bar_area, vmin, vmax)?;
    root.present()?;
    Ok(())
}

fn draw_colorbar(area: &Area<'_>, vmin: f64, vmax: f64) -> Result<(), RenderError> {
    let mut bar = ChartBuilder::on(area)
        .margin_top(40)
        .margin_bottom(200)
        .margin_left(20)
        .margin_right(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, vmin..vmax)?;

    bar.configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .x_label_formatter(&|_: &f64| String::new())
        .y_label_formatter(&|v: &f64| format!("{:.1}", v))
        .draw()?;

    let steps = 100;
    let step = (vmax - vmin) / steps as f64;
    bar.draw_series((0..steps).map(|i| {
        let y0 = vmin + step * i as f64;
        let t = (i as f64 + 0.5) / steps as f64;
        Rectangle::new([(0.0, y0), (1.0, y0 + step)], coolwarm(t).filled())
    }))?;
    Ok(())
}

fn draw_box_plots(columns: &[&NumericColumn], out: &Path) -> Result<(), RenderError> {
    let root = BitMapBackend::new(out, BOX_PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let values: Vec<Vec<f64>> = columns.iter().map(|c| c.finite()).collect();
    let (lo, hi) = bounds(values.iter().flatten().copied());
    let scale = axis_scale(lo, hi);

    let stats: Vec<Option<BoxStats>> = values
        .iter()
        .map(|v| box_stats(&scaled(v, scale)))
        .collect();
    let (lo, hi) = bounds(
        stats
            .iter()
            .flatten()
            .flat_map(|s| [s.whisker_low, s.whisker_high]),
    );
    let (y0, y1) = axis_range(padded_range(lo, hi))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Box Plots of Numerical Features (Outliers Removed)",
            (FONT, 22),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..columns.len() as f64, y0..y1)?;

    let caption = scale_caption(scale);
    let blank = |_: &f64| String::new();
    {
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh().x_labels(0).x_label_formatter(&blank);
        if let Some(caption) = &caption {
            mesh.y_desc(caption.as_str());
        }
        mesh.draw()?;
    }

    for (i, (column, stats)) in columns.iter().zip(&stats).enumerate() {
        let center = i as f64 + 0.5;
        let color = PALETTE[i % PALETTE.len()];

        if let Some(s) = stats {
            let (left, right) = (center - 0.3, center + 0.3);
            let edge = BLACK.stroke_width(1);
            chart.draw_series(std::iter::once(Rectangle::new(
                [(left, s.q1), (right, s.q3)],
                color.filled(),
            )))?;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(left, s.q1), (right, s.q3)],
                edge,
            )))?;
            chart.draw_series(
                [
                    vec![(left, s.median), (right, s.median)],
                    vec![(center, s.q3), (center, s.whisker_high)],
                    vec![(center, s.q1), (center, s.whisker_low)],
                    vec![(center - 0.15, s.whisker_high), (center + 0.15, s.whisker_high)],
                    vec![(center - 0.15, s.whisker_low), (center + 0.15, s.whisker_low)],
                ]
                .into_iter()
                .map(|points| PathElement::new(points, edge)),
            )?;
        }

        let (bx, by) = chart.backend_coord(&(center, y0));
        root.draw(&Text::new(
            truncate_label(&column.name),
            (bx, by + 16),
            centered(14),
        ))?;
    }

    root.present()?;
    Ok(())
}

fn grid_root(out: &Path, panels: usize) -> (Area<'_>, GridLayout) {
    let layout = GridLayout::for_panels(panels);
    let height = GRID_ROW_HEIGHT * layout.rows.max(1) as u32;
    (
        BitMapBackend::new(out, (GRID_WIDTH, height)).into_drawing_area(),
        layout,
    )
}

fn draw_histograms(columns: &[&NumericColumn], out: &Path) -> Result<(), RenderError> {
    let (root, layout) = grid_root(out, columns.len());
    root.fill(&WHITE)?;
    let cells = root.split_evenly((layout.rows, layout.cols));

    for (column, cell) in columns.iter().zip(&cells) {
        let title = format!("Histogram of {}", column.name);
        let raw = column.finite();
        let (lo, hi) = bounds(raw.iter().copied());
        let scale = axis_scale(lo, hi);
        let values = scaled(&raw, scale);
        let Some(hist) = histogram(&values) else {
            cell.titled(&title, (FONT, 18))?;
            continue;
        };

        let first = hist.edges.first().copied().unwrap_or(0.0);
        let last = hist.edges.last().copied().unwrap_or(1.0);
        let (first, last) = axis_range((first, last))?;
        let top = (hist.max_count().max(1) as f64) * 1.1;
        let color = PALETTE[0];
        let x_desc = match scale_caption(scale) {
            Some(caption) => format!("{} ({})", column.name, caption),
            None => column.name.clone(),
        };

        let mut chart = ChartBuilder::on(cell)
            .caption(&title, (FONT, 18))
            .margin(12)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(first..last, 0f64..top)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(6)
            .y_labels(6)
            .x_desc(x_desc.as_str())
            .y_desc("Count")
            .draw()?;

        chart.draw_series(hist.counts.iter().enumerate().map(|(i, count)| {
            Rectangle::new(
                [(hist.edges[i], 0.0), (hist.edges[i + 1], *count as f64)],
                color.mix(0.6).filled(),
            )
        }))?;

        if let Some(curve) = kde_curve(&values, hist.bin_width()) {
            chart.draw_series(LineSeries::new(curve, color.stroke_width(2)))?;
        }
    }

    root.present()?;
    Ok(())
}

fn draw_count_plots(columns: &[&CategoricalColumn], out: &Path) -> Result<(), RenderError> {
    let (root, layout) = grid_root(out, columns.len());
    root.fill(&WHITE)?;
    let cells = root.split_evenly((layout.rows, layout.cols));

    for (column, cell) in columns.iter().zip(&cells) {
        let title = format!("Count Plot of {}", column.name);
        let counts = value_counts(column);
        if counts.is_empty() {
            cell.titled(&title, (FONT, 18))?;
            continue;
        }

        let top = (counts.iter().map(|(_, n)| *n).max().unwrap_or(1) as f64) * 1.1;

        let mut chart = ChartBuilder::on(cell)
            .caption(&title, (FONT, 18))
            .margin(12)
            .x_label_area_size(90)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..counts.len() as f64, 0f64..top)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .x_label_formatter(&|_: &f64| String::new())
            .y_labels(6)
            .y_desc("count")
            .draw()?;

        chart.draw_series(counts.iter().enumerate().map(|(i, (_, n))| {
            let x = i as f64;
            Rectangle::new(
                [(x + 0.1, 0.0), (x + 0.9, *n as f64)],
                PALETTE[i % PALETTE.len()].filled(),
            )
        }))?;

        for (i, (label, _)) in counts.iter().enumerate() {
            let (bx, by) = chart.backend_coord(&(i as f64 + 0.5, 0.0));
            draw_diagonal_label(&root, &truncate_label(label), (bx, by + 8), 12)?;
        }
    }

    root.present()?;
    Ok(())
}

/// Draw `label` along a 45 degree diagonal ending at `anchor`
///
/// The text runs from lower left up to the tick, one glyph per step.
fn draw_diagonal_label(
    root: &Area<'_>,
    label: &str,
    anchor: (i32, i32),
    size: u32,
) -> Result<(), RenderError> {
    let step = (size as f64 * 0.55).round() as i32;
    let chars: Vec<char> = label.chars().collect();
    let len = chars.len() as i32;

    for (i, ch) in chars.into_iter().enumerate() {
        let k = len - 1 - i as i32;
        let position = (anchor.0 - k * step, anchor.1 + k * step);
        root.draw(&Text::new(ch.to_string(), position, centered(size)))?;
    }
    Ok(())
}
