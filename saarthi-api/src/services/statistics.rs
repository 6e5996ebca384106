//! Descriptive statistics over a parsed table
//!
//! Pure functions; no I/O. Conventions follow the usual dataframe semantics:
//! sample standard deviation (n - 1), linearly interpolated quantiles and
//! pairwise-complete correlation.

use std::collections::HashMap;

use crate::models::{CategoricalSummary, ColumnTable, NumericSummary, Summary};
use crate::services::table::{CategoricalColumn, NumericColumn, Table};

/// Subplots per grid row
pub const GRID_COLUMNS: usize = 3;

/// Upper bound on histogram bins
pub const MAX_HISTOGRAM_BINS: usize = 100;

/// Points on each density curve
pub const KDE_POINTS: usize = 200;

/// Numeric and categorical summaries for a table
pub fn summarize(table: &Table) -> Summary {
    let numeric: ColumnTable<NumericSummary> = table
        .numeric_columns()
        .map(|c| (c.name.clone(), describe_numeric(c)))
        .collect();
    let categorical: ColumnTable<CategoricalSummary> = table
        .categorical_columns()
        .map(|c| (c.name.clone(), describe_categorical(c)))
        .collect();

    Summary {
        numeric: numeric.non_empty(),
        categorical: categorical.non_empty(),
    }
}

pub fn describe_numeric(column: &NumericColumn) -> NumericSummary {
    let mut values = column.present();
    values.sort_by(f64::total_cmp);

    NumericSummary {
        count: values.len(),
        mean: mean(&values),
        std: sample_std(&values),
        min: values.first().copied(),
        q25: quantile_sorted(&values, 0.25),
        median: quantile_sorted(&values, 0.5),
        q75: quantile_sorted(&values, 0.75),
        max: values.last().copied(),
    }
}

pub fn describe_categorical(column: &CategoricalColumn) -> CategoricalSummary {
    let counts = value_counts(column);
    let count = counts.iter().map(|(_, n)| n).sum();

    // value_counts is in first-appearance order, so max_by would pick the last tie
    let mut top: Option<&(String, usize)> = None;
    for entry in &counts {
        if top.map_or(true, |best| entry.1 > best.1) {
            top = Some(entry);
        }
    }

    CategoricalSummary {
        count,
        unique: counts.len(),
        top: top.map(|(value, _)| value.clone()),
        frequency: top.map(|(_, n)| *n),
    }
}

/// Distinct non-missing values with their counts, in first-appearance order
pub fn value_counts(column: &CategoricalColumn) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for value in column.values.iter().flatten() {
        match index.get(value.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value.as_str(), counts.len());
                counts.push((value.clone(), 1));
            }
        }
    }
    counts
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with n - 1 in the denominator
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Linear-interpolation quantile of already sorted values
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(lerp(sorted[lo], sorted[hi], frac))
}

/// `a + (b - a) * t` that stays finite when `b - a` exceeds `f64::MAX`
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let delta = b - a;
    if delta.is_finite() {
        a + delta * t
    } else {
        a * (1.0 - t) + b * t
    }
}

/// Pearson correlation over rows where both values are present and finite
///
/// `None` with fewer than two complete pairs, zero variance on either side,
/// or sums too large to represent.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Square correlation matrix over the given columns
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn correlation_matrix(columns: &[&NumericColumn]) -> CorrelationMatrix {
    let values = columns
        .iter()
        .map(|a| {
            columns
                .iter()
                .map(|b| pearson(&a.values, &b.values))
                .collect()
        })
        .collect();

    CorrelationMatrix {
        labels: columns.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

/// Box-plot geometry with outliers excluded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest observation within 1.5 IQR below q1
    pub whisker_low: f64,
    /// Largest observation within 1.5 IQR above q3
    pub whisker_high: f64,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let q1 = quantile_sorted(&sorted, 0.25)?;
    let median = quantile_sorted(&sorted, 0.5)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let reach = 1.5 * (q3 - q1);

    let whisker_low = sorted
        .iter()
        .copied()
        .find(|v| *v >= q1 - reach)
        .unwrap_or(q1);
    let whisker_high = sorted
        .iter()
        .rev()
        .copied()
        .find(|v| *v <= q3 + reach)
        .unwrap_or(q3);

    Some(BoxStats {
        q1,
        median,
        q3,
        whisker_low,
        whisker_high,
    })
}

/// Equal-width histogram
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        match (self.edges.first(), self.edges.last()) {
            (Some(first), Some(last)) if !self.counts.is_empty() => {
                (last / 2.0 - first / 2.0) / self.counts.len() as f64 * 2.0
            }
            _ => 0.0,
        }
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Bin count chosen as the smaller width of Freedman-Diaconis and Sturges
///
/// Non-finite values are ignored. Widths are computed on halved values so
/// spans close to `f64::MAX` still bin correctly.
pub fn histogram(values: &[f64]) -> Option<Histogram> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    let (mut first, mut last) = (*sorted.first()?, *sorted.last()?);

    let half_range = last / 2.0 - first / 2.0;
    let bins = if half_range > 0.0 {
        let n = sorted.len() as f64;
        let sturges = half_range / (n.log2() + 1.0);
        let half_iqr =
            quantile_sorted(&sorted, 0.75)? / 2.0 - quantile_sorted(&sorted, 0.25)? / 2.0;
        let fd = 2.0 * half_iqr * n.powf(-1.0 / 3.0);
        let width = if fd > 0.0 { fd.min(sturges) } else { sturges };
        ((half_range / width).ceil() as usize).clamp(1, MAX_HISTOGRAM_BINS)
    } else {
        let pad = degenerate_padding(first);
        first -= pad;
        last += pad;
        1
    };

    let edges = (0..=bins)
        .map(|i| lerp(first, last, i as f64 / bins as f64))
        .collect();
    let half_width = (last / 2.0 - first / 2.0) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let idx = (((v / 2.0 - first / 2.0) / half_width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Some(Histogram { edges, counts })
}

/// Half-width given to a zero-length range around `value`
///
/// 0.5 for ordinary magnitudes; grows with `value` once 0.5 would be lost to
/// rounding.
pub fn degenerate_padding(value: f64) -> f64 {
    0.5_f64.max(value.abs() * 1e-9)
}

/// Gaussian KDE with Scott's bandwidth, scaled to histogram counts
///
/// Evaluated on `KDE_POINTS` points spanning the data range. `None` for fewer
/// than two observations or zero spread.
pub fn kde_curve(values: &[f64], bin_width: f64) -> Option<Vec<(f64, f64)>> {
    let std = sample_std(values)?;
    if std == 0.0 || !std.is_finite() {
        return None;
    }
    let n = values.len() as f64;
    let bandwidth = std * n.powf(-0.2);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (max - min) / (KDE_POINTS - 1) as f64;

    let curve = (0..KDE_POINTS)
        .map(|i| {
            let x = min + step * i as f64;
            let density: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density * n * bin_width)
        })
        .collect();
    Some(curve)
}

/// Subplot grid for `panels` charts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    pub fn for_panels(panels: usize) -> Self {
        Self {
            rows: panels.div_ceil(GRID_COLUMNS),
            cols: GRID_COLUMNS,
        }
    }

    /// (row, col) of the i-th panel
    pub fn cell(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }
}
