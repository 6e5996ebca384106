//! Session and asset records
//!
//! A session is one uploaded file plus everything derived from it. Sessions
//! are persisted in the registry snapshot; see `services::session_store`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sub-directory of a session's storage path holding rendered charts
pub const CHARTS_DIR: &str = "charts";

/// Type tag of a generated chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Heatmap of pairwise correlations between numeric columns
    CorrelationMatrix,
    /// Box plots of numeric columns, outliers suppressed
    BoxPlot,
    /// Histogram + density curve per numeric column
    Histogram,
    /// Category counts per categorical column
    CountPlot,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::CorrelationMatrix,
        AssetKind::BoxPlot,
        AssetKind::Histogram,
        AssetKind::CountPlot,
    ];

    /// Chart kinds derived from numeric columns
    pub const NUMERIC: [AssetKind; 3] = [
        AssetKind::CorrelationMatrix,
        AssetKind::BoxPlot,
        AssetKind::Histogram,
    ];

    /// Chart kinds derived from categorical columns
    pub const CATEGORICAL: [AssetKind; 1] = [AssetKind::CountPlot];

    /// Wire/registry tag
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::CorrelationMatrix => "correlation_matrix",
            AssetKind::BoxPlot => "box_plot",
            AssetKind::Histogram => "histogram",
            AssetKind::CountPlot => "count_plot",
        }
    }

    /// Local file name inside the session's charts directory
    pub fn file_name(self) -> &'static str {
        match self {
            AssetKind::CorrelationMatrix => "correlation_matrix.png",
            AssetKind::BoxPlot => "box_plots.png",
            AssetKind::Histogram => "histograms.png",
            AssetKind::CountPlot => "categorical_plots.png",
        }
    }

    /// Remote object id; stable per session so republishing overwrites
    pub fn logical_id(self, session_id: &str) -> String {
        let prefix = match self {
            AssetKind::CorrelationMatrix => "corr_matrix",
            AssetKind::BoxPlot => "box_plots",
            AssetKind::Histogram => "histograms",
            AssetKind::CountPlot => "categorical_plots",
        };
        format!("{}_{}", prefix, session_id)
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub url: String,
}

/// One upload and its derived artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Registry key; filled from the map key when loading older snapshots
    #[serde(default)]
    pub session_id: String,

    /// Directory dedicated to this session
    #[serde(alias = "session_dir")]
    pub storage_path: PathBuf,

    /// Sanitized upload name; the data file lives at `storage_path/original_filename`
    pub original_filename: String,

    /// Published charts, at most one per kind
    #[serde(default)]
    pub assets: Vec<Asset>,

    /// Column-composition fingerprint the assets were rendered for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eda_fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(session_id: String, storage_path: PathBuf, original_filename: String) -> Self {
        Self {
            session_id,
            storage_path,
            original_filename,
            assets: Vec::new(),
            eda_fingerprint: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Path of the uploaded data file
    pub fn source_path(&self) -> PathBuf {
        self.storage_path.join(&self.original_filename)
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.storage_path.join(CHARTS_DIR)
    }

    pub fn chart_path(&self, kind: AssetKind) -> PathBuf {
        self.charts_dir().join(kind.file_name())
    }

    pub fn asset_url(&self, kind: AssetKind) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.url.as_str())
    }

    /// Insert or overwrite the asset of the same kind
    pub fn set_asset(&mut self, asset: Asset) {
        match self.assets.iter_mut().find(|a| a.kind == asset.kind) {
            Some(existing) => existing.url = asset.url,
            None => self.assets.push(asset),
        }
    }

    /// Cached charts are reusable only when they were rendered for the same
    /// column composition and every expected kind is present.
    pub fn has_cached_assets(&self, fingerprint: &str, expected: &[AssetKind]) -> bool {
        self.eda_fingerprint.as_deref() == Some(fingerprint)
            && expected.iter().all(|kind| self.asset_url(*kind).is_some())
    }
}
