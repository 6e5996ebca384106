//! Data models for saarthi-api

pub mod analysis;
pub mod session;

pub use analysis::{
    CategoricalSummary, ColumnTable, EdaResult, MissingReport, NumericSummary, Preview, Summary,
};
pub use session::{Asset, AssetKind, Session};
