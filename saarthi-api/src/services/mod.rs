//! Services for saarthi-api

pub mod analysis_engine;
pub mod charts;
pub mod publisher;
pub mod session_store;
pub mod statistics;
pub mod table;
pub mod teardown_manager;
pub mod upload_manager;

pub use analysis_engine::AnalysisEngine;
pub use charts::{ChartRenderer, PlottersRenderer, RenderError};
pub use publisher::{AssetPublisher, PublishError, UnpublishOutcome};
pub use session_store::SessionStore;
pub use table::{Table, TableError};
pub use teardown_manager::{TeardownManager, TeardownReport};
pub use upload_manager::UploadManager;
