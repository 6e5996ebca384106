//! Analysis over a session's uploaded file
//!
//! Preview, missing-value report, summary statistics and the full EDA bundle.
//! Charts are rendered once per column composition: when the session already
//! holds every chart kind the current columns call for, rendered for the same
//! fingerprint, the stored URLs are returned and nothing is redrawn.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ServiceError;
use crate::models::{Asset, AssetKind, EdaResult, MissingReport, Preview, Session, Summary};
use crate::services::charts::ChartRenderer;
use crate::services::publisher::{AssetPublisher, PublishError};
use crate::services::session_store::SessionStore;
use crate::services::statistics;
use crate::services::table::Table;

pub struct AnalysisEngine {
    store: SessionStore,
    renderer: Arc<dyn ChartRenderer>,
    publisher: Arc<dyn AssetPublisher>,
    preview_rows: usize,
    publish_timeout: Duration,
}

impl AnalysisEngine {
    pub fn new(
        store: SessionStore,
        renderer: Arc<dyn ChartRenderer>,
        publisher: Arc<dyn AssetPublisher>,
        preview_rows: usize,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            renderer,
            publisher,
            preview_rows,
            publish_timeout,
        }
    }

    /// Header plus the first `preview_rows` rows
    pub async fn get_preview(&self, session_id: &str) -> Result<Preview, ServiceError> {
        let (session, table) = self.load_table(session_id).await?;
        let preview_rows = self.preview_rows;

        let preview = tokio::task::spawn_blocking(move || Preview {
            original_filename: session.original_filename,
            columns: table.column_names(),
            rows: table.head_records(preview_rows),
        })
        .await?;
        Ok(preview)
    }

    pub async fn get_missing_report(&self, session_id: &str) -> Result<MissingReport, ServiceError> {
        let (_, table) = self.load_table(session_id).await?;
        ensure_rows(&table)?;
        Ok(MissingReport::from_counts(table.missing_counts()))
    }

    /// Summary statistics without charts
    pub async fn get_summary(&self, session_id: &str) -> Result<Summary, ServiceError> {
        let (_, table) = self.load_table(session_id).await?;
        ensure_rows(&table)?;
        let summary = tokio::task::spawn_blocking(move || statistics::summarize(&table)).await?;
        Ok(summary)
    }

    pub async fn get_eda(&self, session_id: &str) -> Result<EdaResult, ServiceError> {
        let (session, table) = self.load_table(session_id).await?;
        ensure_rows(&table)?;

        let table = Arc::new(table);
        let summary = {
            let table = Arc::clone(&table);
            tokio::task::spawn_blocking(move || statistics::summarize(&table)).await?
        };

        let fingerprint = table.fingerprint();
        let expected = expected_kinds(&table);

        if session.has_cached_assets(&fingerprint, &expected) {
            tracing::info!(session_id = %session_id, "Reusing cached charts");
            return Ok(eda_result(summary, &session, &expected, true));
        }

        let mut assets = Vec::with_capacity(expected.len());
        for kind in &expected {
            let url = self.render_and_publish(&session, &table, *kind).await?;
            assets.push(Asset { kind: *kind, url });
        }

        let updated = self
            .store
            .record_assets(session_id, &fingerprint, assets)
            .await?;

        tracing::info!(
            session_id = %session_id,
            charts = expected.len(),
            publisher = self.publisher.name(),
            "EDA charts published"
        );
        Ok(eda_result(summary, &updated, &expected, false))
    }

    async fn load_table(&self, session_id: &str) -> Result<(Session, Table), ServiceError> {
        let session = self.store.get(session_id).await?;
        let source = session.source_path();

        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Err(ServiceError::SourceFileMissing(session_id.to_string()));
        }

        let table = tokio::task::spawn_blocking(move || Table::from_path(&source)).await??;
        Ok((session, table))
    }

    async fn render_and_publish(
        &self,
        session: &Session,
        table: &Arc<Table>,
        kind: AssetKind,
    ) -> Result<String, ServiceError> {
        let out: PathBuf = session.chart_path(kind);
        {
            let renderer = Arc::clone(&self.renderer);
            let table = Arc::clone(table);
            let out = out.clone();
            tokio::task::spawn_blocking(move || renderer.render(kind, &table, &out)).await??;
        }
        tracing::debug!(session_id = %session.session_id, chart = %kind, "Rendered chart");

        let logical_id = kind.logical_id(&session.session_id);
        match tokio::time::timeout(self.publish_timeout, self.publisher.publish(&out, &logical_id))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(PublishError::Timeout(self.publish_timeout).into()),
        }
    }
}

fn ensure_rows(table: &Table) -> Result<(), ServiceError> {
    if table.is_empty() {
        Err(ServiceError::EmptyFile)
    } else {
        Ok(())
    }
}

/// Chart kinds the table's column composition calls for
pub fn expected_kinds(table: &Table) -> Vec<AssetKind> {
    let mut kinds = Vec::new();
    if table.has_numeric() {
        kinds.extend(AssetKind::NUMERIC);
    }
    if table.has_categorical() {
        kinds.extend(AssetKind::CATEGORICAL);
    }
    kinds
}

fn eda_result(
    summary: Summary,
    session: &Session,
    expected: &[AssetKind],
    from_cache: bool,
) -> EdaResult {
    let url = |kind: AssetKind| {
        if expected.contains(&kind) {
            session.asset_url(kind).map(str::to_string)
        } else {
            None
        }
    };

    EdaResult {
        summary,
        correlation_matrix_url: url(AssetKind::CorrelationMatrix),
        box_plot_url: url(AssetKind::BoxPlot),
        histogram_url: url(AssetKind::Histogram),
        count_plot_url: url(AssetKind::CountPlot),
        from_cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::charts::RenderError;
    use crate::services::publisher::{LocalPublisher, UnpublishOutcome};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl ChartRenderer for CountingRenderer {
        fn render(&self, _kind: AssetKind, _table: &Table, out: &Path) -> Result<(), RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, b"png")?;
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: SessionStore,
        renderer: Arc<CountingRenderer>,
        engine: AnalysisEngine,
    }

    /// Publisher that answers only after `delay`
    struct SlowPublisher {
        delay: Duration,
    }

    #[async_trait]
    impl AssetPublisher for SlowPublisher {
        async fn publish(&self, _local_path: &Path, logical_id: &str) -> Result<String, PublishError> {
            tokio::time::sleep(self.delay).await;
            Ok(format!("http://slow/{}", logical_id))
        }

        async fn unpublish(&self, _url: &str) -> UnpublishOutcome {
            UnpublishOutcome::Ok
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let publisher = Arc::new(LocalPublisher::new(
            dir.path().join("published"),
            "http://test".to_string(),
        ));
        fixture_with(dir, publisher, Duration::from_secs(5))
    }

    fn fixture_with(
        dir: TempDir,
        publisher: Arc<dyn AssetPublisher>,
        publish_timeout: Duration,
    ) -> Fixture {
        let store = SessionStore::new(dir.path().join("registry.json"));
        let renderer = Arc::new(CountingRenderer::default());
        let engine = AnalysisEngine::new(
            store.clone(),
            renderer.clone(),
            publisher,
            100,
            publish_timeout,
        );
        Fixture {
            _dir: dir,
            store,
            renderer,
            engine,
        }
    }

    async fn add_session(f: &Fixture, id: &str, csv: &str) {
        let storage = f._dir.path().join("uploads").join(id);
        std::fs::create_dir_all(&storage).unwrap();
        std::fs::write(storage.join("data.csv"), csv).unwrap();
        f.store
            .insert(Session::new(id.to_string(), storage, "data.csv".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn eda_renders_once_then_hits_cache() {
        let f = fixture();
        add_session(&f, "s1", "x,y,c\n1,2,a\n2,4,b\n3,5,a\n").await;

        let first = f.engine.get_eda("s1").await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            first.histogram_url.as_deref(),
            Some("http://test/assets/histograms_s1.png")
        );

        let second = f.engine.get_eda("s1").await.unwrap();
        assert!(second.from_cache);
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 4);
        assert_eq!(first.correlation_matrix_url, second.correlation_matrix_url);
        assert_eq!(first.count_plot_url, second.count_plot_url);
    }

    #[tokio::test]
    async fn changed_columns_invalidate_cache() {
        let f = fixture();
        add_session(&f, "s1", "x\n1\n2\n").await;
        f.engine.get_eda("s1").await.unwrap();

        let session = f.store.get("s1").await.unwrap();
        std::fs::write(session.source_path(), "x,c\n1,a\n2,b\n").unwrap();

        let result = f.engine.get_eda("s1").await.unwrap();
        assert!(!result.from_cache);
        assert!(result.count_plot_url.is_some());
        // 3 numeric charts, then 3 numeric + 1 categorical
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn categorical_only_has_no_numeric_outputs() {
        let f = fixture();
        add_session(&f, "s1", "c,d\na,x\nb,y\n").await;

        let result = f.engine.get_eda("s1").await.unwrap();
        assert!(result.summary.numeric.is_none());
        assert!(result.summary.categorical.is_some());
        assert!(result.correlation_matrix_url.is_none());
        assert!(result.box_plot_url.is_none());
        assert!(result.histogram_url.is_none());
        assert!(result.count_plot_url.is_some());
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let f = fixture();
        add_session(&f, "s1", "a,b\n").await;

        assert!(matches!(f.engine.get_eda("s1").await, Err(ServiceError::EmptyFile)));
        assert!(matches!(
            f.engine.get_missing_report("s1").await,
            Err(ServiceError::EmptyFile)
        ));
        // Preview of a header-only file is still valid
        let preview = f.engine.get_preview("s1").await.unwrap();
        assert_eq!(preview.columns, vec!["a", "b"]);
        assert!(preview.rows.is_empty());
    }

    #[tokio::test]
    async fn missing_source_file_is_not_found() {
        let f = fixture();
        add_session(&f, "s1", "a\n1\n").await;
        let session = f.store.get("s1").await.unwrap();
        std::fs::remove_file(session.source_path()).unwrap();

        assert!(matches!(
            f.engine.get_summary("s1").await,
            Err(ServiceError::SourceFileMissing(_))
        ));
    }

    #[tokio::test]
    async fn slow_publish_times_out_without_recording_assets() {
        let f = fixture_with(
            TempDir::new().unwrap(),
            Arc::new(SlowPublisher {
                delay: Duration::from_millis(500),
            }),
            Duration::from_millis(50),
        );
        add_session(&f, "s1", "x\n1\n2\n").await;

        let err = f.engine.get_eda("s1").await.unwrap_err();
        assert!(
            matches!(err, ServiceError::Publish(PublishError::Timeout(t)) if t == Duration::from_millis(50)),
            "unexpected error: {err:?}"
        );
        let session = f.store.get("s1").await.unwrap();
        assert!(session.assets.is_empty());
    }

    #[tokio::test]
    async fn publish_within_timeout_succeeds() {
        let f = fixture_with(
            TempDir::new().unwrap(),
            Arc::new(SlowPublisher {
                delay: Duration::from_millis(1),
            }),
            Duration::from_secs(5),
        );
        add_session(&f, "s1", "x\n1\n2\n").await;

        let result = f.engine.get_eda("s1").await.unwrap();
        assert_eq!(result.box_plot_url.as_deref(), Some("http://slow/box_plots_s1"));
    }

    #[tokio::test]
    async fn missing_report_counts_per_column() {
        let f = fixture();
        add_session(&f, "s1", "a,b\n1,\n2,2\n").await;

        let report = f.engine.get_missing_report("s1").await.unwrap();
        assert_eq!(report.missing_values.get("a"), Some(&0));
        assert_eq!(report.missing_values.get("b"), Some(&1));
        assert!(report.missing_present);
    }
}
