//! The import job state machine.
//!
//! `Pending -> Running -> {Succeeded | Canceled | Failed}`. The job builds
//! every statement up front, creates the table, then sends the inserts
//! batch by batch, strictly in order. Cancellation is checked before
//! statement building and before each batch; a batch already in flight
//! is never interrupted.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use carto_api::SqlExecutor;
use carto_import_models::{Dialect, JobState, Layer, TargetTable};

use crate::atomic::{self, AtomicBlock};
use crate::batch;
use crate::progress::{ProgressCallback, null_progress};
use crate::statement::build_statements;
use crate::value::TextQuoting;
use crate::ImportError;

/// Default number of `INSERT` statements per batch (10).
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(9);

/// Parameters of an import, fixed once the job starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// CARTO connection name used to address the SQL API.
    pub connection: String,
    /// Target dialect.
    pub dialect: Dialect,
    /// Destination table.
    pub table: TargetTable,
    /// Maximum statements per atomic batch.
    pub batch_size: NonZeroUsize,
    /// How text literals are quoted.
    pub text_quoting: TextQuoting,
}

impl ImportOptions {
    /// Options with the default batch size and verbatim text quoting.
    #[must_use]
    pub fn new(connection: impl Into<String>, dialect: Dialect, table: TargetTable) -> Self {
        Self {
            connection: connection.into(),
            dialect,
            table,
            batch_size: DEFAULT_BATCH_SIZE,
            text_quoting: TextQuoting::default(),
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the text quoting mode.
    #[must_use]
    pub const fn with_text_quoting(mut self, text_quoting: TextQuoting) -> Self {
        self.text_quoting = text_quoting;
        self
    }
}

/// Requests cancellation of a job. Cloneable; every clone controls the
/// same job.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Asks the job to stop before its next batch.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How the pipeline stopped when it did not fail.
enum Completion {
    Finished,
    Canceled,
}

/// A single layer import.
///
/// State, progress and the captured error can be read from another task
/// while [`ImportJob::run`] is executing.
pub struct ImportJob {
    options: ImportOptions,
    layer: Layer,
    cancel: CancelHandle,
    state: AtomicU8,
    progress: AtomicU8,
    error: OnceLock<ImportError>,
    progress_callback: Arc<dyn ProgressCallback>,
}

impl ImportJob {
    /// Creates a pending job.
    #[must_use]
    pub fn new(options: ImportOptions, layer: Layer) -> Self {
        Self {
            options,
            layer,
            cancel: CancelHandle::default(),
            state: AtomicU8::new(JobState::Pending as u8),
            progress: AtomicU8::new(0),
            error: OnceLock::new(),
            progress_callback: null_progress(),
        }
    }

    /// Reports progress to `callback` instead of discarding it.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    /// The job's parameters.
    #[must_use]
    pub const fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// A handle that cancels this job.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> JobState {
        JobState::from_repr(self.state.load(Ordering::SeqCst)).unwrap_or(JobState::Failed)
    }

    /// Percent of inserts acknowledged, in `0..=100`. Never decreases.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// The error that failed the job, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ImportError> {
        self.error.get()
    }

    /// Runs the import to a terminal state and returns it.
    ///
    /// A job runs at most once; calling `run` again returns the current
    /// state without doing anything.
    pub async fn run<E: SqlExecutor + ?Sized>(&self, executor: &E) -> JobState {
        if self
            .state
            .compare_exchange(
                JobState::Pending as u8,
                JobState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            log::warn!(
                "Import to {} already started ({})",
                self.options.table,
                self.state()
            );
            return self.state();
        }

        log::info!(
            "Importing {} features to {} ({}, batch size {})",
            self.layer.len(),
            self.options.table,
            self.options.dialect,
            self.options.batch_size
        );

        let final_state = match self.execute(executor).await {
            Ok(Completion::Finished) => {
                self.set_progress(100);
                self.progress_callback
                    .finish(format!("Imported layer to {}", self.options.table));
                log::info!("Import to {} complete", self.options.table);
                JobState::Succeeded
            }
            Ok(Completion::Canceled) => {
                self.progress_callback
                    .finish(format!("Import to {} canceled", self.options.table));
                log::info!(
                    "Import to {} canceled at {}%",
                    self.options.table,
                    self.progress()
                );
                JobState::Canceled
            }
            Err(e) => {
                log::error!(
                    "Could not import layer to {}.\n{e}\n{e:?}",
                    self.options.table
                );
                self.progress_callback
                    .finish(format!("Import to {} failed: {e}", self.options.table));
                let _ = self.error.set(e);
                JobState::Failed
            }
        };

        self.state.store(final_state as u8, Ordering::SeqCst);
        final_state
    }

    async fn execute<E: SqlExecutor + ?Sized>(&self, executor: &E) -> Result<Completion, ImportError> {
        if self.cancel.is_canceled() {
            return Ok(Completion::Canceled);
        }

        let ImportOptions {
            connection,
            dialect,
            table,
            batch_size,
            text_quoting,
        } = &self.options;

        let statements = build_statements(&self.layer, table, *dialect, *text_quoting)?;

        log::debug!("{}", statements.create);
        executor.execute_write(connection, &statements.create).await?;
        log::info!("Created table {table}");

        let batches = batch::plan(&statements.inserts, *batch_size);
        let total = statements.inserts.len();
        self.progress_callback.set_total(100);

        for batch in &batches {
            if self.cancel.is_canceled() {
                return Ok(Completion::Canceled);
            }

            self.progress_callback.set_message(format!(
                "{table}: batch {}/{}",
                batch.index + 1,
                batches.len()
            ));
            log::debug!(
                "{table}: sending batch {}/{} ({} statements)",
                batch.index + 1,
                batches.len(),
                batch.statements.len()
            );

            let block = atomic::wrap(batch.statements, *dialect, table);
            self.send_block(executor, connection, &block).await?;

            self.set_progress(batch::progress_after(batch.index, total, *batch_size));
        }

        Ok(Completion::Finished)
    }

    async fn send_block<E: SqlExecutor + ?Sized>(
        &self,
        executor: &E,
        connection: &str,
        block: &AtomicBlock,
    ) -> Result<(), ImportError> {
        match block {
            AtomicBlock::Single(sql) => {
                executor.execute_write(connection, sql).await?;
            }
            AtomicBlock::Procedure {
                name,
                create,
                call,
                drop,
            } => {
                executor.execute_write(connection, create).await?;
                let called = executor.execute_write(connection, call).await;
                let dropped = executor.execute_write(connection, drop).await;

                if let Err(call_error) = called {
                    if let Err(drop_error) = dropped {
                        log::warn!("Could not drop procedure {name}: {drop_error}");
                    }
                    return Err(call_error.into());
                }
                dropped?;
            }
        }
        Ok(())
    }

    fn set_progress(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.progress.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            self.progress_callback.set_position(u64::from(percent));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use carto_api::ApiError;
    use carto_import_models::{Feature, Field, SemanticType};

    use super::*;

    /// Records every statement and optionally fails or cancels on given
    /// calls (0-based, counting every `execute_write`). A failing call
    /// answers HTTP 500 with its configured body.
    #[derive(Default)]
    struct RecordingExecutor {
        sent: Mutex<Vec<String>>,
        fail_on: BTreeMap<usize, &'static str>,
        cancel_after: Option<(usize, CancelHandle)>,
    }

    impl RecordingExecutor {
        fn failing(calls: &[(usize, &'static str)]) -> Self {
            Self {
                fail_on: calls.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SqlExecutor for RecordingExecutor {
        async fn execute_read(
            &self,
            _connection: &str,
            _sql: &str,
        ) -> Result<serde_json::Value, ApiError> {
            unreachable!("imports never read")
        }

        async fn execute_write(
            &self,
            connection: &str,
            sql: &str,
        ) -> Result<serde_json::Value, ApiError> {
            assert_eq!(connection, "conn");
            let call = {
                let mut sent = self.sent.lock().unwrap();
                sent.push(sql.to_string());
                sent.len() - 1
            };
            if let Some((after, handle)) = &self.cancel_after {
                if call == *after {
                    handle.cancel();
                }
            }
            if let Some(body) = self.fail_on.get(&call) {
                return Err(ApiError::Status {
                    status: 500,
                    body: (*body).to_string(),
                });
            }
            Ok(serde_json::json!({ "rows": [] }))
        }
    }

    fn layer(features: usize) -> Layer {
        Layer::new(
            vec![Field::new("id", SemanticType::Integer)],
            (0..features)
                .map(|i| Feature::new(vec![i64::try_from(i).unwrap().into()], None))
                .collect(),
        )
    }

    fn options(dialect: Dialect) -> ImportOptions {
        ImportOptions::new("conn", dialect, "db.schema.t".parse().unwrap())
    }

    fn batch_of(sql: &str, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Postgres => sql.starts_with("DO $$"),
            _ => sql.contains("INSERT INTO"),
        }
    }

    #[tokio::test]
    async fn imports_all_batches_in_order() {
        let job = ImportJob::new(options(Dialect::Postgres), layer(25));
        let executor = RecordingExecutor::default();

        assert_eq!(job.run(&executor).await, JobState::Succeeded);
        assert_eq!(job.state(), JobState::Succeeded);
        assert_eq!(job.progress(), 100);
        assert!(job.error().is_none());

        let sent = executor.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].starts_with("CREATE OR REPLACE TABLE db.schema.t"));
        assert!(sent[1].contains("VALUES (0, NULL);"));
        assert!(sent[1].contains("VALUES (9, NULL);"));
        assert!(sent[3].contains("VALUES (24, NULL);"));
        assert!(sent[1..].iter().all(|sql| batch_of(sql, Dialect::Postgres)));
    }

    #[tokio::test]
    async fn cancel_after_first_batch_stops_before_second() {
        let job = ImportJob::new(options(Dialect::Postgres), layer(25));
        let executor = RecordingExecutor {
            cancel_after: Some((1, job.cancel_handle())),
            ..RecordingExecutor::default()
        };

        assert_eq!(job.run(&executor).await, JobState::Canceled);
        let sent = executor.sent();
        assert_eq!(sent.len(), 2, "CREATE plus exactly one batch");
        assert_eq!(job.progress(), 40);
        assert!(job.error().is_none());
    }

    #[tokio::test]
    async fn cancel_before_start_sends_nothing() {
        let job = ImportJob::new(options(Dialect::BigQuery), layer(5));
        job.cancel_handle().cancel();
        let executor = RecordingExecutor::default();

        assert_eq!(job.run(&executor).await, JobState::Canceled);
        assert!(executor.sent().is_empty());
        assert_eq!(job.progress(), 0);
    }

    #[tokio::test]
    async fn transport_error_on_second_batch_fails_job() {
        let job = ImportJob::new(options(Dialect::Postgres), layer(25));
        let executor = RecordingExecutor::failing(&[(2, "boom")]);

        assert_eq!(job.run(&executor).await, JobState::Failed);
        let sent = executor.sent();
        assert_eq!(sent.len(), 3, "CREATE, batch 1, failed batch 2");
        assert_eq!(
            sent.iter().filter(|sql| sql.contains("VALUES (0, NULL);")).count(),
            1
        );
        assert!(!sent.iter().any(|sql| sql.contains("VALUES (24, NULL);")));
        assert_eq!(job.progress(), 40);
        assert!(matches!(
            job.error(),
            Some(ImportError::Transport(ApiError::Status { status: 500, .. }))
        ));
    }

    #[tokio::test]
    async fn create_failure_fails_before_any_batch() {
        let job = ImportJob::new(options(Dialect::Snowflake), layer(3));
        let executor = RecordingExecutor::failing(&[(0, "boom")]);

        assert_eq!(job.run(&executor).await, JobState::Failed);
        assert_eq!(executor.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_procedure_call_still_drops_procedure() {
        let job = ImportJob::new(options(Dialect::Redshift), layer(3));
        // 0 = CREATE TABLE, 1 = CREATE PROCEDURE, 2 = CALL, 3 = DROP
        let executor = RecordingExecutor::failing(&[(2, "boom")]);

        assert_eq!(job.run(&executor).await, JobState::Failed);
        let sent = executor.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent[2].starts_with("CALL "));
        assert!(sent[3].starts_with("DROP PROCEDURE "));
        assert!(matches!(job.error(), Some(ImportError::Transport(_))));
    }

    #[tokio::test]
    async fn failed_drop_does_not_hide_call_error() {
        let job = ImportJob::new(options(Dialect::Redshift), layer(3));
        let executor = RecordingExecutor::failing(&[(2, "call"), (3, "drop")]);

        assert_eq!(job.run(&executor).await, JobState::Failed);
        assert_eq!(executor.sent().len(), 4);
        assert!(
            matches!(
                job.error(),
                Some(ImportError::Transport(ApiError::Status { status: 500, body })) if body == "call"
            ),
            "{:?}",
            job.error()
        );
    }

    #[tokio::test]
    async fn failed_drop_after_successful_call_fails_job() {
        let job = ImportJob::new(
            options(Dialect::Redshift).with_batch_size(NonZeroUsize::new(2).unwrap()),
            layer(3),
        );
        let executor = RecordingExecutor::failing(&[(3, "drop")]);

        assert_eq!(job.run(&executor).await, JobState::Failed);
        let sent = executor.sent();
        assert_eq!(sent.len(), 4, "second batch is never started");
        assert!(sent[3].starts_with("DROP PROCEDURE "));
        assert!(matches!(
            job.error(),
            Some(ImportError::Transport(ApiError::Status { body, .. })) if body == "drop"
        ));
    }

    #[tokio::test]
    async fn procedure_triad_per_batch() {
        let job = ImportJob::new(
            options(Dialect::Redshift).with_batch_size(NonZeroUsize::new(2).unwrap()),
            layer(3),
        );
        let executor = RecordingExecutor::default();

        assert_eq!(job.run(&executor).await, JobState::Succeeded);
        let sent = executor.sent();
        assert_eq!(sent.len(), 1 + 2 * 3);
        assert!(sent[1].starts_with("CREATE OR REPLACE PROCEDURE db.schema.carto_"));
        assert!(sent[4].starts_with("CREATE OR REPLACE PROCEDURE db.schema.carto_"));
        assert_ne!(sent[2], sent[5], "each batch gets its own procedure");
    }

    #[tokio::test]
    async fn field_mismatch_fails_without_network() {
        let layer = Layer::new(
            vec![Field::new("id", SemanticType::Integer)],
            vec![Feature::new(vec![], None)],
        );
        let job = ImportJob::new(options(Dialect::Databricks), layer);
        let executor = RecordingExecutor::default();

        assert_eq!(job.run(&executor).await, JobState::Failed);
        assert!(executor.sent().is_empty());
        assert!(matches!(
            job.error(),
            Some(ImportError::FieldCountMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn empty_layer_only_creates_table() {
        let job = ImportJob::new(options(Dialect::BigQuery), layer(0));
        let executor = RecordingExecutor::default();

        assert_eq!(job.run(&executor).await, JobState::Succeeded);
        assert_eq!(executor.sent().len(), 1);
        assert_eq!(job.progress(), 100);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let job = ImportJob::new(options(Dialect::Databricks), layer(2));
        let executor = RecordingExecutor::default();

        assert_eq!(job.run(&executor).await, JobState::Succeeded);
        assert_eq!(job.run(&executor).await, JobState::Succeeded);
        assert_eq!(executor.sent().len(), 2);
    }
}
