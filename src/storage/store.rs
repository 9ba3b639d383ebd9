//! Result persistence.
//!
//! Two writes per job: every finalized request as a trace entry, and one job
//! summary. Each record is stored as a JSON document next to the columns it is
//! looked up by.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

use crate::error_handling::DatabaseError;
use crate::job::{scalar_to_string, JobSummary};
use crate::trace::CapturedRequest;

use super::circuit_breaker::DbWriteCircuitBreaker;
use super::migrations::run_migrations;
use super::pool::init_db_pool_with_path;

/// Destination of a job's results. Shared by every running job.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Inserts the finalized requests of one job; returns the number written.
    async fn insert_trace_entries(
        &self,
        job_id: &str,
        entries: &[CapturedRequest],
    ) -> Result<usize, DatabaseError>;

    async fn insert_summary(&self, summary: &JobSummary) -> Result<(), DatabaseError>;
}

/// `ResultStore` backed by the SQLite results database.
pub struct SqliteResultStore {
    pool: Arc<Pool<Sqlite>>,
    breaker: DbWriteCircuitBreaker,
}

impl SqliteResultStore {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        Self::with_circuit_breaker(pool, DbWriteCircuitBreaker::new())
    }

    pub fn with_circuit_breaker(pool: Arc<Pool<Sqlite>>, breaker: DbWriteCircuitBreaker) -> Self {
        SqliteResultStore { pool, breaker }
    }

    /// Opens (creating if needed) the database at `db_path` and applies migrations.
    pub async fn open(db_path: &Path) -> Result<Self, DatabaseError> {
        let pool = init_db_pool_with_path(db_path).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn guard(&self) -> Result<(), DatabaseError> {
        if self.breaker.allow_write() {
            Ok(())
        } else {
            Err(DatabaseError::CircuitOpen)
        }
    }

    fn track<T>(&self, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }

    async fn write_entries(
        &self,
        job_id: &str,
        entries: &[CapturedRequest],
    ) -> Result<usize, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            let document = serde_json::to_string(entry)?;
            sqlx::query(
                "INSERT INTO trace_entries (job_id, request_id, url, url_hash, status, document, captured_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(job_id)
            .bind(&entry.request_id)
            .bind(&entry.url)
            .bind(&entry.url_hash)
            .bind(entry.status)
            .bind(document)
            .bind(entry.at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(entries.len())
    }

    async fn write_summary(&self, summary: &JobSummary) -> Result<(), DatabaseError> {
        let document = serde_json::to_string(summary)?;
        sqlx::query(
            "INSERT INTO job_summaries (job_id, schedule_id, schedule_history_id, company_id, url, url_hash, request_count, load_time, document, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&summary.job_id)
        .bind(&summary.schedule_id)
        .bind(&summary.schedule_history_id)
        .bind(summary.company_id.as_ref().and_then(scalar_to_string))
        .bind(&summary.url)
        .bind(&summary.url_hash)
        .bind(summary.request_count as i64)
        .bind(summary.load_time)
        .bind(document)
        .bind(summary.at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn insert_trace_entries(
        &self,
        job_id: &str,
        entries: &[CapturedRequest],
    ) -> Result<usize, DatabaseError> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.guard()?;
        let result = self.write_entries(job_id, entries).await;
        self.track(result)
    }

    async fn insert_summary(&self, summary: &JobSummary) -> Result<(), DatabaseError> {
        self.guard()?;
        let result = self.write_summary(summary).await;
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobConfig;
    use crate::storage::test_helpers::open_test_store;
    use crate::trace::CookieRecord;
    use sqlx::Row;
    use std::time::Duration;

    fn entries(count: usize) -> Vec<CapturedRequest> {
        (0..count)
            .map(|i| {
                let mut request =
                    CapturedRequest::new(format!("100.{i}"), format!("https://example.com/{i}.js"));
                request.status = 200;
                request.job_id = Some("job-1".to_string());
                request
            })
            .collect()
    }

    #[tokio::test]
    async fn test_insert_trace_entries() {
        let (store, _dir) = open_test_store().await;
        let written = store.insert_trace_entries("job-1", &entries(3)).await.unwrap();
        assert_eq!(written, 3);

        let rows = sqlx::query(
            "SELECT request_id, document FROM trace_entries WHERE job_id = ? ORDER BY id",
        )
        .bind("job-1")
        .fetch_all(store.pool())
        .await
        .unwrap();
        assert_eq!(rows.len(), 3);
        let request_id: String = rows[1].get("request_id");
        assert_eq!(request_id, "100.1");
        let document: String = rows[0].get("document");
        let decoded: CapturedRequest = serde_json::from_str(&document).unwrap();
        assert_eq!(decoded.url, "https://example.com/0.js");
    }

    #[tokio::test]
    async fn test_insert_empty_entries_is_a_no_op() {
        let (store, _dir) = open_test_store().await;
        assert_eq!(store.insert_trace_entries("job-1", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_summary_once_per_job() {
        let (store, _dir) = open_test_store().await;
        let job = JobConfig::default_job("https://example.com/");
        let summary = JobSummary::new(
            &job,
            &entries(12),
            640.0,
            vec![CookieRecord::parse("sid=1")],
            vec!["example.com".into()],
        );

        store.insert_summary(&summary).await.unwrap();
        assert!(store.insert_summary(&summary).await.is_err());

        let row = sqlx::query(
            "SELECT request_count, company_id FROM job_summaries WHERE job_id = ?",
        )
        .bind(&summary.job_id)
        .fetch_one(store.pool())
        .await
        .unwrap();
        let request_count: i64 = row.get("request_count");
        let company_id: Option<String> = row.get("company_id");
        assert_eq!(request_count, 12);
        assert_eq!(company_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_open_circuit_skips_writes() {
        let (store, _dir) = open_test_store().await;
        let store = SqliteResultStore::with_circuit_breaker(
            store.pool.clone(),
            DbWriteCircuitBreaker::with_threshold(1, Duration::from_secs(60)),
        );
        let job = JobConfig::default_job("https://example.com/");
        let summary = JobSummary::new(&job, &[], -1.0, Vec::new(), Vec::new());

        store.insert_summary(&summary).await.unwrap();
        // Duplicate key trips the breaker
        assert!(store.insert_summary(&summary).await.is_err());
        assert!(matches!(
            store.insert_trace_entries("job-1", &entries(1)).await,
            Err(DatabaseError::CircuitOpen)
        ));
    }
}
