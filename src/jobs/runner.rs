//! Bulk job runner: validates submissions, queues them, and executes each
//! job's rows sequentially in the background.

use super::models::{
    InputRow, Job, JobKind, JobProgress, JobReceipt, JobStatus, ResultFilter, ResultRow,
};
use super::store::JobStore;
use crate::core::classifier::EmailVerifier;
use crate::core::config::Config;
use crate::core::discovery::EmailFinder;
use crate::core::error::{AppError, Result};
use crate::core::models::{DiscoveryOutcome, DiscoveryReason, PersonQuery, Reason, VerificationOutcome};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

const NOT_FOUND: &str = "Not Found";

/// A validated submission waiting for an execution slot.
struct JobTask {
    job_id: String,
    kind: JobKind,
    rows: Vec<InputRow>,
    /// Original header names, aligned with `kind.required_columns()`.
    columns: Vec<String>,
}

/// Everything a job body needs. Shared by all running jobs.
struct ExecutionContext {
    config: Arc<Config>,
    store: Arc<dyn JobStore>,
    verifier: Arc<dyn EmailVerifier>,
    finder: Arc<dyn EmailFinder>,
}

/// Accepts bulk submissions and serves progress and results.
///
/// Must be created inside a Tokio runtime: construction spawns the dispatcher
/// that pulls queued jobs and runs up to `max_concurrent_jobs` at once.
#[derive(Clone)]
pub struct JobRunner {
    config: Arc<Config>,
    store: Arc<dyn JobStore>,
    queue: mpsc::UnboundedSender<JobTask>,
}

impl JobRunner {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn JobStore>,
        verifier: Arc<dyn EmailVerifier>,
        finder: Arc<dyn EmailFinder>,
    ) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        let context = Arc::new(ExecutionContext {
            config: Arc::clone(&config),
            store: Arc::clone(&store),
            verifier,
            finder,
        });
        tokio::spawn(dispatch(receiver, context));
        Self {
            config,
            store,
            queue,
        }
    }

    /// Validates `rows` and schedules a job for them. Returns immediately.
    pub fn submit(
        &self,
        kind: JobKind,
        rows: Vec<InputRow>,
        source_filename: Option<String>,
    ) -> Result<JobReceipt> {
        self.purge_expired();

        let total_rows = rows.len();
        let Some(header_row) = rows.first() else {
            return Err(AppError::EmptySubmission);
        };
        if total_rows > self.config.max_bulk_rows {
            return Err(AppError::TooManyRows {
                count: total_rows,
                max: self.config.max_bulk_rows,
            });
        }
        let columns = resolve_columns(kind, header_row)?;

        let job_id = Uuid::new_v4().to_string();
        self.store
            .create(Job::new(job_id.clone(), kind, total_rows, source_filename))?;

        let task = JobTask {
            job_id: job_id.clone(),
            kind,
            rows,
            columns,
        };
        if self.queue.send(task).is_err() {
            let message = "Job dispatcher is not running";
            if let Err(e) = self.store.update(&job_id, &mut |job| job.fail(message)) {
                tracing::warn!(target: "job_runner", "Could not mark job {} failed: {}", job_id, e);
            }
            return Err(AppError::Task(message.to_string()));
        }

        tracing::info!(target: "job_runner", "Accepted {} job {} with {} row(s)", kind, job_id, total_rows);
        Ok(JobReceipt { job_id, total_rows })
    }

    pub fn progress(&self, job_id: &str) -> Result<JobProgress> {
        self.store
            .snapshot(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))
    }

    /// Full snapshot of a job, results included.
    pub fn job(&self, job_id: &str) -> Result<Job> {
        self.store
            .get(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))
    }

    /// Completed results restricted by `filter`, in input order.
    pub fn results(&self, job_id: &str, filter: ResultFilter) -> Result<Vec<ResultRow>> {
        self.completed_rows(job_id, &|kind, row| filter.matches(kind, row))
    }

    pub fn results_where<F>(&self, job_id: &str, predicate: F) -> Result<Vec<ResultRow>>
    where
        F: Fn(&ResultRow) -> bool,
    {
        self.completed_rows(job_id, &|_, row| predicate(row))
    }

    /// Drops jobs that reached a terminal state longer ago than the retention
    /// period. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.config.job_retention) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return 0;
        };

        let expired = self.store.finished_before(cutoff);
        for job_id in &expired {
            self.store.remove(job_id);
        }
        if !expired.is_empty() {
            tracing::debug!(target: "job_runner", "Purged {} expired job(s)", expired.len());
        }
        expired.len()
    }

    /// Clones the rows `keep` selects, under the store's read lock.
    fn completed_rows(
        &self,
        job_id: &str,
        keep: &dyn Fn(JobKind, &ResultRow) -> bool,
    ) -> Result<Vec<ResultRow>> {
        let mut selected = Err(AppError::JobNotCompleted(job_id.to_string()));
        self.store.read(job_id, &mut |job| {
            if job.status == JobStatus::Completed {
                selected = Ok(job
                    .results
                    .iter()
                    .filter(|row| keep(job.kind, row))
                    .cloned()
                    .collect());
            }
        })?;
        non_empty(selected?)
    }
}

fn non_empty(rows: Vec<ResultRow>) -> Result<Vec<ResultRow>> {
    if rows.is_empty() {
        Err(AppError::NoMatchingRows)
    } else {
        Ok(rows)
    }
}

/// Maps each required column to the header that names it, ignoring case and
/// surrounding whitespace.
fn resolve_columns(kind: JobKind, header_row: &InputRow) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    let mut missing = Vec::new();
    for required in kind.required_columns() {
        match header_row
            .keys()
            .find(|header| header.trim().to_lowercase() == *required)
        {
            Some(header) => columns.push(header.clone()),
            None => missing.push(required.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::MissingColumns(missing));
    }
    Ok(columns)
}

fn field<'a>(row: &'a InputRow, column: &str) -> &'a str {
    row.get(column).map(|v| v.trim()).unwrap_or("")
}

async fn dispatch(mut queue: mpsc::UnboundedReceiver<JobTask>, context: Arc<ExecutionContext>) {
    let slots = Arc::new(Semaphore::new(context.config.max_concurrent_jobs.max(1)));
    while let Some(task) = queue.recv().await {
        let permit = match Arc::clone(&slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                let message = format!("Job scheduler closed: {}", e);
                if let Err(e) = context.store.update(&task.job_id, &mut |job| job.fail(&message)) {
                    tracing::warn!(target: "job_runner", "Could not mark job {} failed: {}", task.job_id, e);
                }
                break;
            }
        };

        let context = Arc::clone(&context);
        tokio::spawn(async move {
            let _permit = permit;
            let job_id = task.job_id.clone();
            let handle = tokio::spawn(execute(Arc::clone(&context), task));
            if let Err(e) = handle.await {
                tracing::error!(target: "job_runner", "Job {} aborted: {}", job_id, e);
                let message = e.to_string();
                if let Err(e) = context.store.update(&job_id, &mut |job| job.fail(&message)) {
                    tracing::warn!(target: "job_runner", "Could not mark job {} failed: {}", job_id, e);
                }
            }
        });
    }
    tracing::debug!(target: "job_runner", "Job queue closed; dispatcher exiting");
}

/// Processes every row of one job in input order.
async fn execute(context: Arc<ExecutionContext>, task: JobTask) {
    let delay = match task.kind {
        JobKind::Verify => context.config.verify_row_delay,
        JobKind::Find => context.config.find_row_delay,
    };
    let total_rows = task.rows.len();
    tracing::info!(target: "job_runner", "Starting {} job {} ({} rows)", task.kind, task.job_id, total_rows);

    for (index, row) in task.rows.iter().enumerate() {
        let (result, log) = match task.kind {
            JobKind::Verify => context.verify_row(row, &task.columns[0]).await,
            JobKind::Find => context.find_row(row, &task.columns).await,
        };
        tracing::debug!(target: "job_runner", "[{}] {}/{}: {}", task.job_id, index + 1, total_rows, log);

        let mut entry = Some((result, log));
        let recorded = context.store.update(&task.job_id, &mut |job| {
            if let Some((result, log)) = entry.take() {
                job.record_row(result, log);
            }
        });
        if let Err(e) = recorded {
            tracing::warn!(target: "job_runner", "Stopping job {}: {}", task.job_id, e);
            return;
        }

        if index + 1 < total_rows {
            pace(delay).await;
        }
    }

    if let Err(e) = context.store.update(&task.job_id, &mut |job| job.complete()) {
        tracing::warn!(target: "job_runner", "Could not complete job {}: {}", task.job_id, e);
        return;
    }
    tracing::info!(target: "job_runner", "Job {} completed", task.job_id);
}

async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl ExecutionContext {
    async fn verify_row(&self, row: &InputRow, email_column: &str) -> (ResultRow, String) {
        let email = field(row, email_column);
        let outcome = if email.is_empty() {
            VerificationOutcome::invalid(Reason::EmptyEmail)
        } else {
            self.verifier.verify(email).await
        };

        let log = format!("{} → {} ({})", email, outcome.status, outcome.reason);
        let result = ResultRow::from_input(row)
            .with("status", outcome.status.as_str())
            .with("reason", outcome.reason.to_string());
        (result, log)
    }

    async fn find_row(&self, row: &InputRow, columns: &[String]) -> (ResultRow, String) {
        let query = PersonQuery::new(
            field(row, &columns[0]),
            field(row, &columns[1]),
            field(row, &columns[2]),
        );
        let outcome = if query.is_complete() {
            self.finder.discover(&query, None).await
        } else {
            DiscoveryOutcome::not_found(DiscoveryReason::MissingData)
        };

        let (found_email, status) = match &outcome.found_email {
            Some(email) => (email.to_string(), "found"),
            None => (NOT_FOUND.to_string(), "not_found"),
        };
        let log = format!(
            "{} {}@{} → {}",
            query.firstname, query.lastname, query.domain, found_email
        );
        let result = ResultRow::from_input(row)
            .with("found_email", found_email)
            .with("status", status)
            .with("reason", outcome.reason.to_string());
        (result, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;
    use crate::core::models::EmailAddress;
    use crate::jobs::store::InMemoryJobStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// `@ok.test` is valid, `@panic.test` panics, anything else is invalid.
    struct DomainVerifier {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmailVerifier for DomainVerifier {
        async fn verify(&self, email: &str) -> VerificationOutcome {
            self.seen.lock().push(email.to_string());
            if email.ends_with("@panic.test") {
                panic!("probe blew up");
            }
            if email.ends_with("@ok.test") {
                VerificationOutcome::valid(Reason::SmtpOk)
            } else {
                VerificationOutcome::invalid(Reason::SmtpReject)
            }
        }
    }

    /// Finds `first.last@domain` only for the domain `ok.test`.
    struct StubFinder;

    #[async_trait]
    impl EmailFinder for StubFinder {
        async fn discover(&self, query: &PersonQuery, _proxy: Option<&str>) -> DiscoveryOutcome {
            if query.domain == "ok.test" {
                let email = format!(
                    "{}.{}@ok.test",
                    query.firstname.to_lowercase(),
                    query.lastname.to_lowercase()
                );
                DiscoveryOutcome::found(
                    EmailAddress::parse(&email).unwrap(),
                    DiscoveryReason::FoundPattern(Reason::SmtpOk),
                )
            } else {
                DiscoveryOutcome::not_found(DiscoveryReason::NotFound)
            }
        }
    }

    fn runner_with(config: Config) -> (JobRunner, Arc<DomainVerifier>) {
        let verifier = Arc::new(DomainVerifier {
            seen: Mutex::new(Vec::new()),
        });
        let runner = JobRunner::new(
            Arc::new(config),
            Arc::new(InMemoryJobStore::new()),
            verifier.clone(),
            Arc::new(StubFinder),
        );
        (runner, verifier)
    }

    fn fast_config() -> Config {
        ConfigBuilder::new()
            .verify_row_delay(Duration::ZERO)
            .find_row_delay(Duration::ZERO)
            .build()
            .unwrap()
    }

    fn rows(pairs: &[&[(&str, &str)]]) -> Vec<InputRow> {
        pairs
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }

    async fn wait_terminal(runner: &JobRunner, job_id: &str) -> JobProgress {
        for _ in 0..500 {
            let progress = runner.progress(job_id).unwrap();
            if progress.status.is_terminal() {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    #[tokio::test]
    async fn test_verify_job_records_every_row() {
        let (runner, verifier) = runner_with(fast_config());
        let receipt = runner
            .submit(
                JobKind::Verify,
                rows(&[
                    &[(" Email ", "a@ok.test"), ("name", "A")],
                    &[(" Email ", "  "), ("name", "B")],
                    &[(" Email ", "c@bad.test"), ("name", "C")],
                ]),
                Some("leads.csv".into()),
            )
            .unwrap();
        assert_eq!(receipt.total_rows, 3);

        let progress = wait_terminal(&runner, &receipt.job_id).await;
        assert_eq!(progress.status, JobStatus::Completed);
        assert_eq!(progress.progress, 100);
        assert_eq!(progress.log, "Completed verification of 3 emails");

        let all = runner.results(&receipt.job_id, ResultFilter::All).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].get("reason"), Some("empty_email"));
        assert_eq!(all[1].get("name"), Some("B"));
        assert_eq!(*verifier.seen.lock(), vec!["a@ok.test", "c@bad.test"]);

        let invalid = runner.results(&receipt.job_id, ResultFilter::Invalid).unwrap();
        let names: Vec<_> = invalid.iter().filter_map(|r| r.get("name")).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_duplicate_rows_are_processed_independently() {
        let (runner, verifier) = runner_with(fast_config());
        let receipt = runner
            .submit(
                JobKind::Verify,
                rows(&[&[("email", "dup@ok.test")], &[("email", "dup@ok.test")]]),
                None,
            )
            .unwrap();
        wait_terminal(&runner, &receipt.job_id).await;

        let all = runner.results(&receipt.job_id, ResultFilter::All).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.get("email") == Some("dup@ok.test")));
        assert_eq!(verifier.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_find_job_rows() {
        let (runner, _) = runner_with(fast_config());
        let receipt = runner
            .submit(
                JobKind::Find,
                rows(&[
                    &[("FirstName", "Ana"), ("LastName", "Lee"), ("Domain", "ok.test")],
                    &[("FirstName", "Bo"), ("LastName", ""), ("Domain", "ok.test")],
                    &[("FirstName", "Cy"), ("LastName", "Ng"), ("Domain", "none.test")],
                ]),
                None,
            )
            .unwrap();
        let progress = wait_terminal(&runner, &receipt.job_id).await;
        assert_eq!(progress.log, "Completed finding emails for 3 records");

        let all = runner.results(&receipt.job_id, ResultFilter::All).unwrap();
        assert_eq!(all[0].get("found_email"), Some("ana.lee@ok.test"));
        assert_eq!(all[0].get("status"), Some("found"));
        assert_eq!(all[0].get("reason"), Some("found_pattern_smtp_ok"));
        assert_eq!(all[1].get("reason"), Some("missing_data"));
        assert_eq!(all[2].get("found_email"), Some("Not Found"));
        assert_eq!(all[2].get("status"), Some("not_found"));

        let found = runner.results(&receipt.job_id, ResultFilter::Found).unwrap();
        assert_eq!(found.len(), 1);
        // verify-only filters fall back to every row on a find job
        assert_eq!(runner.results(&receipt.job_id, ResultFilter::Valid).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_submission_validation() {
        let (runner, _) = runner_with(fast_config());

        let too_many: Vec<InputRow> = (0..1001)
            .map(|i| InputRow::from([("email".to_string(), format!("u{}@ok.test", i))]))
            .collect();
        assert!(matches!(
            runner.submit(JobKind::Verify, too_many, None),
            Err(AppError::TooManyRows { count: 1001, max: 1000 })
        ));

        let err = runner
            .submit(JobKind::Find, rows(&[&[("firstname", "A"), ("domain", "d")]]), None)
            .unwrap_err();
        assert!(matches!(err, AppError::MissingColumns(cols) if cols == vec!["lastname"]));

        assert!(matches!(
            runner.submit(JobKind::Verify, Vec::new(), None),
            Err(AppError::EmptySubmission)
        ));
    }

    #[tokio::test]
    async fn test_results_conditions() {
        let (runner, _) = runner_with(fast_config());
        assert!(matches!(runner.progress("nope"), Err(AppError::JobNotFound(_))));

        let receipt = runner
            .submit(JobKind::Verify, rows(&[&[("email", "x@bad.test")]]), None)
            .unwrap();
        wait_terminal(&runner, &receipt.job_id).await;
        assert!(matches!(
            runner.results(&receipt.job_id, ResultFilter::Valid),
            Err(AppError::NoMatchingRows)
        ));
        let rows = runner
            .results_where(&receipt.job_id, |row| row.get("email") == Some("x@bad.test"))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_results_require_completion() {
        let config = ConfigBuilder::new()
            .verify_row_delay(Duration::from_secs(30))
            .build()
            .unwrap();
        let (runner, _) = runner_with(config);
        let receipt = runner
            .submit(
                JobKind::Verify,
                rows(&[&[("email", "a@ok.test")], &[("email", "b@ok.test")]]),
                None,
            )
            .unwrap();
        assert!(matches!(
            runner.results(&receipt.job_id, ResultFilter::All),
            Err(AppError::JobNotCompleted(_))
        ));
    }

    #[tokio::test]
    async fn test_panic_marks_job_error_and_keeps_rows() {
        let (runner, _) = runner_with(fast_config());
        let receipt = runner
            .submit(
                JobKind::Verify,
                rows(&[
                    &[("email", "a@ok.test")],
                    &[("email", "b@panic.test")],
                    &[("email", "c@ok.test")],
                ]),
                None,
            )
            .unwrap();
        let progress = wait_terminal(&runner, &receipt.job_id).await;
        assert_eq!(progress.status, JobStatus::Error);
        assert!(progress.log.starts_with("Error: "));

        let job = runner.job(&receipt.job_id).unwrap();
        assert_eq!(job.results.len(), 1);
        assert_eq!(job.current_row, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_jobs() {
        let config = ConfigBuilder::new()
            .verify_row_delay(Duration::ZERO)
            .job_retention(Duration::ZERO)
            .build()
            .unwrap();
        let (runner, _) = runner_with(config);
        let receipt = runner
            .submit(JobKind::Verify, rows(&[&[("email", "a@ok.test")]]), None)
            .unwrap();
        wait_terminal(&runner, &receipt.job_id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(runner.purge_expired(), 1);
        assert!(matches!(
            runner.progress(&receipt.job_id),
            Err(AppError::JobNotFound(_))
        ));
    }
}
