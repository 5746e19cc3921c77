mod archive;

pub use archive::ArchiveBuilder;

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::certificate::{CertificateType, IssuanceRecord, IssuanceRequest, RecordRow};
use crate::config::Config;
use crate::db::LogSink;
use crate::error::IssueError;
use crate::pdf::CertificateRenderer;
use crate::storage::{Publisher, Resolver, TemplateStore};

/// Last step a failed row completed. A row that completes every step is
/// archived instead of reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    DateParsed,
    Rendered,
    Published,
    Logged,
}

#[derive(Debug)]
pub struct RowFailure {
    /// Zero-based position in the input.
    pub row: usize,
    pub external_id: String,
    pub stage: Stage,
    pub error: IssueError,
}

impl RowFailure {
    pub fn is_skipped(&self) -> bool {
        matches!(self.error, IssueError::DateParse { .. })
    }
}

/// A certificate that was published and archived but whose log append failed.
#[derive(Debug)]
pub struct RowWarning {
    pub row: usize,
    pub file_name: String,
    pub error: IssueError,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub certificate_type: CertificateType,
    pub archive: Vec<u8>,
    /// File names in the archive, in input order.
    pub archived: Vec<String>,
    pub records: Vec<IssuanceRecord>,
    pub failures: Vec<RowFailure>,
    pub warnings: Vec<RowWarning>,
}

impl BatchOutcome {
    pub fn skipped(&self) -> usize {
        self.failures.iter().filter(|f| f.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.failures.len() - self.skipped()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.batch_id.clone(),
            cert_type: self.certificate_type.label(),
            issued: self.archived.len(),
            skipped: self.skipped(),
            failed: self.failed(),
            records: self.records.clone(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureView {
                    row: f.row,
                    iatc_id: f.external_id.clone(),
                    stage: f.stage,
                    kind: f.error.kind(),
                    reason: f.error.to_string(),
                })
                .collect(),
            warnings: self
                .warnings
                .iter()
                .map(|w| WarningView {
                    row: w.row,
                    file_name: w.file_name.clone(),
                    reason: w.error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub cert_type: &'static str,
    pub issued: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: Vec<IssuanceRecord>,
    pub failures: Vec<FailureView>,
    pub warnings: Vec<WarningView>,
}

#[derive(Debug, Serialize)]
pub struct FailureView {
    pub row: usize,
    pub iatc_id: String,
    pub stage: Stage,
    pub kind: &'static str,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct WarningView {
    pub row: usize,
    pub file_name: String,
    pub reason: String,
}

/// A row that made it through publishing.
struct Issued {
    file_name: String,
    pdf: Vec<u8>,
    record: IssuanceRecord,
    log_error: Option<IssueError>,
}

/// Drives each row through parse, resolve, render, publish and log. Rows are
/// independent: a failed row is recorded and the batch moves on.
pub struct Issuer {
    config: Arc<Config>,
    renderer: CertificateRenderer,
    templates: Arc<dyn TemplateStore>,
    publisher: Arc<dyn Publisher>,
    log: Arc<dyn LogSink>,
}

impl Issuer {
    pub fn new(
        config: Arc<Config>,
        templates: Arc<dyn TemplateStore>,
        publisher: Arc<dyn Publisher>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let renderer = CertificateRenderer::new(config.layout.clone(), config.qr_enabled);
        Self {
            config,
            renderer,
            templates,
            publisher,
            log,
        }
    }

    pub async fn run(&self, rows: &[RecordRow], certificate_type: CertificateType) -> BatchOutcome {
        let batch_id = Uuid::new_v4().to_string();
        let span = info_span!("batch", batch_id = %batch_id, cert_type = %certificate_type);
        self.run_batch(batch_id, rows, certificate_type)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        batch_id: String,
        rows: &[RecordRow],
        certificate_type: CertificateType,
    ) -> BatchOutcome {
        info!("Issuing {} certificates", rows.len());

        let mut archive = ArchiveBuilder::new();
        let mut archived = Vec::new();
        let mut records = Vec::new();
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        let mut issued_names = HashSet::new();
        let mut template = None;

        for (index, row) in rows.iter().enumerate() {
            let span = debug_span!("row", index, external_id = %row.external_id);
            let outcome = self
                .issue_one(row, certificate_type, &mut template, &issued_names)
                .instrument(span)
                .await;

            let Issued {
                file_name,
                pdf,
                record,
                log_error,
            } = match outcome {
                Ok(issued) => issued,
                Err((stage, error)) => {
                    warn!("Row {} ({}) stopped after {:?}: {}", index, row.external_id, stage, error);
                    failures.push(RowFailure {
                        row: index,
                        external_id: row.external_id.clone(),
                        stage,
                        error,
                    });
                    continue;
                }
            };
            issued_names.insert(file_name.clone());

            let stage = match log_error {
                Some(error) => {
                    warn!("{} is published but has no log record: {}", file_name, error);
                    warnings.push(RowWarning {
                        row: index,
                        file_name: file_name.clone(),
                        error,
                    });
                    Stage::Published
                }
                None => {
                    records.push(record);
                    Stage::Logged
                }
            };

            if let Err(e) = archive.add(&file_name, &pdf) {
                warn!("Could not add {} to the archive: {}", file_name, e);
                failures.push(RowFailure {
                    row: index,
                    external_id: row.external_id.clone(),
                    stage,
                    error: IssueError::Archive {
                        file_name,
                        reason: e.to_string(),
                    },
                });
                continue;
            }
            debug!("{} complete", file_name);
            archived.push((index, row.external_id.clone(), file_name));
        }

        let archive = match archive.finish() {
            Ok(bytes) => bytes,
            Err(e) => {
                // Everything is already published; only the download is lost.
                warn!("Could not finalize the archive: {}", e);
                for (row, external_id, file_name) in archived.drain(..) {
                    failures.push(RowFailure {
                        row,
                        external_id,
                        stage: Stage::Logged,
                        error: IssueError::Archive {
                            file_name,
                            reason: e.to_string(),
                        },
                    });
                }
                Vec::new()
            }
        };

        let outcome = BatchOutcome {
            batch_id,
            certificate_type,
            archive,
            archived: archived.into_iter().map(|(_, _, file_name)| file_name).collect(),
            records,
            failures,
            warnings,
        };
        info!(
            "Batch done: {} issued, {} skipped, {} failed, {} without log record",
            outcome.archived.len(),
            outcome.skipped(),
            outcome.failed(),
            outcome.warnings.len()
        );
        outcome
    }

    async fn issue_one(
        &self,
        row: &RecordRow,
        certificate_type: CertificateType,
        template: &mut Option<Vec<u8>>,
        issued_names: &HashSet<String>,
    ) -> Result<Issued, (Stage, IssueError)> {
        let request = IssuanceRequest::from_row(row, certificate_type).map_err(|e| match e {
            IssueError::DateParse { .. } => (Stage::Pending, e),
            other => (Stage::DateParsed, other),
        })?;

        let resolved = Resolver::new(&self.config)
            .resolve(&request)
            .map_err(|e| (Stage::DateParsed, e))?;
        if issued_names.contains(&resolved.file_name) {
            return Err((
                Stage::DateParsed,
                IssueError::DuplicateInBatch {
                    file_name: resolved.file_name,
                },
            ));
        }

        let template_bytes = match template {
            Some(bytes) => bytes,
            None => {
                let bytes = self
                    .fetch_template(certificate_type)
                    .await
                    .map_err(|e| (Stage::DateParsed, e))?;
                template.insert(bytes)
            }
        };

        let pdf = self
            .renderer
            .render(template_bytes.as_slice(), &request, &resolved.certificate_url)
            .map_err(|e| (Stage::DateParsed, e))?;

        let publish_error = |reason: String| {
            (
                Stage::Rendered,
                IssueError::PublishFailed {
                    file_name: resolved.file_name.clone(),
                    reason,
                },
            )
        };
        let stored_url = tokio::time::timeout(
            self.config.http_timeout,
            self.publisher.put(&resolved.file_name, &pdf),
        )
        .await
        .map_err(|_| publish_error("timed out".to_string()))?
        .map_err(|e| publish_error(e.to_string()))?;
        if stored_url != resolved.certificate_url {
            debug!(
                "Publisher returned {} for {}; logging the resolved URL",
                stored_url, resolved.file_name
            );
        }

        let record = IssuanceRecord::new(&request, &resolved.certificate_url);
        let log_error = match tokio::time::timeout(self.config.http_timeout, self.log.append(&record)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("timed out".to_string()),
        }
        .map(|reason| IssueError::LogAppendFailed {
            file_name: resolved.file_name.clone(),
            reason,
        });

        Ok(Issued {
            file_name: resolved.file_name,
            pdf,
            record,
            log_error,
        })
    }

    async fn fetch_template(&self, certificate_type: CertificateType) -> Result<Vec<u8>, IssueError> {
        let not_found = |reason: String| IssueError::TemplateNotFound {
            cert_type: certificate_type.to_string(),
            reason,
        };
        let template_id = self
            .config
            .template_id(certificate_type)
            .ok_or_else(|| not_found("no template mapped for this type".to_string()))?;

        let bytes = tokio::time::timeout(self.config.http_timeout, self.templates.fetch(template_id))
            .await
            .map_err(|_| not_found("timed out".to_string()))?
            .map_err(|e| not_found(e.to_string()))?;
        info!("Loaded template {} ({} bytes)", template_id, bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LogSinkError;
    use crate::pdf::tests::blank_template;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::{Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStorage {
        template: Option<Vec<u8>>,
        fetches: AtomicUsize,
        objects: Mutex<HashMap<String, Vec<u8>>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl TemplateStore for MemoryStorage {
        async fn fetch(&self, template_id: &str) -> Result<Vec<u8>, StorageError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.template
                .clone()
                .ok_or_else(|| StorageError::NotFound(template_id.to_string()))
        }
    }

    #[async_trait]
    impl Publisher for MemoryStorage {
        async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
            if self.reject.iter().any(|r| r == file_name) {
                return Err(StorageError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.objects
                .lock()
                .unwrap()
                .insert(file_name.to_string(), bytes.to_vec());
            Ok(format!("memory://{file_name}"))
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        records: Mutex<Vec<IssuanceRecord>>,
        broken: bool,
    }

    #[async_trait]
    impl LogSink for MemoryLog {
        async fn append(&self, record: &IssuanceRecord) -> Result<(), LogSinkError> {
            if self.broken {
                return Err(LogSinkError::Status {
                    status: 500,
                    body: "insert failed".to_string(),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<IssuanceRecord>, LogSinkError> {
            Ok(self.records.lock().unwrap().clone())
        }
    }

    /// Collaborator whose calls never complete.
    struct Stalled;

    #[async_trait]
    impl TemplateStore for Stalled {
        async fn fetch(&self, _template_id: &str) -> Result<Vec<u8>, StorageError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl Publisher for Stalled {
        async fn put(&self, _file_name: &str, _bytes: &[u8]) -> Result<String, StorageError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl LogSink for Stalled {
        async fn append(&self, _record: &IssuanceRecord) -> Result<(), LogSinkError> {
            std::future::pending().await
        }

        async fn list(&self) -> Result<Vec<IssuanceRecord>, LogSinkError> {
            std::future::pending().await
        }
    }

    fn config() -> Arc<Config> {
        Arc::new(Config::for_base_url("https://store.example.com"))
    }

    fn storage() -> MemoryStorage {
        MemoryStorage {
            template: Some(blank_template(842, 595)),
            ..Default::default()
        }
    }

    fn issuer(storage: &Arc<MemoryStorage>, log: &Arc<MemoryLog>) -> Issuer {
        Issuer::new(config(), storage.clone(), storage.clone(), log.clone())
    }

    fn archive_names(archive: &[u8]) -> Vec<String> {
        let reader = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
        reader.file_names().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn single_row_is_published_logged_and_archived() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![RecordRow::new("A1", "Jane Doe", "01/03/2024")];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert!(outcome.failures.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(archive_names(&outcome.archive), vec!["A1_001_2024-03-01.pdf"]);
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.issue_date.to_string(), "2024-03-01");
        assert_eq!(record.cert_type, "Employee of the Month");
        assert_eq!(
            record.cert_url,
            "https://store.example.com/storage/issued_certificates/A1_001_2024-03-01.pdf"
        );
        assert_eq!(log.list().await.unwrap(), outcome.records);

        // The archived bytes are exactly what was published.
        let mut reader = zip::ZipArchive::new(Cursor::new(outcome.archive.clone())).unwrap();
        let mut archived = Vec::new();
        reader
            .by_name("A1_001_2024-03-01.pdf")
            .unwrap()
            .read_to_end(&mut archived)
            .unwrap();
        let objects = storage.objects.lock().unwrap();
        assert_eq!(objects.get("A1_001_2024-03-01.pdf"), Some(&archived));
    }

    #[tokio::test]
    async fn unparseable_date_is_skipped_not_fatal() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "31-02-2024"),
            RecordRow::new("A2", "John Roe", "02/03/2024"),
        ];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::StudentOfTheMonth)
            .await;

        assert_eq!(outcome.skipped(), 1);
        assert_eq!(outcome.failed(), 0);
        assert_eq!(outcome.failures[0].external_id, "A1");
        assert_eq!(outcome.failures[0].stage, Stage::Pending);
        assert!(outcome.records.iter().all(|r| r.external_id != "A1"));
        assert_eq!(archive_names(&outcome.archive), vec!["A2_002_2024-03-02.pdf"]);
    }

    #[tokio::test]
    async fn publish_failure_is_isolated_to_its_row() {
        let storage = Arc::new(MemoryStorage {
            reject: vec!["A1_001_2024-03-01.pdf".to_string()],
            ..storage()
        });
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("A2", "John Roe", "01/03/2024"),
        ];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert_eq!(outcome.failures.len(), 1);
        let failure = &outcome.failures[0];
        assert_eq!(failure.stage, Stage::Rendered);
        assert!(matches!(failure.error, IssueError::PublishFailed { .. }));

        assert_eq!(archive_names(&outcome.archive), vec!["A2_001_2024-03-01.pdf"]);
        let logged = log.list().await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].external_id, "A2");
    }

    #[tokio::test]
    async fn log_failure_keeps_the_certificate_and_warns() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog {
            broken: true,
            ..Default::default()
        });
        let rows = vec![RecordRow::new("A1", "Jane Doe", "01/03/2024")];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert!(outcome.failures.is_empty());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(outcome.warnings[0].error, IssueError::LogAppendFailed { .. }));
        assert_eq!(archive_names(&outcome.archive), vec!["A1_001_2024-03-01.pdf"]);
        assert!(storage.objects.lock().unwrap().contains_key("A1_001_2024-03-01.pdf"));
    }

    #[tokio::test]
    async fn every_row_is_accounted_for_once() {
        let storage = Arc::new(MemoryStorage {
            reject: vec!["C3_001_2024-01-05.pdf".to_string()],
            ..storage()
        });
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("../A1", "Mallory", "01/03/2024"),
            RecordRow::new("B2", "", "01/03/2024"),
            RecordRow::new("C3", "Carl", "05/01/2024"),
            RecordRow::new("D4", "Dana", "not a date"),
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("E5", "Erin", "28/02/2024"),
        ];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        let archived = archive_names(&outcome.archive);
        assert_eq!(archived.len() + outcome.failures.len(), rows.len());
        assert_eq!(archived, outcome.archived);
        assert_eq!(archived, vec!["A1_001_2024-03-01.pdf", "E5_001_2024-02-28.pdf"]);

        let kinds: Vec<_> = outcome.failures.iter().map(|f| (f.row, f.error.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (1, "invalid_external_id"),
                (2, "missing_field"),
                (3, "publish_failed"),
                (4, "date_parse"),
                (5, "duplicate_in_batch"),
            ]
        );
        assert_eq!(outcome.skipped(), 1);
        assert_eq!(outcome.failed(), 4);
    }

    #[tokio::test]
    async fn template_is_fetched_once_per_batch() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("A2", "John Roe", "01/03/2024"),
            RecordRow::new("A3", "Jim Poe", "01/03/2024"),
        ];

        issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert_eq!(storage.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_template_fails_each_row_and_is_retried() {
        let storage = Arc::new(MemoryStorage::default());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("A2", "John Roe", "01/03/2024"),
        ];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome
            .failures
            .iter()
            .all(|f| matches!(f.error, IssueError::TemplateNotFound { .. })));
        assert_eq!(storage.fetches.load(Ordering::SeqCst), 2);
        assert!(outcome.archived.is_empty());
        assert!(log.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_publish_times_out_and_fails_the_row() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let issuer = Issuer::new(config(), storage.clone(), Arc::new(Stalled), log.clone());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("A2", "John Roe", "01/03/2024"),
        ];

        let outcome = issuer.run(&rows, CertificateType::EmployeeOfTheMonth).await;

        assert_eq!(outcome.failures.len(), 2);
        for failure in &outcome.failures {
            assert_eq!(failure.stage, Stage::Rendered);
            assert!(
                matches!(&failure.error, IssueError::PublishFailed { reason, .. } if reason == "timed out"),
                "{:?}",
                failure.error
            );
        }
        assert!(outcome.archived.is_empty());
        assert!(log.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_log_append_times_out_into_a_warning() {
        let storage = Arc::new(storage());
        let issuer = Issuer::new(config(), storage.clone(), storage.clone(), Arc::new(Stalled));
        let rows = vec![RecordRow::new("A1", "Jane Doe", "01/03/2024")];

        let outcome = issuer.run(&rows, CertificateType::EmployeeOfTheMonth).await;

        assert!(outcome.failures.is_empty());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            &outcome.warnings[0].error,
            IssueError::LogAppendFailed { reason, .. } if reason == "timed out"
        ));
        assert_eq!(archive_names(&outcome.archive), vec!["A1_001_2024-03-01.pdf"]);
        assert!(storage.objects.lock().unwrap().contains_key("A1_001_2024-03-01.pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_template_fetch_times_out() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let issuer = Issuer::new(config(), Arc::new(Stalled), storage.clone(), log.clone());
        let rows = vec![RecordRow::new("A1", "Jane Doe", "01/03/2024")];

        let outcome = issuer.run(&rows, CertificateType::EmployeeOfTheMonth).await;

        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            &outcome.failures[0].error,
            IssueError::TemplateNotFound { reason, .. } if reason == "timed out"
        ));
        assert!(storage.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_name_after_a_good_date_is_failed_not_skipped() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "", "01/03/2024"),
            RecordRow::new("A2", "", "31-02-2024"),
        ];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.skipped(), 1);
        assert_eq!(outcome.failures[0].stage, Stage::DateParsed);
        assert_eq!(outcome.failures[1].stage, Stage::Pending);
        assert!(outcome.failures[1].is_skipped());
    }

    #[tokio::test]
    async fn two_digit_year_is_skipped() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![RecordRow::new("A1", "Jane Doe", "01/03/24")];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;

        assert_eq!(outcome.skipped(), 1);
        assert!(outcome.archived.is_empty());
        assert!(storage.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_reports_counts_and_reasons() {
        let storage = Arc::new(storage());
        let log = Arc::new(MemoryLog::default());
        let rows = vec![
            RecordRow::new("A1", "Jane Doe", "01/03/2024"),
            RecordRow::new("A2", "John Roe", "32/01/2024"),
        ];

        let outcome = issuer(&storage, &log)
            .run(&rows, CertificateType::EmployeeOfTheMonth)
            .await;
        let summary = serde_json::to_value(outcome.summary()).unwrap();

        assert_eq!(summary["issued"], 1);
        assert_eq!(summary["skipped"], 1);
        assert_eq!(summary["failed"], 0);
        assert_eq!(summary["failures"][0]["kind"], "date_parse");
        assert_eq!(summary["failures"][0]["stage"], "pending");
        assert_eq!(summary["records"][0]["iatc_id"], "A1");
    }
}
