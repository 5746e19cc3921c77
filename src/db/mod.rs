// Issuance log. Records are append-only: re-issuing a certificate adds a new row
// even though the stored PDF is overwritten in place.
use async_trait::async_trait;
use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::certificate::IssuanceRecord;
use crate::config::Config;

pub type DbPool = Arc<PgPool>;

#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error("log service responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("log request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append(&self, record: &IssuanceRecord) -> Result<(), LogSinkError>;

    /// Every record, oldest first.
    async fn list(&self) -> Result<Vec<IssuanceRecord>, LogSinkError>;
}

/// Log table exposed through a REST endpoint (`POST` to insert, `GET` to list).
pub struct RestLogSink {
    client: Client,
    url: String,
    key: String,
}

impl RestLogSink {
    pub fn new(config: &Config) -> Result<Self, LogSinkError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            url: config.log_url(),
            key: config.storage_key.clone(),
        })
    }
}

#[async_trait]
impl LogSink for RestLogSink {
    async fn append(&self, record: &IssuanceRecord) -> Result<(), LogSinkError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.key)
            .header("prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LogSinkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<IssuanceRecord>, LogSinkError> {
        let response = self.client.get(&self.url).bearer_auth(&self.key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LogSinkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

pub struct PgLogSink {
    pool: DbPool,
}

impl PgLogSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogSink for PgLogSink {
    async fn append(&self, record: &IssuanceRecord) -> Result<(), LogSinkError> {
        sqlx::query(
            r#"
            INSERT INTO certificates (iatc_id, name, issue_date, cert_type, cert_url)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.external_id)
        .bind(&record.recipient_name)
        .bind(record.issue_date)
        .bind(&record.cert_type)
        .bind(&record.cert_url)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<IssuanceRecord>, LogSinkError> {
        let rows = sqlx::query_as::<_, IssuanceRecord>(
            "SELECT iatc_id, name, issue_date, cert_type, cert_url FROM certificates ORDER BY id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }
}

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
