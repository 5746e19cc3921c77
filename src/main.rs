use std::sync::Arc;

use certmint::config::Config;
use certmint::db::{self, LogSink, PgLogSink, RestLogSink};
use certmint::issuance::Issuer;
use certmint::state::AppState;
use certmint::storage::{DirTemplateStore, HttpStorage, TemplateStore};
use certmint::{routes, templates};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certmint=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let storage = Arc::new(HttpStorage::new(&config)?);
    let template_store: Arc<dyn TemplateStore> = match &config.template_dir {
        Some(dir) => {
            tracing::info!("Reading templates from {}", dir.display());
            Arc::new(DirTemplateStore::new(dir.clone()))
        }
        None => storage.clone(),
    };

    let log: Arc<dyn LogSink> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(pool.as_ref()).await?;
            tracing::info!("Logging issuance to Postgres");
            Arc::new(PgLogSink::new(pool))
        }
        None => Arc::new(RestLogSink::new(&config)?),
    };

    let issuer = Arc::new(Issuer::new(
        config.clone(),
        template_store,
        storage,
        log.clone(),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        issuer,
        log,
        tera: Arc::new(templates::load()?),
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certificate service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
