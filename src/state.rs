use crate::config::Config;
use crate::db::LogSink;
use crate::issuance::Issuer;
use std::sync::Arc;
use tera::Tera;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub issuer: Arc<Issuer>,
    pub log: Arc<dyn LogSink>,
    pub tera: Arc<Tera>,
}
