//! In-process stand-in for the storage bucket and the REST log table.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use certmint::config::Config;
use certmint::db::{LogSink, RestLogSink};
use certmint::issuance::Issuer;
use certmint::state::AppState;
use certmint::storage::HttpStorage;

pub const STORAGE_KEY: &str = "service-key";
pub const PASSWORD: &str = "let-me-in";

#[derive(Default)]
pub struct Remote {
    pub templates: Mutex<HashMap<String, Vec<u8>>>,
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub log: Mutex<Vec<Value>>,
    /// File names whose upload is refused.
    pub refuse: Mutex<Vec<String>>,
    pub log_down: Mutex<bool>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {STORAGE_KEY}"))
}

async fn get_template(
    State(remote): State<Arc<Remote>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match remote.templates.lock().unwrap().get(&id) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_object(
    State(remote): State<Arc<Remote>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if headers.get("content-type").and_then(|v| v.to_str().ok()) != Some("application/pdf") {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE;
    }
    if remote.refuse.lock().unwrap().contains(&name) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    remote.objects.lock().unwrap().insert(name, body.to_vec());
    StatusCode::OK
}

async fn get_object(
    State(remote): State<Arc<Remote>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match remote.objects.lock().unwrap().get(&name) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn insert_record(
    State(remote): State<Arc<Remote>>,
    headers: HeaderMap,
    Json(record): Json<Value>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if *remote.log_down.lock().unwrap() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    remote.log.lock().unwrap().push(record);
    StatusCode::CREATED
}

async fn list_records(State(remote): State<Arc<Remote>>) -> Json<Vec<Value>> {
    Json(remote.log.lock().unwrap().clone())
}

/// Starts the stub on an ephemeral port and returns its base URL.
pub async fn spawn_remote(remote: Arc<Remote>) -> String {
    let app = Router::new()
        .route("/storage/templates/:id", get(get_template))
        .route(
            "/storage/issued_certificates/:name",
            get(get_object).put(put_object),
        )
        .route("/rest/certificates", get(list_records).post(insert_record))
        .with_state(remote);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn template_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = b"BT /F1 24 Tf 100 500 Td (Certificate of Recognition) Tj ET\n".to_vec();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 842.into(), 595.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn config(base_url: &str) -> Config {
    let mut config = Config::for_base_url(base_url);
    config.storage_key = STORAGE_KEY.to_string();
    config.access_password = PASSWORD.to_string();
    config
}

pub fn issuer(config: &Arc<Config>) -> (Issuer, Arc<dyn LogSink>) {
    let storage = Arc::new(HttpStorage::new(config).unwrap());
    let log: Arc<dyn LogSink> = Arc::new(RestLogSink::new(config).unwrap());
    let issuer = Issuer::new(config.clone(), storage.clone(), storage, log.clone());
    (issuer, log)
}

pub fn app_state(config: Config) -> Arc<AppState> {
    let config = Arc::new(config);
    let (issuer, log) = issuer(&config);
    Arc::new(AppState {
        config,
        issuer: Arc::new(issuer),
        log,
        tera: Arc::new(certmint::templates::load().unwrap()),
    })
}

pub const BOUNDARY: &str = "certmint-test-boundary";

pub fn multipart_request(uri: &str, password: &str, cert_type: &str, csv: &str) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in [("password", password), ("cert_type", cert_type)] {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"rows.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{BOUNDARY}--\r\n"
    ));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
