use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::certificate::CertificateType;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Where overlay elements land on the template page. Offsets are in PDF points;
/// text baselines are measured from the top edge of the page.
#[derive(Debug, Clone)]
pub struct OverlayLayout {
    pub font_size: f32,
    pub name_baseline: f32,
    pub date_baseline: f32,
    pub qr_box: QrBox,
    /// Raster pixels per QR module.
    pub qr_module_px: u32,
}

/// QR placement in page space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QrBox {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            font_size: 40.0,
            name_baseline: 300.0,
            date_baseline: 350.0,
            qr_box: QrBox {
                x: 40.0,
                y: 40.0,
                size: 100.0,
            },
            qr_module_px: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub storage_key: String,
    pub access_password: String,
    pub templates_prefix: String,
    pub issued_prefix: String,
    pub log_table_path: String,
    pub template_map: HashMap<CertificateType, String>,
    pub template_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub http_timeout: Duration,
    pub qr_enabled: bool,
    pub layout: OverlayLayout,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let base_url = required("STORAGE_BASE_URL")?;
        let storage_key = required("STORAGE_KEY")?;
        let access_password = required("ACCESS_PASSWORD")?;

        let mut template_map = default_template_map();
        for cert_type in CertificateType::ALL {
            if let Ok(template_id) = std::env::var(cert_type.env_key()) {
                template_map.insert(cert_type, template_id);
            }
        }

        let http_timeout = Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 30)?);
        let qr_enabled = parsed("QR_ENABLED", true)?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parsed("PORT", 8501)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            storage_key,
            access_password,
            templates_prefix: path_var("TEMPLATES_PREFIX", "storage/templates"),
            issued_prefix: path_var("ISSUED_PREFIX", "storage/issued_certificates"),
            log_table_path: path_var("LOG_TABLE_PATH", "rest/certificates"),
            template_map,
            template_dir: std::env::var("TEMPLATE_DIR").ok().map(PathBuf::from),
            database_url: std::env::var("DATABASE_URL").ok(),
            http_timeout,
            qr_enabled,
            layout: OverlayLayout::default(),
            host,
            port,
        })
    }

    /// Config pointing at `base_url` with every other field at its default.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            storage_key: String::new(),
            access_password: String::new(),
            templates_prefix: "storage/templates".to_string(),
            issued_prefix: "storage/issued_certificates".to_string(),
            log_table_path: "rest/certificates".to_string(),
            template_map: default_template_map(),
            template_dir: None,
            database_url: None,
            http_timeout: Duration::from_secs(30),
            qr_enabled: true,
            layout: OverlayLayout::default(),
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }

    pub fn template_id(&self, cert_type: CertificateType) -> Option<&str> {
        self.template_map.get(&cert_type).map(String::as_str)
    }

    pub fn template_url(&self, template_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.templates_prefix, template_id)
    }

    pub fn issued_url(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.issued_prefix, file_name)
    }

    pub fn log_url(&self) -> String {
        format!("{}/{}", self.base_url, self.log_table_path)
    }
}

pub fn default_template_map() -> HashMap<CertificateType, String> {
    HashMap::from([
        (CertificateType::EmployeeOfTheMonth, "001.pdf".to_string()),
        (CertificateType::StudentOfTheMonth, "002.pdf".to_string()),
    ])
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn path_var(key: &str, default: &str) -> String {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim_matches('/')
        .to_string()
}
