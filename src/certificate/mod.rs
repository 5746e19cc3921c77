use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::IssueError;

/// Textual date format used by the record source.
pub const INPUT_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateType {
    #[serde(rename = "Employee of the Month")]
    EmployeeOfTheMonth,
    #[serde(rename = "Student of the Month")]
    StudentOfTheMonth,
}

impl CertificateType {
    pub const ALL: [CertificateType; 2] = [
        CertificateType::EmployeeOfTheMonth,
        CertificateType::StudentOfTheMonth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CertificateType::EmployeeOfTheMonth => "Employee of the Month",
            CertificateType::StudentOfTheMonth => "Student of the Month",
        }
    }

    /// Environment variable that overrides this type's template id.
    pub fn env_key(self) -> &'static str {
        match self {
            CertificateType::EmployeeOfTheMonth => "TEMPLATE_EMPLOYEE_OF_THE_MONTH",
            CertificateType::StudentOfTheMonth => "TEMPLATE_STUDENT_OF_THE_MONTH",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown certificate type {0:?}")]
pub struct UnknownCertificateType(pub String);

impl FromStr for CertificateType {
    type Err = UnknownCertificateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CertificateType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCertificateType(wanted.to_string()))
    }
}

/// One row as it arrives from the record source, before any validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordRow {
    #[serde(rename = "iatc_id")]
    pub external_id: String,
    #[serde(rename = "name")]
    pub recipient_name: String,
    pub issue_date: String,
}

impl RecordRow {
    pub fn new(external_id: &str, recipient_name: &str, issue_date: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            recipient_name: recipient_name.to_string(),
            issue_date: issue_date.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    pub external_id: String,
    pub recipient_name: String,
    pub issue_date: NaiveDate,
    pub certificate_type: CertificateType,
}

impl IssuanceRequest {
    /// The date is checked first so an unreadable date always skips the row,
    /// whatever else is wrong with it.
    pub fn from_row(row: &RecordRow, certificate_type: CertificateType) -> Result<Self, IssueError> {
        let issue_date = parse_issue_date(&row.issue_date)?;

        let external_id = row.external_id.trim();
        if external_id.is_empty() {
            return Err(IssueError::MissingField("iatc_id"));
        }
        let recipient_name = row.recipient_name.trim();
        if recipient_name.is_empty() {
            return Err(IssueError::MissingField("name"));
        }

        Ok(Self {
            external_id: external_id.to_string(),
            recipient_name: recipient_name.to_string(),
            issue_date,
            certificate_type,
        })
    }

    /// `"{name} ({externalId})"`, the line printed under the certificate title.
    pub fn display_line(&self) -> String {
        format!("{} ({})", self.recipient_name, self.external_id)
    }

    pub fn iso_date(&self) -> String {
        self.issue_date.format("%Y-%m-%d").to_string()
    }
}

static DATE_SHAPE: OnceLock<Regex> = OnceLock::new();

fn date_shape() -> &'static Regex {
    DATE_SHAPE.get_or_init(|| Regex::new(r"^[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}$").expect("static regex"))
}

/// Parses `DD/MM/YYYY`. chrono's `%Y` takes any number of digits, so the
/// shape is checked first: `01/03/24` is not year 24.
pub fn parse_issue_date(value: &str) -> Result<NaiveDate, IssueError> {
    let fail = || IssueError::DateParse {
        value: value.to_string(),
    };
    let trimmed = value.trim();
    if !date_shape().is_match(trimmed) {
        return Err(fail());
    }
    NaiveDate::parse_from_str(trimmed, INPUT_DATE_FORMAT).map_err(|_| fail())
}

/// Persisted log entry; field names on the wire match the log table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssuanceRecord {
    #[serde(rename = "iatc_id")]
    #[sqlx(rename = "iatc_id")]
    pub external_id: String,
    #[serde(rename = "name")]
    #[sqlx(rename = "name")]
    pub recipient_name: String,
    pub issue_date: NaiveDate,
    pub cert_type: String,
    pub cert_url: String,
}

impl IssuanceRecord {
    pub fn new(request: &IssuanceRequest, cert_url: &str) -> Self {
        Self {
            external_id: request.external_id.clone(),
            recipient_name: request.recipient_name.clone(),
            issue_date: request.issue_date,
            cert_type: request.certificate_type.label().to_string(),
            cert_url: cert_url.to_string(),
        }
    }

    /// Case-insensitive substring match on id, name, type and ISO date. A
    /// blank query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            self.external_id.to_lowercase(),
            self.recipient_name.to_lowercase(),
            self.cert_type.to_lowercase(),
            self.issue_date.format("%Y-%m-%d").to_string(),
        ]
        .iter()
        .any(|field| field.contains(&needle))
    }
}
