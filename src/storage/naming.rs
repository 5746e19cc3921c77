use regex::Regex;
use std::sync::OnceLock;

use crate::certificate::IssuanceRequest;
use crate::config::Config;
use crate::error::IssueError;

static SAFE_ID: OnceLock<Regex> = OnceLock::new();

fn safe_id() -> &'static Regex {
    SAFE_ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub file_name: String,
    pub certificate_url: String,
}

/// Derives the stored name and public URL of a certificate. Both depend only on
/// the request's id, type and date, so re-issuing a request targets the same object.
pub struct Resolver<'a> {
    config: &'a Config,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn resolve(&self, request: &IssuanceRequest) -> Result<ResolvedName, IssueError> {
        check_external_id(&request.external_id)?;

        let template_id = self
            .config
            .template_id(request.certificate_type)
            .ok_or_else(|| IssueError::TemplateNotFound {
                cert_type: request.certificate_type.to_string(),
                reason: "no template mapped for this type".to_string(),
            })?;
        let prefix: String = template_id.chars().take(3).collect();

        let file_name = format!("{}_{}_{}.pdf", request.external_id, prefix, request.iso_date());
        let certificate_url = self.config.issued_url(&file_name);

        Ok(ResolvedName {
            file_name,
            certificate_url,
        })
    }
}

/// Ids become part of an object key, so anything that could escape the
/// issued-certificates prefix is rejected rather than rewritten.
pub fn check_external_id(external_id: &str) -> Result<(), IssueError> {
    if external_id == "." || external_id == ".." || !safe_id().is_match(external_id) {
        return Err(IssueError::InvalidExternalId(external_id.to_string()));
    }
    Ok(())
}
