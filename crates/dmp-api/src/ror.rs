//! ROR-backed organization search
//!
//! Queries a ROR-style `?query=` endpoint and ranks the returned records
//! against the search term, best first.

use crate::config::RorConfig;
use async_trait::async_trait;
use dmp_ingest::{LookupError, OrgCandidate, OrgLookup};
use serde::Deserialize;
use tracing::debug;

/// Search response envelope
#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RorRecord>,
}

/// One organization record
#[derive(Debug, Clone, Default, Deserialize)]
struct RorRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    acronyms: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    external_ids: ExternalIds,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExternalIds {
    #[serde(rename = "FundRef", default)]
    fundref: Option<ExternalId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExternalId {
    #[serde(default)]
    preferred: Option<String>,
    #[serde(default)]
    all: Vec<String>,
}

impl ExternalId {
    fn value(&self) -> Option<&str> {
        self.preferred
            .as_deref()
            .or_else(|| self.all.first().map(String::as_str))
            .filter(|v| !v.trim().is_empty())
    }
}

/// HTTP organization lookup against ROR
pub struct RorLookup {
    base_url: String,
    http_client: reqwest::Client,
}

impl RorLookup {
    /// Create a lookup from settings
    #[must_use]
    pub fn new(config: &RorConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("dmp-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.base_url.clone(),
            http_client,
        }
    }
}

#[async_trait]
impl OrgLookup for RorLookup {
    async fn search(&self, term: &str) -> Result<Vec<OrgCandidate>, LookupError> {
        debug!(term = %term, url = %self.base_url, "querying ROR");
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("query", term)])
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Transport(format!("HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        Ok(rank(term, body.items))
    }
}

/// Decode a raw search body into ranked candidates
///
/// # Errors
/// Returns `LookupError::Decode` when the body is not a search response
pub fn decode(term: &str, body: &str) -> Result<Vec<OrgCandidate>, LookupError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;
    Ok(rank(term, response.items))
}

/// Weigh records against the term and sort them, keeping ties in order
///
/// 0: name starts with the term, 1: name contains it, 2: an acronym or
/// alias matches, 3: anything else the service returned.
fn rank(term: &str, records: Vec<RorRecord>) -> Vec<OrgCandidate> {
    let needle = term.trim().to_lowercase();
    let mut candidates: Vec<OrgCandidate> = records
        .into_iter()
        .filter(|record| !record.name.trim().is_empty())
        .map(|record| candidate(&needle, record))
        .collect();
    candidates.sort_by_key(|c| c.weight);
    candidates
}

fn candidate(needle: &str, record: RorRecord) -> OrgCandidate {
    let weight = weigh(needle, &record);
    let mut candidate = OrgCandidate::new(record.name.trim(), weight);
    if let Some(acronym) = record.acronyms.first() {
        candidate = candidate.with_abbreviation(acronym.clone());
    }
    if let Some(id) = record.id.as_deref().filter(|id| !id.trim().is_empty()) {
        candidate = candidate.with_identifier("ror", id);
    }
    if let Some(fundref) = record.external_ids.fundref.as_ref().and_then(ExternalId::value) {
        candidate = candidate.with_identifier("fundref", fundref);
    }
    candidate
}

fn weigh(needle: &str, record: &RorRecord) -> u32 {
    let name = record.name.trim().to_lowercase();
    if needle.is_empty() {
        return 3;
    }
    if name.starts_with(needle) {
        0
    } else if name.contains(needle) {
        1
    } else if record
        .acronyms
        .iter()
        .chain(&record.aliases)
        .any(|other| other.trim().eq_ignore_ascii_case(needle))
    {
        2
    } else {
        3
    }
}
