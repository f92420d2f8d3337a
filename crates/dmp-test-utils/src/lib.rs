//! Testing utilities for the DMP ingestion workspace
//!
//! Shared fixtures: a seeded in-memory store, sample documents, a static
//! organization lookup, a lookup that holds callers at a barrier and a test
//! configuration.

#![allow(missing_docs)]

use async_trait::async_trait;
use dmp_ingest::{
    InMemoryStore, IngestConfig, LookupError, NoopLookup, OrgCandidate, OrgLookup, PlanResolver,
};
use dmp_model::{IdentifierScheme, SchemeContext, SchemeId, Template, TemplateId};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Barrier;

pub const ORCID: SchemeId = SchemeId(1);
pub const ROR: SchemeId = SchemeId(2);
pub const FUNDREF: SchemeId = SchemeId(3);
pub const GRANT: SchemeId = SchemeId(4);
pub const DOI: SchemeId = SchemeId(5);
pub const SHIBBOLETH: SchemeId = SchemeId(6);

pub const DEFAULT_TEMPLATE: TemplateId = TemplateId(1);
pub const FUNDER_TEMPLATE: TemplateId = TemplateId(2);

pub fn schemes() -> Vec<IdentifierScheme> {
    vec![
        IdentifierScheme::new(ORCID, "orcid")
            .with_landing_url("https://orcid.org/")
            .with_context(SchemeContext::FOR_CONTRIBUTORS.with(SchemeContext::FOR_USERS)),
        IdentifierScheme::new(ROR, "ror")
            .with_landing_url("https://ror.org/")
            .with_context(SchemeContext::FOR_ORGS),
        IdentifierScheme::new(FUNDREF, "fundref")
            .with_landing_url("https://doi.org/10.13039/")
            .with_context(SchemeContext::FOR_ORGS),
        IdentifierScheme::new(GRANT, "grant").with_context(SchemeContext::FOR_PLANS),
        IdentifierScheme::new(DOI, "doi")
            .with_landing_url("https://doi.org/")
            .with_context(SchemeContext::FOR_PLANS),
        IdentifierScheme::new(SHIBBOLETH, "shibboleth")
            .with_context(SchemeContext::FOR_AUTHENTICATION.with(SchemeContext::FOR_ORGS)),
    ]
}

pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    for scheme in schemes() {
        store.add_scheme(scheme);
    }
    store.add_template(Template::new(DEFAULT_TEMPLATE, "Generic DMP").as_default());
    store.add_template(Template::new(FUNDER_TEMPLATE, "Funder DMP"));
    Arc::new(store)
}

pub fn test_config() -> IngestConfig {
    IngestConfig::new()
        .with_lookup_timeout_ms(200)
        .with_lookup_cache(0, 1)
}

pub fn resolver(store: Arc<InMemoryStore>) -> PlanResolver {
    PlanResolver::new(store, Arc::new(NoopLookup), test_config())
}

pub fn resolver_with_lookup(store: Arc<InMemoryStore>, lookup: Arc<dyn OrgLookup>) -> PlanResolver {
    PlanResolver::new(store, lookup, test_config())
}

pub fn minimal_dmp() -> Value {
    json!({
        "title": "T",
        "contact": {"name": "A B", "mbox": "a@b.co"},
        "project": {"title": "P"}
    })
}

pub fn complete_dmp() -> Value {
    json!({
        "title": "Coastal Sediment Survey",
        "description": "Data management for a three year sediment survey",
        "language": "en",
        "ethical_issues_exist": "no",
        "dmp_id": {"type": "doi", "identifier": "https://doi.org/10.48321/D1ABC"},
        "contact": {
            "name": "Jane Doe",
            "mbox": "jane.doe@nowhere.edu",
            "contact_id": {"type": "orcid", "identifier": "https://orcid.org/0000-0002-1825-0097"},
            "affiliation": {
                "name": "University of Nowhere",
                "abbreviation": "UoN",
                "affiliation_id": {"type": "ror", "identifier": "https://ror.org/03yrm5c26"}
            }
        },
        "contributor": [
            {
                "name": "Sam Roe",
                "mbox": "sam.roe@nowhere.edu",
                "role": [
                    "https://dictionary.casrai.org/Contributor_Roles/Investigation",
                    "https://dictionary.casrai.org/Contributor_Roles/Software"
                ],
                "affiliation": {"name": "University of Nowhere"}
            }
        ],
        "project": [{
            "title": "Coastal Sediment Survey",
            "start": "2025-01-01",
            "end": "2027-12-31",
            "funding": [{
                "name": "National Science Agency",
                "funder_id": {"type": "fundref", "identifier": "https://doi.org/10.13039/100000001"},
                "grant_id": {"type": "grant", "identifier": "NSA-2025-0042"},
                "funding_status": "granted"
            }]
        }],
        "extended_attributes": {"dmproadmap": {"template_id": 2}}
    })
}

/// Lookup returning the same candidates for every term and recording terms
#[derive(Debug, Default)]
pub struct StaticLookup {
    candidates: Vec<OrgCandidate>,
    terms: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn new(candidates: Vec<OrgCandidate>) -> Self {
        Self {
            candidates,
            terms: Mutex::new(Vec::new()),
        }
    }

    pub fn terms(&self) -> Vec<String> {
        self.terms.lock().clone()
    }
}

#[async_trait]
impl OrgLookup for StaticLookup {
    async fn search(&self, term: &str) -> Result<Vec<OrgCandidate>, LookupError> {
        self.terms.lock().push(term.to_string());
        Ok(self.candidates.clone())
    }
}

/// Lookup that parks every search until `parties` searches are waiting
///
/// Lets concurrent submissions finish their reads before any of them commits.
#[derive(Debug)]
pub struct BarrierLookup {
    barrier: Barrier,
}

impl BarrierLookup {
    pub fn new(parties: usize) -> Self {
        Self {
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl OrgLookup for BarrierLookup {
    async fn search(&self, _term: &str) -> Result<Vec<OrgCandidate>, LookupError> {
        self.barrier.wait().await;
        Ok(Vec::new())
    }
}
