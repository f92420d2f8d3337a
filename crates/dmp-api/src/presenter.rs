//! Canonical JSON rendering of stored plans
//!
//! The rendered document is itself a valid submission: feeding it back
//! through the update contract finds the same plan through its own-namespace
//! id and resolves to the same entities.

use crate::response::format_time;
use dmp_ingest::{DmpStore, StoreError};
use dmp_model::{
    Contributor, EntityRef, Identifier, IdentifierScheme, OrgId, Organization, Plan,
    PlanContributor, SchemeId,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Scheme whose values never leave the system
const HIDDEN_SCHEME: &str = "shibboleth";

/// `{type, identifier}` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierView {
    /// Scheme name
    #[serde(rename = "type")]
    pub kind: String,
    /// Value with the landing URL applied
    pub identifier: String,
}

/// Rendered organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffiliationView {
    /// Organization name
    pub name: String,
    /// Short name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    /// ROR id when known, else the first visible identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation_id: Option<IdentifierView>,
}

/// Rendered plan contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactView {
    /// Display name
    pub name: String,
    /// Email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbox: Option<String>,
    /// Affiliated organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<AffiliationView>,
    /// First visible identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<IdentifierView>,
}

/// Rendered contributor, roles as ontology URIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorView {
    /// Display name
    pub name: String,
    /// Email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbox: Option<String>,
    /// Role ontology URIs
    pub role: Vec<String>,
    /// Affiliated organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<AffiliationView>,
    /// First visible identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor_id: Option<IdentifierView>,
}

/// Rendered funding entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingView {
    /// Funder name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Funder identifiers
    pub funder_ids: Vec<IdentifierView>,
    /// Grant identifiers
    pub grant_ids: Vec<IdentifierView>,
    /// `planned` or `granted`
    pub funding_status: String,
}

/// Rendered project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectView {
    /// Project title
    pub title: String,
    /// Project description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO start date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// ISO end date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Funding entries
    pub funding: Vec<FundingView>,
}

/// Rendered plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanView {
    /// Plan title
    pub title: String,
    /// Plan description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Language code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Last update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// `yes`, `no` or `unknown`
    pub ethical_issues_exist: String,
    /// Ethical issues description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethical_issues_description: Option<String>,
    /// Ethical issues report link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethical_issues_report: Option<String>,
    /// Own-namespace URL first, then the plan identifiers
    pub dmp_ids: Vec<IdentifierView>,
    /// Primary contact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactView>,
    /// Contributors other than the contact
    pub contributor: Vec<ContributorView>,
    /// Single project entry
    pub project: Vec<ProjectView>,
    /// `{<application>: {template_id}}`
    pub extended_attributes: Value,
}

/// Renders stored plans
pub struct PlanPresenter {
    store: Arc<dyn DmpStore>,
    application_name: String,
    plan_url_base: String,
    role_base_url: String,
}

impl PlanPresenter {
    /// Create a presenter reading related entities from `store`
    pub fn new(
        store: Arc<dyn DmpStore>,
        application_name: impl Into<String>,
        plan_url_base: impl Into<String>,
        role_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            application_name: application_name.into(),
            plan_url_base: plan_url_base.into(),
            role_base_url: role_base_url.into(),
        }
    }

    /// Public URL of a plan
    #[must_use]
    pub fn plan_url(&self, plan: &Plan) -> Option<String> {
        let id = plan.id?;
        let base = self.plan_url_base.trim_end_matches('/');
        Some(format!("{base}/{id}"))
    }

    /// Render one plan
    ///
    /// # Errors
    /// Propagates store failures while loading related entities
    pub async fn present(&self, plan: &Plan) -> Result<PlanView, StoreError> {
        let schemes = self.scheme_index().await?;
        self.render(plan, &schemes).await
    }

    /// Render several plans, loading the scheme registry once
    ///
    /// # Errors
    /// Propagates store failures while loading related entities
    pub async fn present_all(&self, plans: &[Plan]) -> Result<Vec<PlanView>, StoreError> {
        let schemes = self.scheme_index().await?;
        let mut views = Vec::with_capacity(plans.len());
        for plan in plans {
            views.push(self.render(plan, &schemes).await?);
        }
        Ok(views)
    }

    async fn scheme_index(&self) -> Result<HashMap<SchemeId, IdentifierScheme>, StoreError> {
        Ok(self
            .store
            .schemes()
            .await?
            .into_iter()
            .map(|scheme| (scheme.id, scheme))
            .collect())
    }

    async fn render(
        &self,
        plan: &Plan,
        schemes: &HashMap<SchemeId, IdentifierScheme>,
    ) -> Result<PlanView, StoreError> {
        let mut dmp_ids = Vec::with_capacity(plan.identifiers.len() + 1);
        if let Some(url) = self.plan_url(plan) {
            dmp_ids.push(IdentifierView {
                kind: self.application_name.clone(),
                identifier: url,
            });
        }
        dmp_ids.extend(visible(&plan.identifiers, schemes));

        let contact = match plan.contact() {
            Some(entry) => self.contact(entry, schemes).await?,
            None => None,
        };

        let mut contributor = Vec::new();
        for entry in plan.other_contributors() {
            if let Some(view) = self.contributor(entry, schemes).await? {
                contributor.push(view);
            }
        }

        let funding = self.funding(plan, schemes).await?;
        let project = ProjectView {
            title: plan.title.clone(),
            description: plan.description.clone(),
            start: plan.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            end: plan.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            funding: funding.into_iter().collect(),
        };

        Ok(PlanView {
            title: plan.title.clone(),
            description: plan.description.clone(),
            language: plan.language.clone(),
            created: plan.created_at.map(format_time),
            modified: plan.updated_at.map(format_time),
            ethical_issues_exist: plan.ethical_issues.as_answer().to_string(),
            ethical_issues_description: plan.ethical_issues_description.clone(),
            ethical_issues_report: plan.ethical_issues_report.clone(),
            dmp_ids,
            contact,
            contributor,
            project: vec![project],
            extended_attributes: self.extended_attributes(plan),
        })
    }

    fn extended_attributes(&self, plan: &Plan) -> Value {
        let mut attributes = Map::new();
        attributes.insert(
            self.application_name.clone(),
            json!({"template_id": plan.template_id.get()}),
        );
        Value::Object(attributes)
    }

    async fn contact(
        &self,
        entry: &PlanContributor,
        schemes: &HashMap<SchemeId, IdentifierScheme>,
    ) -> Result<Option<ContactView>, StoreError> {
        let Some(person) = self.load_contributor(entry).await? else {
            return Ok(None);
        };
        let view = ContactView {
            name: person.display_name(),
            mbox: person.email.clone(),
            affiliation: self.affiliation(person.org, schemes).await?,
            contact_id: visible(&person.identifiers, schemes).next(),
        };
        Ok(Some(view))
    }

    async fn contributor(
        &self,
        entry: &PlanContributor,
        schemes: &HashMap<SchemeId, IdentifierScheme>,
    ) -> Result<Option<ContributorView>, StoreError> {
        let Some(person) = self.load_contributor(entry).await? else {
            return Ok(None);
        };
        let view = ContributorView {
            name: person.display_name(),
            mbox: person.email.clone(),
            role: entry
                .roles
                .iter()
                .map(|role| role.as_uri(&self.role_base_url))
                .collect(),
            affiliation: self.affiliation(person.org, schemes).await?,
            contributor_id: visible(&person.identifiers, schemes).next(),
        };
        Ok(Some(view))
    }

    async fn funding(
        &self,
        plan: &Plan,
        schemes: &HashMap<SchemeId, IdentifierScheme>,
    ) -> Result<Option<FundingView>, StoreError> {
        let funder = match plan.funder.and_then(|r| r.stored()) {
            Some(id) => self.store.org_by_id(id).await?,
            None => None,
        };
        if funder.is_none() && plan.grant_ids.is_empty() {
            return Ok(None);
        }
        let view = FundingView {
            name: funder.as_ref().map(|org| org.name.clone()),
            funder_ids: funder
                .as_ref()
                .map(|org| visible(&org.identifiers, schemes).collect())
                .unwrap_or_default(),
            grant_ids: visible(&plan.grant_ids, schemes).collect(),
            funding_status: plan.funding_status().as_str().to_string(),
        };
        Ok(Some(view))
    }

    async fn affiliation(
        &self,
        org: Option<EntityRef<OrgId>>,
        schemes: &HashMap<SchemeId, IdentifierScheme>,
    ) -> Result<Option<AffiliationView>, StoreError> {
        let Some(id) = org.and_then(|r| r.stored()) else {
            return Ok(None);
        };
        Ok(self
            .store
            .org_by_id(id)
            .await?
            .map(|org| affiliation_view(&org, schemes)))
    }

    async fn load_contributor(&self, entry: &PlanContributor) -> Result<Option<Contributor>, StoreError> {
        match entry.contributor.stored() {
            Some(id) => self.store.contributor_by_id(id).await,
            None => Ok(None),
        }
    }
}

fn affiliation_view(org: &Organization, schemes: &HashMap<SchemeId, IdentifierScheme>) -> AffiliationView {
    let preferred = org
        .identifier_for("ror")
        .and_then(|ror| present_identifier(ror, schemes));
    AffiliationView {
        name: org.name.clone(),
        abbreviation: org.abbreviation.clone(),
        affiliation_id: preferred.or_else(|| visible(&org.identifiers, schemes).next()),
    }
}

fn visible<'a>(
    identifiers: &'a [Identifier],
    schemes: &'a HashMap<SchemeId, IdentifierScheme>,
) -> impl Iterator<Item = IdentifierView> + 'a {
    identifiers
        .iter()
        .filter_map(move |identifier| present_identifier(identifier, schemes))
}

/// Render one identifier; hidden schemes render as nothing
fn present_identifier(
    identifier: &Identifier,
    schemes: &HashMap<SchemeId, IdentifierScheme>,
) -> Option<IdentifierView> {
    if identifier.scheme_name.eq_ignore_ascii_case(HIDDEN_SCHEME) {
        return None;
    }
    let value = match schemes.get(&identifier.scheme_id) {
        Some(scheme) => scheme.landing_url_for(&identifier.value),
        None => identifier.value.clone(),
    };
    Some(IdentifierView {
        kind: identifier.scheme_name.clone(),
        identifier: value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmp_model::{IdentifierScheme, SchemeContext};

    fn schemes() -> HashMap<SchemeId, IdentifierScheme> {
        [
            IdentifierScheme::new(SchemeId(1), "orcid").with_landing_url("https://orcid.org/"),
            IdentifierScheme::new(SchemeId(2), "shibboleth").with_context(SchemeContext::FOR_ORGS),
            IdentifierScheme::new(SchemeId(3), "grant"),
        ]
        .into_iter()
        .map(|s| (s.id, s))
        .collect()
    }

    #[test]
    fn landing_url_is_reapplied() {
        let id = Identifier::new(SchemeId(1), "orcid", "0000-0002-1825-0097");
        let view = present_identifier(&id, &schemes()).unwrap();
        assert_eq!(view.kind, "orcid");
        assert_eq!(view.identifier, "https://orcid.org/0000-0002-1825-0097");
    }

    #[test]
    fn shibboleth_is_hidden() {
        let ids = vec![
            Identifier::new(SchemeId(2), "shibboleth", "urn:mace:nowhere.edu"),
            Identifier::new(SchemeId(3), "grant", "G-1"),
        ];
        let schemes = schemes();
        let views: Vec<_> = visible(&ids, &schemes).collect();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].identifier, "G-1");
    }

    #[test]
    fn affiliation_prefers_ror() {
        let mut org = Organization::new("University of Nowhere");
        org.identifiers = vec![
            Identifier::new(SchemeId(3), "grant", "G-1"),
            Identifier::new(SchemeId(9), "ror", "03yrm5c26"),
        ];
        let view = affiliation_view(&org, &schemes());
        assert_eq!(view.affiliation_id.unwrap().kind, "ror");
    }
}
