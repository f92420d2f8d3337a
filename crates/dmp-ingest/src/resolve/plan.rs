//! Plan resolution and commit
//!
//! One submission runs as a sequential unit of work:
//! validate, identify, guard, template, scalars, contact, contributors,
//! funder, grants, plan identifiers, owning org, commit. A commit rejected
//! by a uniqueness constraint is retried with a fresh pass, so whatever a
//! concurrent submission persisted in the meantime is found and merged.

use crate::config::IngestConfig;
use crate::dto::{parse_date, DmpInput, IdentifierInput};
use crate::error::{IngestError, IngestResult, ResolveError};
use crate::lookup::CachedLookup;
use crate::ports::{Changeset, CommitReceipt, DmpStore, OrgLookup};
use crate::resolve::contributor::ContributorResolver;
use crate::resolve::identifier::IdentifierResolver;
use crate::resolve::organization::OrganizationResolver;
use crate::resolve::role::RoleTranslator;
use crate::session::ResolutionSession;
use crate::validation::ValidationGate;
use chrono::Utc;
use dmp_model::{
    EntityRef, EthicalIssues, IdentifierOwner, OrgId, OwnerKind, Plan, PlanContributor, PlanId,
    RoleSet, TemplateId,
};
use serde_json::Value;
use std::sync::Arc;
use ulid::Ulid;

/// What the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Contract {
    /// Register a new plan
    #[default]
    Create,
    /// Change an existing plan
    Update,
}

/// Per-submission context supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestContext {
    /// Create or update
    pub contract: Contract,
    /// Fail when no owning organization can be determined
    pub require_organization: bool,
    /// Organization of the authenticated caller
    pub caller_org: Option<OrgId>,
    /// Plan an update is addressed to; only this plan may be changed
    pub target: Option<PlanId>,
}

impl IngestContext {
    /// Create contract
    #[must_use]
    pub fn create() -> Self {
        Self::default()
    }

    /// Update contract
    #[must_use]
    pub fn update() -> Self {
        Self {
            contract: Contract::Update,
            ..Self::default()
        }
    }

    /// Require an owning organization
    #[must_use]
    pub fn requiring_organization(mut self) -> Self {
        self.require_organization = true;
        self
    }

    /// With the caller's organization as fallback owner
    #[must_use]
    pub fn with_caller_org(mut self, org: Option<OrgId>) -> Self {
        self.caller_org = org;
        self
    }

    /// Pin the submission to one stored plan
    #[must_use]
    pub fn targeting(mut self, plan_id: PlanId) -> Self {
        self.target = Some(plan_id);
        self
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Persisted plan
    pub plan_id: PlanId,
    /// Whether the plan was inserted rather than updated
    pub created: bool,
    /// Everything the commit assigned
    pub receipt: CommitReceipt,
}

/// Turns a DMP document into a committed plan graph
#[derive(Clone)]
pub struct PlanResolver {
    store: Arc<dyn DmpStore>,
    config: IngestConfig,
    gate: ValidationGate,
    identifiers: IdentifierResolver,
    orgs: OrganizationResolver,
    contributors: ContributorResolver,
}

impl std::fmt::Debug for PlanResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlanResolver {
    /// Wire the resolvers over a store and an external lookup
    ///
    /// The lookup is wrapped in a TTL cache unless the configured capacity
    /// is zero.
    #[must_use]
    pub fn new(store: Arc<dyn DmpStore>, lookup: Arc<dyn OrgLookup>, config: IngestConfig) -> Self {
        let lookup: Arc<dyn OrgLookup> = if config.lookup_cache_capacity > 0 {
            Arc::new(CachedLookup::new(
                lookup,
                config.lookup_cache_capacity,
                config.lookup_cache_ttl(),
            ))
        } else {
            lookup
        };
        let orgs = OrganizationResolver::new(
            store.clone(),
            lookup,
            config.lookup_timeout(),
            config.default_language.clone(),
        );
        let contributors = ContributorResolver::new(
            store.clone(),
            orgs.clone(),
            RoleTranslator::new(config.role_ontology_base_url.clone()),
        );
        Self {
            identifiers: IdentifierResolver::new(store.clone()),
            store,
            config,
            gate: ValidationGate::new(),
            orgs,
            contributors,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DmpStore> {
        &self.store
    }

    /// Validate, resolve and commit one DMP document
    ///
    /// # Errors
    /// Any [`IngestError`]; nothing is persisted when an error is returned
    #[tracing::instrument(skip_all, fields(submission = %Ulid::new(), contract = ?ctx.contract))]
    pub async fn ingest(&self, dmp: &Value, ctx: &IngestContext) -> IngestResult<IngestOutcome> {
        let errors = self.gate.errors(dmp);
        if !errors.is_empty() {
            tracing::info!(errors = errors.len(), "submission rejected by validation");
            return Err(IngestError::Validation(errors));
        }
        let input = DmpInput::from_value(dmp.clone()).map_err(|err| IngestError::InvalidJson(err.to_string()))?;
        tracing::info!(title = input.title().unwrap_or_default(), "ingesting plan");

        let mut attempt = 0;
        loop {
            let changeset = self.resolve_pass(&input, ctx).await?;
            match self.store.commit(changeset).await {
                Ok(receipt) => {
                    let plan_id = receipt
                        .plan_id
                        .ok_or_else(|| IngestError::PersistenceFailed("commit returned no plan id".into()))?;
                    tracing::info!(plan_id = %plan_id, created = receipt.plan_created, "plan committed");
                    return Ok(IngestOutcome {
                        plan_id,
                        created: receipt.plan_created,
                        receipt,
                    });
                }
                Err(err) if err.is_conflict() && attempt < self.config.commit_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "commit conflict, resolving again");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "commit failed");
                    return Err(IngestError::PersistenceFailed(err.to_string()));
                }
            }
        }
    }

    /// One resolution pass over a fresh session
    async fn resolve_pass(&self, input: &DmpInput, ctx: &IngestContext) -> IngestResult<Changeset> {
        let mut session = ResolutionSession::new();

        let existing = self.identify(input, ctx).await?;
        self.guard(existing.as_ref(), input, ctx)?;
        let template_id = self.template(input, existing.as_ref()).await?;

        let title = input
            .title()
            .ok_or_else(|| IngestError::Validation(vec!["dmp:title is required".into()]))?;
        let mut plan = existing.unwrap_or_else(|| Plan::new(title, template_id));
        self.populate(&mut plan, input, title);

        // Contact
        let contact_input = input
            .contact
            .as_ref()
            .ok_or_else(|| IngestError::UnresolvableContact("no contact submitted".into()))?;
        let contact = self
            .contributors
            .resolve(&mut session, contact_input)
            .await
            .map_err(|err| match err {
                err @ ResolveError::InsufficientData(_) => IngestError::UnresolvableContact(err.to_string()),
                ResolveError::Store(store) => store.into(),
            })?;
        let forced: RoleSet = PlanContributor::CONTACT_ROLES.into_iter().collect();
        if let Some(person) = session.contributor_mut(contact.key) {
            person.roles.union_with(forced);
        }
        plan.attach(PlanContributor::contact(session.contributor_ref(contact.key), contact.roles));

        // Other contributors
        for (index, fragment) in input.contributors.iter().enumerate() {
            match self.contributors.resolve(&mut session, fragment).await {
                Ok(resolved) => plan.attach(PlanContributor::contributor(
                    session.contributor_ref(resolved.key),
                    resolved.roles,
                )),
                Err(ResolveError::Store(err)) => return Err(err.into()),
                Err(err) => tracing::warn!(index, error = %err, "skipping contributor"),
            }
        }

        // Funding
        if let Some(funding) = input.funding() {
            let funder = funding.funder();
            if funder.name.is_some() || !funder.affiliation_ids.is_empty() {
                match self.orgs.resolve(&mut session, &funder).await {
                    Ok(key) => plan.funder = Some(session.org_ref(key)),
                    Err(ResolveError::Store(err)) => return Err(err.into()),
                    Err(err) => tracing::debug!(error = %err, "funder not resolved"),
                }
            }
            let grants = self
                .identifiers
                .resolve_all(OwnerKind::Plan, &funding.grant_ids)
                .await?;
            let added = plan.consolidate_grant_ids(grants);
            tracing::debug!(added, "grant ids attached");
        }

        // Plan identifiers other than our own namespace
        let foreign: Vec<_> = input
            .dmp_id
            .iter()
            .filter(|id| !id.kind().is_some_and(|kind| self.is_own_namespace(kind)))
            .cloned()
            .collect();
        let ids = self.identifiers.resolve_all(OwnerKind::Plan, &foreign).await?;
        plan.consolidate_identifiers(ids);

        // Owning organization
        let contact_org = session.contributor(contact.key).and_then(|c| c.org);
        plan.org = contact_org
            .or(plan.org)
            .or(ctx.caller_org.map(EntityRef::Stored));
        if plan.org.is_none() && ctx.require_organization {
            return Err(IngestError::NoOrganizationDetermined);
        }

        tracing::debug!(
            orgs = session.org_count(),
            contributors = session.contributor_count(),
            new_plan = plan.is_new(),
            "resolution pass complete"
        );
        Ok(session.into_changeset(plan))
    }

    fn is_own_namespace(&self, kind: &str) -> bool {
        kind.trim().eq_ignore_ascii_case(&self.config.application_name)
    }

    /// Find the plan a submission refers to, if any
    ///
    /// A pinned submission only ever resolves to its target; any submitted
    /// identifier that points at another stored plan is rejected.
    async fn identify(&self, input: &DmpInput, ctx: &IngestContext) -> IngestResult<Option<Plan>> {
        if let Some(target) = ctx.target {
            let Some(plan) = self.store.plan_by_id(target).await? else {
                return Ok(None);
            };
            for id in &input.dmp_id {
                match self.referenced_plan(id).await? {
                    Some(found) if found != target => {
                        tracing::info!(plan_id = %target, found = %found, "submitted ids refer to another plan");
                        return Err(IngestError::PlanMismatch { target, found });
                    }
                    _ => {}
                }
            }
            return Ok(Some(plan));
        }

        for id in &input.dmp_id {
            if let Some(plan_id) = self.referenced_plan(id).await? {
                if let Some(plan) = self.store.plan_by_id(plan_id).await? {
                    return Ok(Some(plan));
                }
            }
        }
        Ok(None)
    }

    /// Stored plan a single submitted id points at
    async fn referenced_plan(&self, id: &IdentifierInput) -> IngestResult<Option<PlanId>> {
        let (Some(kind), Some(value)) = (id.kind(), id.value()) else {
            return Ok(None);
        };
        if self.is_own_namespace(kind) {
            let tail = value.trim_end_matches('/').rsplit('/').next().unwrap_or(value);
            let Ok(plan_id) = tail.parse::<PlanId>() else {
                return Ok(None);
            };
            if self.store.plan_by_id(plan_id).await?.is_none() {
                return Ok(None);
            }
            tracing::debug!(plan_id = %plan_id, "plan identified by own id");
            return Ok(Some(plan_id));
        }
        match self.identifiers.resolve(OwnerKind::Plan, id).await? {
            Some(identifier) => match identifier.owner {
                Some(IdentifierOwner::Plan(plan_id)) => {
                    tracing::debug!(plan_id = %plan_id, scheme = %identifier.scheme_name, "plan identified by identifier");
                    Ok(Some(plan_id))
                }
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn guard(&self, existing: Option<&Plan>, input: &DmpInput, ctx: &IngestContext) -> IngestResult<()> {
        match (ctx.contract, existing) {
            (Contract::Create, Some(plan)) => {
                let cutoff = Utc::now() - self.config.duplicate_grace();
                if plan.created_at.is_some_and(|created| created <= cutoff) {
                    return Err(IngestError::PlanAlreadyExists);
                }
                tracing::debug!(plan_id = ?plan.id, "fresh duplicate, updating in place");
                Ok(())
            }
            (Contract::Update, None) if ctx.target.is_some() => Err(IngestError::PlanNotFound(
                ctx.target.map(|id| id.to_string()).unwrap_or_default(),
            )),
            (Contract::Update, None) => {
                let submitted = input
                    .dmp_id
                    .iter()
                    .filter_map(|id| id.value())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(IngestError::PlanNotFound(submitted))
            }
            _ => Ok(()),
        }
    }

    /// Existing plans keep their template; new ones take the submitted or
    /// the default template
    async fn template(&self, input: &DmpInput, existing: Option<&Plan>) -> IngestResult<TemplateId> {
        if let Some(plan) = existing {
            return Ok(plan.template_id);
        }
        if let Some(id) = input.template_id(&self.config.application_name).map(TemplateId) {
            if self.store.template_exists(id).await? {
                return Ok(id);
            }
            tracing::warn!(template_id = %id, "submitted template not found, using the default");
        }
        self.store
            .default_template()
            .await?
            .map(|template| template.id)
            .ok_or(IngestError::NoTemplate)
    }

    fn populate(&self, plan: &mut Plan, input: &DmpInput, title: &str) {
        plan.title = title.to_string();
        if let Some(description) = input.description() {
            plan.description = Some(description.to_string());
        }
        match input.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(language) => plan.language = Some(language.to_string()),
            None if plan.language.is_none() => plan.language = Some(self.config.default_language.clone()),
            None => {}
        }
        if let Some(project) = input.project() {
            if let Some(start) = project.start.as_deref().and_then(parse_date) {
                plan.start_date = Some(start);
            }
            if let Some(end) = project.end.as_deref().and_then(parse_date) {
                plan.end_date = Some(end);
            }
        }
        if input.ethical_issues_exist.is_some() {
            plan.ethical_issues = EthicalIssues::from_answer(input.ethical_issues_exist.as_deref());
        }
        if let Some(description) = input.ethical_issues_description.as_deref().filter(|d| !d.trim().is_empty()) {
            plan.ethical_issues_description = Some(description.trim().to_string());
        }
        if let Some(report) = input.ethical_issues_report.as_deref().filter(|r| !r.trim().is_empty()) {
            plan.ethical_issues_report = Some(report.trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::InMemoryStore;
    use crate::ports::NoopLookup;
    use async_trait::async_trait;
    use dmp_model::{
        Contributor, ContributorId, ContributorRole, Identifier, IdentifierScheme, Organization,
        SchemeId, Template,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.add_scheme(IdentifierScheme::new(SchemeId(1), "orcid").with_landing_url("https://orcid.org/"));
        store.add_scheme(IdentifierScheme::new(SchemeId(2), "ror").with_landing_url("https://ror.org/"));
        store.add_scheme(IdentifierScheme::new(SchemeId(3), "grant"));
        store.add_scheme(IdentifierScheme::new(SchemeId(4), "doi").with_landing_url("https://doi.org/"));
        store.add_template(Template::new(TemplateId(1), "Default").as_default());
        store.add_template(Template::new(TemplateId(2), "Funder template"));
        Arc::new(store)
    }

    fn resolver(store: Arc<dyn DmpStore>) -> PlanResolver {
        PlanResolver::new(store, Arc::new(NoopLookup), IngestConfig::default())
    }

    fn minimal() -> Value {
        json!({
            "title": "Minimal plan",
            "contact": {"name": "Jane Doe", "mbox": "jane@example.org"},
            "project": {"title": "P"}
        })
    }

    #[tokio::test]
    async fn minimal_plan_gets_contact_and_default_template() {
        let store = store();
        let outcome = resolver(store.clone())
            .ingest(&minimal(), &IngestContext::create())
            .await
            .unwrap();
        assert!(outcome.created);

        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();
        assert_eq!(plan.template_id, TemplateId(1));
        assert_eq!(plan.language.as_deref(), Some("en"));
        let contact = plan.contact().unwrap();
        assert!(contact.roles.contains(ContributorRole::DataCuration));
        assert!(contact.roles.contains(ContributorRole::WritingOriginalDraft));
        assert!(plan.org.is_none());
    }

    #[tokio::test]
    async fn validation_errors_are_all_reported() {
        let err = resolver(store())
            .ingest(&json!({"contact": {}}), &IngestContext::create())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(err.messages().len() >= 2);
    }

    #[tokio::test]
    async fn submitted_template_is_used_when_it_exists() {
        let store = store();
        let mut dmp = minimal();
        dmp["extended_attributes"] = json!({"dmproadmap": {"template_id": 2}});
        let outcome = resolver(store.clone()).ingest(&dmp, &IngestContext::create()).await.unwrap();
        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();
        assert_eq!(plan.template_id, TemplateId(2));

        dmp["title"] = json!("Another");
        dmp["contact"]["mbox"] = json!("other@example.org");
        dmp["extended_attributes"] = json!({"dmproadmap": {"template": {"id": "99"}}});
        let outcome = resolver(store.clone()).ingest(&dmp, &IngestContext::create()).await.unwrap();
        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();
        assert_eq!(plan.template_id, TemplateId(1));
    }

    #[tokio::test]
    async fn no_template_at_all() {
        let store = InMemoryStore::new();
        let err = resolver(Arc::new(store))
            .ingest(&minimal(), &IngestContext::create())
            .await
            .unwrap_err();
        assert_eq!(err, IngestError::NoTemplate);
    }

    #[tokio::test]
    async fn resubmission_within_grace_updates_in_place() {
        let store = store();
        let resolver = resolver(store.clone());
        let mut dmp = minimal();
        dmp["dmp_id"] = json!({"type": "doi", "identifier": "https://doi.org/10.1234/abc"});

        let first = resolver.ingest(&dmp, &IngestContext::create()).await.unwrap();
        dmp["description"] = json!("now with a description");
        let second = resolver.ingest(&dmp, &IngestContext::create()).await.unwrap();

        assert_eq!(first.plan_id, second.plan_id);
        assert!(!second.created);
        assert_eq!(store.plan_count(), 1);
        assert_eq!(store.contributor_count(), 1);
        let plan = store.plan_by_id(first.plan_id).await.unwrap().unwrap();
        assert_eq!(plan.description.as_deref(), Some("now with a description"));
        assert_eq!(plan.identifiers.len(), 1);
        assert_eq!(plan.contributors.len(), 1);
    }

    #[tokio::test]
    async fn pinned_update_only_reaches_its_target() {
        let store = store();
        let resolver = resolver(store.clone());
        let mut dmp = minimal();
        dmp["dmp_id"] = json!({"type": "doi", "identifier": "https://doi.org/10.1234/abc"});
        let owner = resolver.ingest(&dmp, &IngestContext::create()).await.unwrap();

        dmp["title"] = json!("Redirected");
        let err = resolver
            .ingest(&dmp, &IngestContext::update().targeting(PlanId(999)))
            .await
            .unwrap_err();
        assert_eq!(err, IngestError::PlanNotFound("999".into()));

        let mut other = minimal();
        other["title"] = json!("Other");
        let other = resolver.ingest(&other, &IngestContext::create()).await.unwrap();
        let err = resolver
            .ingest(&dmp, &IngestContext::update().targeting(other.plan_id))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::PlanMismatch {
                target: other.plan_id,
                found: owner.plan_id,
            }
        );
        let plan = store.plan_by_id(owner.plan_id).await.unwrap().unwrap();
        assert_eq!(plan.title, "Minimal plan");
    }

    #[tokio::test]
    async fn create_after_grace_is_rejected() {
        let store = store();
        let resolver = PlanResolver::new(
            store.clone(),
            Arc::new(NoopLookup),
            IngestConfig::default().with_duplicate_grace_secs(0),
        );
        let first = resolver.ingest(&minimal(), &IngestContext::create()).await.unwrap();

        let mut dmp = minimal();
        dmp["dmp_id"] = json!({"type": "dmproadmap", "identifier": format!("https://example.org/plans/{}", first.plan_id)});
        let err = resolver.ingest(&dmp, &IngestContext::create()).await.unwrap_err();
        assert_eq!(err, IngestError::PlanAlreadyExists);
        assert_eq!(err.to_string(), "Plan already exists. Send an update instead.");

        let updated = resolver.ingest(&dmp, &IngestContext::update()).await.unwrap();
        assert_eq!(updated.plan_id, first.plan_id);
    }

    #[tokio::test]
    async fn update_of_unknown_plan_is_not_found() {
        let mut dmp = minimal();
        dmp["dmp_id"] = json!({"type": "doi", "identifier": "10.1234/missing"});
        let err = resolver(store())
            .ingest(&dmp, &IngestContext::update())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "plan_not_found");
    }

    #[tokio::test]
    async fn contact_is_merged_with_a_matching_contributor() {
        let store = store();
        let mut dmp = minimal();
        dmp["contributor"] = json!([
            {"name": "Jane Doe", "mbox": "JANE@example.org", "role": ["investigation"]},
            {"name": "", "mbox": ""},
            {"name": "Sam Roe", "mbox": "sam@example.org", "role": ["software"]}
        ]);
        let outcome = resolver(store.clone()).ingest(&dmp, &IngestContext::create()).await.unwrap();
        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();

        assert_eq!(plan.contributors.len(), 2);
        let contact = plan.contact().unwrap();
        assert!(contact.roles.contains(ContributorRole::Investigation));
        assert!(contact.roles.contains(ContributorRole::DataCuration));
        assert_eq!(plan.other_contributors().count(), 1);
    }

    #[tokio::test]
    async fn funder_and_grant_are_attached() {
        let store = store();
        let mut dmp = minimal();
        dmp["project"] = json!([{
            "title": "Project",
            "start": "2024-01-01",
            "end": "2026-12-31T00:00:00Z",
            "funding": [{
                "name": "Funding Agency",
                "grant_id": {"type": "grant", "identifier": "G-1"}
            }]
        }]);
        let outcome = resolver(store.clone()).ingest(&dmp, &IngestContext::create()).await.unwrap();
        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();

        let funder = plan.funder.and_then(|r| r.stored()).unwrap();
        assert_eq!(store.org_by_id(funder).await.unwrap().unwrap().name, "Funding Agency");
        assert_eq!(plan.grant_ids[0].value, "G-1");
        assert_eq!(plan.funding_status(), dmp_model::FundingStatus::Granted);
        assert_eq!(plan.start_date.map(|d| d.to_string()).as_deref(), Some("2024-01-01"));
        assert_eq!(plan.end_date.map(|d| d.to_string()).as_deref(), Some("2026-12-31"));
    }

    #[tokio::test]
    async fn owner_falls_back_to_the_caller_org() {
        let store = store();
        let receipt = store.seed(Changeset::orgs(vec![Organization::new("Caller Org")])).unwrap();
        let resolver = resolver(store.clone());

        let err = resolver
            .ingest(&minimal(), &IngestContext::create().requiring_organization())
            .await
            .unwrap_err();
        assert_eq!(err, IngestError::NoOrganizationDetermined);

        let ctx = IngestContext::create()
            .requiring_organization()
            .with_caller_org(Some(receipt.org_ids[0]));
        let outcome = resolver.ingest(&minimal(), &ctx).await.unwrap();
        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();
        assert_eq!(plan.org, Some(EntityRef::Stored(receipt.org_ids[0])));
    }

    #[tokio::test]
    async fn owner_comes_from_the_contact_affiliation() {
        let store = store();
        let mut dmp = minimal();
        dmp["contact"]["affiliation"] = json!({
            "name": "University of Nowhere",
            "affiliation_id": {"type": "ror", "identifier": "https://ror.org/0abc"}
        });
        let outcome = resolver(store.clone())
            .ingest(&dmp, &IngestContext::create().requiring_organization())
            .await
            .unwrap();
        let plan = store.plan_by_id(outcome.plan_id).await.unwrap().unwrap();
        let org = store
            .org_by_id(plan.org.and_then(|r| r.stored()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.identifier_for("ror").unwrap().value, "0abc");
    }

    /// Fails the first commits with a conflict, then delegates
    struct ConflictingStore {
        inner: Arc<InMemoryStore>,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl DmpStore for ConflictingStore {
        async fn scheme_by_name(&self, name: &str) -> Result<Option<IdentifierScheme>, StoreError> {
            self.inner.scheme_by_name(name).await
        }
        async fn schemes(&self) -> Result<Vec<IdentifierScheme>, StoreError> {
            self.inner.schemes().await
        }
        async fn find_identifier(
            &self,
            owner_kind: OwnerKind,
            scheme_id: SchemeId,
            value: &str,
        ) -> Result<Option<Identifier>, StoreError> {
            self.inner.find_identifier(owner_kind, scheme_id, value).await
        }
        async fn org_by_id(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
            self.inner.org_by_id(id).await
        }
        async fn org_by_identifier(&self, scheme_id: SchemeId, value: &str) -> Result<Option<Organization>, StoreError> {
            self.inner.org_by_identifier(scheme_id, value).await
        }
        async fn org_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError> {
            self.inner.org_by_name(name).await
        }
        async fn contributor_by_id(&self, id: ContributorId) -> Result<Option<Contributor>, StoreError> {
            self.inner.contributor_by_id(id).await
        }
        async fn contributor_by_identifier(
            &self,
            scheme_id: SchemeId,
            value: &str,
        ) -> Result<Option<Contributor>, StoreError> {
            self.inner.contributor_by_identifier(scheme_id, value).await
        }
        async fn contributor_by_email(&self, email: &str) -> Result<Option<Contributor>, StoreError> {
            self.inner.contributor_by_email(email).await
        }
        async fn plan_by_id(&self, id: PlanId) -> Result<Option<Plan>, StoreError> {
            self.inner.plan_by_id(id).await
        }
        async fn plan_by_identifier(&self, scheme_id: SchemeId, value: &str) -> Result<Option<Plan>, StoreError> {
            self.inner.plan_by_identifier(scheme_id, value).await
        }
        async fn plans(&self, org: Option<OrgId>) -> Result<Vec<Plan>, StoreError> {
            self.inner.plans(org).await
        }
        async fn default_template(&self) -> Result<Option<Template>, StoreError> {
            self.inner.default_template().await
        }
        async fn template_exists(&self, id: TemplateId) -> Result<bool, StoreError> {
            self.inner.template_exists(id).await
        }
        async fn commit(&self, changeset: Changeset) -> Result<CommitReceipt, StoreError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::UniqueViolation("simulated race".into()));
            }
            self.inner.commit(changeset).await
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_up_to_the_limit() {
        let inner = store();
        let store = Arc::new(ConflictingStore {
            inner: inner.clone(),
            conflicts: AtomicU32::new(2),
        });
        let outcome = resolver(store.clone()).ingest(&minimal(), &IngestContext::create()).await;
        assert!(outcome.is_ok());
        assert_eq!(inner.plan_count(), 1);

        store.conflicts.store(3, Ordering::SeqCst);
        let mut dmp = minimal();
        dmp["title"] = json!("Second");
        dmp["contact"]["mbox"] = json!("second@example.org");
        let err = resolver(store).ingest(&dmp, &IngestContext::create()).await.unwrap_err();
        assert_eq!(err.code(), "persistence_failed");
        assert_eq!(inner.plan_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_is_a_persistence_failure() {
        let store = store();
        store.set_available(false);
        let err = resolver(store.clone())
            .ingest(&minimal(), &IngestContext::create())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
