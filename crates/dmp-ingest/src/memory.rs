//! In-memory reference store
//!
//! Enforces the same uniqueness rules a relational backend would:
//! - identifiers on `(owner_kind, scheme, value)`
//! - organization names, case-insensitively
//! - contributor emails, case-insensitively
//!
//! Commits apply to a copy of the state which replaces the live state only
//! when every write succeeded. Stored organizations and contributors in a
//! changeset are merged into their current version, so writes resolved
//! from an older read add to it instead of replacing it.

use crate::error::StoreError;
use crate::ports::{Changeset, CommitReceipt, DmpStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dmp_model::{
    Contributor, ContributorId, EntityRef, Identifier, IdentifierId, IdentifierOwner,
    IdentifierScheme, OrgId, Organization, OwnerKind, Plan, PlanId, SchemeId, StagedKey, Template,
    TemplateId,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

type IdentifierKey = (OwnerKind, SchemeId, String);

#[derive(Debug, Clone, Default)]
struct State {
    next_id: u64,
    orgs: BTreeMap<OrgId, Organization>,
    contributors: BTreeMap<ContributorId, Contributor>,
    plans: BTreeMap<PlanId, Plan>,
    identifiers: HashMap<IdentifierKey, Identifier>,
    org_names: HashMap<String, OrgId>,
    emails: HashMap<String, ContributorId>,
}

/// Serialized form of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Next id to hand out
    pub next_id: u64,
    /// Identifier schemes
    pub schemes: Vec<IdentifierScheme>,
    /// Templates
    pub templates: Vec<Template>,
    /// Organizations
    pub orgs: Vec<Organization>,
    /// Contributors
    pub contributors: Vec<Contributor>,
    /// Plans
    pub plans: Vec<Plan>,
}

/// Reference `DmpStore`
#[derive(Debug)]
pub struct InMemoryStore {
    schemes: DashMap<String, IdentifierScheme>,
    templates: DashMap<TemplateId, Template>,
    state: RwLock<State>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty, available store
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemes: DashMap::new(),
            templates: DashMap::new(),
            state: RwLock::new(State {
                next_id: 1,
                ..State::default()
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Register an identifier scheme
    pub fn add_scheme(&self, scheme: IdentifierScheme) {
        self.schemes.insert(scheme.name.to_lowercase(), scheme);
    }

    /// Register a template
    pub fn add_template(&self, template: Template) {
        self.templates.insert(template.id, template);
    }

    /// Simulate an outage; every call fails while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Commit without going through the async port
    ///
    /// # Errors
    /// Same as [`DmpStore::commit`]
    pub fn seed(&self, changeset: Changeset) -> Result<CommitReceipt, StoreError> {
        self.ensure_available()?;
        let mut state = self.state.write();
        let mut draft = state.clone();
        let receipt = draft.apply(changeset, Utc::now())?;
        *state = draft;
        Ok(receipt)
    }

    /// Number of stored organizations
    #[must_use]
    pub fn org_count(&self) -> usize {
        self.state.read().orgs.len()
    }

    /// Number of stored contributors
    #[must_use]
    pub fn contributor_count(&self) -> usize {
        self.state.read().contributors.len()
    }

    /// Number of stored plans
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.state.read().plans.len()
    }

    /// Copy the full contents
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        let mut schemes: Vec<_> = self.schemes.iter().map(|e| e.value().clone()).collect();
        schemes.sort_by_key(|s| s.id);
        let mut templates: Vec<_> = self.templates.iter().map(|e| e.value().clone()).collect();
        templates.sort_by_key(|t| t.id);
        Snapshot {
            next_id: state.next_id,
            schemes,
            templates,
            orgs: state.orgs.values().cloned().collect(),
            contributors: state.contributors.values().cloned().collect(),
            plans: state.plans.values().cloned().collect(),
        }
    }

    /// Rebuild a store from a snapshot
    ///
    /// # Errors
    /// Returns `StoreError::Snapshot` if the snapshot breaks a uniqueness rule
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let store = Self::new();
        for scheme in snapshot.schemes {
            store.add_scheme(scheme);
        }
        for template in snapshot.templates {
            store.add_template(template);
        }

        let mut state = State {
            next_id: snapshot.next_id.max(1),
            ..State::default()
        };
        for org in snapshot.orgs {
            let id = org.id.ok_or_else(|| StoreError::Snapshot("organization without id".into()))?;
            state.index_identifiers(&org.identifiers).map_err(snapshot_error)?;
            state.claim_org_name(id, &org.name).map_err(snapshot_error)?;
            state.orgs.insert(id, org);
        }
        for contributor in snapshot.contributors {
            let id = contributor
                .id
                .ok_or_else(|| StoreError::Snapshot("contributor without id".into()))?;
            state.index_identifiers(&contributor.identifiers).map_err(snapshot_error)?;
            state.claim_email(id, contributor.email.as_deref()).map_err(snapshot_error)?;
            state.contributors.insert(id, contributor);
        }
        for plan in snapshot.plans {
            let id = plan.id.ok_or_else(|| StoreError::Snapshot("plan without id".into()))?;
            state.index_identifiers(&plan.identifiers).map_err(snapshot_error)?;
            state.index_identifiers(&plan.grant_ids).map_err(snapshot_error)?;
            state.plans.insert(id, plan);
        }
        *store.state.write() = state;
        Ok(store)
    }

    /// Write a JSON snapshot
    ///
    /// # Errors
    /// Returns `StoreError::Snapshot` on I/O or encoding failure
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.snapshot()).map_err(snapshot_error)?;
        std::fs::write(path, json).map_err(snapshot_error)
    }

    /// Read a JSON snapshot
    ///
    /// # Errors
    /// Returns `StoreError::Snapshot` on I/O, decoding or consistency failure
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(snapshot_error)?;
        let snapshot: Snapshot = serde_json::from_str(&json).map_err(snapshot_error)?;
        Self::from_snapshot(snapshot)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store switched off".into()))
        }
    }
}

fn snapshot_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Snapshot(err.to_string())
}

fn identifier_key(owner_kind: OwnerKind, scheme_id: SchemeId, value: &str) -> IdentifierKey {
    (owner_kind, scheme_id, value.to_string())
}

impl State {
    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn index_identifiers(&mut self, identifiers: &[Identifier]) -> Result<(), StoreError> {
        for identifier in identifiers {
            let owner = identifier
                .owner
                .ok_or_else(|| StoreError::InvalidReference(format!("identifier {} has no owner", identifier.value)))?;
            let key = identifier_key(owner.kind(), identifier.scheme_id, &identifier.value);
            if self.identifiers.insert(key, identifier.clone()).is_some() {
                return Err(StoreError::UniqueViolation(format!(
                    "identifier {}:{} already taken",
                    identifier.scheme_name, identifier.value
                )));
            }
        }
        Ok(())
    }

    fn claim_org_name(&mut self, id: OrgId, name: &str) -> Result<(), StoreError> {
        let key = name.trim().to_lowercase();
        match self.org_names.get(&key) {
            Some(existing) if *existing != id => Err(StoreError::UniqueViolation(format!(
                "organization name '{}' already taken",
                name.trim()
            ))),
            _ => {
                self.org_names.retain(|_, owner| *owner != id);
                self.org_names.insert(key, id);
                Ok(())
            }
        }
    }

    fn claim_email(&mut self, id: ContributorId, email: Option<&str>) -> Result<(), StoreError> {
        let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(());
        };
        let key = email.to_lowercase();
        match self.emails.get(&key) {
            Some(existing) if *existing != id => Err(StoreError::UniqueViolation(format!(
                "contributor email '{email}' already taken"
            ))),
            _ => {
                self.emails.retain(|_, owner| *owner != id);
                self.emails.insert(key, id);
                Ok(())
            }
        }
    }

    /// Give every identifier an id and `owner`, rejecting foreign duplicates
    fn attach_identifiers(
        &mut self,
        identifiers: &mut [Identifier],
        owner: IdentifierOwner,
    ) -> Result<(), StoreError> {
        for identifier in identifiers.iter_mut() {
            let key = identifier_key(owner.kind(), identifier.scheme_id, &identifier.value);
            if let Some(existing) = self.identifiers.get(&key) {
                if existing.owner != Some(owner) {
                    return Err(StoreError::UniqueViolation(format!(
                        "identifier {}:{} belongs to another {}",
                        identifier.scheme_name,
                        identifier.value,
                        owner.kind()
                    )));
                }
                identifier.id = existing.id;
                identifier.owner = Some(owner);
                continue;
            }
            if identifier.id.is_none() {
                identifier.id = Some(IdentifierId(self.next()));
            }
            identifier.owner = Some(owner);
            self.identifiers.insert(key, identifier.clone());
        }
        Ok(())
    }

    fn apply(&mut self, changeset: Changeset, now: DateTime<Utc>) -> Result<CommitReceipt, StoreError> {
        let Changeset {
            orgs,
            contributors,
            plan,
        } = changeset;

        let org_ids = self.assign_ids(orgs.iter().map(|o| o.id.map(OrgId::get)), |s, id| {
            s.orgs.contains_key(&OrgId(id))
        })?
        .into_iter()
        .map(OrgId)
        .collect::<Vec<_>>();
        let contributor_ids = self
            .assign_ids(contributors.iter().map(|c| c.id.map(ContributorId::get)), |s, id| {
                s.contributors.contains_key(&ContributorId(id))
            })?
            .into_iter()
            .map(ContributorId)
            .collect::<Vec<_>>();

        let settle_org = |r: EntityRef<OrgId>| {
            r.settle(|key: StagedKey| org_ids.get(key.index()).copied())
                .ok_or_else(|| StoreError::InvalidReference(format!("organization {r:?}")))
        };

        for (org, id) in orgs.into_iter().zip(org_ids.iter().copied()) {
            let mut org = match self.orgs.get(&id) {
                Some(current) => {
                    let mut merged = current.clone();
                    merged.merge_from(org);
                    merged
                }
                None => org,
            };
            self.claim_org_name(id, &org.name)?;
            self.attach_identifiers(&mut org.identifiers, IdentifierOwner::Org(id))?;
            org.id = Some(id);
            org.created_at.get_or_insert(now);
            org.updated_at = Some(now);
            self.orgs.insert(id, org);
        }

        for (contributor, id) in contributors.into_iter().zip(contributor_ids.iter().copied()) {
            let mut contributor = match self.contributors.get(&id) {
                Some(current) => {
                    let mut merged = current.clone();
                    merged.merge_from(contributor);
                    merged
                }
                None => contributor,
            };
            if !contributor.has_name_or_email() {
                return Err(StoreError::InvalidReference(format!(
                    "contributor {id} has neither a name nor an email"
                )));
            }
            self.claim_email(id, contributor.email.as_deref())?;
            self.attach_identifiers(&mut contributor.identifiers, IdentifierOwner::Contributor(id))?;
            contributor.org = contributor.org.map(settle_org).transpose()?.map(EntityRef::Stored);
            contributor.id = Some(id);
            self.contributors.insert(id, contributor);
        }

        let mut receipt = CommitReceipt {
            plan_id: None,
            plan_created: false,
            org_ids: org_ids.clone(),
            contributor_ids: contributor_ids.clone(),
        };

        if let Some(mut plan) = plan {
            let (id, created) = match plan.id {
                Some(id) if self.plans.contains_key(&id) => (id, false),
                Some(id) => return Err(StoreError::InvalidReference(format!("plan {id}"))),
                None => (PlanId(self.next()), true),
            };

            plan.org = plan.org.map(settle_org).transpose()?.map(EntityRef::Stored);
            plan.funder = plan.funder.map(settle_org).transpose()?.map(EntityRef::Stored);
            for entry in &mut plan.contributors {
                let settled = entry
                    .contributor
                    .settle(|key| contributor_ids.get(key.index()).copied())
                    .ok_or_else(|| StoreError::InvalidReference(format!("contributor {:?}", entry.contributor)))?;
                if !self.contributors.contains_key(&settled) {
                    return Err(StoreError::InvalidReference(format!("contributor {settled}")));
                }
                entry.contributor = EntityRef::Stored(settled);
            }
            self.attach_identifiers(&mut plan.identifiers, IdentifierOwner::Plan(id))?;
            self.attach_identifiers(&mut plan.grant_ids, IdentifierOwner::Plan(id))?;

            plan.id = Some(id);
            plan.created_at.get_or_insert(now);
            plan.updated_at = Some(now);
            self.plans.insert(id, plan);

            receipt.plan_id = Some(id);
            receipt.plan_created = created;
        }

        Ok(receipt)
    }

    /// Keep existing ids (which must exist) and allocate the rest
    fn assign_ids(
        &mut self,
        ids: impl Iterator<Item = Option<u64>>,
        exists: impl Fn(&State, u64) -> bool,
    ) -> Result<Vec<u64>, StoreError> {
        let mut assigned = Vec::new();
        for id in ids {
            match id {
                Some(id) if exists(&*self, id) => assigned.push(id),
                Some(id) => return Err(StoreError::InvalidReference(format!("unknown id {id}"))),
                None => assigned.push(self.next()),
            }
        }
        Ok(assigned)
    }

    fn owner_of(&self, owner_kind: OwnerKind, scheme_id: SchemeId, value: &str) -> Option<IdentifierOwner> {
        self.identifiers
            .get(&identifier_key(owner_kind, scheme_id, value))
            .and_then(|identifier| identifier.owner)
    }
}

#[async_trait]
impl DmpStore for InMemoryStore {
    async fn scheme_by_name(&self, name: &str) -> Result<Option<IdentifierScheme>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .schemes
            .get(&name.trim().to_lowercase())
            .map(|entry| entry.value().clone()))
    }

    async fn schemes(&self) -> Result<Vec<IdentifierScheme>, StoreError> {
        self.ensure_available()?;
        let mut schemes: Vec<_> = self.schemes.iter().map(|e| e.value().clone()).collect();
        schemes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schemes)
    }

    async fn find_identifier(
        &self,
        owner_kind: OwnerKind,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Identifier>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .state
            .read()
            .identifiers
            .get(&identifier_key(owner_kind, scheme_id, value))
            .cloned())
    }

    async fn org_by_id(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().orgs.get(&id).cloned())
    }

    async fn org_by_identifier(
        &self,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Organization>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        Ok(match state.owner_of(OwnerKind::Org, scheme_id, value) {
            Some(IdentifierOwner::Org(id)) => state.orgs.get(&id).cloned(),
            _ => None,
        })
    }

    async fn org_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        Ok(state
            .org_names
            .get(&name.trim().to_lowercase())
            .and_then(|id| state.orgs.get(id))
            .cloned())
    }

    async fn contributor_by_id(&self, id: ContributorId) -> Result<Option<Contributor>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().contributors.get(&id).cloned())
    }

    async fn contributor_by_identifier(
        &self,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Contributor>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        Ok(match state.owner_of(OwnerKind::Contributor, scheme_id, value) {
            Some(IdentifierOwner::Contributor(id)) => state.contributors.get(&id).cloned(),
            _ => None,
        })
    }

    async fn contributor_by_email(&self, email: &str) -> Result<Option<Contributor>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        Ok(state
            .emails
            .get(&email.trim().to_lowercase())
            .and_then(|id| state.contributors.get(id))
            .cloned())
    }

    async fn plan_by_id(&self, id: PlanId) -> Result<Option<Plan>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().plans.get(&id).cloned())
    }

    async fn plan_by_identifier(
        &self,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Plan>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        Ok(match state.owner_of(OwnerKind::Plan, scheme_id, value) {
            Some(IdentifierOwner::Plan(id)) => state.plans.get(&id).cloned(),
            _ => None,
        })
    }

    async fn plans(&self, org: Option<OrgId>) -> Result<Vec<Plan>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        let mut plans: Vec<Plan> = state
            .plans
            .values()
            .filter(|plan| org.is_none() || plan.org.and_then(|r| r.stored()) == org)
            .cloned()
            .collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(plans)
    }

    async fn default_template(&self) -> Result<Option<Template>, StoreError> {
        self.ensure_available()?;
        let mut defaults: Vec<Template> = self
            .templates
            .iter()
            .filter(|entry| entry.value().is_default)
            .map(|entry| entry.value().clone())
            .collect();
        defaults.sort_by_key(|t| t.id);
        Ok(defaults.into_iter().next())
    }

    async fn template_exists(&self, id: TemplateId) -> Result<bool, StoreError> {
        self.ensure_available()?;
        Ok(self.templates.contains_key(&id))
    }

    async fn commit(&self, changeset: Changeset) -> Result<CommitReceipt, StoreError> {
        let receipt = self.seed(changeset)?;
        tracing::debug!(
            plan_id = ?receipt.plan_id,
            orgs = receipt.org_ids.len(),
            contributors = receipt.contributor_ids.len(),
            "changeset committed"
        );
        Ok(receipt)
    }
}
