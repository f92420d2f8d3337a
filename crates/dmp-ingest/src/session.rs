//! Resolution session (unit of work)
//!
//! One session per resolution pass. It owns working copies of every
//! organization and contributor the pass touches, so the same entity found
//! twice (by identifier, name, email or stored id) resolves to one staged
//! slot. Nothing reaches the store until the session becomes a changeset.

use crate::ports::Changeset;
use dmp_model::{
    Contributor, ContributorId, EntityRef, OrgId, Organization, Plan, SchemeId, StagedKey,
};

/// Working set of one resolution pass
#[derive(Debug, Default)]
pub struct ResolutionSession {
    orgs: Vec<Organization>,
    contributors: Vec<Contributor>,
}

impl ResolutionSession {
    /// Empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an organization, reusing an existing slot for the same entity
    pub fn stage_org(&mut self, org: Organization) -> StagedKey {
        let existing = match org.id {
            Some(id) => self.org_key_by_id(id),
            None => self.org_key_by_name(&org.name),
        };
        if let Some(key) = existing {
            return key;
        }
        self.orgs.push(org);
        StagedKey(self.orgs.len() - 1)
    }

    /// Slot holding the stored organization `id`
    #[must_use]
    pub fn org_key_by_id(&self, id: OrgId) -> Option<StagedKey> {
        self.orgs.iter().position(|o| o.id == Some(id)).map(StagedKey)
    }

    /// Slot holding an organization with this `(scheme, value)`
    #[must_use]
    pub fn org_key_by_identifier(&self, scheme_id: SchemeId, value: &str) -> Option<StagedKey> {
        self.orgs
            .iter()
            .position(|o| {
                o.identifiers
                    .iter()
                    .any(|i| i.scheme_id == scheme_id && i.value == value)
            })
            .map(StagedKey)
    }

    /// Slot holding an organization with this name (case-insensitive)
    #[must_use]
    pub fn org_key_by_name(&self, name: &str) -> Option<StagedKey> {
        self.orgs.iter().position(|o| o.has_name(name)).map(StagedKey)
    }

    /// Staged organization
    #[must_use]
    pub fn org(&self, key: StagedKey) -> Option<&Organization> {
        self.orgs.get(key.index())
    }

    /// Staged organization, mutably
    pub fn org_mut(&mut self, key: StagedKey) -> Option<&mut Organization> {
        self.orgs.get_mut(key.index())
    }

    /// Reference to a staged organization, `Stored` when it already has an id
    #[must_use]
    pub fn org_ref(&self, key: StagedKey) -> EntityRef<OrgId> {
        match self.org(key).and_then(|o| o.id) {
            Some(id) => EntityRef::Stored(id),
            None => EntityRef::Staged(key),
        }
    }

    /// Stage a contributor, reusing an existing slot for the same person
    pub fn stage_contributor(&mut self, contributor: Contributor) -> StagedKey {
        let existing = match contributor.id {
            Some(id) => self.contributor_key_by_id(id),
            None => contributor
                .email
                .as_deref()
                .and_then(|email| self.contributor_key_by_email(email)),
        };
        if let Some(key) = existing {
            return key;
        }
        self.contributors.push(contributor);
        StagedKey(self.contributors.len() - 1)
    }

    /// Slot holding the stored contributor `id`
    #[must_use]
    pub fn contributor_key_by_id(&self, id: ContributorId) -> Option<StagedKey> {
        self.contributors
            .iter()
            .position(|c| c.id == Some(id))
            .map(StagedKey)
    }

    /// Slot holding a contributor with this `(scheme, value)`
    #[must_use]
    pub fn contributor_key_by_identifier(&self, scheme_id: SchemeId, value: &str) -> Option<StagedKey> {
        self.contributors
            .iter()
            .position(|c| {
                c.identifiers
                    .iter()
                    .any(|i| i.scheme_id == scheme_id && i.value == value)
            })
            .map(StagedKey)
    }

    /// Slot holding a contributor with this email (case-insensitive)
    #[must_use]
    pub fn contributor_key_by_email(&self, email: &str) -> Option<StagedKey> {
        if email.trim().is_empty() {
            return None;
        }
        self.contributors
            .iter()
            .position(|c| c.has_email(email))
            .map(StagedKey)
    }

    /// Staged contributor
    #[must_use]
    pub fn contributor(&self, key: StagedKey) -> Option<&Contributor> {
        self.contributors.get(key.index())
    }

    /// Staged contributor, mutably
    pub fn contributor_mut(&mut self, key: StagedKey) -> Option<&mut Contributor> {
        self.contributors.get_mut(key.index())
    }

    /// Reference to a staged contributor, `Stored` when it already has an id
    #[must_use]
    pub fn contributor_ref(&self, key: StagedKey) -> EntityRef<ContributorId> {
        match self.contributor(key).and_then(|c| c.id) {
            Some(id) => EntityRef::Stored(id),
            None => EntityRef::Staged(key),
        }
    }

    /// Number of staged organizations
    #[must_use]
    pub fn org_count(&self) -> usize {
        self.orgs.len()
    }

    /// Number of staged contributors
    #[must_use]
    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    /// Close the session
    #[must_use]
    pub fn into_changeset(self, plan: Plan) -> Changeset {
        Changeset {
            orgs: self.orgs,
            contributors: self.contributors,
            plan: Some(plan),
        }
    }
}
