//! Repository and lookup ports
//!
//! Resolvers only talk to the outside world through these traits, so the
//! whole pipeline runs against the in-memory store in tests.

use crate::dto::IdentifierInput;
use crate::error::{LookupError, StoreError};
use async_trait::async_trait;
use dmp_model::{
    Contributor, ContributorId, Identifier, IdentifierScheme, OrgId, Organization, OwnerKind, Plan,
    PlanId, SchemeId, Template, TemplateId,
};
use serde::{Deserialize, Serialize};

/// Everything one resolution pass wants persisted
///
/// Entities reference each other through `EntityRef::Staged` keys, which
/// index into `orgs` and `contributors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// New or modified organizations, indexed by staged key
    pub orgs: Vec<Organization>,
    /// New or modified contributors, indexed by staged key
    pub contributors: Vec<Contributor>,
    /// The plan, if any
    pub plan: Option<Plan>,
}

impl Changeset {
    /// Changeset carrying only organizations
    #[must_use]
    pub fn orgs(orgs: Vec<Organization>) -> Self {
        Self {
            orgs,
            ..Self::default()
        }
    }

    /// Whether there is nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty() && self.contributors.is_empty() && self.plan.is_none()
    }
}

/// Ids assigned by a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Plan id, when the changeset carried a plan
    pub plan_id: Option<PlanId>,
    /// Whether the plan was inserted rather than updated
    pub plan_created: bool,
    /// Organization ids, by staged key
    pub org_ids: Vec<OrgId>,
    /// Contributor ids, by staged key
    pub contributor_ids: Vec<ContributorId>,
}

/// Persistence port
#[async_trait]
pub trait DmpStore: Send + Sync {
    /// Scheme by case-insensitive name
    async fn scheme_by_name(&self, name: &str) -> Result<Option<IdentifierScheme>, StoreError>;

    /// Every registered scheme
    async fn schemes(&self) -> Result<Vec<IdentifierScheme>, StoreError>;

    /// Persisted identifier keyed on `(owner_kind, scheme, value)`
    async fn find_identifier(
        &self,
        owner_kind: OwnerKind,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Identifier>, StoreError>;

    /// Organization by id
    async fn org_by_id(&self, id: OrgId) -> Result<Option<Organization>, StoreError>;

    /// Organization owning an identifier
    async fn org_by_identifier(
        &self,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Organization>, StoreError>;

    /// Organization by case-insensitive exact name
    async fn org_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError>;

    /// Contributor by id
    async fn contributor_by_id(&self, id: ContributorId) -> Result<Option<Contributor>, StoreError>;

    /// Contributor owning an identifier
    async fn contributor_by_identifier(
        &self,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Contributor>, StoreError>;

    /// Contributor by case-insensitive email
    async fn contributor_by_email(&self, email: &str) -> Result<Option<Contributor>, StoreError>;

    /// Plan by id
    async fn plan_by_id(&self, id: PlanId) -> Result<Option<Plan>, StoreError>;

    /// Plan owning an identifier
    async fn plan_by_identifier(
        &self,
        scheme_id: SchemeId,
        value: &str,
    ) -> Result<Option<Plan>, StoreError>;

    /// Plans owned by `org` (all plans for `None`), newest first
    async fn plans(&self, org: Option<OrgId>) -> Result<Vec<Plan>, StoreError>;

    /// The system default template
    async fn default_template(&self) -> Result<Option<Template>, StoreError>;

    /// Whether a template exists
    async fn template_exists(&self, id: TemplateId) -> Result<bool, StoreError>;

    /// Persist a changeset atomically
    async fn commit(&self, changeset: Changeset) -> Result<CommitReceipt, StoreError>;
}

/// Candidate returned by the external organization search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgCandidate {
    /// Candidate name
    pub name: String,
    /// Rank class, 0 best (starts with), 1 contains, higher is looser
    pub weight: u32,
    /// Short name
    pub abbreviation: Option<String>,
    /// Identifiers the service knows for the candidate
    pub identifiers: Vec<IdentifierInput>,
}

impl OrgCandidate {
    /// Candidate without identifiers
    #[must_use]
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
            abbreviation: None,
            identifiers: Vec::new(),
        }
    }

    /// With an identifier
    #[must_use]
    pub fn with_identifier(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.push(IdentifierInput::new(kind, value));
        self
    }

    /// With abbreviation
    #[must_use]
    pub fn with_abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = Some(abbreviation.into());
        self
    }

    /// Starts-with or contains match
    #[inline]
    #[must_use]
    pub fn is_close_match(&self) -> bool {
        self.weight <= 1
    }
}

/// External organization search port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrgLookup: Send + Sync {
    /// Ranked candidates for a name
    async fn search(&self, term: &str) -> Result<Vec<OrgCandidate>, LookupError>;
}

/// Lookup that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLookup;

#[async_trait]
impl OrgLookup for NoopLookup {
    async fn search(&self, _term: &str) -> Result<Vec<OrgCandidate>, LookupError> {
        Ok(Vec::new())
    }
}
