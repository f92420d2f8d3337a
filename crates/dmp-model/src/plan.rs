//! Data management plans

use crate::entity_ref::EntityRef;
use crate::identifier::{consolidate, Identifier, IdentifierOwner};
use crate::ids::{ContributorId, OrgId, PlanId, TemplateId};
use crate::role::{ContributorRole, RoleSet};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Answer to "does the plan raise ethical issues?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EthicalIssues {
    /// Issues exist
    Yes,
    /// No issues
    No,
    /// Not answered
    #[default]
    Unknown,
}

impl EthicalIssues {
    /// Parse a submitted answer; anything other than yes/no is unknown
    #[must_use]
    pub fn from_answer(answer: Option<&str>) -> Self {
        match answer.map(str::trim) {
            Some(a) if a.eq_ignore_ascii_case("yes") => Self::Yes,
            Some(a) if a.eq_ignore_ascii_case("no") => Self::No,
            _ => Self::Unknown,
        }
    }

    /// Nullable boolean form
    #[inline]
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Yes => Some(true),
            Self::No => Some(false),
            Self::Unknown => None,
        }
    }

    /// Answer keyword
    #[inline]
    #[must_use]
    pub fn as_answer(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }
}

/// How a contributor appears on a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributorKind {
    /// The plan's primary contact (curator and author)
    Contact,
    /// Any other contributor
    Contributor,
}

/// Plan-owned annotation linking a contributor to a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanContributor {
    /// Linked contributor
    pub contributor: EntityRef<ContributorId>,
    /// Contact or plain contributor
    pub kind: ContributorKind,
    /// Roles on this plan
    pub roles: RoleSet,
}

impl PlanContributor {
    /// Roles every contact carries
    pub const CONTACT_ROLES: [ContributorRole; 2] =
        [ContributorRole::DataCuration, ContributorRole::WritingOriginalDraft];

    /// Contact annotation with the forced roles added
    #[must_use]
    pub fn contact(contributor: EntityRef<ContributorId>, roles: RoleSet) -> Self {
        let mut roles = roles;
        roles.extend(Self::CONTACT_ROLES);
        Self {
            contributor,
            kind: ContributorKind::Contact,
            roles,
        }
    }

    /// Plain contributor annotation
    #[must_use]
    pub fn contributor(contributor: EntityRef<ContributorId>, roles: RoleSet) -> Self {
        Self {
            contributor,
            kind: ContributorKind::Contributor,
            roles,
        }
    }

    /// Whether this is the contact entry
    #[inline]
    #[must_use]
    pub fn is_contact(&self) -> bool {
        self.kind == ContributorKind::Contact
    }
}

/// Funding status derived from grant ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingStatus {
    /// No grant attached yet
    Planned,
    /// A grant id is attached
    Granted,
}

impl FundingStatus {
    /// Keyword form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Granted => "granted",
        }
    }
}

/// A data management plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Store id, `None` until committed
    pub id: Option<PlanId>,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Language code
    #[serde(default)]
    pub language: Option<String>,
    /// Project start
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Project end
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Ethical issues answer
    #[serde(default)]
    pub ethical_issues: EthicalIssues,
    /// Ethical issues description
    #[serde(default)]
    pub ethical_issues_description: Option<String>,
    /// Link to an ethical issues report
    #[serde(default)]
    pub ethical_issues_report: Option<String>,
    /// Owning organization
    #[serde(default)]
    pub org: Option<EntityRef<OrgId>>,
    /// Funding organization
    #[serde(default)]
    pub funder: Option<EntityRef<OrgId>>,
    /// Contact and contributors
    #[serde(default)]
    pub contributors: Vec<PlanContributor>,
    /// Plan identifiers (dmp ids from other namespaces)
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    /// Grant identifiers
    #[serde(default)]
    pub grant_ids: Vec<Identifier>,
    /// Template the plan is based on
    pub template_id: TemplateId,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// New, unsaved plan
    #[must_use]
    pub fn new(title: impl Into<String>, template_id: TemplateId) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            language: None,
            start_date: None,
            end_date: None,
            ethical_issues: EthicalIssues::Unknown,
            ethical_issues_description: None,
            ethical_issues_report: None,
            org: None,
            funder: None,
            contributors: Vec::new(),
            identifiers: Vec::new(),
            grant_ids: Vec::new(),
            template_id,
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether the plan has not been committed yet
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Owner tag for identifiers attached to this plan
    #[inline]
    #[must_use]
    pub fn as_owner(&self) -> Option<IdentifierOwner> {
        self.id.map(IdentifierOwner::Plan)
    }

    /// The contact entry
    #[must_use]
    pub fn contact(&self) -> Option<&PlanContributor> {
        self.contributors.iter().find(|pc| pc.is_contact())
    }

    /// Entries other than the contact
    pub fn other_contributors(&self) -> impl Iterator<Item = &PlanContributor> {
        self.contributors.iter().filter(|pc| !pc.is_contact())
    }

    /// Planned until a grant id is attached
    #[must_use]
    pub fn funding_status(&self) -> FundingStatus {
        if self.grant_ids.iter().any(|g| !g.value.trim().is_empty()) {
            FundingStatus::Granted
        } else {
            FundingStatus::Planned
        }
    }

    /// Merge plan identifiers without duplicating `(scheme, value)` pairs
    pub fn consolidate_identifiers(&mut self, incoming: impl IntoIterator<Item = Identifier>) -> usize {
        let owner = self.as_owner();
        consolidate(&mut self.identifiers, incoming, owner)
    }

    /// Merge grant identifiers without duplicating `(scheme, value)` pairs
    pub fn consolidate_grant_ids(&mut self, incoming: impl IntoIterator<Item = Identifier>) -> usize {
        let owner = self.as_owner();
        consolidate(&mut self.grant_ids, incoming, owner)
    }

    /// Attach a contributor, merging entries for the same contributor
    ///
    /// Adding the contact replaces any earlier contact flag so the plan
    /// always carries at most one contact.
    pub fn attach(&mut self, entry: PlanContributor) {
        if entry.is_contact() {
            for existing in &mut self.contributors {
                if existing.is_contact() && existing.contributor != entry.contributor {
                    existing.kind = ContributorKind::Contributor;
                }
            }
        }

        match self
            .contributors
            .iter_mut()
            .find(|existing| existing.contributor == entry.contributor)
        {
            Some(existing) => {
                existing.roles.union_with(entry.roles);
                if entry.is_contact() {
                    existing.kind = ContributorKind::Contact;
                }
            }
            None => self.contributors.push(entry),
        }
    }
}
