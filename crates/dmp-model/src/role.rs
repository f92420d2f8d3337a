//! Contributor roles (CRediT taxonomy) and role sets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A contribution role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributorRole {
    /// Ideas; formulation of research goals
    Conceptualization,
    /// Management activities to annotate and maintain research data
    DataCuration,
    /// Statistical or computational analysis
    FormalAnalysis,
    /// Acquisition of financial support
    FundingAcquisition,
    /// Conducting the research process
    Investigation,
    /// Development or design of methodology
    Methodology,
    /// Management and coordination responsibility
    ProjectAdministration,
    /// Provision of study materials or tools
    Resources,
    /// Programming and software development
    Software,
    /// Oversight and leadership responsibility
    Supervision,
    /// Verification of results
    Validation,
    /// Preparation of visualizations
    Visualization,
    /// Preparation of the initial draft
    WritingOriginalDraft,
    /// Critical review and revision
    WritingReviewEditing,
}

impl ContributorRole {
    /// Every role in bit order
    pub const ALL: [ContributorRole; 14] = [
        Self::Conceptualization,
        Self::DataCuration,
        Self::FormalAnalysis,
        Self::FundingAcquisition,
        Self::Investigation,
        Self::Methodology,
        Self::ProjectAdministration,
        Self::Resources,
        Self::Software,
        Self::Supervision,
        Self::Validation,
        Self::Visualization,
        Self::WritingOriginalDraft,
        Self::WritingReviewEditing,
    ];

    /// Role assigned when nothing better is known
    pub const DEFAULT: ContributorRole = Self::WritingOriginalDraft;

    /// Snake-case keyword
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conceptualization => "conceptualization",
            Self::DataCuration => "data_curation",
            Self::FormalAnalysis => "formal_analysis",
            Self::FundingAcquisition => "funding_acquisition",
            Self::Investigation => "investigation",
            Self::Methodology => "methodology",
            Self::ProjectAdministration => "project_administration",
            Self::Resources => "resources",
            Self::Software => "software",
            Self::Supervision => "supervision",
            Self::Validation => "validation",
            Self::Visualization => "visualization",
            Self::WritingOriginalDraft => "writing_original_draft",
            Self::WritingReviewEditing => "writing_review_editing",
        }
    }

    /// One-based bit position
    #[must_use]
    pub fn bit(self) -> u8 {
        self as u8 + 1
    }

    #[inline]
    fn mask(self) -> u16 {
        1 << (self.bit() - 1)
    }

    /// Ontology URI for this role
    ///
    /// The keyword is capitalized the way the CRediT vocabulary spells it:
    /// `https://dictionary.casrai.org/Contributor_Roles/` + `Data_curation`.
    #[must_use]
    pub fn as_uri(self, base: &str) -> String {
        let keyword = self.as_str();
        let mut chars = keyword.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };
        if base.ends_with('/') {
            format!("{base}{capitalized}")
        } else {
            format!("{base}/{capitalized}")
        }
    }
}

impl fmt::Display for ContributorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role keyword
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown contributor role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for ContributorRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keyword = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(keyword))
            .ok_or_else(|| RoleParseError(keyword.to_string()))
    }
}

/// Additive set of roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(u16);

impl RoleSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a role
    #[inline]
    pub fn insert(&mut self, role: ContributorRole) {
        self.0 |= role.mask();
    }

    /// Union with another set
    #[inline]
    pub fn union_with(&mut self, other: RoleSet) {
        self.0 |= other.0;
    }

    /// Set containing `self` and `other`
    #[inline]
    #[must_use]
    pub fn union(mut self, other: RoleSet) -> RoleSet {
        self.union_with(other);
        self
    }

    /// Membership test
    #[inline]
    #[must_use]
    pub fn contains(&self, role: ContributorRole) -> bool {
        self.0 & role.mask() != 0
    }

    /// Whether no role is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of roles set
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Roles in bit order
    pub fn iter(&self) -> impl Iterator<Item = ContributorRole> + '_ {
        ContributorRole::ALL
            .into_iter()
            .filter(move |role| self.contains(*role))
    }

    /// Raw bit field
    #[inline]
    #[must_use]
    pub fn bits(&self) -> u16 {
        self.0
    }
}

impl FromIterator<ContributorRole> for RoleSet {
    fn from_iter<T: IntoIterator<Item = ContributorRole>>(iter: T) -> Self {
        let mut set = RoleSet::empty();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl Extend<ContributorRole> for RoleSet {
    fn extend<T: IntoIterator<Item = ContributorRole>>(&mut self, iter: T) {
        for role in iter {
            self.insert(role);
        }
    }
}
