//! Contributors (people named on plans)

use crate::entity_ref::EntityRef;
use crate::identifier::{consolidate, Identifier, IdentifierOwner};
use crate::ids::{ContributorId, OrgId};
use crate::role::RoleSet;
use serde::{Deserialize, Serialize};

/// A person who contributes to plans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Store id, `None` until committed
    pub id: Option<ContributorId>,
    /// Given name
    #[serde(default)]
    pub firstname: Option<String>,
    /// Family name
    #[serde(default)]
    pub surname: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Affiliation, set once
    #[serde(default)]
    pub org: Option<EntityRef<OrgId>>,
    /// Roles accumulated across submissions
    #[serde(default)]
    pub roles: RoleSet,
    /// Attached identifiers, unique by `(scheme, value)`
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
}

impl Default for Contributor {
    fn default() -> Self {
        Self::new()
    }
}

impl Contributor {
    /// Empty, unsaved contributor
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            firstname: None,
            surname: None,
            email: None,
            phone: None,
            org: None,
            roles: RoleSet::empty(),
            identifiers: Vec::new(),
        }
    }

    /// Split a combined name into `(firstname, surname)`
    ///
    /// The last word is the surname and everything before it the firstname.
    /// A single word is treated as a surname.
    #[must_use]
    pub fn split_name(name: &str) -> (Option<String>, Option<String>) {
        let words: Vec<&str> = name.split_whitespace().collect();
        match words.split_last() {
            None => (None, None),
            Some((last, [])) => (None, Some((*last).to_string())),
            Some((last, rest)) => (Some(rest.join(" ")), Some((*last).to_string())),
        }
    }

    /// `first last`, skipping blank parts
    #[must_use]
    pub fn display_name(&self) -> String {
        [self.firstname.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether a name or an email is present
    #[must_use]
    pub fn has_name_or_email(&self) -> bool {
        !self.display_name().is_empty() || present(self.email.as_deref())
    }

    /// Case-insensitive email comparison
    #[must_use]
    pub fn has_email(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|mine| mine.trim().eq_ignore_ascii_case(email.trim()))
    }

    /// Whether the contributor has not been committed yet
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Owner tag for identifiers attached to this contributor
    #[inline]
    #[must_use]
    pub fn as_owner(&self) -> Option<IdentifierOwner> {
        self.id.map(IdentifierOwner::Contributor)
    }

    /// Merge identifiers without duplicating `(scheme, value)` pairs
    pub fn consolidate_identifiers(&mut self, incoming: impl IntoIterator<Item = Identifier>) -> usize {
        let owner = self.as_owner();
        consolidate(&mut self.identifiers, incoming, owner)
    }

    /// Fill blank fields from the given values, keeping every non-blank one
    pub fn fill_blanks(&mut self, firstname: Option<&str>, surname: Option<&str>, email: Option<&str>, phone: Option<&str>) {
        fill(&mut self.firstname, firstname);
        fill(&mut self.surname, surname);
        fill(&mut self.email, email);
        fill(&mut self.phone, phone);
    }

    /// Fold a concurrently resolved copy into this one
    ///
    /// Roles are unioned, identifiers accumulate, blank fields are filled
    /// and the affiliation is set once.
    pub fn merge_from(&mut self, other: Contributor) {
        self.fill_blanks(
            other.firstname.as_deref(),
            other.surname.as_deref(),
            other.email.as_deref(),
            other.phone.as_deref(),
        );
        if self.org.is_none() {
            self.org = other.org;
        }
        self.roles.union_with(other.roles);
        self.consolidate_identifiers(other.identifiers);
    }
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn fill(slot: &mut Option<String>, value: Option<&str>) {
    if present(slot.as_deref()) {
        return;
    }
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *slot = Some(value.to_string());
    }
}
