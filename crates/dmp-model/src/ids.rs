//! Store-assigned entity identifiers
//!
//! Every persisted entity carries a numeric id handed out by the store.
//! Entities that have not been committed yet carry `None` instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value
            #[inline]
            #[must_use]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Plan primary key
    PlanId
);
numeric_id!(
    /// Organization primary key
    OrgId
);
numeric_id!(
    /// Contributor primary key
    ContributorId
);
numeric_id!(
    /// Identifier primary key
    IdentifierId
);
numeric_id!(
    /// Identifier scheme primary key
    SchemeId
);
numeric_id!(
    /// Template primary key
    TemplateId
);
