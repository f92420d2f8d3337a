//! DMP Model - Data Management Plan domain types
//!
//! Plain data, no I/O:
//! - Store ids and intra-pass entity references
//! - Identifier schemes and identifiers with sum-typed owners
//! - Organizations, contributors and CRediT role sets
//! - Plans with their contact/contributor annotations, and templates

pub mod contributor;
pub mod entity_ref;
pub mod identifier;
pub mod ids;
pub mod organization;
pub mod plan;
pub mod role;
pub mod scheme;
pub mod template;

pub use contributor::Contributor;
pub use entity_ref::{EntityRef, StagedKey};
pub use identifier::{consolidate, Identifier, IdentifierFormat, IdentifierOwner, OwnerKind};
pub use ids::{ContributorId, IdentifierId, OrgId, PlanId, SchemeId, TemplateId};
pub use organization::Organization;
pub use plan::{ContributorKind, EthicalIssues, FundingStatus, Plan, PlanContributor};
pub use role::{ContributorRole, RoleParseError, RoleSet};
pub use scheme::{IdentifierScheme, SchemeContext};
pub use template::Template;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
