//! Resolvers
//!
//! Each resolver turns one fragment of a submission into staged entities
//! inside a [`ResolutionSession`](crate::session::ResolutionSession).
//! [`PlanResolver`] drives the others and commits the result.

pub mod contributor;
pub mod identifier;
pub mod organization;
pub mod plan;
pub mod role;

pub use contributor::{ContributorResolver, ResolvedContributor};
pub use identifier::IdentifierResolver;
pub use organization::OrganizationResolver;
pub use plan::{Contract, IngestContext, IngestOutcome, PlanResolver};
pub use role::RoleTranslator;
