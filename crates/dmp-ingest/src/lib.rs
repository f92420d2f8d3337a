//! DMP Ingest - identity resolution for Data Management Plans
//!
//! Takes a heterogeneous, partially specified DMP document and resolves it
//! into a deduplicated graph of plans, organizations, contributors and
//! identifiers:
//! - Validates the raw document before anything is resolved
//! - Matches entities already in the store by identifier, name or email
//! - Merges identifiers without conflicts and creates missing entities
//! - Commits each submission atomically, retrying on uniqueness races
//!
//! # Example
//!
//! ```rust,ignore
//! use dmp_ingest::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! let resolver = PlanResolver::new(store, Arc::new(NoopLookup), IngestConfig::new());
//!
//! let dmp = serde_json::json!({
//!     "title": "T",
//!     "contact": {"name": "A B", "mbox": "a@b.co"},
//!     "project": {"title": "P"}
//! });
//! let outcome = resolver.ingest(&dmp, &IngestContext::create()).await?;
//! println!("plan {} created: {}", outcome.plan_id, outcome.created);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod lookup;
pub mod memory;
pub mod ports;
pub mod resolve;
pub mod session;
pub mod validation;

pub use config::{load_file, IngestConfig, DEFAULT_ROLE_ONTOLOGY_BASE_URL};
pub use dto::{
    parse_date, AffiliationInput, ContributorInput, DmpInput, FundingInput, IdentifierInput,
    ProjectInput,
};
pub use error::{
    ConfigError, EntityKind, IngestError, IngestResult, LookupError, ResolveError, StoreError,
};
pub use lookup::{CachedLookup, LookupCacheStats};
pub use memory::{InMemoryStore, Snapshot};
pub use ports::{Changeset, CommitReceipt, DmpStore, NoopLookup, OrgCandidate, OrgLookup};
pub use resolve::{
    Contract, ContributorResolver, IdentifierResolver, IngestContext, IngestOutcome,
    OrganizationResolver, PlanResolver, ResolvedContributor, RoleTranslator,
};
pub use session::ResolutionSession;
pub use validation::{ValidationGate, ValidationIssue};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running submissions
    pub use crate::{
        DmpStore, InMemoryStore, IngestConfig, IngestContext, IngestError, IngestOutcome,
        NoopLookup, OrgLookup, PlanResolver,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
