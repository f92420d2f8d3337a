//! DMP API - ingestion contracts over the resolution core
//!
//! Wraps [`dmp_ingest::PlanResolver`] in the two public contracts:
//! - v1 batch create, each item resolved independently
//! - v2 single create/update, requiring an owning organization
//!
//! plus plan retrieval with the canonical presenter, pagination, the
//! response envelope and a ROR-backed organization lookup.
//!
//! # Example
//!
//! ```rust,ignore
//! use dmp_api::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(InMemoryStore::new());
//! let service = ApiService::new(store, Arc::new(NoopLookup), ApiConfig::new());
//!
//! let caller = Caller::new("sample client");
//! let body = r#"{"dmp": {"title": "T", "contact": {"name": "A B", "mbox": "a@b.co"}, "project": {"title": "P"}}}"#;
//! let response = service.create_v2(Some(&caller), body).await;
//! println!("{}", response.status);
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod pagination;
pub mod presenter;
pub mod response;
pub mod ror;
pub mod service;

pub use bootstrap::{default_template, standard_schemes};
pub use config::{ApiConfig, RorConfig, DEFAULT_ROR_URL};
pub use error::{ApiError, ApiResult};
pub use pagination::Pagination;
pub use presenter::{
    AffiliationView, ContactView, ContributorView, FundingView, IdentifierView, PlanPresenter,
    PlanView, ProjectView,
};
pub use response::{format_time, ResponseEnvelope, StatusClass, TIME_FORMAT};
pub use ror::RorLookup;
pub use service::{ApiResponse, ApiService, Caller};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for serving the contracts
    pub use crate::{ApiConfig, ApiResponse, ApiService, Caller, StatusClass};
    pub use dmp_ingest::{InMemoryStore, NoopLookup};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
