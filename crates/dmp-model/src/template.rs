//! Plan templates
//!
//! Templates are authored elsewhere; ingestion only needs to know which ones
//! exist and which is the system default.

use crate::ids::TemplateId;
use serde::{Deserialize, Serialize};

/// A plan template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Store id
    pub id: TemplateId,
    /// Display title
    pub title: String,
    /// Whether this is the system default
    #[serde(default)]
    pub is_default: bool,
}

impl Template {
    /// Non-default template
    #[must_use]
    pub fn new(id: TemplateId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            is_default: false,
        }
    }

    /// Mark as the system default
    #[inline]
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}
