//! Identifier schemes
//!
//! A scheme is a named identifier namespace (ORCID, ROR, DOI, ...) with an
//! optional landing URL that prefixes every value when it is shown to users.

use crate::ids::SchemeId;
use serde::{Deserialize, Serialize};

/// Where a scheme may be used
///
/// Bit set over the entity kinds a scheme applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeContext(u8);

impl SchemeContext {
    /// Usable for sign-in
    pub const FOR_AUTHENTICATION: Self = Self(1);
    /// Usable on organizations
    pub const FOR_ORGS: Self = Self(1 << 1);
    /// Usable on plans
    pub const FOR_PLANS: Self = Self(1 << 2);
    /// Usable on users
    pub const FOR_USERS: Self = Self(1 << 3);
    /// Usable on contributors
    pub const FOR_CONTRIBUTORS: Self = Self(1 << 4);

    /// No context
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every context
    #[inline]
    #[must_use]
    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    /// Union of two contexts
    #[inline]
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether every bit of `other` is set
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// A registered identifier namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierScheme {
    /// Store id
    pub id: SchemeId,
    /// Lower-case name used as the `type` of submitted identifiers
    pub name: String,
    /// Human readable description
    #[serde(default)]
    pub description: Option<String>,
    /// URL prefix of the scheme's public landing pages
    #[serde(default)]
    pub user_landing_url: Option<String>,
    /// Whether the scheme is active
    #[serde(default = "default_active")]
    pub active: bool,
    /// Entity kinds the scheme applies to
    #[serde(default)]
    pub context: SchemeContext,
}

fn default_active() -> bool {
    true
}

impl IdentifierScheme {
    /// Create an active scheme usable everywhere
    #[must_use]
    pub fn new(id: SchemeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into().to_lowercase(),
            description: None,
            user_landing_url: None,
            active: true,
            context: SchemeContext::all(),
        }
    }

    /// With landing URL
    #[inline]
    #[must_use]
    pub fn with_landing_url(mut self, url: impl Into<String>) -> Self {
        self.user_landing_url = Some(url.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: SchemeContext) -> Self {
        self.context = context;
        self
    }

    /// Case-insensitive name comparison
    #[inline]
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// Strip the landing URL from a submitted value
    ///
    /// `https://orcid.org/0000-0001` and `0000-0001` both yield `0000-0001`.
    /// The prefix is matched case-insensitively; the rest of the value keeps
    /// its case.
    #[must_use]
    pub fn strip_landing_url(&self, raw: &str) -> String {
        let value = raw.trim();
        let Some(landing) = self.landing_url() else {
            return value.to_string();
        };

        if let Some(rest) = strip_prefix_ci(value, landing) {
            return rest.trim_start_matches('/').to_string();
        }

        // Tolerate the other URL scheme (http vs https)
        for (from, to) in [("https://", "http://"), ("http://", "https://")] {
            if let Some(rest) = strip_prefix_ci(landing, from) {
                let alternate = format!("{to}{rest}");
                if let Some(rest) = strip_prefix_ci(value, &alternate) {
                    return rest.trim_start_matches('/').to_string();
                }
            }
        }

        value.to_string()
    }

    /// Re-apply the landing URL to a stored value
    #[must_use]
    pub fn landing_url_for(&self, value: &str) -> String {
        match self.landing_url() {
            Some(landing) if strip_prefix_ci(value, landing).is_none() => {
                if landing.ends_with('/') {
                    format!("{landing}{value}")
                } else {
                    format!("{landing}/{value}")
                }
            }
            _ => value.to_string(),
        }
    }

    /// Non-blank landing URL
    #[inline]
    #[must_use]
    pub fn landing_url(&self) -> Option<&str> {
        self.user_landing_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// ASCII case-insensitive `strip_prefix`
fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &value[prefix.len()..])
}
