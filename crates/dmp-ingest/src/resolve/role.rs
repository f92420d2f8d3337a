//! Role vocabulary translation

use dmp_model::{ContributorRole, RoleSet};

/// Maps submitted role tokens (keywords or URIs) onto contributor roles
#[derive(Debug, Clone)]
pub struct RoleTranslator {
    base_url: String,
}

impl RoleTranslator {
    /// Translator stripping `base_url` from role URIs
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
        }
    }

    /// Translate one token; unknown tokens map to the default role
    #[must_use]
    pub fn translate(&self, token: &str) -> ContributorRole {
        let token = token.trim();
        let keyword = self
            .strip_base(token)
            .or_else(|| token.contains("://").then(|| last_segment(token)))
            .unwrap_or(token);

        let normalized: String = keyword
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        normalized.parse().unwrap_or_else(|_| {
            tracing::debug!(role = token, "unknown role, using default");
            ContributorRole::DEFAULT
        })
    }

    /// Translate every token; an empty submission yields the default role
    #[must_use]
    pub fn translate_all<S: AsRef<str>>(&self, tokens: &[S]) -> RoleSet {
        let mut roles: RoleSet = tokens
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !t.trim().is_empty())
            .map(|t| self.translate(t))
            .collect();
        if roles.is_empty() {
            roles.insert(ContributorRole::DEFAULT);
        }
        roles
    }

    fn strip_base<'a>(&self, token: &'a str) -> Option<&'a str> {
        if self.base_url.is_empty() {
            return None;
        }
        let head = token.get(..self.base_url.len())?;
        if !head.eq_ignore_ascii_case(&self.base_url) {
            return None;
        }
        Some(token[self.base_url.len()..].trim_start_matches('/'))
    }
}

fn last_segment(uri: &str) -> &str {
    uri.trim_end_matches('/')
        .rsplit(['/', '#'])
        .next()
        .unwrap_or(uri)
}
