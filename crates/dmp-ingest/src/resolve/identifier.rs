//! Identifier resolution against the scheme registry

use crate::dto::IdentifierInput;
use crate::error::StoreError;
use crate::ports::DmpStore;
use dmp_model::{Identifier, OwnerKind};
use std::sync::Arc;

/// Normalizes `{type, identifier}` pairs and finds or builds identifiers
///
/// Only consults the store; never calls external services.
#[derive(Clone)]
pub struct IdentifierResolver {
    store: Arc<dyn DmpStore>,
}

impl std::fmt::Debug for IdentifierResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierResolver").finish_non_exhaustive()
    }
}

impl IdentifierResolver {
    /// Create resolver
    #[must_use]
    pub fn new(store: Arc<dyn DmpStore>) -> Self {
        Self { store }
    }

    /// Resolve one pair for an owner kind
    ///
    /// Returns `None` for a blank type, a blank value or an unknown scheme.
    /// An existing identifier keyed on `(owner_kind, scheme, value)` is
    /// returned as stored; otherwise a new, unattached one is built.
    ///
    /// # Errors
    /// Propagates store failures
    pub async fn resolve(
        &self,
        owner_kind: OwnerKind,
        input: &IdentifierInput,
    ) -> Result<Option<Identifier>, StoreError> {
        let (Some(kind), Some(raw)) = (input.kind(), input.value()) else {
            return Ok(None);
        };
        let Some(scheme) = self.store.scheme_by_name(kind).await? else {
            tracing::debug!(scheme = kind, "unknown identifier scheme");
            return Ok(None);
        };

        let value = scheme.strip_landing_url(raw);
        if value.is_empty() {
            return Ok(None);
        }

        if let Some(existing) = self.store.find_identifier(owner_kind, scheme.id, &value).await? {
            return Ok(Some(existing));
        }
        Ok(Some(Identifier::new(scheme.id, scheme.name, value)))
    }

    /// Resolve every pair, dropping the ones that do not resolve
    ///
    /// # Errors
    /// Propagates store failures
    pub async fn resolve_all(
        &self,
        owner_kind: OwnerKind,
        inputs: &[IdentifierInput],
    ) -> Result<Vec<Identifier>, StoreError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            if let Some(identifier) = self.resolve(owner_kind, input).await? {
                if !resolved.iter().any(|r: &Identifier| r.same_key(&identifier)) {
                    resolved.push(identifier);
                }
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::ports::Changeset;
    use dmp_model::{IdentifierOwner, IdentifierScheme, Organization, SchemeId};
    use proptest::prelude::*;

    fn store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.add_scheme(IdentifierScheme::new(SchemeId(1), "orcid").with_landing_url("https://orcid.org/"));
        store.add_scheme(IdentifierScheme::new(SchemeId(2), "ror").with_landing_url("https://ror.org/"));
        store.add_scheme(IdentifierScheme::new(SchemeId(3), "grant"));
        Arc::new(store)
    }

    #[tokio::test]
    async fn blank_or_unknown_input_does_not_resolve() {
        let resolver = IdentifierResolver::new(store());
        for input in [
            IdentifierInput::new("", "0000"),
            IdentifierInput::new("orcid", "  "),
            IdentifierInput::new("isni", "0000"),
            IdentifierInput::default(),
        ] {
            assert_eq!(resolver.resolve(OwnerKind::Contributor, &input).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn scheme_name_is_case_insensitive() {
        let resolver = IdentifierResolver::new(store());
        let id = resolver
            .resolve(OwnerKind::Contributor, &IdentifierInput::new("ORCID", "https://orcid.org/0000-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id.scheme_name, "orcid");
        assert_eq!(id.value, "0000-1");
        assert!(id.is_new());
    }

    #[tokio::test]
    async fn prefers_the_stored_identifier() {
        let store = store();
        let mut org = Organization::new("Org");
        org.identifiers.push(Identifier::new(SchemeId(2), "ror", "03yrm5c26"));
        let receipt = store.seed(Changeset::orgs(vec![org])).unwrap();

        let resolver = IdentifierResolver::new(store);
        let id = resolver
            .resolve(OwnerKind::Org, &IdentifierInput::new("ror", "https://ror.org/03yrm5c26"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id.owner, Some(IdentifierOwner::Org(receipt.org_ids[0])));

        // Same pair for another owner kind is a different identifier
        let other = resolver
            .resolve(OwnerKind::Plan, &IdentifierInput::new("ror", "03yrm5c26"))
            .await
            .unwrap()
            .unwrap();
        assert!(other.owner.is_none());
    }

    #[tokio::test]
    async fn resolve_all_compacts_failures_and_duplicates() {
        let resolver = IdentifierResolver::new(store());
        let ids = resolver
            .resolve_all(
                OwnerKind::Plan,
                &[
                    IdentifierInput::new("grant", "G-1"),
                    IdentifierInput::new("bogus", "x"),
                    IdentifierInput::new("grant", " G-1 "),
                ],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
    }

    proptest! {
        #[test]
        fn landing_url_and_bare_value_resolve_identically(value in "[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let resolver = IdentifierResolver::new(store());
            let (bare, prefixed) = rt.block_on(async {
                let bare = resolver
                    .resolve(OwnerKind::Contributor, &IdentifierInput::new("orcid", value.clone()))
                    .await
                    .unwrap();
                let prefixed = resolver
                    .resolve(
                        OwnerKind::Contributor,
                        &IdentifierInput::new("orcid", format!("https://orcid.org/{value}")),
                    )
                    .await
                    .unwrap();
                (bare, prefixed)
            });
            prop_assert_eq!(bare.map(|i| i.value), prefixed.map(|i| i.value));
        }
    }
}
