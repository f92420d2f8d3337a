//! Contributor resolution
//!
//! Matches by identifier, then by email, then builds a new contributor.
//! Matched contributors only ever gain data: blank fields are filled,
//! identifiers and roles are merged, an affiliation is set once.

use crate::dto::ContributorInput;
use crate::error::{EntityKind, ResolveError};
use crate::ports::DmpStore;
use crate::resolve::identifier::IdentifierResolver;
use crate::resolve::organization::OrganizationResolver;
use crate::resolve::role::RoleTranslator;
use crate::session::ResolutionSession;
use dmp_model::{Contributor, Identifier, IdentifierOwner, OwnerKind, RoleSet, StagedKey};
use std::sync::Arc;

/// A contributor staged in the session with the roles submitted for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedContributor {
    /// Session slot
    pub key: StagedKey,
    /// Roles translated from this submission only
    pub roles: RoleSet,
}

/// Finds or builds contributors from contact/contributor fragments
#[derive(Clone)]
pub struct ContributorResolver {
    store: Arc<dyn DmpStore>,
    identifiers: IdentifierResolver,
    orgs: OrganizationResolver,
    roles: RoleTranslator,
}

impl std::fmt::Debug for ContributorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributorResolver")
            .field("orgs", &self.orgs)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

impl ContributorResolver {
    /// Create resolver
    #[must_use]
    pub fn new(store: Arc<dyn DmpStore>, orgs: OrganizationResolver, roles: RoleTranslator) -> Self {
        Self {
            identifiers: IdentifierResolver::new(store.clone()),
            store,
            orgs,
            roles,
        }
    }

    /// Resolve a fragment into a staged contributor
    ///
    /// # Errors
    /// `InsufficientData` when the fragment carries no email, no name and
    /// no identifier, or when a new contributor would have neither a name
    /// nor an email; store failures otherwise
    pub async fn resolve(
        &self,
        session: &mut ResolutionSession,
        input: &ContributorInput,
    ) -> Result<ResolvedContributor, ResolveError> {
        let has_raw_id = input.contributor_ids.iter().any(|id| id.value().is_some());
        if input.email().is_none() && !input.has_name() && !has_raw_id {
            return Err(ResolveError::InsufficientData(EntityKind::Contributor));
        }

        let identifiers = self
            .identifiers
            .resolve_all(OwnerKind::Contributor, &input.contributor_ids)
            .await?;
        let (firstname, surname) = input.name_parts();

        let key = match self.by_identifiers(session, &identifiers).await? {
            Some(key) => key,
            None => match self.by_email(session, input.email()).await? {
                Some(key) => key,
                None => {
                    let mut contributor = Contributor::new();
                    contributor.fill_blanks(
                        firstname.as_deref(),
                        surname.as_deref(),
                        input.email(),
                        input.phone.as_deref(),
                    );
                    if !contributor.has_name_or_email() {
                        return Err(ResolveError::InsufficientData(EntityKind::Contributor));
                    }
                    tracing::debug!(contributor = %contributor.display_name(), "creating contributor");
                    session.stage_contributor(contributor)
                }
            },
        };

        let needs_org = session.contributor(key).is_some_and(|c| c.org.is_none());
        let org = match input.affiliation() {
            Some(affiliation) if needs_org => match self.orgs.resolve(session, affiliation).await {
                Ok(org_key) => Some(session.org_ref(org_key)),
                Err(err) if err.is_insufficient() => {
                    tracing::debug!("contributor affiliation too sparse, left unset");
                    None
                }
                Err(err) => return Err(err),
            },
            _ => None,
        };

        let roles = self.roles.translate_all(input.role.as_slice());
        let Some(contributor) = session.contributor_mut(key) else {
            return Err(ResolveError::InsufficientData(EntityKind::Contributor));
        };
        contributor.fill_blanks(
            firstname.as_deref(),
            surname.as_deref(),
            input.email(),
            input.phone.as_deref(),
        );
        if contributor.org.is_none() {
            contributor.org = org;
        }
        contributor.consolidate_identifiers(identifiers);
        contributor.roles.union_with(roles);

        Ok(ResolvedContributor { key, roles })
    }

    async fn by_identifiers(
        &self,
        session: &mut ResolutionSession,
        identifiers: &[Identifier],
    ) -> Result<Option<StagedKey>, ResolveError> {
        for identifier in identifiers {
            if let Some(IdentifierOwner::Contributor(id)) = identifier.owner {
                if let Some(key) = session.contributor_key_by_id(id) {
                    return Ok(Some(key));
                }
                if let Some(contributor) = self.store.contributor_by_id(id).await? {
                    tracing::debug!(contributor = %id, "contributor matched by identifier");
                    return Ok(Some(session.stage_contributor(contributor)));
                }
            }
            if let Some(key) = session.contributor_key_by_identifier(identifier.scheme_id, &identifier.value) {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    async fn by_email(
        &self,
        session: &mut ResolutionSession,
        email: Option<&str>,
    ) -> Result<Option<StagedKey>, ResolveError> {
        let Some(email) = email else {
            return Ok(None);
        };
        if let Some(key) = session.contributor_key_by_email(email) {
            return Ok(Some(key));
        }
        Ok(self.store.contributor_by_email(email).await?.map(|contributor| {
            tracing::debug!(contributor = ?contributor.id, "contributor matched by email");
            session.stage_contributor(contributor)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ROLE_ONTOLOGY_BASE_URL;
    use crate::dto::{AffiliationInput, IdentifierInput};
    use crate::memory::InMemoryStore;
    use crate::ports::{Changeset, NoopLookup};
    use dmp_model::{ContributorRole, EntityRef, IdentifierScheme, SchemeId};
    use std::time::Duration;

    fn store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.add_scheme(IdentifierScheme::new(SchemeId(1), "orcid").with_landing_url("https://orcid.org/"));
        store.add_scheme(IdentifierScheme::new(SchemeId(2), "ror").with_landing_url("https://ror.org/"));
        Arc::new(store)
    }

    fn resolver(store: Arc<InMemoryStore>) -> ContributorResolver {
        let orgs = OrganizationResolver::new(store.clone(), Arc::new(NoopLookup), Duration::from_millis(100), "en");
        ContributorResolver::new(store, orgs, RoleTranslator::new(DEFAULT_ROLE_ONTOLOGY_BASE_URL))
    }

    fn person(name: &str, mbox: &str) -> ContributorInput {
        ContributorInput {
            name: Some(name.into()),
            mbox: Some(mbox.into()),
            ..ContributorInput::default()
        }
    }

    #[tokio::test]
    async fn empty_fragment_is_insufficient() {
        let resolver = resolver(store());
        let mut session = ResolutionSession::new();
        let err = resolver
            .resolve(&mut session, &ContributorInput::default())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::InsufficientData(EntityKind::Contributor));
    }

    #[tokio::test]
    async fn identifier_alone_cannot_create_a_contributor() {
        let resolver = resolver(store());
        let mut session = ResolutionSession::new();
        let input = ContributorInput {
            contributor_ids: vec![IdentifierInput::new("orcid", "0000-0001")],
            ..ContributorInput::default()
        };
        let err = resolver.resolve(&mut session, &input).await.unwrap_err();
        assert!(err.is_insufficient());
        assert_eq!(session.contributor_count(), 0);
    }

    #[tokio::test]
    async fn identifier_alone_finds_a_stored_contributor() {
        let store = store();
        let mut jo = Contributor::new();
        jo.email = Some("jo@example.org".into());
        jo.identifiers.push(Identifier::new(SchemeId(1), "orcid", "0000-0001"));
        let receipt = store
            .seed(Changeset {
                contributors: vec![jo],
                ..Changeset::default()
            })
            .unwrap();

        let resolver = resolver(store);
        let mut session = ResolutionSession::new();
        let input = ContributorInput {
            contributor_ids: vec![IdentifierInput::new("orcid", "https://orcid.org/0000-0001")],
            ..ContributorInput::default()
        };
        let resolved = resolver.resolve(&mut session, &input).await.unwrap();
        assert_eq!(
            session.contributor_ref(resolved.key),
            EntityRef::Stored(receipt.contributor_ids[0])
        );
    }

    #[tokio::test]
    async fn email_match_is_case_insensitive_and_fills_blanks() {
        let store = store();
        let mut jo = Contributor::new();
        jo.email = Some("jo@example.org".into());
        jo.surname = Some("Existing".into());
        store
            .seed(Changeset {
                contributors: vec![jo],
                ..Changeset::default()
            })
            .unwrap();

        let resolver = resolver(store);
        let mut session = ResolutionSession::new();
        let mut input = person("Jo Submitted", "JO@EXAMPLE.ORG");
        input.phone = Some("+1 555".into());
        let resolved = resolver.resolve(&mut session, &input).await.unwrap();

        let contributor = session.contributor(resolved.key).unwrap();
        assert!(!contributor.is_new());
        assert_eq!(contributor.surname.as_deref(), Some("Existing"));
        assert_eq!(contributor.firstname.as_deref(), Some("Jo"));
        assert_eq!(contributor.phone.as_deref(), Some("+1 555"));
    }

    #[tokio::test]
    async fn roles_are_unioned_with_stored_ones() {
        let store = store();
        let mut jo = Contributor::new();
        jo.email = Some("jo@example.org".into());
        jo.roles.insert(ContributorRole::Investigation);
        store
            .seed(Changeset {
                contributors: vec![jo],
                ..Changeset::default()
            })
            .unwrap();

        let resolver = resolver(store);
        let mut session = ResolutionSession::new();
        let mut input = person("Jo", "jo@example.org");
        input.role = vec![
            "https://dictionary.casrai.org/Contributor_Roles/Data_curation".into(),
            "investigation".into(),
        ];
        let resolved = resolver.resolve(&mut session, &input).await.unwrap();

        assert_eq!(resolved.roles.len(), 2);
        let roles = session.contributor(resolved.key).unwrap().roles;
        assert!(roles.contains(ContributorRole::Investigation));
        assert!(roles.contains(ContributorRole::DataCuration));
        assert_eq!(roles.len(), 2);
    }

    #[tokio::test]
    async fn no_roles_means_the_default_role() {
        let resolver = resolver(store());
        let mut session = ResolutionSession::new();
        let resolved = resolver
            .resolve(&mut session, &person("Sam Roe", "sam@example.org"))
            .await
            .unwrap();
        assert_eq!(
            resolved.roles.iter().collect::<Vec<_>>(),
            vec![ContributorRole::WritingOriginalDraft]
        );
    }

    #[tokio::test]
    async fn affiliation_is_set_once() {
        let store = store();
        let resolver = resolver(store);
        let mut session = ResolutionSession::new();

        let mut input = person("Sam Roe", "sam@example.org");
        input.affiliations = vec![AffiliationInput {
            name: Some("First Org".into()),
            ..AffiliationInput::default()
        }];
        let first = resolver.resolve(&mut session, &input).await.unwrap();
        let org = session.contributor(first.key).unwrap().org;
        assert!(org.is_some());

        input.affiliations[0].name = Some("Second Org".into());
        let second = resolver.resolve(&mut session, &input).await.unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(session.contributor(second.key).unwrap().org, org);
        assert_eq!(session.org_count(), 1);
    }

    #[tokio::test]
    async fn sparse_affiliation_is_ignored() {
        let resolver = resolver(store());
        let mut session = ResolutionSession::new();
        let mut input = person("Sam Roe", "sam@example.org");
        input.affiliations = vec![AffiliationInput::default()];
        let resolved = resolver.resolve(&mut session, &input).await.unwrap();
        assert!(session.contributor(resolved.key).unwrap().org.is_none());
    }
}
