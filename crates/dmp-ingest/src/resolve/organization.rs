//! Organization resolution
//!
//! Order of preference:
//! 1. an affiliation identifier already owned by an organization
//! 2. case-insensitive exact name match in the store
//! 3. the best close match from the external lookup
//! 4. a new organization built from the submitted name

use crate::dto::{AffiliationInput, IdentifierInput};
use crate::error::{EntityKind, ResolveError};
use crate::ports::{DmpStore, OrgCandidate, OrgLookup};
use crate::resolve::identifier::IdentifierResolver;
use crate::session::ResolutionSession;
use dmp_model::{Identifier, IdentifierOwner, Organization, OwnerKind, StagedKey};
use std::sync::Arc;
use std::time::Duration;

/// Finds or builds organizations from affiliation fragments
#[derive(Clone)]
pub struct OrganizationResolver {
    store: Arc<dyn DmpStore>,
    lookup: Arc<dyn OrgLookup>,
    identifiers: IdentifierResolver,
    lookup_timeout: Duration,
    default_language: String,
}

impl std::fmt::Debug for OrganizationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationResolver")
            .field("lookup_timeout", &self.lookup_timeout)
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}

impl OrganizationResolver {
    /// Create resolver
    #[must_use]
    pub fn new(
        store: Arc<dyn DmpStore>,
        lookup: Arc<dyn OrgLookup>,
        lookup_timeout: Duration,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            identifiers: IdentifierResolver::new(store.clone()),
            store,
            lookup,
            lookup_timeout,
            default_language: default_language.into(),
        }
    }

    /// Resolve an affiliation into a staged organization
    ///
    /// # Errors
    /// `InsufficientData` when no identifier matched and no name was given;
    /// store failures otherwise
    pub async fn resolve(
        &self,
        session: &mut ResolutionSession,
        affiliation: &AffiliationInput,
    ) -> Result<StagedKey, ResolveError> {
        let identifiers = self
            .identifiers
            .resolve_all(OwnerKind::Org, &affiliation.affiliation_ids)
            .await?;

        let key = match self.by_identifiers(session, &identifiers).await? {
            Some(key) => key,
            None => {
                let name = affiliation
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or(ResolveError::InsufficientData(EntityKind::Organization))?;
                self.by_name_or_lookup(session, name).await?
            }
        };

        let Some(org) = session.org_mut(key) else {
            return Err(ResolveError::InsufficientData(EntityKind::Organization));
        };
        let added = org.consolidate_identifiers(identifiers);
        if let Some(abbreviation) = affiliation
            .abbreviation
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
        {
            let blank = org.abbreviation.as_deref().map_or(true, |a| a.trim().is_empty());
            if org.is_new() || blank {
                org.abbreviation = Some(abbreviation.to_string());
            }
        }
        if org.is_new() && org.language.is_none() {
            org.language = Some(self.default_language.clone());
        }
        tracing::debug!(org = %org.name, identifiers_added = added, "organization resolved");
        Ok(key)
    }

    /// First identifier pointing at an organization, in the session or the store
    async fn by_identifiers(
        &self,
        session: &mut ResolutionSession,
        identifiers: &[Identifier],
    ) -> Result<Option<StagedKey>, ResolveError> {
        for identifier in identifiers {
            if let Some(IdentifierOwner::Org(id)) = identifier.owner {
                if let Some(key) = session.org_key_by_id(id) {
                    return Ok(Some(key));
                }
                if let Some(org) = self.store.org_by_id(id).await? {
                    tracing::debug!(org = %org.name, "organization matched by identifier");
                    return Ok(Some(session.stage_org(org)));
                }
            }
            if let Some(key) = session.org_key_by_identifier(identifier.scheme_id, &identifier.value) {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    async fn by_name(
        &self,
        session: &mut ResolutionSession,
        name: &str,
    ) -> Result<Option<StagedKey>, ResolveError> {
        if let Some(key) = session.org_key_by_name(name) {
            return Ok(Some(key));
        }
        Ok(self
            .store
            .org_by_name(name)
            .await?
            .map(|org| session.stage_org(org)))
    }

    async fn by_name_or_lookup(
        &self,
        session: &mut ResolutionSession,
        name: &str,
    ) -> Result<StagedKey, ResolveError> {
        if let Some(key) = self.by_name(session, name).await? {
            tracing::debug!(org = name, "organization matched by name");
            return Ok(key);
        }

        let candidates = self.search(name).await;
        if let Some(candidate) = candidates.into_iter().find(OrgCandidate::is_close_match) {
            return self.from_candidate(session, candidate).await;
        }

        tracing::debug!(org = name, "creating organization from submitted name");
        Ok(session.stage_org(Organization::new(name)))
    }

    async fn from_candidate(
        &self,
        session: &mut ResolutionSession,
        candidate: OrgCandidate,
    ) -> Result<StagedKey, ResolveError> {
        let identifiers = self.resolve_candidate_ids(&candidate.identifiers).await?;
        if let Some(key) = self.by_identifiers(session, &identifiers).await? {
            return Ok(key);
        }
        if let Some(key) = self.by_name(session, &candidate.name).await? {
            return Ok(key);
        }

        tracing::debug!(org = %candidate.name, weight = candidate.weight, "creating organization from lookup candidate");
        let mut org = Organization::new(candidate.name);
        org.abbreviation = candidate.abbreviation;
        org.consolidate_identifiers(identifiers);
        Ok(session.stage_org(org))
    }

    async fn resolve_candidate_ids(&self, inputs: &[IdentifierInput]) -> Result<Vec<Identifier>, ResolveError> {
        Ok(self.identifiers.resolve_all(OwnerKind::Org, inputs).await?)
    }

    /// External search, time-boxed; failures count as no candidates
    async fn search(&self, name: &str) -> Vec<OrgCandidate> {
        match tokio::time::timeout(self.lookup_timeout, self.lookup.search(name)).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(err)) => {
                tracing::warn!(org = name, error = %err, "organization lookup failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(org = name, timeout = ?self.lookup_timeout, "organization lookup timed out");
                Vec::new()
            }
        }
    }
}
