//! Reference data for a fresh store

use dmp_model::{IdentifierScheme, SchemeContext, SchemeId, Template, TemplateId};

/// Schemes a new deployment starts with
#[must_use]
pub fn standard_schemes() -> Vec<IdentifierScheme> {
    vec![
        IdentifierScheme::new(SchemeId(1), "orcid")
            .with_description("ORCID")
            .with_landing_url("https://orcid.org/")
            .with_context(SchemeContext::FOR_CONTRIBUTORS.with(SchemeContext::FOR_USERS)),
        IdentifierScheme::new(SchemeId(2), "ror")
            .with_description("Research Organization Registry")
            .with_landing_url("https://ror.org/")
            .with_context(SchemeContext::FOR_ORGS),
        IdentifierScheme::new(SchemeId(3), "fundref")
            .with_description("Crossref Funder Registry")
            .with_landing_url("https://doi.org/10.13039/")
            .with_context(SchemeContext::FOR_ORGS),
        IdentifierScheme::new(SchemeId(4), "grant")
            .with_description("Grant number")
            .with_context(SchemeContext::FOR_PLANS),
        IdentifierScheme::new(SchemeId(5), "doi")
            .with_description("Digital Object Identifier")
            .with_landing_url("https://doi.org/")
            .with_context(SchemeContext::FOR_PLANS),
        IdentifierScheme::new(SchemeId(6), "shibboleth")
            .with_description("Institutional single sign-on")
            .with_context(SchemeContext::FOR_AUTHENTICATION.with(SchemeContext::FOR_ORGS)),
    ]
}

/// Template used when a submission names none
#[must_use]
pub fn default_template() -> Template {
    Template::new(TemplateId(1), "Generic Data Management Plan").as_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_ids_and_names_are_unique() {
        let schemes = standard_schemes();
        for (i, a) in schemes.iter().enumerate() {
            for b in &schemes[i + 1..] {
                assert_ne!(a.id, b.id);
                assert!(!a.matches_name(&b.name));
            }
        }
    }

    #[test]
    fn shibboleth_is_not_a_plan_scheme() {
        let shibboleth = standard_schemes().into_iter().find(|s| s.name == "shibboleth").unwrap();
        assert!(!shibboleth.context.contains(SchemeContext::FOR_PLANS));
    }
}
