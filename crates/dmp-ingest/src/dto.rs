//! Typed view of a submitted DMP document
//!
//! The raw JSON is parsed into these structs exactly once. Both contract
//! versions are accepted, so most collections take either a single object or
//! a list, and several fields answer to more than one key.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// `{type, identifier}` pair as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentifierInput {
    /// Scheme name
    #[serde(default, rename = "type", deserialize_with = "loose_string")]
    pub kind: Option<String>,
    /// Value, possibly prefixed with the scheme's landing URL
    #[serde(default, deserialize_with = "loose_string")]
    pub identifier: Option<String>,
}

impl IdentifierInput {
    /// Convenience constructor
    #[must_use]
    pub fn new(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            identifier: Some(identifier.into()),
        }
    }

    /// Trimmed, non-blank type
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        non_blank(self.kind.as_deref())
    }

    /// Trimmed, non-blank value
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        non_blank(self.identifier.as_deref())
    }
}

/// Affiliation (organization) fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AffiliationInput {
    /// Organization name
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    /// Short name
    #[serde(default, deserialize_with = "loose_string")]
    pub abbreviation: Option<String>,
    /// Organization identifiers
    #[serde(
        default,
        alias = "affiliation_id",
        alias = "funder_ids",
        alias = "funder_id",
        deserialize_with = "one_or_many"
    )]
    pub affiliation_ids: Vec<IdentifierInput>,
}

/// Contact or contributor fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContributorInput {
    /// Combined name
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    /// Given name
    #[serde(default, deserialize_with = "loose_string")]
    pub firstname: Option<String>,
    /// Family name
    #[serde(default, deserialize_with = "loose_string")]
    pub surname: Option<String>,
    /// Email
    #[serde(default, deserialize_with = "loose_string")]
    pub mbox: Option<String>,
    /// Phone
    #[serde(default, deserialize_with = "loose_string")]
    pub phone: Option<String>,
    /// Role keywords or URIs
    #[serde(default, alias = "roles", deserialize_with = "one_or_many")]
    pub role: Vec<String>,
    /// Affiliations, first one used
    #[serde(default, alias = "affiliation", deserialize_with = "one_or_many")]
    pub affiliations: Vec<AffiliationInput>,
    /// Person identifiers
    #[serde(
        default,
        alias = "contributor_id",
        alias = "contact_id",
        alias = "contact_ids",
        deserialize_with = "one_or_many"
    )]
    pub contributor_ids: Vec<IdentifierInput>,
}

impl ContributorInput {
    /// Non-blank email
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        non_blank(self.mbox.as_deref())
    }

    /// `(firstname, surname)`, splitting the combined name when needed
    #[must_use]
    pub fn name_parts(&self) -> (Option<String>, Option<String>) {
        let first = non_blank(self.firstname.as_deref()).map(str::to_string);
        let last = non_blank(self.surname.as_deref()).map(str::to_string);
        if first.is_some() || last.is_some() {
            return (first, last);
        }
        match non_blank(self.name.as_deref()) {
            Some(name) => dmp_model::Contributor::split_name(name),
            None => (None, None),
        }
    }

    /// Whether a surname or combined name is present
    #[must_use]
    pub fn has_name(&self) -> bool {
        non_blank(self.surname.as_deref()).is_some()
            || non_blank(self.name.as_deref()).is_some()
            || non_blank(self.firstname.as_deref()).is_some()
    }

    /// First affiliation
    #[must_use]
    pub fn affiliation(&self) -> Option<&AffiliationInput> {
        self.affiliations.first()
    }
}

/// Funding fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FundingInput {
    /// Funder name
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    /// Funder identifiers
    #[serde(
        default,
        alias = "funder_id",
        alias = "affiliation_ids",
        alias = "affiliation_id",
        deserialize_with = "one_or_many"
    )]
    pub funder_ids: Vec<IdentifierInput>,
    /// Grant identifiers
    #[serde(default, alias = "grant_id", deserialize_with = "one_or_many")]
    pub grant_ids: Vec<IdentifierInput>,
    /// Submitted status, informational only
    #[serde(default, deserialize_with = "loose_string")]
    pub funding_status: Option<String>,
}

impl FundingInput {
    /// Funder as an affiliation fragment
    #[must_use]
    pub fn funder(&self) -> AffiliationInput {
        AffiliationInput {
            name: self.name.clone(),
            abbreviation: None,
            affiliation_ids: self.funder_ids.clone(),
        }
    }
}

/// Project fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectInput {
    /// Project title
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    /// Project description
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    /// Start date
    #[serde(default, alias = "start_on", deserialize_with = "loose_string")]
    pub start: Option<String>,
    /// End date
    #[serde(default, alias = "end_on", deserialize_with = "loose_string")]
    pub end: Option<String>,
    /// Funding entries, first one used
    #[serde(default, deserialize_with = "one_or_many")]
    pub funding: Vec<FundingInput>,
}

/// A submitted DMP
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DmpInput {
    /// Plan title
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    /// Plan description
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    /// Language code
    #[serde(default, deserialize_with = "loose_string")]
    pub language: Option<String>,
    /// Plan identifiers
    #[serde(default, alias = "dmp_ids", deserialize_with = "one_or_many")]
    pub dmp_id: Vec<IdentifierInput>,
    /// Primary contact
    #[serde(default)]
    pub contact: Option<ContributorInput>,
    /// Other contributors
    #[serde(default, alias = "contributor", deserialize_with = "one_or_many")]
    pub contributors: Vec<ContributorInput>,
    /// Project, first one used
    #[serde(default, deserialize_with = "one_or_many")]
    pub project: Vec<ProjectInput>,
    /// `yes`, `no` or `unknown`
    #[serde(default, deserialize_with = "loose_string")]
    pub ethical_issues_exist: Option<String>,
    /// Ethical issues description
    #[serde(default, deserialize_with = "loose_string")]
    pub ethical_issues_description: Option<String>,
    /// Link to an ethical issues report
    #[serde(default, deserialize_with = "loose_string")]
    pub ethical_issues_report: Option<String>,
    /// Application-namespaced extensions
    #[serde(default, deserialize_with = "one_or_many")]
    pub extended_attributes: Vec<IndexMap<String, Value>>,
}

impl DmpInput {
    /// Parse from an already validated JSON value
    ///
    /// # Errors
    /// Returns the serde error when a field has an unusable type
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Trimmed, non-blank title
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    /// First project
    #[must_use]
    pub fn project(&self) -> Option<&ProjectInput> {
        self.project.first()
    }

    /// First funding entry of the first project
    #[must_use]
    pub fn funding(&self) -> Option<&FundingInput> {
        self.project().and_then(|project| project.funding.first())
    }

    /// Plan description, falling back to the project description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
            .or_else(|| self.project().and_then(|p| non_blank(p.description.as_deref())))
    }

    /// Template id under this application's extension key
    ///
    /// Accepts `{app: {template_id: N}}` and `{app: {template: {id: N}}}`,
    /// with `N` a number or a numeric string.
    #[must_use]
    pub fn template_id(&self, application_name: &str) -> Option<u64> {
        self.extended_attributes
            .iter()
            .flat_map(|map| map.iter())
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case(application_name))
            .find_map(|(_, ext)| {
                ext.get("template_id")
                    .or_else(|| ext.get("template").and_then(|t| t.get("id")))
                    .and_then(value_as_u64)
            })
    }
}

/// Parse a submitted date
///
/// Accepts RFC 3339 timestamps, plain `YYYY-MM-DD` dates and the
/// `YYYY-MM-DD HH:MM:SS UTC` form.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    raw.strip_suffix("UTC")
        .map(str::trim_end)
        .and_then(|ts| NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").ok())
        .map(|ts| ts.date())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept a single item, a list, or null
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
        Nothing(Option<()>),
    }

    Ok(match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
        OneOrMany::Nothing(_) => Vec::new(),
    })
}

/// Accept strings, numbers and booleans as text
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
