//! Pre-flight structural validation of a raw DMP document
//!
//! Runs before anything is resolved. Every problem found is reported with
//! a field path such as `dmp:contact:mbox`.

use crate::dto::parse_date;
use serde_json::{Map, Value};

/// Field-qualified validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path of the offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Structural checks over the raw JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationGate;

impl ValidationGate {
    /// Create the gate
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Collect every problem in `dmp`
    #[must_use]
    pub fn check(&self, dmp: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let Some(dmp) = dmp.as_object() else {
            issues.push(ValidationIssue::new("dmp", "must be an object"));
            return issues;
        };

        if text(dmp, "title").is_none() {
            issues.push(ValidationIssue::new("dmp:title", "is required"));
        }

        check_contact(dmp, &mut issues);
        check_dmp_ids(dmp, &mut issues);
        check_project(dmp, &mut issues);
        issues
    }

    /// Messages only, in field order of discovery
    #[must_use]
    pub fn errors(&self, dmp: &Value) -> Vec<String> {
        self.check(dmp).iter().map(ToString::to_string).collect()
    }
}

fn check_contact(dmp: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    match dmp.get("contact") {
        None | Some(Value::Null) => issues.push(ValidationIssue::new("dmp:contact", "is required")),
        Some(Value::Object(contact)) => {
            if text(contact, "mbox").is_none() {
                issues.push(ValidationIssue::new("dmp:contact:mbox", "is required"));
            }
            if ["name", "firstname", "surname"]
                .iter()
                .all(|key| text(contact, key).is_none())
            {
                issues.push(ValidationIssue::new("dmp:contact:name", "is required"));
            }
        }
        Some(_) => issues.push(ValidationIssue::new("dmp:contact", "must be an object")),
    }
}

fn check_dmp_ids(dmp: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    for key in ["dmp_id", "dmp_ids"] {
        let entries: Vec<&Value> = match dmp.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => vec![other],
        };
        for entry in entries {
            let Some(entry) = entry.as_object() else {
                issues.push(ValidationIssue::new(format!("dmp:{key}"), "entries must be objects"));
                continue;
            };
            if text(entry, "type").is_none() {
                issues.push(ValidationIssue::new(format!("dmp:{key}:type"), "is required"));
            }
            if text(entry, "identifier").is_none() {
                issues.push(ValidationIssue::new(format!("dmp:{key}:identifier"), "is required"));
            }
        }
    }
}

fn check_project(dmp: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let project = match dmp.get("project") {
        Some(Value::Object(project)) if !project.is_empty() => project,
        Some(Value::Array(items)) => match items.first() {
            Some(Value::Object(project)) if !project.is_empty() => project,
            _ => {
                issues.push(ValidationIssue::new("dmp:project", "is required"));
                return;
            }
        },
        _ => {
            issues.push(ValidationIssue::new("dmp:project", "is required"));
            return;
        }
    };

    let start = date_field(project, &["start", "start_on"], "dmp:project:start", issues);
    let end = date_field(project, &["end", "end_on"], "dmp:project:end", issues);
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            issues.push(ValidationIssue::new("dmp:project:end", "must not be before the start"));
        }
    }

    match project.get("funding") {
        None | Some(Value::Null | Value::Array(_)) => {}
        Some(_) => issues.push(ValidationIssue::new("dmp:project:funding", "must be a list")),
    }
}

fn date_field(
    project: &Map<String, Value>,
    keys: &[&str],
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<chrono::NaiveDate> {
    let raw = keys.iter().find_map(|key| text(project, key))?;
    let parsed = parse_date(raw);
    if parsed.is_none() {
        issues.push(ValidationIssue::new(field, "is not a valid date"));
    }
    parsed
}

fn text<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn errors(value: Value) -> Vec<String> {
        ValidationGate::new().errors(&value)
    }

    #[test]
    fn minimal_document_passes() {
        let dmp = json!({
            "title": "T",
            "contact": {"name": "A B", "mbox": "a@b.co"},
            "project": {"title": "P"}
        });
        assert!(errors(dmp).is_empty());
    }

    #[test]
    fn reports_every_missing_field() {
        assert_eq!(
            errors(json!({"contact": {"mbox": " "}})),
            vec![
                "dmp:title is required",
                "dmp:contact:mbox is required",
                "dmp:contact:name is required",
                "dmp:project is required",
            ]
        );
    }

    #[test]
    fn surname_alone_names_the_contact() {
        let dmp = json!({
            "title": "T",
            "contact": {"surname": "B", "mbox": "a@b.co"},
            "project": [{"title": "P"}]
        });
        assert!(errors(dmp).is_empty());
    }

    #[test]
    fn empty_project_is_rejected() {
        let dmp = json!({"title": "T", "contact": {"name": "A", "mbox": "a@b"}, "project": []});
        assert_eq!(errors(dmp), vec!["dmp:project is required"]);
    }

    #[test]
    fn dmp_ids_need_type_and_identifier() {
        let dmp = json!({
            "title": "T",
            "contact": {"name": "A", "mbox": "a@b"},
            "project": {"title": "P"},
            "dmp_ids": [{"type": "doi"}, {"identifier": "x"}]
        });
        assert_eq!(
            errors(dmp),
            vec!["dmp:dmp_ids:identifier is required", "dmp:dmp_ids:type is required"]
        );
    }

    #[test]
    fn dates_and_funding_shape() {
        let dmp = json!({
            "title": "T",
            "contact": {"name": "A", "mbox": "a@b"},
            "project": {"start": "2025-01-01", "end": "2024-01-01", "funding": {"name": "NSF"}}
        });
        assert_eq!(
            errors(dmp),
            vec!["dmp:project:end must not be before the start", "dmp:project:funding must be a list"]
        );

        let bad_date = json!({
            "title": "T",
            "contact": {"name": "A", "mbox": "a@b"},
            "project": {"start_on": "soon"}
        });
        assert_eq!(errors(bad_date), vec!["dmp:project:start is not a valid date"]);
    }

    #[test]
    fn non_object_document() {
        assert_eq!(errors(json!([1, 2])), vec!["dmp must be an object"]);
    }
}
