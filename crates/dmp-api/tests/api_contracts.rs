//! End-to-end checks of the v1 and v2 contracts against the in-memory store
//!
//! Every test drives `ApiService` with raw request bodies and inspects the
//! serialized envelope the way an API client would.

use dmp_api::{ApiConfig, ApiService, Caller, StatusClass};
use dmp_ingest::{Changeset, DmpStore, InMemoryStore, NoopLookup};
use dmp_model::{Organization, PlanId};
use dmp_test_utils::{complete_dmp, minimal_dmp, seeded_store, test_config, SHIBBOLETH};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

const PLAN_URL_BASE: &str = "https://dmp.example.org/api/v2/plans/";

fn service(store: Arc<InMemoryStore>) -> ApiService {
    let config = ApiConfig::new()
        .with_ingest(test_config())
        .with_plan_url_base(PLAN_URL_BASE);
    ApiService::new(store, Arc::new(NoopLookup), config)
}

fn client() -> Caller {
    Caller::new("sample client")
}

fn v2_body(dmp: Value) -> String {
    json!({ "dmp": dmp }).to_string()
}

fn v1_body(dmps: Vec<Value>) -> String {
    let items: Vec<Value> = dmps.into_iter().map(|dmp| json!({ "dmp": dmp })).collect();
    json!({ "total_items": items.len(), "items": items }).to_string()
}

fn plan_id_of(item: &Value) -> PlanId {
    let url = item["dmp_ids"][0]["identifier"].as_str().unwrap();
    url.rsplit('/').next().unwrap().parse().unwrap()
}

/// A complete document renders with every identifier in its public form
#[tokio::test]
async fn v2_create_renders_the_canonical_plan() {
    let store = seeded_store();
    let response = service(store.clone())
        .create_v2(Some(&client()), &v2_body(complete_dmp()))
        .await;
    assert_eq!(response.status, StatusClass::Created);

    let body = response.to_json().unwrap();
    assert_eq!(body["code"], json!(201));
    assert_eq!(body["caller"], json!("sample client"));
    assert_eq!(body["total_items"], json!(1));

    let plan = &body["items"][0];
    assert_eq!(plan["title"], json!("Coastal Sediment Survey"));
    assert_eq!(plan["ethical_issues_exist"], json!("no"));
    assert_eq!(plan["dmp_ids"][0]["type"], json!("dmproadmap"));
    assert!(plan["dmp_ids"][0]["identifier"].as_str().unwrap().starts_with(PLAN_URL_BASE));
    assert_eq!(
        plan["dmp_ids"][1],
        json!({"type": "doi", "identifier": "https://doi.org/10.48321/D1ABC"})
    );

    assert_eq!(plan["contact"]["name"], json!("Jane Doe"));
    assert_eq!(
        plan["contact"]["contact_id"],
        json!({"type": "orcid", "identifier": "https://orcid.org/0000-0002-1825-0097"})
    );
    assert_eq!(
        plan["contact"]["affiliation"],
        json!({
            "name": "University of Nowhere",
            "abbreviation": "UoN",
            "affiliation_id": {"type": "ror", "identifier": "https://ror.org/03yrm5c26"}
        })
    );

    assert_eq!(plan["contributor"].as_array().unwrap().len(), 1);
    assert_eq!(
        plan["contributor"][0]["role"],
        json!([
            "https://dictionary.casrai.org/Contributor_Roles/Investigation",
            "https://dictionary.casrai.org/Contributor_Roles/Software"
        ])
    );

    let project = &plan["project"][0];
    assert_eq!(project["start"], json!("2025-01-01"));
    assert_eq!(project["end"], json!("2027-12-31"));
    assert_eq!(
        project["funding"],
        json!([{
            "name": "National Science Agency",
            "funder_ids": [{"type": "fundref", "identifier": "https://doi.org/10.13039/100000001"}],
            "grant_ids": [{"type": "grant", "identifier": "NSA-2025-0042"}],
            "funding_status": "granted"
        }])
    );
    assert_eq!(plan["extended_attributes"], json!({"dmproadmap": {"template_id": 2}}));
}

/// Feeding a rendered plan back through update resolves to the same graph
#[tokio::test]
async fn rendered_plan_round_trips_through_update() {
    let store = seeded_store();
    let service = service(store.clone());
    let created = service
        .create_v2(Some(&client()), &v2_body(complete_dmp()))
        .await
        .to_json()
        .unwrap();
    let rendered = created["items"][0].clone();
    let plan_id = plan_id_of(&rendered);
    let counts = (store.plan_count(), store.org_count(), store.contributor_count());

    let updated = service
        .update_v2(Some(&client()), plan_id, &v2_body(rendered.clone()))
        .await;
    assert_eq!(updated.status, StatusClass::Ok);
    assert_eq!(
        (store.plan_count(), store.org_count(), store.contributor_count()),
        counts
    );

    let again = updated.to_json().unwrap();
    assert_eq!(again["items"][0]["dmp_ids"], rendered["dmp_ids"]);
    assert_eq!(again["items"][0]["contact"], rendered["contact"]);
    assert_eq!(again["items"][0]["project"], rendered["project"]);
}

/// Update by path id works even when the body carries no ids of its own
#[tokio::test]
async fn update_is_addressed_by_the_path_id() {
    let store = seeded_store();
    let service = service(store.clone());
    let caller = client();
    let mut dmp = minimal_dmp();
    dmp["contact"]["affiliation"] = json!({"name": "University of Nowhere"});

    let created = service.create_v2(Some(&caller), &v2_body(dmp.clone())).await.to_json().unwrap();
    let plan_id = plan_id_of(&created["items"][0]);

    dmp["title"] = json!("Renamed");
    let updated = service.update_v2(Some(&caller), plan_id, &v2_body(dmp)).await;
    assert_eq!(updated.status, StatusClass::Ok);
    assert_eq!(store.plan_count(), 1);
    assert_eq!(store.plan_by_id(plan_id).await.unwrap().unwrap().title, "Renamed");
}

#[tokio::test]
async fn update_of_unknown_plan_is_not_found() {
    let store = seeded_store();
    let mut dmp = minimal_dmp();
    dmp["contact"]["affiliation"] = json!({"name": "University of Nowhere"});

    let response = service(store.clone())
        .update_v2(Some(&client()), PlanId(999), &v2_body(dmp))
        .await;
    assert_eq!(response.status, StatusClass::NotFound);
    assert_eq!(store.plan_count(), 0);
}

/// A body id owned by an existing plan cannot redirect an update to a missing one
#[tokio::test]
async fn update_of_missing_plan_never_touches_the_plan_its_ids_name() {
    let store = seeded_store();
    let service = service(store.clone());
    let created = service.create_v2(Some(&client()), &v2_body(complete_dmp())).await.to_json().unwrap();
    let existing = plan_id_of(&created["items"][0]);

    let mut dmp = complete_dmp();
    dmp["title"] = json!("Overwritten");
    let response = service.update_v2(Some(&client()), PlanId(999), &v2_body(dmp)).await;

    assert_eq!(response.status, StatusClass::NotFound);
    assert_eq!(response.envelope.errors, vec!["Plan not found".to_string()]);
    assert_eq!(
        store.plan_by_id(existing).await.unwrap().unwrap().title,
        "Coastal Sediment Survey"
    );
}

/// Ids that belong to a different plan than the path names are rejected
#[tokio::test]
async fn update_with_ids_of_another_plan_is_a_bad_request() {
    let store = seeded_store();
    let service = service(store.clone());
    let first = service.create_v2(Some(&client()), &v2_body(complete_dmp())).await.to_json().unwrap();
    let first = plan_id_of(&first["items"][0]);

    let mut other = minimal_dmp();
    other["title"] = json!("Second");
    other["contact"]["affiliation"] = json!({"name": "University of Nowhere"});
    let second = service.create_v2(Some(&client()), &v2_body(other)).await.to_json().unwrap();
    let second = plan_id_of(&second["items"][0]);

    let mut dmp = complete_dmp();
    dmp["title"] = json!("Overwritten");
    let response = service.update_v2(Some(&client()), second, &v2_body(dmp)).await;

    assert_eq!(response.status, StatusClass::BadRequest);
    assert_eq!(
        response.envelope.errors,
        vec![format!("Plan identifiers refer to plan {first}, not plan {second}")]
    );
    assert_eq!(store.plan_by_id(first).await.unwrap().unwrap().title, "Coastal Sediment Survey");
    assert_eq!(store.plan_by_id(second).await.unwrap().unwrap().title, "Second");
}

/// A caller bound to another organization cannot update the plan
#[tokio::test]
async fn update_of_other_organization_plan_is_not_found() {
    let store = seeded_store();
    let service = service(store.clone());
    let created = service.create_v2(Some(&client()), &v2_body(complete_dmp())).await.to_json().unwrap();
    let plan_id = plan_id_of(&created["items"][0]);
    let outsider = store
        .seed(Changeset::orgs(vec![Organization::new("Elsewhere College")]))
        .unwrap()
        .org_ids[0];

    let mut dmp = complete_dmp();
    dmp["title"] = json!("Overwritten");
    let response = service
        .update_v2(Some(&client().with_org(outsider)), plan_id, &v2_body(dmp))
        .await;

    assert_eq!(response.status, StatusClass::NotFound);
    assert_eq!(
        store.plan_by_id(plan_id).await.unwrap().unwrap().title,
        "Coastal Sediment Survey"
    );
}

/// v2 refuses plans no organization can own
#[tokio::test]
async fn v2_requires_an_organization() {
    let store = seeded_store();
    let response = service(store.clone())
        .create_v2(Some(&client()), &v2_body(minimal_dmp()))
        .await;

    assert_eq!(response.status, StatusClass::BadRequest);
    assert_eq!(
        response.envelope.errors,
        vec!["Unable to determine the organization for the plan".to_string()]
    );
    assert_eq!(store.plan_count(), 0);
}

/// The caller's organization owns plans that name none
#[tokio::test]
async fn v2_falls_back_to_the_caller_organization() {
    let store = seeded_store();
    let receipt = store
        .seed(Changeset::orgs(vec![Organization::new("Caller University")]))
        .unwrap();
    let caller = client().with_org(receipt.org_ids[0]);
    let service = service(store.clone());

    let response = service.create_v2(Some(&caller), &v2_body(minimal_dmp())).await;
    assert_eq!(response.status, StatusClass::Created);

    let listed = service.list(Some(&caller), None, None).await.to_json().unwrap();
    assert_eq!(listed["total_items"], json!(1));
    assert_eq!(listed["items"][0]["title"], json!("T"));
}

/// Good items are created even when others in the batch fail
#[tokio::test]
async fn v1_batch_reports_partial_success() {
    let store = seeded_store();
    let body = v1_body(vec![minimal_dmp(), json!({"title": "No contact"})]);
    let response = service(store.clone()).create_v1(Some(&client()), &body).await;

    assert_eq!(response.status, StatusClass::Created);
    assert_eq!(response.envelope.items.len(), 1);
    assert_eq!(store.plan_count(), 1);
    assert!(response.envelope.errors.iter().all(|e| e.starts_with("items[1]: ")));
    assert!(response
        .envelope
        .errors
        .contains(&"items[1]: dmp:contact is required".to_string()));
}

#[tokio::test]
async fn v1_batch_with_no_valid_item_fails() {
    let store = seeded_store();
    let body = v1_body(vec![json!({"title": "No contact"})]);
    let response = service(store.clone()).create_v1(Some(&client()), &body).await;

    assert_eq!(response.status, StatusClass::BadRequest);
    assert!(response.envelope.items.is_empty());
    assert_eq!(store.plan_count(), 0);
}

#[tokio::test]
async fn v1_batch_shape_errors() {
    let store = seeded_store();
    let service = service(store.clone());

    let response = service
        .create_v1(Some(&client()), &json!({"items": {"dmp": minimal_dmp()}}).to_string())
        .await;
    assert_eq!(response.status, StatusClass::BadRequest);
    assert_eq!(
        response.envelope.errors,
        vec!["'items' must be an array of: [{'dmp':{}}]".to_string()]
    );

    let response = service
        .create_v1(Some(&client()), &json!({"items": [{"dmp": minimal_dmp()}, {"plan": {}}]}).to_string())
        .await;
    assert_eq!(
        response.envelope.errors,
        vec!["items[1]: 'dmp' must be an object".to_string()]
    );
    assert_eq!(store.plan_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let service = service(seeded_store());
    for response in [
        service.create_v1(Some(&client()), "{\"items\": [").await,
        service.create_v2(Some(&client()), "not json").await,
    ] {
        assert_eq!(response.status, StatusClass::BadRequest);
        assert_eq!(response.envelope.errors, vec!["Invalid JSON".to_string()]);
    }
}

#[tokio::test]
async fn missing_caller_is_unauthorized() {
    let service = service(seeded_store());
    let response = service.create_v2(None, &v2_body(complete_dmp())).await;
    assert_eq!(response.status, StatusClass::Unauthorized);
    assert_eq!(response.envelope.code, 401);
    assert_eq!(service.show(None, PlanId(1)).await.status, StatusClass::Unauthorized);
}

#[tokio::test]
async fn unknown_plan_is_not_found() {
    let response = service(seeded_store()).show(Some(&client()), PlanId(42)).await;
    assert_eq!(response.status, StatusClass::NotFound);
    assert_eq!(response.envelope.errors, vec!["Plan not found".to_string()]);
}

/// A caller bound to another organization cannot see the plan
#[tokio::test]
async fn plans_of_other_organizations_are_hidden() {
    let store = seeded_store();
    let service = service(store.clone());
    let created = service
        .create_v2(Some(&client()), &v2_body(complete_dmp()))
        .await
        .to_json()
        .unwrap();
    let plan_id = plan_id_of(&created["items"][0]);

    let outsider = store
        .seed(Changeset::orgs(vec![Organization::new("Elsewhere College")]))
        .unwrap()
        .org_ids[0];
    let response = service.show(Some(&client().with_org(outsider)), plan_id).await;
    assert_eq!(response.status, StatusClass::NotFound);

    let response = service.show(Some(&client()), plan_id).await;
    assert_eq!(response.status, StatusClass::Ok);
}

#[tokio::test]
async fn listing_is_paginated_newest_first() {
    let store = seeded_store();
    let service = service(store.clone());
    for i in 0..3 {
        let mut dmp = minimal_dmp();
        dmp["title"] = json!(format!("Plan {i}"));
        let response = service.create_v1(Some(&client()), &v1_body(vec![dmp])).await;
        assert_eq!(response.status, StatusClass::Created);
    }

    let first = service.list(Some(&client()), Some(1), Some(2)).await.to_json().unwrap();
    assert_eq!(first["page"], json!(1));
    assert_eq!(first["per_page"], json!(2));
    assert_eq!(first["total_items"], json!(3));
    let titles: Vec<_> = first["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Plan 2".to_string(), "Plan 1".to_string()]);

    let second = service.list(Some(&client()), Some(2), Some(2)).await.to_json().unwrap();
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_eq!(second["items"][0]["title"], json!("Plan 0"));
}

/// Shibboleth ids are kept but never rendered
#[tokio::test]
async fn shibboleth_identifiers_are_hidden() {
    let store = seeded_store();
    let mut dmp = minimal_dmp();
    dmp["contact"]["affiliation"] = json!({
        "name": "University of Nowhere",
        "affiliation_id": {"type": "shibboleth", "identifier": "urn:mace:incommon:nowhere.edu"}
    });

    let response = service(store.clone()).create_v2(Some(&client()), &v2_body(dmp)).await;
    assert_eq!(response.status, StatusClass::Created);

    let stored = store
        .org_by_identifier(SHIBBOLETH, "urn:mace:incommon:nowhere.edu")
        .await
        .unwrap();
    assert!(stored.is_some());

    let body = response.to_json().unwrap();
    let affiliation = &body["items"][0]["contact"]["affiliation"];
    assert_eq!(affiliation["name"], json!("University of Nowhere"));
    assert!(affiliation.get("affiliation_id").is_none());
}
