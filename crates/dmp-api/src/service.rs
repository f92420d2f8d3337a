//! The ingestion contracts
//!
//! `ApiService` is transport-agnostic: it takes the caller and the raw body
//! and returns a status class plus a response envelope. The v1 contract
//! accepts a batch of documents and treats each one as its own unit of
//! work; v2 takes a single document and insists on an owning organization.

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::pagination::Pagination;
use crate::presenter::{PlanPresenter, PlanView};
use crate::response::{ResponseEnvelope, StatusClass};
use dmp_ingest::{DmpStore, IngestContext, OrgLookup, PlanResolver};
use dmp_model::{OrgId, Plan, PlanId};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Name echoed in envelopes
    pub name: String,
    /// Organization the caller acts for
    pub org: Option<OrgId>,
}

impl Caller {
    /// Caller without an organization
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            org: None,
        }
    }

    /// With organization
    #[must_use]
    pub fn with_org(mut self, org: OrgId) -> Self {
        self.org = Some(org);
        self
    }
}

/// Status plus body of a contract call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Outcome class
    pub status: StatusClass,
    /// Body
    pub envelope: ResponseEnvelope<PlanView>,
}

impl ApiResponse {
    /// Serialized body
    ///
    /// # Errors
    /// Returns error if the envelope cannot be serialized
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(&self.envelope)
    }
}

/// Contract entry points over one store
pub struct ApiService {
    store: Arc<dyn DmpStore>,
    resolver: PlanResolver,
    presenter: PlanPresenter,
    config: ApiConfig,
}

impl ApiService {
    /// Create a service over `store`, searching organizations with `lookup`
    pub fn new(store: Arc<dyn DmpStore>, lookup: Arc<dyn OrgLookup>, config: ApiConfig) -> Self {
        let resolver = PlanResolver::new(store.clone(), lookup, config.ingest.clone());
        let presenter = PlanPresenter::new(
            store.clone(),
            config.ingest.application_name.clone(),
            config.plan_url_base.clone(),
            config.ingest.role_ontology_base_url.clone(),
        );
        Self {
            store,
            resolver,
            presenter,
            config,
        }
    }

    /// Plan renderer used by the service
    #[must_use]
    pub fn presenter(&self) -> &PlanPresenter {
        &self.presenter
    }

    /// v1 batch create: `{ total_items, items: [{ dmp }] }`
    ///
    /// Items that fail are reported in `errors` while the rest are created.
    /// The call only fails as a whole when the body is malformed or nothing
    /// could be created.
    #[tracing::instrument(skip_all, fields(caller = caller.map(|c| c.name.as_str())))]
    pub async fn create_v1(&self, caller: Option<&Caller>, body: &str) -> ApiResponse {
        const SOURCE: &str = "POST /api/v1/plans";
        let Some(caller) = caller else {
            return self.failure(SOURCE, None, &ApiError::Unauthorized);
        };

        let documents = match parse_body(body).and_then(|value| batch_items(&value)) {
            Ok(documents) => documents,
            Err(err) => return self.failure(SOURCE, Some(caller), &err),
        };

        let ctx = IngestContext::create().with_caller_org(caller.org);
        let mut views = Vec::new();
        let mut failures: Vec<(usize, ApiError)> = Vec::new();
        for (index, dmp) in documents.iter().enumerate() {
            match self.ingest_and_present(dmp, &ctx).await {
                Ok(view) => views.push(view),
                Err(err) => {
                    warn!(item = index, error = %err, "batch item rejected");
                    failures.push((index, err));
                }
            }
        }
        info!(created = views.len(), failed = failures.len(), "v1 batch processed");

        if views.is_empty() {
            if let Some((_, first)) = failures.first() {
                let errors = qualified_errors(&failures);
                return self.respond(SOURCE, Some(caller), first.status(), Vec::new(), errors);
            }
        }
        let errors = qualified_errors(&failures);
        self.respond(SOURCE, Some(caller), StatusClass::Created, views, errors)
    }

    /// v2 single create: `{ dmp }`; the plan must end up owned by an
    /// organization, falling back to the caller's
    #[tracing::instrument(skip_all, fields(caller = caller.map(|c| c.name.as_str())))]
    pub async fn create_v2(&self, caller: Option<&Caller>, body: &str) -> ApiResponse {
        const SOURCE: &str = "POST /api/v2/plans";
        let Some(caller) = caller else {
            return self.failure(SOURCE, None, &ApiError::Unauthorized);
        };

        let ctx = IngestContext::create()
            .requiring_organization()
            .with_caller_org(caller.org);
        let result = match parse_body(body).and_then(|value| single_dmp(&value)) {
            Ok(dmp) => self.ingest_and_present(&dmp, &ctx).await,
            Err(err) => Err(err),
        };
        self.single(SOURCE, caller, result, StatusClass::Created)
    }

    /// v2 update of an existing plan
    ///
    /// The update is pinned to `plan_id`: the plan must exist and be visible
    /// to the caller, and the submitted ids may not point at another plan.
    #[tracing::instrument(skip_all, fields(caller = caller.map(|c| c.name.as_str()), plan_id = %plan_id))]
    pub async fn update_v2(&self, caller: Option<&Caller>, plan_id: PlanId, body: &str) -> ApiResponse {
        let source = format!("PUT /api/v2/plans/{plan_id}");
        let Some(caller) = caller else {
            return self.failure(&source, None, &ApiError::Unauthorized);
        };

        match self.store.plan_by_id(plan_id).await {
            Ok(Some(plan)) if visible_to(&plan, caller) => {}
            Ok(_) => {
                let err = ApiError::NotFound("Plan not found".to_string());
                return self.failure(&source, Some(caller), &err);
            }
            Err(err) => return self.failure(&source, Some(caller), &err.into()),
        }

        let ctx = IngestContext::update()
            .requiring_organization()
            .with_caller_org(caller.org)
            .targeting(plan_id);
        let result = match parse_body(body).and_then(|value| single_dmp(&value)) {
            Ok(dmp) => self.ingest_and_present(&dmp, &ctx).await,
            Err(err) => Err(err),
        };
        self.single(&source, caller, result, StatusClass::Ok)
    }

    /// Render one plan visible to the caller
    #[tracing::instrument(skip_all, fields(plan_id = %plan_id))]
    pub async fn show(&self, caller: Option<&Caller>, plan_id: PlanId) -> ApiResponse {
        let source = format!("GET /api/v2/plans/{plan_id}");
        let Some(caller) = caller else {
            return self.failure(&source, None, &ApiError::Unauthorized);
        };

        let result = match self.store.plan_by_id(plan_id).await {
            Ok(Some(plan)) if visible_to(&plan, caller) => {
                self.presenter.present(&plan).await.map_err(ApiError::from)
            }
            Ok(_) => Err(ApiError::NotFound("Plan not found".to_string())),
            Err(err) => Err(err.into()),
        };
        self.single(&source, caller, result, StatusClass::Ok)
    }

    /// Page of the caller organization's plans, newest first
    #[tracing::instrument(skip_all)]
    pub async fn list(&self, caller: Option<&Caller>, page: Option<u32>, per_page: Option<u32>) -> ApiResponse {
        const SOURCE: &str = "GET /api/v2/plans";
        let Some(caller) = caller else {
            return self.failure(SOURCE, None, &ApiError::Unauthorized);
        };

        let pagination = Pagination::new(
            page,
            per_page,
            self.config.default_per_page,
            self.config.max_per_page,
        );
        let plans = match self.store.plans(caller.org).await {
            Ok(plans) => plans,
            Err(err) => return self.failure(SOURCE, Some(caller), &err.into()),
        };
        let views = match self.presenter.present_all(pagination.window(&plans)).await {
            Ok(views) => views,
            Err(err) => return self.failure(SOURCE, Some(caller), &err.into()),
        };

        let mut response = self.respond(SOURCE, Some(caller), StatusClass::Ok, views, Vec::new());
        response.envelope = response
            .envelope
            .with_page(pagination.page, pagination.per_page, plans.len());
        response
    }

    async fn ingest_and_present(&self, dmp: &Value, ctx: &IngestContext) -> ApiResult<PlanView> {
        let outcome = self.resolver.ingest(dmp, ctx).await?;
        let plan = self
            .store
            .plan_by_id(outcome.plan_id)
            .await?
            .ok_or_else(|| ApiError::Internal(vec![format!("plan {} vanished after commit", outcome.plan_id)]))?;
        Ok(self.presenter.present(&plan).await?)
    }

    fn single(
        &self,
        source: &str,
        caller: &Caller,
        result: ApiResult<PlanView>,
        success: StatusClass,
    ) -> ApiResponse {
        match result {
            Ok(view) => self.respond(source, Some(caller), success, vec![view], Vec::new()),
            Err(err) => self.failure(source, Some(caller), &err),
        }
    }

    fn failure(&self, source: &str, caller: Option<&Caller>, err: &ApiError) -> ApiResponse {
        info!(status = %err.status(), error = %err, "request failed");
        self.respond(source, caller, err.status(), Vec::new(), err.errors())
    }

    fn respond(
        &self,
        source: &str,
        caller: Option<&Caller>,
        status: StatusClass,
        items: Vec<PlanView>,
        errors: Vec<String>,
    ) -> ApiResponse {
        let total = items.len();
        let mut envelope = ResponseEnvelope::new(
            self.config.ingest.application_name.clone(),
            source,
            caller.map(|c| c.name.clone()),
            status,
        )
        .with_items(items)
        .with_errors(errors);
        if !status.is_error() {
            envelope.total_items = Some(total);
        }
        ApiResponse { status, envelope }
    }
}

/// A caller with an organization only sees that organization's plans
fn visible_to(plan: &Plan, caller: &Caller) -> bool {
    match caller.org {
        None => true,
        Some(org) => plan.org.and_then(|r| r.stored()) == Some(org),
    }
}

fn parse_body(body: &str) -> ApiResult<Value> {
    serde_json::from_str(body).map_err(|_| ApiError::bad_request("Invalid JSON"))
}

fn single_dmp(body: &Value) -> ApiResult<Value> {
    match body.get("dmp") {
        Some(Value::Object(dmp)) => Ok(Value::Object(dmp.clone())),
        _ => Err(ApiError::bad_request("'dmp' must be an object")),
    }
}

/// Pull `items[].dmp` out of a v1 batch, reporting every shape problem
fn batch_items(body: &Value) -> ApiResult<Vec<Value>> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Err(ApiError::bad_request("'items' must be an array of: [{'dmp':{}}]"));
    };

    let mut documents = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item.get("dmp") {
            Some(Value::Object(dmp)) => documents.push(Value::Object(Map::clone(dmp))),
            _ => errors.push(format!("items[{index}]: 'dmp' must be an object")),
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::BadRequest(errors));
    }
    if documents.is_empty() {
        return Err(ApiError::bad_request("'items' must contain at least one dmp"));
    }
    Ok(documents)
}

fn qualified_errors(failures: &[(usize, ApiError)]) -> Vec<String> {
    failures
        .iter()
        .flat_map(|(index, err)| {
            err.errors()
                .into_iter()
                .map(move |message| format!("items[{index}]: {message}"))
        })
        .collect()
}
