//! HTTP API surface
//!
//! Four routes: `POST /retrieve` runs the full pipeline, `GET /lanes`
//! reports lane availability and budget tables, `GET /constraints` lists the
//! constraint catalog, and `GET /health` answers liveness probes.
//!
//! Upstream trouble never becomes a 5xx here: a request with every lane
//! failing still answers 200 with zero results. 400 is reserved for requests
//! that are malformed or that cannot be served because a required lane has
//! no providers at all.

use crate::budget::ComplexityTier;
use crate::config::Config;
use crate::constraints::{self, Constraint};
use crate::error::{FathomError, Result};
use crate::fusion::FusedRetrievalResult;
use crate::lane::{LaneAvailability, LaneKind};
use crate::orchestrator::{Orchestrator, RetrievalRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    orchestrator: Orchestrator,
    started: Instant,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            started: Instant::now(),
        }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/retrieve", post(retrieve))
        .route("/lanes", get(lanes))
        .route("/constraints", get(constraint_catalog))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: &Config, orchestrator: Orchestrator) -> Result<()> {
    let addr = format!("{}:{}", config.server.bind_addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FathomError::Server(format!("failed to bind {}: {}", addr, e)))?;

    tracing::info!("Listening on http://{}", addr);

    let state = Arc::new(AppState::new(orchestrator));
    axum::serve(listener, router(state))
        .await
        .map_err(|e| FathomError::Server(e.to_string()))
}

/// A caller-facing request validation failure
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveBody {
    query: String,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(default)]
    constraints: Vec<Constraint>,
    #[serde(default)]
    budget_remaining: Option<f64>,
    #[serde(default)]
    trace_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct RetrieveResponse {
    trace_id: String,
    #[serde(flatten)]
    result: FusedRetrievalResult,
}

async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RetrieveBody>,
) -> std::result::Result<Json<RetrieveResponse>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let complexity = match body.complexity.as_deref() {
        None => return Err(ApiError::bad_request("missing required field: complexity")),
        Some(raw) => ComplexityTier::from_str(raw)
            .map_err(|_| ApiError::bad_request(format!("unknown complexity tier: {}", raw)))?,
    };

    let budget_remaining = body.budget_remaining.unwrap_or(1.0);
    if !(0.0..=1.0).contains(&budget_remaining) {
        return Err(ApiError::bad_request(
            "budget_remaining must be between 0 and 1",
        ));
    }

    let misconfigured = state.orchestrator.lane_set().misconfigured_required();
    if !misconfigured.is_empty() {
        let names: Vec<_> = misconfigured.iter().map(|l| l.as_str()).collect();
        return Err(ApiError::bad_request(format!(
            "required lane(s) have no providers configured: {}",
            names.join(", ")
        )));
    }

    let mut request = RetrievalRequest::new(body.query, complexity);
    request.constraints = body.constraints;
    request.budget_remaining = budget_remaining;
    if let Some(trace_id) = body.trace_id {
        request.trace_id = trace_id;
    }
    request.user_id = body.user_id;
    request.session_id = body.session_id;

    let result = state.orchestrator.retrieve(&request).await;

    Ok(Json(RetrieveResponse {
        trace_id: request.trace_id,
        result,
    }))
}

#[derive(Serialize)]
struct LaneDescriptor {
    lane: LaneKind,
    status: LaneAvailability,
    providers: usize,
    required: bool,
}

#[derive(Serialize)]
struct TierBudget {
    overall_budget_ms: u64,
    per_lane_budget_ms: BTreeMap<String, u64>,
}

#[derive(Serialize)]
struct LanesResponse {
    lanes: Vec<LaneDescriptor>,
    budget_allocations: BTreeMap<String, TierBudget>,
}

async fn lanes(State(state): State<Arc<AppState>>) -> Json<LanesResponse> {
    let lane_set = state.orchestrator.lane_set();

    let lanes = lane_set
        .lanes()
        .iter()
        .map(|l| LaneDescriptor {
            lane: l.kind,
            status: lane_set.availability(l.kind),
            providers: l.chain.len(),
            required: l.required,
        })
        .collect();

    let mut budget_allocations = BTreeMap::new();
    for tier in ComplexityTier::ALL {
        let allocation = state.orchestrator.allocator().allocate(tier, 1.0);
        budget_allocations.insert(
            tier.as_str().to_string(),
            TierBudget {
                overall_budget_ms: allocation.overall_budget_ms,
                per_lane_budget_ms: allocation
                    .per_lane_budget_ms
                    .iter()
                    .map(|(kind, ms)| (kind.as_str().to_string(), *ms))
                    .collect(),
            },
        );
    }

    Json(LanesResponse {
        lanes,
        budget_allocations,
    })
}

#[derive(Serialize)]
struct ConstraintsResponse {
    constraints: Vec<Constraint>,
}

async fn constraint_catalog() -> Json<ConstraintsResponse> {
    Json(ConstraintsResponse {
        constraints: constraints::catalog(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::constraints::ProviderParams;
    use crate::lane::{LaneConfig, LaneSet, ProviderChain};
    use crate::provider::{ProviderAdapter, ProviderError, RawItem};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    struct OneItemProvider;

    #[async_trait]
    impl ProviderAdapter for OneItemProvider {
        fn name(&self) -> &str {
            "one"
        }

        fn keyless(&self) -> bool {
            false
        }

        async fn call(
            &self,
            _query: &str,
            _params: &ProviderParams,
        ) -> std::result::Result<Vec<RawItem>, ProviderError> {
            Ok(vec![RawItem::new(
                "title",
                "content",
                "https://example.com/a",
                "one",
                "one",
                false,
            )])
        }
    }

    fn app(lanes: Vec<LaneConfig>) -> Router {
        let orchestrator = Orchestrator::new(
            LaneSet::from_lanes(lanes),
            Arc::new(MemoryCache::default()),
            &Config::default(),
        );
        router(Arc::new(AppState::new(orchestrator)))
    }

    fn web_lane(required: bool, empty: bool) -> LaneConfig {
        let mut chain = ProviderChain::new();
        if !empty {
            chain.push_keyed(Arc::new(OneItemProvider));
        }
        LaneConfig {
            kind: LaneKind::Web,
            chain,
            required,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_happy_path() {
        let response = app(vec![web_lane(false, false)])
            .oneshot(
                Request::post("/retrieve")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"query": "rust language", "complexity": "simple"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total_results"], 1);
        assert!(json["trace_id"].is_string());
    }

    #[tokio::test]
    async fn test_empty_query_is_400() {
        let response = app(vec![web_lane(false, false)])
            .oneshot(
                Request::post("/retrieve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_complexity_is_400() {
        let response = app(vec![web_lane(false, false)])
            .oneshot(
                Request::post("/retrieve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "rust language"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("complexity"));
    }

    #[tokio::test]
    async fn test_unknown_complexity_is_400() {
        let response = app(vec![web_lane(false, false)])
            .oneshot(
                Request::post("/retrieve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "x", "complexity": "galactic"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_misconfigured_required_lane_is_400() {
        let response = app(vec![web_lane(true, true)])
            .oneshot(
                Request::post("/retrieve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "x", "complexity": "simple"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("web"));
    }

    #[tokio::test]
    async fn test_no_lanes_still_answers_200() {
        let response = app(vec![])
            .oneshot(
                Request::post("/retrieve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "x", "complexity": "simple"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total_results"], 0);
    }

    #[tokio::test]
    async fn test_lanes_endpoint_reports_budgets() {
        let response = app(vec![web_lane(false, false)])
            .oneshot(Request::get("/lanes").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["budget_allocations"]["simple"]["overall_budget_ms"],
            5000
        );
        assert_eq!(
            json["budget_allocations"]["research"]["overall_budget_ms"],
            10000
        );
        assert_eq!(json["lanes"][0]["status"], "available");
    }

    #[tokio::test]
    async fn test_constraints_endpoint_lists_catalog() {
        let response = app(vec![])
            .oneshot(Request::get("/constraints").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let ids: Vec<_> = json["constraints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect();
        assert!(ids.contains(&"time_range".to_string()));
        assert!(ids.contains(&"citations_required".to_string()));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app(vec![])
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }
}
