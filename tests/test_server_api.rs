//! Wire-level API tests
//!
//! Drives the full router with in-memory lanes and asserts on the JSON the
//! server actually puts on the wire.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fathom::cache::MemoryCache;
use fathom::config::Config;
use fathom::constraints::ProviderParams;
use fathom::lane::{LaneConfig, LaneKind, LaneSet, ProviderChain};
use fathom::orchestrator::Orchestrator;
use fathom::provider::{ProviderAdapter, ProviderError, RawItem};
use fathom::server::{router, AppState};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;

struct EchoProvider {
    name: &'static str,
    keyless: bool,
}

#[async_trait]
impl ProviderAdapter for EchoProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn keyless(&self) -> bool {
        self.keyless
    }

    async fn call(
        &self,
        query: &str,
        _params: &ProviderParams,
    ) -> Result<Vec<RawItem>, ProviderError> {
        Ok(vec![RawItem::new(
            format!("about {}", query),
            format!("an article covering {}", query),
            format!("https://{}.example.com/{}", self.name, query.replace(' ', "-")),
            self.name,
            self.name,
            self.keyless,
        )])
    }
}

fn app() -> axum::Router {
    let mut web = ProviderChain::new();
    web.push_keyed(Arc::new(EchoProvider {
        name: "web",
        keyless: false,
    }));
    let mut news = ProviderChain::new();
    news.push_keyless(Arc::new(EchoProvider {
        name: "news",
        keyless: true,
    }));

    let lanes = vec![
        LaneConfig {
            kind: LaneKind::Web,
            chain: web,
            required: false,
        },
        LaneConfig {
            kind: LaneKind::News,
            chain: news,
            required: false,
        },
    ];

    let orchestrator = Orchestrator::new(
        LaneSet::from_lanes(lanes),
        Arc::new(MemoryCache::default()),
        &Config::default(),
    );
    router(Arc::new(AppState::new(orchestrator)))
}

async fn post_json(app: axum::Router, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_retrieve_response_shape() {
    let (status, json) = post_json(
        app(),
        "/retrieve",
        r#"{
            "query": "rust async runtimes",
            "complexity": "technical",
            "constraints": [
                {"id": "time_range", "selected": "Recent (1 year)"}
            ],
            "budget_remaining": 0.8
        }"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["trace_id"].is_string());
    assert!(json["results"].is_array());
    assert!(json["citations"].is_array());
    assert!(json["disagreements"].is_array());
    assert!(json["lanes"].is_array());
    assert_eq!(json["fusion_metadata"]["total_lanes"], 2);
    assert_eq!(json["fusion_metadata"]["rrf_k"], 60.0);

    let first = &json["results"][0];
    for field in ["id", "title", "url", "domain", "fused_rank", "rrf_score"] {
        assert!(!first[field].is_null(), "missing field {}", field);
    }

    // The fallback lane's item carries the tag on the wire
    let tagged = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["fallback_used"] == true);
    assert!(tagged);
}

#[tokio::test]
async fn test_trace_id_round_trips() {
    let (status, json) = post_json(
        app(),
        "/retrieve",
        r#"{"query": "x", "complexity": "simple", "trace_id": "trace-123"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["trace_id"], "trace-123");
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let (status, _) = post_json(app(), "/retrieve", "{not json").await;
    assert!(status.is_client_error());

    let (status, _) = post_json(app(), "/retrieve", r#"{"no_query": true}"#).await;
    assert!(status.is_client_error());

    // Required fields must be present, not defaulted
    let (status, json) = post_json(app(), "/retrieve", r#"{"query": "x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("complexity"));
}

#[tokio::test]
async fn test_unknown_constraint_ids_are_tolerated() {
    let (status, json) = post_json(
        app(),
        "/retrieve",
        r#"{
            "query": "x",
            "complexity": "simple",
            "constraints": [{"id": "hologram_mode", "selected": "on"}]
        }"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["total_results"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_lanes_reports_status_and_budget_allocations() {
    let response = app()
        .oneshot(Request::get("/lanes").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let lanes = json["lanes"].as_array().unwrap();
    let web = lanes.iter().find(|l| l["lane"] == "web").unwrap();
    assert_eq!(web["status"], "available");
    let news = lanes.iter().find(|l| l["lane"] == "news").unwrap();
    assert_eq!(news["status"], "degraded");

    let allocations = &json["budget_allocations"];
    assert_eq!(allocations["simple"]["per_lane_budget_ms"]["web"], 1000);
    assert_eq!(allocations["research"]["per_lane_budget_ms"]["web"], 2000);
    assert_eq!(allocations["technical"]["per_lane_budget_ms"]["news"], 1500);
}

#[tokio::test]
async fn test_constraints_catalog_is_stable() {
    let response = app()
        .oneshot(Request::get("/constraints").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let time_range = json["constraints"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == "time_range")
        .unwrap();
    assert_eq!(time_range["type"], "select");
    assert!(time_range["options"]
        .as_array()
        .unwrap()
        .iter()
        .any(|o| o == "Recent (1 year)"));
}
