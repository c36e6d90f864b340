//! Edge-surface tests: auth gate, tenant-context validation, chat
//! round-trips, and freshness endpoints, all against fake model backends.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use dc_gateway::build_router;
use dc_gateway::state::{AppState, RestartHandle};
use docent::config::ServiceSecret;
use docent::error::DocentError;
use docent::models::{Embedder, GenerationOptions, Generator, Reranker};
use docent::registry::TenantRegistry;

struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocentError> {
        let mut buckets = vec![0.0f32; 8];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            buckets[(hasher.finish() % 8) as usize] += 1.0;
        }
        if buckets.iter().all(|v| *v == 0.0) {
            buckets[0] = 1.0;
        }
        Ok(buckets)
    }
}

struct ZeroReranker;

#[async_trait]
impl Reranker for ZeroReranker {
    async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, DocentError> {
        Ok(vec![0.0; documents.len()])
    }
}

struct CannedGenerator;

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _options: GenerationOptions,
    ) -> Result<String, DocentError> {
        Ok("A canned grounded answer.".to_string())
    }
}

struct Harness {
    router: Router,
    _dirs: Vec<TempDir>,
    vector_path: String,
    record_uri: String,
}

fn harness(secret: Option<&str>) -> Harness {
    let vector_dir = TempDir::new().unwrap();
    let record_dir = TempDir::new().unwrap();
    let vector_path = vector_dir.path().to_string_lossy().into_owned();
    let record_uri = format!(
        "sqlite://{}?mode=rwc",
        record_dir.path().join("records.db").display()
    );

    let registry = Arc::new(TenantRegistry::new(
        "scraped_content",
        Arc::new(HashEmbedder),
        Arc::new(ZeroReranker),
        Arc::new(CannedGenerator),
    ));
    let state = AppState::new(
        registry,
        ServiceSecret::new(secret.map(str::to_string)),
        RestartHandle::disabled(),
    );
    Harness {
        router: build_router(state),
        _dirs: vec![vector_dir, record_dir],
        vector_path,
        record_uri,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn chat_request(harness: &Harness, query: &str, session_id: Option<&str>) -> Request<Body> {
    let body = json!({
        "query": query,
        "session_id": session_id,
        "resource_id": "tenant-1",
        "vector_store_path": harness.vector_path,
        "database_uri": harness.record_uri,
    });
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn liveness_endpoints_need_no_secret() {
    let harness = harness(Some("s3cr3t"));

    let response = harness
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["chatbot_ready"], json!(true));
    assert!(health["daily_requests_used"].is_u64());
}

#[tokio::test]
async fn protected_endpoints_reject_missing_or_wrong_secret() {
    let harness = harness(Some("s3cr3t"));

    let response = harness
        .router
        .clone()
        .oneshot(chat_request(&harness, "hello", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = chat_request(&harness, "hello", None);
    request
        .headers_mut()
        .insert("x-service-secret", "wrong".parse().unwrap());
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = chat_request(&harness, "hello", None);
    request
        .headers_mut()
        .insert("x-service-secret", "s3cr3t".parse().unwrap());
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn placeholder_secret_disables_enforcement() {
    let harness = harness(Some("change-me"));
    let response = harness
        .router
        .clone()
        .oneshot(chat_request(&harness, "hello", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_requires_tenant_context() {
    let harness = harness(None);

    let body = json!({ "query": "hello", "resource_id": "tenant-1" });
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = body_json(response).await;
    assert!(detail["detail"].as_str().unwrap().contains("vector_store_path"));
}

#[tokio::test]
async fn chat_generates_session_ids_for_default_sessions() {
    let harness = harness(None);

    let response = harness
        .router
        .clone()
        .oneshot(chat_request(&harness, "hello there", Some("default")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let session = body["session_id"].as_str().unwrap();
    assert!(session.starts_with("tenant-1_"));
    assert_eq!(session.len(), "tenant-1_".len() + 8);
    // Fresh sessions hit the name gate first.
    assert_eq!(
        body["answer"].as_str().unwrap(),
        "Before we continue, may I have your name please?"
    );
    assert_eq!(body["metadata"]["resource_id"], json!("tenant-1"));
}

#[tokio::test]
async fn chat_keeps_explicit_session_ids() {
    let harness = harness(None);

    let response = harness
        .router
        .clone()
        .oneshot(chat_request(&harness, "hello", Some("session-42")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["session_id"], json!("session-42"));
}

#[tokio::test]
async fn path_scoped_chat_fills_resource_id() {
    let harness = harness(None);

    let body = json!({
        "query": "hello",
        "vector_store_path": harness.vector_path,
        "database_uri": harness.record_uri,
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/bots/tenant-9/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["session_id"].as_str().unwrap().starts_with("tenant-9_"));
}

#[tokio::test]
async fn leads_endpoints_report_counts() {
    let harness = harness(None);

    // Drive one session far enough to create a partial lead.
    for message in ["hi", "Alice"] {
        let response = harness
            .router
            .clone()
            .oneshot(chat_request(&harness, message, Some("lead-session")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let uri = format!(
        "/leads/count?resource_id=tenant-1&vector_store_path={}&database_uri={}",
        urlencode(&harness.vector_path),
        urlencode(&harness.record_uri),
    );
    let response = harness
        .router
        .clone()
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["count"], json!(1));

    let uri = format!(
        "/leads?resource_id=tenant-1&vector_store_path={}&database_uri={}",
        urlencode(&harness.vector_path),
        urlencode(&harness.record_uri),
    );
    let response = harness
        .router
        .clone()
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["leads"][0]["name"], json!("Alice"));
    assert_eq!(body["leads"][0]["status"], json!("partial"));
}

#[tokio::test]
async fn contact_info_reports_empty_corpus() {
    let harness = harness(None);
    let uri = format!(
        "/contact-info?resource_id=tenant-1&vector_store_path={}&database_uri={}",
        urlencode(&harness.vector_path),
        urlencode(&harness.record_uri),
    );
    let response = harness
        .router
        .clone()
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["emails"], json!([]));
    assert_eq!(body["phones"], json!([]));
    assert!(body["formatted_response"]
        .as_str()
        .unwrap()
        .contains("couldn't find"));
}

#[tokio::test]
async fn mark_data_updated_sets_flag_only() {
    let harness = harness(None);
    let uri = format!(
        "/mark-data-updated?resource_id=tenant-1&vector_store_path={}&database_uri={}",
        urlencode(&harness.vector_path),
        urlencode(&harness.record_uri),
    );
    let response = harness
        .router
        .clone()
        .oneshot(Request::post(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], json!("success"));
}

#[tokio::test]
async fn refresh_cache_reports_document_count() {
    let harness = harness(None);

    // Warm the engine so there is something to destroy.
    harness
        .router
        .clone()
        .oneshot(chat_request(&harness, "hello", Some("warm")))
        .await
        .unwrap();

    let uri = format!(
        "/refresh-cache?resource_id=tenant-1&vector_store_path={}&database_uri={}",
        urlencode(&harness.vector_path),
        urlencode(&harness.record_uri),
    );
    let response = harness
        .router
        .clone()
        .oneshot(Request::post(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["destroyed"], json!(true));
    assert_eq!(body["document_count"], json!(0));
}

#[tokio::test]
async fn restart_endpoints_answer_before_exiting() {
    let harness = harness(None);

    let response = harness
        .router
        .clone()
        .oneshot(Request::post("/system/restart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("restarting"));
    assert!(body["pid"].is_u64());

    let uri = format!(
        "/reload_vectors?resource_id=tenant-1&vector_store_path={}&database_uri={}",
        urlencode(&harness.vector_path),
        urlencode(&harness.record_uri),
    );
    let response = harness
        .router
        .clone()
        .oneshot(Request::post(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["action_taken"], json!("restart_scheduled"));
}

fn urlencode(raw: &str) -> String {
    let mut out = String::new();
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
