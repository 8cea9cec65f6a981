//! API routes

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use replybox_common::config::ApiConfig;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers::{emails, health, metrics};
use crate::openapi::create_openapi_routes;
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/detailed", get(health::health_detailed));

    let mut router = Router::new()
        .route("/emails", get(emails::fetch_emails))
        .route("/emails/:email_id", get(emails::get_email))
        .route("/reply/:email_id", post(emails::reply_email))
        .route("/metrics", get(metrics::metrics))
        .nest("/health", health_routes)
        .with_state(state);

    if config.enable_docs {
        router = router.merge(create_openapi_routes());
    }

    router
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::emails::{FetchResponse, ReplyResponse};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use pretty_assertions::assert_eq;
    use replybox_core::testing::{sample_message, MemoryEmailRepository, MemoryJobQueue, MockProvider};
    use replybox_core::{FetchService, Metrics, ReplyJob};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Fixture {
        server: TestServer,
        emails: Arc<MemoryEmailRepository>,
        queue: Arc<MemoryJobQueue>,
    }

    fn fixture_with(provider: MockProvider, queue: MemoryJobQueue) -> Fixture {
        let emails = Arc::new(MemoryEmailRepository::new());
        let queue = Arc::new(queue);
        let metrics = Arc::new(Metrics::new().unwrap());
        let state = AppState {
            fetch: Arc::new(FetchService::new(
                Arc::new(provider),
                emails.clone(),
                metrics.clone(),
            )),
            emails: emails.clone(),
            queue: queue.clone(),
            metrics,
        };
        let server = TestServer::new(create_router(state, &ApiConfig::default())).unwrap();
        Fixture {
            server,
            emails,
            queue,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockProvider::with_messages(vec![
                sample_message("m1", "alice@example.com", "One"),
                sample_message("m2", "bob@example.com", "Two"),
                sample_message("m3", "carol@example.com", "Three"),
            ]),
            MemoryJobQueue::new(3),
        )
    }

    #[tokio::test]
    async fn test_fetch_emails() {
        let f = fixture();

        let response = f.server.get("/emails").await;
        response.assert_status_ok();
        let body: FetchResponse = response.json();

        assert_eq!(body.status, "Emails Fetched");
        assert_eq!((body.fetched, body.inserted, body.skipped), (3, 3, 0));
        assert_eq!(f.emails.all().len(), 3);
        assert!(f.emails.all().iter().all(|r| !r.replied));
    }

    #[tokio::test]
    async fn test_fetch_provider_failure_is_bad_gateway() {
        let f = fixture_with(
            MockProvider::with_messages(vec![sample_message("m1", "alice@example.com", "One")])
                .failing_get("m1", 503),
            MemoryJobQueue::new(3),
        );

        let response = f.server.get("/emails").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "PROVIDER_ERROR");
    }

    #[tokio::test]
    async fn test_reply_scheduled_from_query() {
        let f = fixture();

        let response = f
            .server
            .post("/reply/1")
            .add_query_param("reply_content", "Thanks!")
            .await;
        response.assert_status_ok();
        let body: ReplyResponse = response.json();

        assert_eq!(body.status, "Reply Scheduled");
        assert_eq!(
            f.queue.payloads(),
            vec![ReplyJob {
                email_id: 1,
                reply_content: "Thanks!".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_reply_scheduled_for_unknown_email() {
        let f = fixture();

        let response = f
            .server
            .post("/reply/999")
            .add_query_param("reply_content", "Hello")
            .await;
        response.assert_status_ok();
        assert_eq!(f.queue.payloads()[0].email_id, 999);
    }

    #[tokio::test]
    async fn test_reply_from_json_body() {
        let f = fixture();

        let response = f
            .server
            .post("/reply/2")
            .json(&json!({"reply_content": "From the body"}))
            .await;
        response.assert_status_ok();
        assert_eq!(f.queue.payloads()[0].reply_content, "From the body");
    }

    #[tokio::test]
    async fn test_reply_requires_content() {
        let f = fixture();

        let response = f.server.post("/reply/1").await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(f.queue.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_reply_rejects_non_integer_id() {
        let f = fixture();

        let response = f
            .server
            .post("/reply/abc")
            .add_query_param("reply_content", "Hi")
            .await;
        assert!(response.status_code().is_client_error());
        assert!(f.queue.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_reply_broker_failure() {
        let f = fixture_with(MockProvider::default(), MemoryJobQueue::new(3).failing_enqueue());

        let response = f
            .server
            .post("/reply/1")
            .add_query_param("reply_content", "Hi")
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "QUEUE_ERROR");
    }

    #[tokio::test]
    async fn test_get_email() {
        let f = fixture();
        f.server.get("/emails").await.assert_status_ok();

        let response = f.server.get("/emails/2").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["sender"], "bob@example.com");
        assert_eq!(body["replied"], false);

        f.server
            .get("/emails/999")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_routes() {
        let f = fixture();
        f.server.post("/reply/1").add_query_param("reply_content", "x").await;

        f.server.get("/health").await.assert_status_ok();
        f.server.get("/health/live").await.assert_status_ok();
        f.server.get("/health/ready").await.assert_status_ok();

        let detailed: Value = f.server.get("/health/detailed").await.json();
        assert_eq!(detailed["status"], "healthy");
        assert_eq!(detailed["checks"]["queue"]["stats"]["pending"], 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let f = fixture();
        f.server.get("/emails").await.assert_status_ok();

        let response = f.server.get("/metrics").await;
        response.assert_status_ok();
        let text = response.text();
        assert!(text.contains("replybox_emails_inserted_total 3"));
    }

    #[tokio::test]
    async fn test_docs_routes() {
        let f = fixture();
        let spec: Value = f.server.get("/openapi.json").await.json();
        assert!(spec["paths"]["/reply/{email_id}"]["post"].is_object());
        f.server.get("/docs").await.assert_status_ok();
    }
}
