//! Session endpoints: status, dialog actions and activity ingestion.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::monitor::{ActivityEvent, SessionSnapshot};
use crate::server::state::AppState;
use crate::surface::WarningAction;

/// GET /api/session - Current phase and countdown.
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.monitor().snapshot())
}

/// POST /api/session/start - Page load; renews an expired session.
pub async fn start_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.begin_session().snapshot())
}

/// POST /api/session/extend - "Stay Logged In".
pub async fn extend_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    let monitor = state.monitor();
    monitor.handle_action(WarningAction::StayLoggedIn).await;
    Json(monitor.snapshot())
}

/// POST /api/session/logout - "Logout Now".
pub async fn logout_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    let monitor = state.monitor();
    monitor.handle_action(WarningAction::LogoutNow).await;
    Json(monitor.snapshot())
}

/// POST /api/activity - One input event from the page.
///
/// Accepted even when no listener is attached; the event is then dropped.
pub async fn post_activity(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ActivityEvent>,
) -> StatusCode {
    let delivered = state.monitor().hub().publish(event);
    tracing::trace!(kind = ?event.kind, delivered, "Activity posted");
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use crate::monitor::Phase;
    use crate::server::{router, AppState, Broadcaster};
    use crate::testing::Harness;
    use hyper::{Body, Client, Method, Request, StatusCode};
    use std::sync::Arc;

    async fn spawn_bridge(h: &Harness) -> String {
        serve(AppState::new(Broadcaster::new(16), h.monitor.clone())).await
    }

    async fn serve(state: AppState) -> String {
        let state = Arc::new(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn call(method: Method, url: String, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(url)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = Client::new().request(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_status() {
        let h = Harness::started();
        let base = spawn_bridge(&h).await;

        let (status, body) = call(Method::GET, format!("{base}/health"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(Method::GET, format!("{base}/api/session"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "active");
        assert_eq!(body["running"], true);
        assert!(body["countdown"].is_null());
    }

    #[tokio::test]
    async fn test_extend_and_logout_routes() {
        let h = Harness::started();
        let base = spawn_bridge(&h).await;

        let (status, body) = call(Method::POST, format!("{base}/api/session/extend"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "active");
        assert_eq!(h.backend.extend_calls(), 1);

        let (status, body) = call(Method::POST, format!("{base}/api/session/logout"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "expired");
        assert_eq!(body["logging_out"], true);
        assert_eq!(h.backend.logout_calls(), 1);
        assert_eq!(h.monitor.phase(), Phase::Expired);
    }

    #[tokio::test]
    async fn test_start_renews_logged_out_session() {
        let h = Harness::started();
        let fresh = Harness::new();
        let next = fresh.monitor.clone();
        let state = AppState::new(Broadcaster::new(16), h.monitor.clone())
            .with_factory(move || next.clone());
        let base = serve(state).await;

        let (_, body) = call(Method::POST, format!("{base}/api/session/start"), "").await;
        assert_eq!(body["phase"], "active");
        assert!(!fresh.monitor.is_running());

        call(Method::POST, format!("{base}/api/session/logout"), "").await;
        assert_eq!(h.monitor.phase(), Phase::Expired);

        let (status, body) = call(Method::POST, format!("{base}/api/session/start"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "active");
        assert_eq!(body["running"], true);
        assert!(fresh.monitor.is_running());

        let (_, body) = call(Method::GET, format!("{base}/api/session"), "").await;
        assert_eq!(body["logging_out"], false);
        assert_eq!(fresh.backend.logout_calls(), 0);
    }

    #[tokio::test]
    async fn test_post_activity() {
        let h = Harness::started();
        let base = spawn_bridge(&h).await;

        let (status, _) = call(
            Method::POST,
            format!("{base}/api/activity"),
            r#"{"kind":"touch"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, _) = call(
            Method::POST,
            format!("{base}/api/activity"),
            r#"{"kind":"teleport"}"#,
        )
        .await;
        assert!(status.is_client_error());
    }
}
