use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics::Publisher;

#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<Publisher>,
}

#[axum::debug_handler]
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    // Rendering waits on the snapshot lock while a cycle repopulates, so keep
    // it off the async workers.
    let publisher = state.publisher.clone();
    let rendered = match tokio::task::spawn_blocking(move || publisher.render()).await {
        Ok(rendered) => rendered,
        Err(e) => Err(anyhow::anyhow!("Metrics render task failed: {}", e)),
    };

    match rendered {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.publisher.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.publisher.last_report())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener up front so a taken port fails startup immediately.
pub async fn bind(addr: std::net::SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Port {} already in use or unavailable", addr))
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Serving metrics at http://{}/metrics", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CycleReport, PlayerRecord, RecordCounts, StatRecord};
    use axum::{body::Body, http::Request};
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            publisher: Arc::new(Publisher::new().unwrap()),
        }
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_exposition() {
        let state = state();
        {
            let mut cycle = state.publisher.begin_cycle();
            cycle.publish(&StatRecord::Player(PlayerRecord {
                player: "Mohamed Salah".to_string(),
                team: "Liverpool".to_string(),
                goals: Some(18.0),
                assists: None,
            }));
        }
        state.publisher.end_cycle(true, Duration::from_secs(4));

        let (status, content_type, body) = get_body(router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains(r#"premier_league_player_goals{player="Mohamed Salah",team="Liverpool"} 18"#));
        assert!(body.contains("fbref_scrape_success 1"));
    }

    #[tokio::test]
    async fn test_stats_endpoint_reports_last_cycle() {
        let state = state();
        let (_, _, body) = get_body(router(state.clone()), "/stats").await;
        assert_eq!(body, "null");

        state.publisher.record_report(CycleReport::succeeded(
            Duration::from_secs(2),
            RecordCounts { players: 3, teams: 20, goalkeepers: 2 },
        ));
        let (status, _, body) = get_body(router(state), "/stats").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["counts"]["teams"], 20);
    }

    #[tokio::test]
    async fn test_metrics_waits_for_cycle_in_progress() {
        let state = state();
        let app = router(state.clone());

        let mut cycle = state.publisher.begin_cycle();
        cycle.publish(&StatRecord::Player(PlayerRecord {
            player: "Cole Palmer".to_string(),
            team: "Chelsea".to_string(),
            goals: Some(15.0),
            assists: Some(6.0),
        }));

        // The scrape is served from a blocking thread, so this task keeps
        // running and can finish the cycle.
        let request = tokio::spawn(get_body(app, "/metrics"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!request.is_finished());
        drop(cycle);

        let (status, _, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"premier_league_player_assists{player="Cole Palmer",team="Chelsea"} 6"#));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _, _) = get_body(router(state()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_fails_when_port_taken() {
        let first = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();
        assert!(bind(taken).await.is_err());
    }
}
