//! Server-Sent Events endpoint
//!
//! - GET /events?stream=<address> - Subscribe to events for one deposit address
//! - GET /health - Health check

use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};

use super::broadcaster::ChannelBroadcaster;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Topic to follow (deposit address)
    pub stream: String,
}

/// Create the events router
pub fn create_events_router(broadcaster: Arc<ChannelBroadcaster>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/events", get(handle_events))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(broadcaster)
}

/// Start the events server
pub async fn start_events_server(
    broadcaster: Arc<ChannelBroadcaster>,
    port: u16,
) -> Result<(), std::io::Error> {
    let app = create_events_router(broadcaster);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(target: "bridge::events", %addr, "SSE server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// GET /events?stream=<address>
async fn handle_events(
    State(broadcaster): State<Arc<ChannelBroadcaster>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = broadcaster.subscribe();

    let events = stream::unfold((rx, query.stream), |(mut rx, topic)| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.topic == topic => {
                    let sse = Event::default()
                        .event(event.event_type.as_str())
                        .data(String::from_utf8_lossy(&event.payload));
                    return Some((Ok(sse), (rx, topic)));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "bridge::events", skipped, "SSE subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "utxo-bridge-events",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = create_events_router(Arc::new(ChannelBroadcaster::default()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_events_is_event_stream() {
        let app = create_events_router(Arc::new(ChannelBroadcaster::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/events?stream=Lhd98J63jWM44tY8tcGPcvCdRDruDadyJj")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
    }

    #[tokio::test]
    async fn test_events_requires_stream() {
        let app = create_events_router(Arc::new(ChannelBroadcaster::default()));

        let response = app
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
