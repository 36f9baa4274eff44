//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::limits::{connection_limit_middleware, rate_limit_middleware};
use crate::state::AppState;

use super::dynamic::handle_dynamic_request;
use super::handlers::{health_check, metrics, version_check};
use super::middleware::request_logger;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
        .allow_headers([
            header::ACCEPT,
            header::RANGE,
            header::CONTENT_TYPE,
            header::ORIGIN,
        ])
        .allow_private_network(true)
        .max_age(Duration::from_secs(3600));

    let rate_limiter = crate::limits::create_rate_limiter(&state.config.limits);
    let connection_limiter = crate::limits::create_connection_limiter(&state.config.limits);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .route("/metrics", get(metrics))
        .route("/{*path}", any(handle_dynamic_request))
        .layer(axum::middleware::from_fn_with_state(
            connection_limiter,
            connection_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), request_logger));

    if state.config.cors_enabled {
        router = router.layer(cors);
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn create_router_builds_successfully() {
        let state = Arc::new(AppState::new(ServerConfig::default()));
        let _router = create_router(state);
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::util::ServiceExt;

        let state = Arc::new(AppState::new(ServerConfig::default()));
        let app = create_router(state);

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/library/movie.mp4/master.m3u8")
            .header(header::ORIGIN, "http://localhost:8080")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn health_endpoint_responds_ok() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::util::ServiceExt;

        let state = Arc::new(AppState::new(ServerConfig::default()));
        let app = create_router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
