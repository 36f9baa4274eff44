//! HTTP layer: the ambient axum plumbing around `hls_core::StreamingFacade`.

pub mod dynamic;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
