//! HLS streaming server: the ambient HTTP/config/ops layer around
//! `hls_core::StreamingFacade`. Split into a library so integration tests
//! can build the router without going through `main`.

pub mod config;
pub mod config_file;
pub mod error;
pub mod http;
pub mod limits;
pub mod metrics;
pub mod state;
