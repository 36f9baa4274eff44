//! Application state management
//!
//! Holds the single [`hls_core::StreamingFacade`] instance the HTTP
//! handlers call into, plus the ambient concerns the core does not own:
//! shutdown signaling, the encoder subprocess registry, and metrics.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use hls_core::{
    BuildCoordinator, EncodeRequest, EncoderTool, FfmpegEncoderTool, FfprobeTool,
    FsMediaRepository, Result as CoreResult, SegmentCache, StreamingFacade, SubprocessRegistry,
};

use crate::config::ServerConfig;
use crate::metrics::Metrics;

/// Wraps an [`EncoderTool`] to record invocation/failure/in-flight
/// counters, since the core crate has no notion of the server's metrics.
struct MeteredEncoder<E> {
    inner: E,
    metrics: Arc<Metrics>,
}

#[async_trait]
impl<E: EncoderTool + Send + Sync> EncoderTool for MeteredEncoder<E> {
    async fn encode_segment(&self, req: EncodeRequest<'_>) -> CoreResult<()> {
        self.metrics.record_encoder_invocation();
        self.metrics.encode_started();
        let result = self.inner.encode_segment(req).await;
        self.metrics.encode_finished();
        if result.is_err() {
            self.metrics.record_encoder_failure();
        }
        result
    }
}

pub struct AppState {
    pub facade: StreamingFacade,
    pub subprocess_registry: SubprocessRegistry,
    pub metrics: Arc<Metrics>,
    pub config: ServerConfig,
    shutdown: AtomicBool,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let metrics = Arc::new(Metrics::default());
        let registry = SubprocessRegistry::new();
        let cache = SegmentCache::new(config.core.cache_root.clone());
        let inner_encoder = FfmpegEncoderTool::new(
            config.core.encoder_binary_path.clone(),
            registry.clone(),
            config.core.max_concurrent_encodes,
        );
        let encoder = Arc::new(MeteredEncoder {
            inner: inner_encoder,
            metrics: metrics.clone(),
        });
        let coordinator = BuildCoordinator::new(
            cache,
            encoder,
            config.core.segment_filename_digits,
            config.core.target_segment_duration_seconds,
        );
        let repository = Arc::new(FsMediaRepository::new(config.media_root.clone()));
        let probe = Arc::new(FfprobeTool::new(config.core.probe_binary_path.clone()));
        let facade = StreamingFacade::new(
            coordinator,
            repository,
            probe,
            config.core.target_segment_duration_seconds,
        );

        Self {
            facade,
            subprocess_registry: registry,
            metrics,
            config,
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Best-effort SIGTERM-then-SIGKILL drain of every tracked encoder
    /// subprocess, called from the shutdown hook.
    pub async fn drain_subprocesses(&self) {
        let grace = std::time::Duration::from_secs(self.config.shutdown_grace_seconds);
        self.subprocess_registry.drain(grace).await;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_running() {
        let state = AppState::with_defaults();
        assert!(!state.is_shutdown());
    }

    #[test]
    fn shutdown_flag_latches() {
        let state = AppState::with_defaults();
        state.shutdown();
        assert!(state.is_shutdown());
    }
}
