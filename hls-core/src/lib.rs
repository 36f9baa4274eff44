//! # hls-core
//!
//! Just-in-time HLS transcoding and segment caching. Given any requested
//! `(media, quality, segment_number)`, produces the correct MPEG-TS
//! segment bytes by analyzing the source once to find keyframe-aligned
//! boundaries, invoking an external encoder to produce exactly the
//! requested segment, coalescing concurrent requests for the same
//! segment onto one encode, and caching results durably on disk.
//!
//! This crate has no HTTP dependency. It consumes three narrow
//! collaborators — [`MediaRepository`], [`ProbeTool`], [`EncoderTool`] —
//! and exposes [`StreamingFacade`] as its only public entry point. An
//! HTTP layer built against this crate only ever deals in file paths.
//!
//! ```ignore
//! let facade = StreamingFacade::new(coordinator, repository, probe, 6.0);
//! let path = facade.get_segment(&media_id, QualityLabel::P720, "segment_005.ts").await?;
//! ```

pub mod analysis;
pub mod cache;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod facade;
pub mod planner;
pub mod playlist;
pub mod probe;
pub mod profile;
pub mod repository;
pub mod types;

pub use analysis::AnalysisStore;
pub use cache::SegmentCache;
pub use coordinator::BuildCoordinator;
pub use encoder::{EncodeRequest, EncoderTool, FfmpegEncoderTool, SubprocessRegistry};
pub use error::{EncoderError, HlsError, ProbeError, Result};
pub use facade::StreamingFacade;
pub use probe::{FfprobeTool, ProbeTool};
pub use profile::select_profiles;
pub use repository::{FsMediaRepository, MediaRecord, MediaRepository};
pub use types::{Analysis, Keyframe, MediaId, QualityLabel, QualityProfile, SegmentSpec};
