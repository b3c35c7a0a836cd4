//! vcompose Media Engine
//!
//! The external collaborators around the compiler: an ffprobe-backed
//! [`MediaEngine`](vcompose_core::MediaEngine) for reading source tracks and
//! an export pipeline that renders a finished composition with ffmpeg.
//!
//! # Export Architecture
//!
//! ```text
//! CompositionResult ──┐
//!                     ├── ExportCoordinator ── ExportBackend::create_session
//! ExportJob ──────────┘                                  │
//!                                                        ├── plan (inputs, filter graph, maps)
//!                                                        ├── run ffmpeg (-progress pipe:1)
//!                                                        ▼
//!                                                 terminal ExportStatus
//!                                                        │
//!                                                        ▼
//!                                          Ok(report) | ExportError
//! ```

pub mod export;
pub mod ffmpeg;
pub mod probe;

pub use export::*;
pub use ffmpeg::FfmpegBackend;
pub use probe::{AssetRegistry, FfprobeEngine};
