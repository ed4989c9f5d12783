//! # vfxupload-av
//!
//! External media tooling for the upload pipeline.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg, ffprobe, and the
//!   aws CLI, from config overrides or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   plus a streaming mode that reports output lines as they arrive.
//! - **Probing** ([`MediaProber`], [`FfprobeProber`]) -- audio presence and
//!   the color tag triple of the first video stream.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- audio stem
//!   mixing, audio muxing, and stream-copy color tagging.
//! - **Scratch space** ([`Workspace`]) -- temporary directory for downloaded
//!   companion audio, removed on drop.

pub mod actions;
pub mod command;
pub mod probe;
pub mod tools;
pub mod transcode;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, MediaProber, ProbeResult};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, ToolsConfig};
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use workspace::Workspace;
