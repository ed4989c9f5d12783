//! The upload pipeline.
//!
//! A job is created `pending`, gets a destination from the [`PathResolver`],
//! is probed and tagged by the [`Tagger`], and is finally uploaded by the
//! [`Uploader`]. [`UploadManager`] runs tag and upload batches through
//! [`run_bounded`] with at most [`MAX_CONCURRENT`] jobs in flight.

pub mod manager;
pub mod resolver;
pub mod scheduler;
pub mod tagging;
pub mod upload;

pub use manager::{BatchSummary, UploadManager};
pub use resolver::{match_shot_folder, PathResolver, ResolveError, CACHE_TTL};
pub use scheduler::{run_bounded, MAX_CONCURRENT};
pub use tagging::{TagPlan, Tagger};
pub use upload::Uploader;
