//! vfxupload-core: shared types, IDs, errors, and the event bus.
//!
//! This crate is the foundational dependency for the other vfxupload crates,
//! providing the job identifier, a unified error type, the color-space model,
//! the render filename parser, the project catalog, and a broadcast event bus.

pub mod color;
pub mod error;
pub mod events;
pub mod filename;
pub mod ids;
pub mod project;

// Re-export the most commonly used items at the crate root.
pub use color::{ColorSpace, ColorTags};
pub use error::{Error, Result};
pub use events::{BatchStage, Event, EventBus, PipelineEvent};
pub use filename::{parse_file_name, ParsedFileName};
pub use ids::JobId;
pub use project::{Project, ProjectCatalog};
