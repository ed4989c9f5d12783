use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vfxupload_core::ColorSpace;

#[derive(Parser)]
#[command(name = "vfxupload")]
#[command(author, version, about = "Tag VFX renders and upload them to their shot folders")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue render files and resolve their destinations
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination key inside the project bucket, skipping resolution
        #[arg(long)]
        dest: Option<String>,

        /// Target color space (P3-D65-PQ, Rec2020-PQ, Rec709, None)
        #[arg(long)]
        color: Option<ColorSpace>,
    },

    /// Mux companion audio and write color tags for every pending job
    Tag,

    /// Upload every tagged job
    Upload,

    /// Queue files, then resolve, tag, and upload in one go
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target color space (P3-D65-PQ, Rec2020-PQ, Rec709, None)
        #[arg(long)]
        color: Option<ColorSpace>,
    },

    /// List queued jobs
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset a failed job to pending
    Retry {
        /// Job id or unique id prefix
        job: String,
    },

    /// Set a job's destination key by hand
    SetPath {
        /// Job id or unique id prefix
        job: String,
        destination: String,
    },

    /// Change the target color space of a pending job
    SetColor {
        /// Job id or unique id prefix
        job: String,
        color: ColorSpace,
    },

    /// Remove a job from the queue
    Remove {
        /// Job id or unique id prefix
        job: String,
    },

    /// Remove every completed job
    ClearCompleted,

    /// Print the s3:// URI of a job's destination
    Uri {
        /// Job id or unique id prefix
        job: String,
    },

    /// Delete an uploaded object and drop its job
    DeleteRemote {
        /// Job id or unique id prefix
        job: String,
    },

    /// Rename an uploaded object
    RenameRemote {
        /// Job id or unique id prefix
        job: String,
        /// New final filename component
        name: String,
    },

    /// Validate a JSON project list and store it as the project catalog
    ImportProjects {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// List the projects in the active catalog
    Projects,

    /// Delete the imported project catalog
    RemoveProjects,

    /// Probe a render for audio and color tags
    Probe {
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
