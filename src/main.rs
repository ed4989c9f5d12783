mod cli;

use vfxupload::{
    app::App,
    catalog,
    config::{self, Config},
    pipeline::{BatchSummary, UploadManager},
    state::{Job, JobStatus, JobStore},
};
use vfxupload_av::{FfprobeProber, MediaProber, ToolRegistry};
use vfxupload_core::{ColorSpace, PipelineEvent};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vfxupload=trace,vfxupload_core=debug,vfxupload_av=debug".to_string()
        } else {
            "vfxupload=info,vfxupload_core=info,vfxupload_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Add { files, dest, color } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(add_files(config_path, &files, dest.as_deref(), color))
        }
        Commands::Tag => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(tag_jobs(config_path))
        }
        Commands::Upload => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(upload_jobs(config_path))
        }
        Commands::Run { files, color } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_files(config_path, &files, color))
        }
        Commands::List { json } => list_jobs(config_path, json),
        Commands::Retry { job } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(retry_job(config_path, &job))
        }
        Commands::SetPath { job, destination } => set_path(config_path, &job, &destination),
        Commands::SetColor { job, color } => set_color(config_path, &job, color),
        Commands::Remove { job } => remove_job(config_path, &job),
        Commands::ClearCompleted => clear_completed(config_path),
        Commands::Uri { job } => print_uri(config_path, &job),
        Commands::DeleteRemote { job } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(delete_remote(config_path, &job))
        }
        Commands::RenameRemote { job, name } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(rename_remote(config_path, &job, &name))
        }
        Commands::ImportProjects { file } => import_projects(config_path, &file),
        Commands::Projects => list_projects(config_path),
        Commands::RemoveProjects => remove_projects(config_path),
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(config_path, &file, json))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or_else(|| config_path.map(Path::to_path_buf));
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vfxupload {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_app(config_path: Option<&Path>) -> Result<App> {
    let config = config::load_config_or_default(config_path)?;
    App::open(config)
}

/// Prints status changes as they are published until [`finish`](Self::finish).
struct EventPrinter {
    stop: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl EventPrinter {
    fn spawn(app: &App) -> Self {
        let mut rx = app.events.subscribe();
        let jobs = app.jobs.clone();
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => match event {
                        Ok(event) => print_event(&jobs, event.payload),
                        Err(RecvError::Lagged(n)) => {
                            tracing::debug!("event printer skipped {} events", n)
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut stopped => {
                        while let Ok(event) = rx.try_recv() {
                            print_event(&jobs, event.payload);
                        }
                        break;
                    }
                }
            }
        });
        Self { stop, handle }
    }

    /// Print whatever is still buffered, then stop.
    async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

fn print_event(jobs: &JobStore, event: PipelineEvent) {
    match event {
        PipelineEvent::JobStatusChanged {
            job_id,
            status,
            progress,
            message,
        } => {
            // Progress ticks are too chatty for the terminal.
            if progress.is_some_and(|p| p > 0.0 && p < 1.0) {
                return;
            }
            let name = jobs.get(job_id).map(|j| j.file_name).unwrap_or_default();
            match message {
                Some(msg) => println!("  {}  {:<14} {}  ({})", job_id.short(), status, name, msg),
                None => println!("  {}  {:<14} {}", job_id.short(), status, name),
            }
        }
        PipelineEvent::BatchProgress {
            stage,
            completed,
            total,
        } => tracing::debug!(%stage, completed, total, "batch progress"),
        _ => {}
    }
}

/// Refuse Ctrl-C while a tag or upload batch is in flight.
fn spawn_interrupt_guard(manager: Arc<UploadManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if manager.is_busy() {
                tracing::warn!("A batch is still running; it will finish before exiting");
            } else {
                std::process::exit(130);
            }
        }
    })
}

fn print_summary(summary: &BatchSummary) {
    if summary.total == 0 {
        println!("{}: nothing to do", summary.stage);
    } else {
        println!(
            "{}: {} of {} succeeded, {} failed",
            summary.stage, summary.succeeded, summary.total, summary.failed
        );
    }
}

fn queue_files(
    app: &App,
    files: &[PathBuf],
    dest: Option<&str>,
    color: Option<ColorSpace>,
) -> usize {
    let mut added = 0;
    for file in files {
        match app.add_file(file, dest, color) {
            Ok(job) => {
                added += 1;
                let project = job
                    .project
                    .as_ref()
                    .map(|p| p.display_name.as_str())
                    .unwrap_or("no project");
                println!(
                    "Queued {} {} ({}, {})",
                    job.id.short(),
                    job.file_name,
                    project,
                    job.color_space
                );
            }
            Err(e) => eprintln!("Skipping {}: {:#}", file.display(), e),
        }
    }
    added
}

async fn add_files(
    config_path: Option<&Path>,
    files: &[PathBuf],
    dest: Option<&str>,
    color: Option<ColorSpace>,
) -> Result<()> {
    let app = open_app(config_path)?;
    if queue_files(&app, files, dest, color) == 0 {
        anyhow::bail!("No files were queued");
    }

    match app.manager() {
        Ok(manager) => {
            let printer = EventPrinter::spawn(&app);
            print_summary(&manager.resolve_all().await);
            printer.finish().await;
        }
        Err(e) => tracing::warn!("Skipping path resolution: {:#}", e),
    }
    Ok(())
}

async fn tag_jobs(config_path: Option<&Path>) -> Result<()> {
    let app = open_app(config_path)?;
    let manager = Arc::new(app.manager()?);
    let printer = EventPrinter::spawn(&app);
    let guard = spawn_interrupt_guard(manager.clone());

    print_summary(&manager.resolve_all().await);
    let result = manager.tag_all().await;

    guard.abort();
    printer.finish().await;
    print_summary(&result?);
    Ok(())
}

async fn upload_jobs(config_path: Option<&Path>) -> Result<()> {
    let app = open_app(config_path)?;
    let manager = Arc::new(app.manager()?);
    let printer = EventPrinter::spawn(&app);
    let guard = spawn_interrupt_guard(manager.clone());

    let result = manager.upload_all().await;

    guard.abort();
    printer.finish().await;
    print_summary(&result?);
    Ok(())
}

async fn run_files(
    config_path: Option<&Path>,
    files: &[PathBuf],
    color: Option<ColorSpace>,
) -> Result<()> {
    let app = open_app(config_path)?;
    let manager = Arc::new(app.manager()?);
    queue_files(&app, files, None, color);

    let printer = EventPrinter::spawn(&app);
    let guard = spawn_interrupt_guard(manager.clone());

    print_summary(&manager.resolve_all().await);
    let tagged = manager.tag_all().await;
    let uploaded = match &tagged {
        Ok(_) => Some(manager.upload_all().await),
        Err(_) => None,
    };

    guard.abort();
    printer.finish().await;
    print_summary(&tagged?);
    if let Some(uploaded) = uploaded {
        print_summary(&uploaded?);
    }
    Ok(())
}

fn list_jobs(config_path: Option<&Path>, json: bool) -> Result<()> {
    let app = open_app(config_path)?;
    let jobs = app.jobs.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs queued");
        return Ok(());
    }
    for job in &jobs {
        print_job(job);
    }
    Ok(())
}

fn print_job(job: &Job) {
    let destination = if job.destination.is_empty() {
        "-"
    } else {
        job.destination.as_str()
    };
    println!(
        "{}  {:<20} {:<11} {}",
        job.id.short(),
        job.status.to_string(),
        job.color_space,
        job.file_name
    );
    println!("          -> {}", destination);
}

async fn retry_job(config_path: Option<&Path>, query: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    let job = app.jobs.reset(job.id)?;
    println!("Reset {} {}", job.id.short(), job.file_name);

    if job.destination.is_empty() && job.parsed.is_some() && job.project.is_some() {
        let manager = app.manager()?;
        manager.resolve_path(job.id).await?;
        if let Some(job) = app.jobs.get(job.id) {
            print_job(&job);
        }
    }
    Ok(())
}

fn set_path(config_path: Option<&Path>, query: &str, destination: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    let job = app.jobs.set_destination(job.id, destination)?;
    print_job(&job);
    Ok(())
}

fn set_color(config_path: Option<&Path>, query: &str, color: ColorSpace) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    let job = app.jobs.set_color_space(job.id, color)?;
    println!("{} will be tagged {}", job.file_name, color.display_name());
    Ok(())
}

fn remove_job(config_path: Option<&Path>, query: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    if matches!(
        job.status,
        JobStatus::ResolvingPath
            | JobStatus::MuxingAudio
            | JobStatus::TaggingColor
            | JobStatus::Uploading { .. }
    ) {
        anyhow::bail!("{} is {}; wait for it to finish", job.file_name, job.status);
    }
    app.jobs.remove(job.id)?;
    println!("Removed {}", job.file_name);
    Ok(())
}

fn clear_completed(config_path: Option<&Path>) -> Result<()> {
    let app = open_app(config_path)?;
    let removed = app.jobs.clear_completed();
    println!("Removed {} completed job(s)", removed);
    Ok(())
}

fn print_uri(config_path: Option<&Path>, query: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    match job.remote_uri() {
        Some(uri) => {
            println!("{}", uri);
            Ok(())
        }
        None => anyhow::bail!("{} has no project or destination", job.file_name),
    }
}

async fn delete_remote(config_path: Option<&Path>, query: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    let manager = app.manager()?;
    let uri = manager.remote_uri(job.id)?;
    manager.delete_remote(job.id).await?;
    println!("Deleted {}", uri);
    Ok(())
}

async fn rename_remote(config_path: Option<&Path>, query: &str, name: &str) -> Result<()> {
    let app = open_app(config_path)?;
    let job = app.jobs.find(query)?;
    let manager = app.manager()?;
    let renamed = manager.rename_remote(job.id, name).await?;
    println!("Renamed to {}", renamed.remote_uri().unwrap_or_default());
    Ok(())
}

fn import_projects(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let catalog = catalog::import_catalog(&config, file)?;
    println!(
        "Imported {} project(s) into {:?}",
        catalog.len(),
        catalog::catalog_path(&config)
    );
    Ok(())
}

fn list_projects(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let catalog = catalog::load_catalog(&config)?;
    if catalog.is_empty() {
        println!("No projects configured");
        return Ok(());
    }
    for project in catalog.projects() {
        println!(
            "{:<4} {:<24} s3://{}/{}  [{}]",
            project.episode_number,
            project.display_name,
            project.bucket,
            project.base(),
            project.color_space
        );
    }
    Ok(())
}

fn remove_projects(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if catalog::remove_catalog(&config)? {
        println!("Imported project catalog removed");
    } else {
        println!("No imported project catalog");
    }
    Ok(())
}

async fn probe_file(config_path: Option<&Path>, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    let result = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Audio: {}", if result.has_audio { "yes" } else { "no" });
    println!(
        "Color: {} / {} / {}",
        result.color_primaries.as_deref().unwrap_or("unknown"),
        result.color_transfer.as_deref().unwrap_or("unknown"),
        result.color_space.as_deref().unwrap_or("unknown")
    );
    for cs in ColorSpace::ALL {
        if cs != ColorSpace::None && result.already_tagged(cs) {
            println!("Tagged as {}", cs.display_name());
        }
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Tagging and uploads need ffmpeg, ffprobe, and aws.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Data dir: {}", config.data_dir().display());
    println!("  Default color space: {}", config.default_color_space);
    println!(
        "  AWS profile: {}",
        config.aws.profile.as_deref().unwrap_or("(default)")
    );
    println!("  Inline projects: {}", config.projects.len());
    if catalog::catalog_path(&config).exists() {
        let catalog = catalog::load_catalog(&config)?;
        println!("  Imported projects: {}", catalog.len());
    }

    Ok(())
}
