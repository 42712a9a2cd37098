use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gnuke::config::Config;
use gnuke::gcp::auth::{CredentialSource, GcpCredentials};
use gnuke::gcp::client::{format_gcp_error, GcpClient, ALL_REGIONS};
use gnuke::gcp::projects;
use gnuke::nuke::{ConsoleSink, Nuke, NukeParameters};
use gnuke::resource::{self, get_registry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Remove every resource from a Google Cloud project
#[derive(Parser, Debug)]
#[command(name = "gnuke", version, about, long_about = None)]
struct Args {
    /// GCP project to nuke
    #[arg(short, long)]
    project: Option<String>,

    /// Region to nuke (zonal and regional resources outside it are left alone), or "all"
    #[arg(short, long)]
    region: Option<String>,

    /// gcloud configuration that supplies the default project and region.
    /// Authentication always uses Application Default Credentials, not the
    /// account of this configuration.
    #[arg(long, conflicts_with_all = ["key_file", "access_token"])]
    profile: Option<String>,

    /// Service account key file
    #[arg(long, conflicts_with = "access_token")]
    key_file: Option<PathBuf>,

    /// OAuth access token, e.g. from 'gcloud auth print-access-token'
    #[arg(long)]
    access_token: Option<String>,

    /// Config file (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only nuke these resource types
    #[arg(long)]
    target: Vec<String>,

    /// Never nuke these resource types
    #[arg(long)]
    exclude: Vec<String>,

    /// Actually delete resources. Without it nothing is removed.
    #[arg(long)]
    no_dry_run: bool,

    /// Do not retry failed removals
    #[arg(long)]
    no_retry: bool,

    /// Do not wait for asynchronous removals to complete
    #[arg(long)]
    no_wait: bool,

    /// Give up after this many remove passes
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_passes: Option<u32>,

    /// List all resource types and exit
    #[arg(long)]
    list_types: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gnuke {} started with log level: {:?}", gnuke::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gnuke").join("gnuke.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gnuke").join("gnuke.log");
    }
    PathBuf::from("gnuke.log")
}

fn print_resource_types() {
    for def in get_registry() {
        println!("{:<36} {}", def.key, def.display_name);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    if args.list_types {
        print_resource_types();
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    // Session: credentials, project and region are fixed for the whole run
    let source = CredentialSource::from_parts(
        args.profile.clone(),
        args.key_file.clone(),
        args.access_token.clone(),
    )?;
    let credentials = GcpCredentials::new(&source)
        .await
        .with_context(|| format!("Unable to create session with {}", source))?;

    let project = match config.effective_project(args.project.as_deref(), source.profile()) {
        Some(project) => project,
        None => credentials.project_id().await.context(
            "No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag",
        )?,
    };
    config.check_project(&project)?;

    let region = config
        .effective_region(args.region.as_deref(), source.profile())
        .unwrap_or_else(|| ALL_REGIONS.to_string());

    tracing::info!("Using project: {}, region: {}, credentials: {}", project, region, source);

    let client = Arc::new(GcpClient::from_credentials(credentials, &project, &region)?);
    let info = projects::describe_project(&client).await.map_err(|e| {
        tracing::error!("Project lookup failed: {:#}", e);
        anyhow::anyhow!("Unable to access project '{}': {}", project, format_gcp_error(&e))
    })?;

    let listers = resource::listers(
        &config.selection(&args.target, &args.exclude),
        &config.filters,
        config.poll_interval(),
    )?;

    let params = NukeParameters {
        no_dry_run: args.no_dry_run,
        retry: !args.no_retry,
        wait: !args.no_wait,
        max_passes: args.max_passes.or(config.max_passes),
    };

    println!(
        "Nuking project '{}' ({}) in region '{}' across {} resource types.",
        info.project_id,
        info.name,
        region,
        listers.len()
    );
    if !params.no_dry_run {
        println!("Dry run: nothing will be removed. Use --no-dry-run to delete.");
    }
    println!();

    let run_id = uuid::Uuid::new_v4();
    let started = chrono::Local::now();
    let mut nuke = Nuke::new(params, client, listers, Arc::new(ConsoleSink::stdout()));
    let summary = nuke
        .run()
        .instrument(tracing::info_span!("nuke", run_id = %run_id, project = %project))
        .await?;
    let elapsed = chrono::Local::now() - started;

    println!();
    println!(
        "Nuke complete: {}. (started {}, took {}s)",
        summary,
        started.format("%Y-%m-%d %H:%M:%S"),
        elapsed.num_seconds()
    );

    if !summary.is_success() {
        return Err(anyhow::anyhow!(
            "{} resources could not be removed",
            summary.failed
        ));
    }

    Ok(())
}
