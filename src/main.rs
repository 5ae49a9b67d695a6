// src/main.rs
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use people_counter_dashboard::config::DashboardConfig;
use people_counter_dashboard::errors::handle_api_error;
use people_counter_dashboard::models::Point;
use people_counter_dashboard::services::{
    DownloadKind, Downloader, HttpVideoApi, MetricsTab, UiTelemetry, VideoApi,
};
use std::path::PathBuf;
use std::sync::Arc;

mod handlers;

use crate::handlers::{ProcessOptions, parse_display_size, parse_point};

/// People counter dashboard client
#[derive(Parser, Debug)]
#[command(name = "people-counter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend base URL (overrides PEOPLE_COUNTER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory downloads are saved to (overrides PEOPLE_COUNTER_DOWNLOAD_DIR)
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a video, optionally with an IN/OUT line, and follow processing
    Process {
        file: PathBuf,

        /// Line point in display coordinates, given twice: --point X,Y
        #[arg(long = "point", value_parser = parse_point)]
        points: Vec<Point>,

        /// Size the preview is displayed at, e.g. 960x540 (default: native)
        #[arg(long, value_parser = parse_display_size)]
        display_size: Option<(f64, f64)>,

        /// Write the preview with the drawn line as PNG
        #[arg(long)]
        preview_out: Option<PathBuf>,

        /// Artefacts to download once done (video, heatmap, stats, report)
        #[arg(long = "download")]
        downloads: Vec<DownloadKind>,
    },
    /// Show the status of a task
    Status { task_id: String },
    /// Cancel a task
    Cancel { task_id: String },
    /// Show the results of a completed task
    Results {
        task_id: String,

        #[arg(long = "download")]
        downloads: Vec<DownloadKind>,
    },
    /// Show operational metrics
    Metrics {
        /// Lookback window in hours: 1, 24 or 168
        #[arg(long, default_value_t = 24)]
        hours: u32,

        /// summary, api, ai or ui
        #[arg(long, default_value = "summary")]
        tab: MetricsTab,
    },
}

pub struct AppState {
    config: DashboardConfig,
    api: Arc<dyn VideoApi>,
    telemetry: UiTelemetry,
    downloader: Downloader,
}

impl AppState {
    fn new(config: DashboardConfig) -> Result<Self> {
        let http = HttpVideoApi::new(&config)?;
        info!("Using backend at {}", http.base_url());
        let api: Arc<dyn VideoApi> = Arc::new(http);
        Ok(Self {
            telemetry: UiTelemetry::new(api.clone()),
            downloader: Downloader::new(config.download_dir.clone()),
            api,
            config,
        })
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = DashboardConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }
    if let Some(dir) = cli.out_dir {
        config.download_dir = dir;
    }
    let state = AppState::new(config)?;

    match cli.command {
        Command::Process {
            file,
            points,
            display_size,
            preview_out,
            downloads,
        } => {
            handlers::process(
                &state,
                ProcessOptions {
                    file,
                    points,
                    display_size,
                    preview_out,
                    downloads,
                },
            )
            .await
        }
        Command::Status { task_id } => handlers::status(&state, &task_id).await,
        Command::Cancel { task_id } => handlers::cancel(&state, &task_id).await,
        Command::Results { task_id, downloads } => {
            handlers::results(&state, &task_id, &downloads).await
        }
        Command::Metrics { hours, tab } => handlers::metrics(&state, hours, tab).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        debug!("{:?}", e);
        error!("{}", handle_api_error(&e));
        std::process::exit(1);
    }
}
