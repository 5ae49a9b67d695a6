// src/handlers.rs
use crate::AppState;
use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use people_counter_dashboard::errors::DashboardError;
use people_counter_dashboard::models::{Point, UiEventType};
use people_counter_dashboard::services::api_client::metrics_chart_url;
use people_counter_dashboard::services::metrics_view::TabView;
use people_counter_dashboard::services::results::has_in_out_events;
use people_counter_dashboard::services::telemetry::measure_execution_time;
use people_counter_dashboard::services::{
    ComponentMetrics, DisplayRect, DownloadKind, LogNotifier, MetricsSnapshot, MetricsTab,
    MetricsWindow, ResultsDownloads, ResultsPage, UploadWorkflow, VideoFile, WorkflowOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Parses `X,Y` display-space coordinates.
pub fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", raw))?;
    let x: f64 = x.trim().parse().map_err(|_| format!("bad X in '{}'", raw))?;
    let y: f64 = y.trim().parse().map_err(|_| format!("bad Y in '{}'", raw))?;
    Ok(Point::new(x, y))
}

/// Parses `WxH`, the size the preview is shown at.
pub fn parse_display_size(raw: &str) -> Result<(f64, f64), String> {
    let (w, h) = raw
        .to_ascii_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().to_string(), h.trim().to_string()))
        .ok_or_else(|| format!("expected WxH but got '{}'", raw))?;
    let w: f64 = w.parse().map_err(|_| format!("bad width in '{}'", raw))?;
    let h: f64 = h.parse().map_err(|_| format!("bad height in '{}'", raw))?;
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("display size must be positive, got '{}'", raw));
    }
    Ok((w, h))
}

pub struct ProcessOptions {
    pub file: PathBuf,
    pub points: Vec<Point>,
    pub display_size: Option<(f64, f64)>,
    pub preview_out: Option<PathBuf>,
    pub downloads: Vec<DownloadKind>,
}

/// Upload screen: preview, optional line, submit, then follow the task.
pub async fn process(state: &AppState, opts: ProcessOptions) -> Result<()> {
    let screen = ComponentMetrics::new(state.telemetry.clone(), "UploadScreen");
    let file = VideoFile::load(&opts.file).await?;

    let mut workflow = UploadWorkflow::new(state.api.clone(), state.config.poll_interval)
        .on_complete(|task_id| info!("Processing of task {} finished", task_id));

    if let Err(e) = workflow.select_file(file).await {
        warn!("Preview unavailable: {}", e.to_api_error());
    }
    screen.mark_load_end();

    if opts.points.is_empty() {
        workflow.cancel_line_setup();
    } else {
        if opts.points.len() != 2 {
            return Err(DashboardError::Validation(
                "Exactly two --point values are needed to draw the line".into(),
            )
            .into());
        }
        if workflow.line_capture().is_none() {
            workflow.set_use_line(true).await?;
        }
        let capture = workflow
            .line_capture()
            .ok_or_else(|| DashboardError::Validation("Line setup could not be opened".into()))?;
        let rect = match opts.display_size {
            Some((width, height)) => DisplayRect::new(0.0, 0.0, width, height),
            None => DisplayRect::native(capture.preview().width, capture.preview().height),
        };

        for point in &opts.points {
            if !workflow.capture_click(point.x, point.y, rect)? {
                return Err(DashboardError::Validation(format!(
                    "Point ({}, {}) was not accepted",
                    point.x, point.y
                ))
                .into());
            }
        }
        if let Some(path) = &opts.preview_out {
            let capture = workflow
                .line_capture()
                .ok_or_else(|| DashboardError::Validation("Line setup closed unexpectedly".into()))?;
            let png = capture.surface_png()?;
            tokio::fs::write(path, png)
                .await
                .map_err(DashboardError::from)?;
            info!("Line preview written to {}", path.display());
        }
        workflow.save_line()?;
    }

    let task_id = measure_execution_time(
        &state.telemetry,
        "UploadScreen",
        UiEventType::Interaction,
        workflow.submit(),
    )
    .await?;
    println!("Task {} submitted, press Ctrl-C to cancel", task_id);

    let outcome = tokio::select! {
        outcome = workflow.run_to_completion() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(WorkflowOutcome::Completed(task_id)) => {
            results(state, &task_id, &opts.downloads).await
        }
        Some(WorkflowOutcome::Failed(message)) => Err(DashboardError::Validation(message).into()),
        Some(WorkflowOutcome::Stopped) => Err(DashboardError::Validation(
            "Polling stopped before the task finished".into(),
        )
        .into()),
        None => {
            workflow.cancel().await;
            println!("Task {} cancelled", task_id);
            Ok(())
        }
    }
}

pub async fn status(state: &AppState, task_id: &str) -> Result<()> {
    let status = state.api.get_task_status(task_id).await?;
    println!("Task:     {}", status.task_id);
    println!("Status:   {:?}", status.status);
    println!("Progress: {}%", status.progress_percent());
    if let Some(message) = status.message.as_deref().filter(|m| !m.is_empty()) {
        println!("Message:  {}", message);
    }
    if let Some(updated) = &status.updated_at {
        println!("Updated:  {}", updated);
    }
    Ok(())
}

pub async fn cancel(state: &AppState, task_id: &str) -> Result<()> {
    let ack = state.api.cancel_task(task_id).await?;
    println!("{} ({})", ack.message, ack.task_id);
    Ok(())
}

/// Results screen, followed by the requested downloads.
pub async fn results(state: &AppState, task_id: &str, downloads: &[DownloadKind]) -> Result<()> {
    let mut screen = ComponentMetrics::new(state.telemetry.clone(), "ResultsScreen");
    let page = ResultsPage::load(state.api.as_ref(), task_id).await?;
    screen.mark_load_end();
    screen.mark_render_start();

    let bundle = &page.bundle;
    let info = &bundle.video_info;
    let cards = page.summary_cards();

    println!("Results for task {} ({})", page.task_id, bundle.filename);
    println!(
        "  Video:           {}x{} @ {:.1} fps, {} frames, {}",
        info.width,
        info.height,
        info.fps,
        info.frame_count,
        page.duration_label()
    );
    println!("  Processing time: {}", page.processing_time_label());
    println!("  Created:         {}", bundle.created_at);
    println!(
        "  IN: {}  OUT: {}  Frames analyzed: {}  Max per frame: {}",
        cards.total_in, cards.total_out, cards.frames_analyzed, cards.max_per_frame
    );
    println!(
        "  People per frame: min {} / avg {:.2} / max {}",
        bundle.summary.min_count, bundle.summary.avg_count, bundle.summary.max_count
    );

    if let Some(peak) = page.count_series().iter().max_by_key(|p| p.count) {
        println!("  Peak: {} people at {:.1}s (frame {})", peak.count, peak.time, peak.frame);
    }
    let in_out = page.in_out_series();
    if has_in_out_events(&in_out) {
        if let Some(last) = in_out.last() {
            println!(
                "  Line crossings by {:.1}s: {} in, {} out",
                last.time, last.cumulative_in, last.cumulative_out
            );
        }
    }
    match &page.heatmap {
        Some(heatmap) => {
            let (w, h) = heatmap.image.dimensions();
            println!("  Heatmap:         {} ({}x{})", heatmap.filename, w, h);
        }
        None => println!("  Heatmap:         not available"),
    }
    screen.mark_render_end();

    if downloads.is_empty() {
        return Ok(());
    }
    info!("Saving downloads to {}", state.downloader.dir().display());
    let files = ResultsDownloads::new(
        state.api.clone(),
        state.downloader.clone(),
        Arc::new(LogNotifier),
    );
    for kind in downloads {
        if let Some(path) = files.download(task_id, *kind).await {
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

pub async fn metrics(state: &AppState, hours: u32, tab: MetricsTab) -> Result<()> {
    let window = MetricsWindow::from_hours(hours)?;
    let screen = ComponentMetrics::new(state.telemetry.clone(), "MetricsDashboard");
    let snapshot = MetricsSnapshot::load(state.api.as_ref(), window, Utc::now()).await;
    screen.mark_load_end();

    let view = snapshot.view(tab)?;

    println!("Metrics for the last {}h", window.hours());
    match view {
        TabView::Summary(summary) => {
            println!("  Period: {} .. {}", summary.period.start, summary.period.end);
            println!(
                "  API: {} requests, avg {:.2} ms (min {:.2} / max {:.2})",
                summary.api.total_requests,
                summary.api.avg_response_time_ms,
                summary.api.min_response_time_ms,
                summary.api.max_response_time_ms
            );
            println!(
                "  AI:  {} frames, {} detections, avg confidence {:.2}%",
                summary.ai.total_frames,
                summary.ai.total_detections,
                summary.ai.avg_confidence * 100.0
            );
            println!(
                "  UI:  {} events, avg load {:.2} ms",
                summary.ui.total_events, summary.ui.avg_load_time_ms
            );
        }
        TabView::Api { summary, chart } => {
            println!(
                "  {} requests, avg {:.2} ms (min {:.2} / max {:.2})",
                summary.total_requests,
                summary.avg_response_time_ms,
                summary.min_response_time_ms,
                summary.max_response_time_ms
            );
            let mut codes: Vec<_> = summary.status_codes.iter().collect();
            codes.sort();
            for (code, count) in codes {
                println!("  HTTP {}: {}", code, count);
            }
            for point in &chart {
                println!("  {}  {:.2} ms", point.time, point.response_time_ms);
            }
            println!("  Chart: {}", metrics_chart_url("api", window.hours()));
        }
        TabView::Ai { summary, chart } => {
            println!(
                "  {} frames, {} detections, avg confidence {:.2}%, {:.2} per frame (min {} / max {})",
                summary.total_frames,
                summary.total_detections,
                summary.avg_confidence * 100.0,
                summary.avg_detections_per_frame,
                summary.min_detections_per_frame,
                summary.max_detections_per_frame
            );
            for point in &chart {
                println!(
                    "  frame {:>6}  confidence {:.3}  detections {}",
                    point.frame, point.confidence, point.detections
                );
            }
            println!("  Chart: {}", metrics_chart_url("ai", window.hours()));
        }
        TabView::Ui { summary, chart } => {
            println!(
                "  {} events, avg load {:.2} ms, avg render {:.2} ms",
                summary.total_events, summary.avg_load_time_ms, summary.avg_render_time_ms
            );
            for point in &chart {
                println!(
                    "  {}  load {:.2} ms  render {:.2} ms",
                    point.time, point.load_time_ms, point.render_time_ms
                );
            }
            println!("  Chart: {}", metrics_chart_url("ui", window.hours()));
        }
    }

    if !snapshot.is_complete() {
        warn!("Some metrics datasets failed to load; other tabs may be unavailable");
    }
    Ok(())
}
