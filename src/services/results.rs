// src/services/results.rs
use crate::errors::DashboardError;
use crate::models::{FrameStatistic, HeatmapImage, ResultsBundle};
use crate::services::api_client::{DownloadKind, VideoApi};
use crate::services::downloads::Downloader;
use crate::services::preview_renderer::decode_base64_image;
use image::RgbaImage;
use log::{debug, error, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const NOT_AVAILABLE: &str = "N/A";

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour up.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

fn frame_time(frame: u64, fps: f64) -> f64 {
    if fps <= 0.0 || !fps.is_finite() {
        return 0.0;
    }
    (frame as f64 / fps * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountPoint {
    pub frame: u64,
    /// Seconds into the video, one decimal.
    pub time: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InOutPoint {
    pub frame: u64,
    pub time: f64,
    pub cumulative_in: u32,
    pub cumulative_out: u32,
}

pub fn count_series(statistics: &[FrameStatistic], fps: f64) -> Vec<CountPoint> {
    statistics
        .iter()
        .map(|stat| CountPoint {
            frame: stat.frame,
            time: frame_time(stat.frame, fps),
            count: stat.count,
        })
        .collect()
}

/// Cumulative IN/OUT per frame. Frames without an explicit value keep the
/// last one seen.
pub fn cumulative_in_out(statistics: &[FrameStatistic], fps: f64) -> Vec<InOutPoint> {
    let mut cumulative_in = 0;
    let mut cumulative_out = 0;

    statistics
        .iter()
        .map(|stat| {
            if let Some(value) = stat.in_count {
                cumulative_in = value;
            }
            if let Some(value) = stat.out_count {
                cumulative_out = value;
            }
            InOutPoint {
                frame: stat.frame,
                time: frame_time(stat.frame, fps),
                cumulative_in,
                cumulative_out,
            }
        })
        .collect()
}

pub fn has_in_out_events(series: &[InOutPoint]) -> bool {
    series
        .iter()
        .any(|p| p.cumulative_in > 0 || p.cumulative_out > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryCards {
    pub total_in: u32,
    pub total_out: u32,
    pub frames_analyzed: usize,
    pub max_per_frame: u32,
}

pub struct HeatmapView {
    pub filename: String,
    pub image: RgbaImage,
}

fn decode_heatmap(heatmap: HeatmapImage) -> Result<HeatmapView, DashboardError> {
    let bytes = decode_base64_image(&heatmap.image)?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| DashboardError::ImageProcessing(e.to_string()))?
        .to_rgba8();
    Ok(HeatmapView {
        filename: heatmap.filename,
        image,
    })
}

/// Everything the results screen shows for one completed task.
pub struct ResultsPage {
    pub task_id: String,
    pub bundle: ResultsBundle,
    pub heatmap: Option<HeatmapView>,
}

impl ResultsPage {
    /// Fetches the bundle and the heatmap side by side. Only the bundle is
    /// required; a missing or broken heatmap is logged and left out.
    pub async fn load(api: &dyn VideoApi, task_id: &str) -> Result<Self, DashboardError> {
        if task_id.trim().is_empty() {
            return Err(DashboardError::Validation("Task id is required".into()));
        }

        let (bundle, heatmap) =
            tokio::join!(api.get_results(task_id), api.get_heatmap_image(task_id));
        let bundle = bundle?;

        let heatmap = match heatmap.and_then(decode_heatmap) {
            Ok(view) => Some(view),
            Err(e) => {
                warn!("Heatmap for task {} unavailable: {}", task_id, e);
                None
            }
        };

        Ok(Self {
            task_id: task_id.to_string(),
            bundle,
            heatmap,
        })
    }

    pub fn duration_label(&self) -> String {
        format_duration(self.bundle.video_info.duration)
    }

    pub fn processing_time_label(&self) -> String {
        match self.bundle.processing_time {
            Some(seconds) if seconds > 0.0 => format_duration(seconds),
            _ => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn count_series(&self) -> Vec<CountPoint> {
        count_series(&self.bundle.statistics, self.bundle.video_info.fps)
    }

    pub fn in_out_series(&self) -> Vec<InOutPoint> {
        cumulative_in_out(&self.bundle.statistics, self.bundle.video_info.fps)
    }

    pub fn summary_cards(&self) -> SummaryCards {
        let tracking = self.bundle.tracking.clone().unwrap_or_default();
        SummaryCards {
            total_in: tracking.total_in,
            total_out: tracking.total_out,
            frames_analyzed: self.bundle.statistics.len(),
            max_per_frame: self.bundle.summary.max_count,
        }
    }
}

/// Blocking, user-facing notification for failures that happen away from
/// any inline error slot.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Reports alerts through the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        error!("{}", message);
    }
}

/// Result downloads with a per-type "in flight" marker.
pub struct ResultsDownloads {
    api: Arc<dyn VideoApi>,
    downloader: Downloader,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<HashSet<DownloadKind>>,
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<DownloadKind>>,
    kind: DownloadKind,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.kind);
    }
}

impl ResultsDownloads {
    pub fn new(api: Arc<dyn VideoApi>, downloader: Downloader, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            downloader,
            notifier,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_downloading(&self, kind: DownloadKind) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
    }

    fn begin(&self, kind: DownloadKind) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(kind) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            kind,
        })
    }

    /// Downloads one artifact under its default name. Failures go to the
    /// notifier; `None` means nothing was saved.
    pub async fn download(&self, task_id: &str, kind: DownloadKind) -> Option<PathBuf> {
        let Some(_marker) = self.begin(kind) else {
            debug!("{:?} download for {} already in flight", kind, task_id);
            return None;
        };

        match self
            .downloader
            .download(self.api.as_ref(), task_id, kind, None)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                self.notifier
                    .alert(&format!("Download failed: {}", e.to_api_error().error));
                None
            }
        }
    }
}
