// src/models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TaskStatusResponse {
    /// Progress as a whole percentage in `0..=100`; a missing value reads as 0.
    pub fn progress_percent(&self) -> u8 {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub message: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub task_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// Base64 payload, usually as a `data:image/...;base64,` URL.
    pub preview_image: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// IN/OUT counting line in source-image pixels. `point1 -> point2` is the
/// line direction the backend uses to tell IN from OUT.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineConfig {
    pub point1: Point,
    pub point2: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStatistic {
    pub frame: u64,
    #[serde(default)]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingStats {
    pub total_in: u32,
    pub total_out: u32,
    pub current_inside: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub max_count: u32,
    pub min_count: u32,
    pub avg_count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsBundle {
    pub task_id: String,
    #[serde(default)]
    pub filename: String,
    pub video_info: VideoInfo,
    #[serde(default)]
    pub statistics: Vec<FrameStatistic>,
    #[serde(default)]
    pub tracking: Option<TrackingStats>,
    #[serde(default)]
    pub summary: SummaryStats,
    pub created_at: String,
    /// Seconds spent processing, when the backend recorded it.
    #[serde(default)]
    pub processing_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapImage {
    pub image: String,
    #[serde(default)]
    pub filename: String,
}

// Telemetry streams

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMetric {
    pub timestamp: String,
    pub endpoint: String,
    pub method: String,
    pub response_time_ms: f64,
    pub status_code: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetricsSummary {
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    #[serde(default)]
    pub status_codes: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMetricsResponse {
    #[serde(default)]
    pub metrics: Vec<ApiMetric>,
    #[serde(default)]
    pub summary: ApiMetricsSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMetric {
    pub timestamp: String,
    pub task_id: String,
    pub frame: u64,
    pub avg_confidence: f64,
    pub detections_count: u32,
    #[serde(default)]
    pub high_confidence_count: u32,
    #[serde(default)]
    pub medium_confidence_count: u32,
    #[serde(default)]
    pub low_confidence_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiMetricsSummary {
    pub total_frames: u64,
    pub total_detections: u64,
    pub avg_confidence: f64,
    #[serde(default)]
    pub avg_detections_per_frame: f64,
    #[serde(default)]
    pub max_detections_per_frame: u32,
    #[serde(default)]
    pub min_detections_per_frame: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMetricsResponse {
    #[serde(default)]
    pub metrics: Vec<AiMetric>,
    #[serde(default)]
    pub summary: AiMetricsSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiEventType {
    Load,
    Render,
    Interaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiMetricRecord {
    pub timestamp: String,
    pub component: String,
    pub load_time_ms: f64,
    #[serde(default)]
    pub render_time_ms: Option<f64>,
    pub event_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiMetricsSummary {
    pub total_events: u64,
    pub avg_load_time_ms: f64,
    #[serde(default)]
    pub avg_render_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiMetricsResponse {
    #[serde(default)]
    pub metrics: Vec<UiMetricRecord>,
    #[serde(default)]
    pub summary: UiMetricsSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPeriod {
    pub start: String,
    pub end: String,
    pub hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSummary {
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSummary {
    pub total_frames: u64,
    pub total_detections: u64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSummary {
    pub total_events: u64,
    pub avg_load_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummaryResponse {
    pub period: SummaryPeriod,
    pub api: ApiSummary,
    pub ai: AiSummary,
    pub ui: UiSummary,
}

/// Outbound UI telemetry event (`POST /metrics/ui`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMetric {
    pub component: String,
    pub load_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_time_ms: Option<f64>,
    pub event_type: UiEventType,
}

/// Time window and optional filter for a telemetry stream query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// `endpoint` for API metrics, `task_id` for AI metrics, `component` for UI metrics.
    pub filter: Option<String>,
}
