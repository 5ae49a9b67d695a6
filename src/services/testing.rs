// src/services/testing.rs
//! Scriptable in-memory backend for unit tests.

use crate::errors::DashboardError;
use crate::models::*;
use crate::services::api_client::{DownloadKind, VideoApi, VideoFile};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

fn server_error(message: &str) -> DashboardError {
    DashboardError::Server {
        status: 500,
        error: message.to_string(),
        detail: None,
    }
}

pub fn status(task_id: &str, status: TaskStatus, progress: Option<f64>) -> TaskStatusResponse {
    TaskStatusResponse {
        task_id: task_id.to_string(),
        status,
        progress,
        message: None,
        created_at: None,
        updated_at: None,
    }
}

#[derive(Default)]
struct Script {
    preview: Option<PreviewResponse>,
    upload_task_id: Option<String>,
    statuses: VecDeque<TaskStatusResponse>,
    status_delay: Duration,
    cancel_fails: bool,
    results: Option<ResultsBundle>,
    heatmap: Option<HeatmapImage>,
    blob: Option<Bytes>,
    api_metrics: Option<ApiMetricsResponse>,
    ai_metrics: Option<AiMetricsResponse>,
    ui_metrics: Option<UiMetricsResponse>,
    summary: Option<MetricsSummaryResponse>,
    telemetry_fails: bool,
    telemetry_delay: Duration,
}

#[derive(Default)]
pub struct FakeApi {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, bool, Option<LineConfig>)>>,
    ui_metrics_sent: Mutex<Vec<UiMetric>>,
}

impl FakeApi {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn uploads(&self) -> Vec<(String, bool, Option<LineConfig>)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn ui_metrics_sent(&self) -> Vec<UiMetric> {
        self.ui_metrics_sent.lock().unwrap().clone()
    }

    pub fn with_preview(&self, preview: PreviewResponse) {
        self.script.lock().unwrap().preview = Some(preview);
    }

    pub fn fail_preview(&self) {
        self.script.lock().unwrap().preview = None;
    }

    pub fn with_upload(&self, task_id: &str) {
        self.script.lock().unwrap().upload_task_id = Some(task_id.to_string());
    }

    /// Statuses are served in order; the last one repeats forever.
    pub fn with_statuses(&self, statuses: Vec<TaskStatusResponse>) {
        self.script.lock().unwrap().statuses = statuses.into();
    }

    pub fn with_status_delay(&self, delay: Duration) {
        self.script.lock().unwrap().status_delay = delay;
    }

    pub fn fail_cancel(&self) {
        self.script.lock().unwrap().cancel_fails = true;
    }

    pub fn with_results(&self, results: ResultsBundle) {
        self.script.lock().unwrap().results = Some(results);
    }

    pub fn with_heatmap(&self, heatmap: HeatmapImage) {
        self.script.lock().unwrap().heatmap = Some(heatmap);
    }

    pub fn with_blob(&self, blob: &'static [u8]) {
        self.script.lock().unwrap().blob = Some(Bytes::from_static(blob));
    }

    pub fn with_api_metrics(&self, metrics: ApiMetricsResponse) {
        self.script.lock().unwrap().api_metrics = Some(metrics);
    }

    pub fn with_ai_metrics(&self, metrics: AiMetricsResponse) {
        self.script.lock().unwrap().ai_metrics = Some(metrics);
    }

    pub fn with_ui_metrics(&self, metrics: UiMetricsResponse) {
        self.script.lock().unwrap().ui_metrics = Some(metrics);
    }

    pub fn with_summary(&self, summary: MetricsSummaryResponse) {
        self.script.lock().unwrap().summary = Some(summary);
    }

    pub fn fail_telemetry(&self) {
        self.script.lock().unwrap().telemetry_fails = true;
    }

    pub fn with_telemetry_delay(&self, delay: Duration) {
        self.script.lock().unwrap().telemetry_delay = delay;
    }
}

#[async_trait]
impl VideoApi for FakeApi {
    async fn upload_preview(&self, file: &VideoFile) -> Result<PreviewResponse, DashboardError> {
        self.record(format!("upload_preview:{}", file.name));
        self.script
            .lock()
            .unwrap()
            .preview
            .clone()
            .ok_or_else(|| server_error("Preview failed"))
    }

    async fn upload_video(
        &self,
        file: &VideoFile,
        use_line: bool,
        line_config: Option<&LineConfig>,
    ) -> Result<UploadResponse, DashboardError> {
        self.record(format!("upload_video:{}", file.name));
        self.uploads
            .lock()
            .unwrap()
            .push((file.name.clone(), use_line, line_config.copied()));
        let task_id = self.script.lock().unwrap().upload_task_id.clone();
        task_id
            .map(|task_id| UploadResponse {
                task_id,
                message: "queued".into(),
                filename: file.name.clone(),
            })
            .ok_or_else(|| server_error("Upload rejected"))
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse, DashboardError> {
        self.record(format!("get_task_status:{}", task_id));
        let (delay, next) = {
            let mut script = self.script.lock().unwrap();
            let next = if script.statuses.len() > 1 {
                script.statuses.pop_front()
            } else {
                script.statuses.front().cloned()
            };
            (script.status_delay, next)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        next.map(|mut s| {
            s.task_id = task_id.to_string();
            s
        })
        .ok_or_else(|| server_error("Task not found"))
    }

    async fn cancel_task(&self, task_id: &str) -> Result<CancelResponse, DashboardError> {
        self.record(format!("cancel_task:{}", task_id));
        if self.script.lock().unwrap().cancel_fails {
            return Err(DashboardError::Transport("connection reset".into()));
        }
        Ok(CancelResponse {
            message: "cancelled".into(),
            task_id: task_id.to_string(),
        })
    }

    async fn get_results(&self, task_id: &str) -> Result<ResultsBundle, DashboardError> {
        self.record(format!("get_results:{}", task_id));
        self.script
            .lock()
            .unwrap()
            .results
            .clone()
            .ok_or_else(|| server_error("Results not found"))
    }

    async fn get_heatmap_image(&self, task_id: &str) -> Result<HeatmapImage, DashboardError> {
        self.record(format!("get_heatmap_image:{}", task_id));
        self.script
            .lock()
            .unwrap()
            .heatmap
            .clone()
            .ok_or_else(|| server_error("Heatmap not found"))
    }

    async fn download(&self, task_id: &str, kind: DownloadKind) -> Result<Bytes, DashboardError> {
        self.record(format!("download:{}:{:?}", task_id, kind));
        self.script
            .lock()
            .unwrap()
            .blob
            .clone()
            .ok_or_else(|| server_error("File not found"))
    }

    async fn get_api_metrics(
        &self,
        _query: &MetricsQuery,
    ) -> Result<ApiMetricsResponse, DashboardError> {
        self.record("get_api_metrics".into());
        self.script
            .lock()
            .unwrap()
            .api_metrics
            .clone()
            .ok_or_else(|| server_error("API metrics unavailable"))
    }

    async fn get_ai_metrics(
        &self,
        _query: &MetricsQuery,
    ) -> Result<AiMetricsResponse, DashboardError> {
        self.record("get_ai_metrics".into());
        self.script
            .lock()
            .unwrap()
            .ai_metrics
            .clone()
            .ok_or_else(|| server_error("AI metrics unavailable"))
    }

    async fn get_ui_metrics(
        &self,
        _query: &MetricsQuery,
    ) -> Result<UiMetricsResponse, DashboardError> {
        self.record("get_ui_metrics".into());
        self.script
            .lock()
            .unwrap()
            .ui_metrics
            .clone()
            .ok_or_else(|| server_error("UI metrics unavailable"))
    }

    async fn get_metrics_summary(
        &self,
        hours: u32,
    ) -> Result<MetricsSummaryResponse, DashboardError> {
        self.record(format!("get_metrics_summary:{}", hours));
        self.script
            .lock()
            .unwrap()
            .summary
            .clone()
            .ok_or_else(|| server_error("Summary unavailable"))
    }

    async fn send_ui_metric(&self, metric: &UiMetric) -> Result<(), DashboardError> {
        let (delay, fails) = {
            let script = self.script.lock().unwrap();
            (script.telemetry_delay, script.telemetry_fails)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.ui_metrics_sent.lock().unwrap().push(metric.clone());
        if fails {
            return Err(DashboardError::Transport("telemetry endpoint down".into()));
        }
        Ok(())
    }
}
