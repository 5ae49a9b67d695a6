// src/services/api_client.rs
use crate::config::DashboardConfig;
use crate::errors::DashboardError;
use crate::models::*;
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// A video chosen for upload, held in memory like a browser `File`.
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub name: String,
    pub mime: String,
    pub data: Bytes,
}

impl VideoFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime = guess_video_mime(&name).to_string();
        Self {
            name,
            mime,
            data: data.into(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self, DashboardError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DashboardError::Validation(format!("Not a file path: {}", path.display()))
            })?
            .to_string();
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(name, data))
    }

    fn to_part(&self) -> Result<Part, DashboardError> {
        Part::bytes(self.data.to_vec())
            .file_name(self.name.clone())
            .mime_str(&self.mime)
            .map_err(DashboardError::from)
    }
}

fn guess_video_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Binary artefacts a completed task offers for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadKind {
    Video,
    Heatmap,
    Stats,
    Report,
}

impl DownloadKind {
    pub fn path(self, task_id: &str) -> String {
        let suffix = match self {
            DownloadKind::Video => "video",
            DownloadKind::Heatmap => "heatmap",
            DownloadKind::Stats => "stats",
            DownloadKind::Report => "report",
        };
        format!("/results/{}/{}", task_id, suffix)
    }

    pub fn default_filename(self, task_id: &str) -> String {
        match self {
            DownloadKind::Video => format!("processed_video_{}.mp4", task_id),
            DownloadKind::Heatmap => format!("heatmap_{}.png", task_id),
            DownloadKind::Stats => format!("stats_{}.json", task_id),
            DownloadKind::Report => format!("report_{}.pdf", task_id),
        }
    }
}

impl std::str::FromStr for DownloadKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(DownloadKind::Video),
            "heatmap" => Ok(DownloadKind::Heatmap),
            "stats" => Ok(DownloadKind::Stats),
            "report" => Ok(DownloadKind::Report),
            other => Err(DashboardError::Validation(format!(
                "Unknown download type: {}",
                other
            ))),
        }
    }
}

/// Relative URL of a server-rendered metrics chart.
pub fn metrics_chart_url(metric_type: &str, hours: u32) -> String {
    format!("/metrics/charts/{}?hours={}", metric_type, hours)
}

/// One operation per backend capability. Implementations never retry.
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn upload_preview(&self, file: &VideoFile) -> Result<PreviewResponse, DashboardError>;

    async fn upload_video(
        &self,
        file: &VideoFile,
        use_line: bool,
        line_config: Option<&LineConfig>,
    ) -> Result<UploadResponse, DashboardError>;

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse, DashboardError>;

    async fn cancel_task(&self, task_id: &str) -> Result<CancelResponse, DashboardError>;

    async fn get_results(&self, task_id: &str) -> Result<ResultsBundle, DashboardError>;

    async fn get_heatmap_image(&self, task_id: &str) -> Result<HeatmapImage, DashboardError>;

    async fn download(&self, task_id: &str, kind: DownloadKind) -> Result<Bytes, DashboardError>;

    async fn get_api_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<ApiMetricsResponse, DashboardError>;

    async fn get_ai_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<AiMetricsResponse, DashboardError>;

    async fn get_ui_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<UiMetricsResponse, DashboardError>;

    async fn get_metrics_summary(
        &self,
        hours: u32,
    ) -> Result<MetricsSummaryResponse, DashboardError>;

    async fn send_ui_metric(&self, metric: &UiMetric) -> Result<(), DashboardError>;
}

pub struct HttpVideoApi {
    client: Client,
    base_url: String,
    preview_timeout: Duration,
    upload_timeout: Duration,
}

impl HttpVideoApi {
    pub fn new(config: &DashboardConfig) -> Result<Self, DashboardError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DashboardError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            preview_timeout: config.preview_timeout,
            upload_timeout: config.upload_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = Uuid::new_v4();
        debug!("{} {} (request_id={})", method, path, request_id);
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-request-id", request_id.to_string())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DashboardError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("request failed with {}: {}", status, body);
        Err(DashboardError::from_error_body(status.as_u16(), &body))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, DashboardError> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| DashboardError::Decode(e.to_string()))
    }

    fn metrics_request(&self, path: &str, filter_key: &str, query: &MetricsQuery) -> RequestBuilder {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(start) = &query.start_time {
            params.push(("start_time", start.as_str()));
        }
        if let Some(end) = &query.end_time {
            params.push(("end_time", end.as_str()));
        }
        if let Some(filter) = &query.filter {
            params.push((filter_key, filter.as_str()));
        }
        self.request(Method::GET, path).query(&params)
    }
}

#[async_trait]
impl VideoApi for HttpVideoApi {
    async fn upload_preview(&self, file: &VideoFile) -> Result<PreviewResponse, DashboardError> {
        let form = Form::new().part("file", file.to_part()?);
        let request = self
            .request(Method::POST, "/upload/preview")
            .timeout(self.preview_timeout)
            .multipart(form);
        self.json(request).await
    }

    async fn upload_video(
        &self,
        file: &VideoFile,
        use_line: bool,
        line_config: Option<&LineConfig>,
    ) -> Result<UploadResponse, DashboardError> {
        let mut form = Form::new()
            .part("file", file.to_part()?)
            .text("use_line", use_line.to_string());

        if let (true, Some(line)) = (use_line, line_config) {
            let encoded = serde_json::to_string(line)
                .map_err(|e| DashboardError::Validation(format!("Invalid line config: {}", e)))?;
            form = form.text("line_config", encoded);
        }

        let request = self
            .request(Method::POST, "/upload")
            .timeout(self.upload_timeout)
            .multipart(form);
        self.json(request).await
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse, DashboardError> {
        self.json(self.request(Method::GET, &format!("/tasks/{}", task_id)))
            .await
    }

    async fn cancel_task(&self, task_id: &str) -> Result<CancelResponse, DashboardError> {
        self.json(self.request(Method::POST, &format!("/tasks/{}/cancel", task_id)))
            .await
    }

    async fn get_results(&self, task_id: &str) -> Result<ResultsBundle, DashboardError> {
        self.json(self.request(Method::GET, &format!("/results/{}", task_id)))
            .await
    }

    async fn get_heatmap_image(&self, task_id: &str) -> Result<HeatmapImage, DashboardError> {
        self.json(self.request(Method::GET, &format!("/results/{}/heatmap/image", task_id)))
            .await
    }

    async fn download(&self, task_id: &str, kind: DownloadKind) -> Result<Bytes, DashboardError> {
        let response = self
            .send(self.request(Method::GET, &kind.path(task_id)))
            .await?;
        Ok(response.bytes().await?)
    }

    async fn get_api_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<ApiMetricsResponse, DashboardError> {
        self.json(self.metrics_request("/metrics/api", "endpoint", query))
            .await
    }

    async fn get_ai_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<AiMetricsResponse, DashboardError> {
        self.json(self.metrics_request("/metrics/ai", "task_id", query))
            .await
    }

    async fn get_ui_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<UiMetricsResponse, DashboardError> {
        self.json(self.metrics_request("/metrics/ui", "component", query))
            .await
    }

    async fn get_metrics_summary(
        &self,
        hours: u32,
    ) -> Result<MetricsSummaryResponse, DashboardError> {
        let request = self
            .request(Method::GET, "/metrics/summary")
            .query(&[("hours", hours)]);
        self.json(request).await
    }

    async fn send_ui_metric(&self, metric: &UiMetric) -> Result<(), DashboardError> {
        self.send(self.request(Method::POST, "/metrics/ui").json(metric))
            .await?;
        Ok(())
    }
}
