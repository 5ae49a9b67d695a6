// src/services/mod.rs
pub mod api_client;
pub mod downloads;
pub mod line_capture;
pub mod metrics_view;
pub mod preview_renderer;
pub mod results;
pub mod telemetry;
pub mod workflow;

#[cfg(test)]
pub mod testing;

pub use api_client::{DownloadKind, HttpVideoApi, VideoApi, VideoFile};
pub use downloads::Downloader;
pub use line_capture::{DisplayRect, LineCapture};
pub use metrics_view::{MetricsSnapshot, MetricsTab, MetricsWindow};
pub use preview_renderer::{PreviewData, PreviewRenderer};
pub use results::{LogNotifier, Notifier, ResultsDownloads, ResultsPage};
pub use telemetry::{ComponentMetrics, UiTelemetry};
pub use workflow::{UploadWorkflow, WorkflowOutcome, WorkflowPhase};
