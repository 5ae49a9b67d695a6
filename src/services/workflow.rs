// src/services/workflow.rs
//! Upload, optional line setup, submission and task polling.
//!
//! The workflow owns a single poll slot. Starting a poll cycle always drops
//! the previous one first, and dropping the slot aborts its ticker, so
//! completion, failure, cancellation and teardown all stop polling the same
//! way.

use crate::errors::{ApiError, DashboardError};
use crate::models::{LineConfig, TaskStatus, TaskStatusResponse};
use crate::services::api_client::{VideoApi, VideoFile};
use crate::services::line_capture::{DisplayRect, LineCapture};
use crate::services::preview_renderer::{PreviewData, PreviewRenderer};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_FAILURE_MESSAGE: &str = "Processing finished with an error";
pub const LINE_REQUIRED_MESSAGE: &str = "Configure the IN/OUT line before starting processing";

pub enum WorkflowPhase {
    /// No file selected.
    Idle,
    /// Preview request for the selected file is in flight.
    Previewing,
    LineSetup(LineCapture),
    /// File selected, ready to submit.
    Ready,
    Submitting,
    Processing {
        task_id: String,
        progress: u8,
    },
    Completed {
        task_id: String,
    },
    Failed {
        message: String,
    },
    Cancelled,
}

impl WorkflowPhase {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Previewing => "previewing",
            WorkflowPhase::LineSetup(_) => "line-setup",
            WorkflowPhase::Ready => "ready",
            WorkflowPhase::Submitting => "submitting",
            WorkflowPhase::Processing { .. } => "processing",
            WorkflowPhase::Completed { .. } => "completed",
            WorkflowPhase::Failed { .. } => "failed",
            WorkflowPhase::Cancelled => "cancelled",
        }
    }
}

/// What one status poll changed.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Progress {
        task_id: String,
        status: TaskStatus,
        progress: u8,
    },
    Completed {
        task_id: String,
    },
    Failed {
        message: String,
    },
    /// The status request itself failed; polling continues.
    PollError(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed(String),
    Failed(String),
    /// Polling stopped without a terminal status.
    Stopped,
}

struct Selection {
    file: VideoFile,
    preview: Option<PreviewData>,
    line: Option<LineConfig>,
    use_line: bool,
}

impl Selection {
    fn new(file: VideoFile) -> Self {
        Self {
            file,
            preview: None,
            line: None,
            use_line: false,
        }
    }
}

type PollResult = Result<TaskStatusResponse, DashboardError>;

/// The one active poll cycle. Dropping it stops the ticker and discards
/// responses still in flight.
struct PollHandle {
    task_id: String,
    ticker: JoinHandle<()>,
    events: mpsc::UnboundedReceiver<PollResult>,
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.ticker.abort();
        debug!("Stopped polling task {}", self.task_id);
    }
}

type CompletionHandler = Box<dyn FnMut(&str) + Send>;

pub struct UploadWorkflow {
    api: Arc<dyn VideoApi>,
    renderer: PreviewRenderer,
    poll_interval: Duration,
    phase: WorkflowPhase,
    selection: Option<Selection>,
    error: Option<String>,
    poller: Option<PollHandle>,
    on_complete: Option<CompletionHandler>,
}

impl UploadWorkflow {
    pub fn new(api: Arc<dyn VideoApi>, poll_interval: Duration) -> Self {
        Self {
            api,
            renderer: PreviewRenderer::new(),
            poll_interval,
            phase: WorkflowPhase::Idle,
            selection: None,
            error: None,
            poller: None,
            on_complete: None,
        }
    }

    /// Called once with the task id when processing completes.
    pub fn on_complete<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_complete = Some(Box::new(handler));
        self
    }

    pub fn phase(&self) -> &WorkflowPhase {
        &self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn file(&self) -> Option<&VideoFile> {
        self.selection.as_ref().map(|s| &s.file)
    }

    pub fn preview(&self) -> Option<&PreviewData> {
        self.selection.as_ref().and_then(|s| s.preview.as_ref())
    }

    pub fn line_config(&self) -> Option<&LineConfig> {
        self.selection.as_ref().and_then(|s| s.line.as_ref())
    }

    pub fn use_line(&self) -> bool {
        self.selection.as_ref().is_some_and(|s| s.use_line)
    }

    pub fn line_capture(&self) -> Option<&LineCapture> {
        match &self.phase {
            WorkflowPhase::LineSetup(capture) => Some(capture),
            _ => None,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match &self.phase {
            WorkflowPhase::Processing { task_id, .. } | WorkflowPhase::Completed { task_id } => {
                Some(task_id)
            }
            _ => None,
        }
    }

    pub fn progress(&self) -> u8 {
        match &self.phase {
            WorkflowPhase::Processing { progress, .. } => *progress,
            WorkflowPhase::Completed { .. } => 100,
            _ => 0,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(
            self.phase,
            WorkflowPhase::Submitting | WorkflowPhase::Processing { .. }
        )
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    fn record(&mut self, err: DashboardError) -> DashboardError {
        self.error = Some(err.to_api_error().error);
        err
    }

    /// Selects a new video. Everything derived from the previous file is
    /// dropped before the new preview is requested.
    pub async fn select_file(&mut self, file: VideoFile) -> Result<(), DashboardError> {
        if self.is_processing() {
            return Err(self.record(DashboardError::Validation(
                "Cannot change the video while it is being processed".into(),
            )));
        }

        self.stop_polling();
        info!("Selected {} ({} bytes)", file.name, file.data.len());
        self.selection = Some(Selection::new(file));
        self.error = None;
        self.phase = WorkflowPhase::Ready;

        self.load_preview().await
    }

    async fn load_preview(&mut self) -> Result<(), DashboardError> {
        let Some(file) = self.selection.as_ref().map(|s| s.file.clone()) else {
            return Err(self.record(DashboardError::Validation("Select a video first".into())));
        };

        self.phase = WorkflowPhase::Previewing;
        self.error = None;

        let preview = self
            .api
            .upload_preview(&file)
            .await
            .and_then(|response| self.renderer.decode_preview(&response));

        match preview {
            Ok(preview) => {
                debug!("Preview {}x{} for {}", preview.width, preview.height, file.name);
                if let Some(selection) = self.selection.as_mut() {
                    selection.preview = Some(preview.clone());
                }
                self.phase = WorkflowPhase::LineSetup(LineCapture::new(preview));
                Ok(())
            }
            Err(e) => {
                warn!("Preview for {} failed: {}", file.name, e);
                self.phase = WorkflowPhase::Ready;
                Err(self.record(e))
            }
        }
    }

    pub fn capture_click(
        &mut self,
        client_x: f64,
        client_y: f64,
        rect: DisplayRect,
    ) -> Result<bool, DashboardError> {
        match &mut self.phase {
            WorkflowPhase::LineSetup(capture) => Ok(capture.click(client_x, client_y, rect)),
            _ => Err(DashboardError::Validation("Line setup is not open".into())),
        }
    }

    pub fn reset_line(&mut self) -> Result<(), DashboardError> {
        match &mut self.phase {
            WorkflowPhase::LineSetup(capture) => {
                capture.reset();
                Ok(())
            }
            _ => Err(DashboardError::Validation("Line setup is not open".into())),
        }
    }

    pub fn save_line(&mut self) -> Result<LineConfig, DashboardError> {
        let saved = match &self.phase {
            WorkflowPhase::LineSetup(capture) => capture.save(),
            _ => Err(DashboardError::Validation("Line setup is not open".into())),
        };
        let line = match saved {
            Ok(line) => line,
            Err(e) => return Err(self.record(e)),
        };

        if let Some(selection) = self.selection.as_mut() {
            selection.line = Some(line);
            selection.use_line = true;
        }
        info!(
            "Line saved: P1({:.0}, {:.0}) -> P2({:.0}, {:.0})",
            line.point1.x, line.point1.y, line.point2.x, line.point2.y
        );
        self.phase = WorkflowPhase::Ready;
        Ok(line)
    }

    /// Closes line setup and turns line-based counting off.
    pub fn cancel_line_setup(&mut self) {
        if let WorkflowPhase::LineSetup(_) = self.phase {
            self.phase = WorkflowPhase::Ready;
        }
        if let Some(selection) = self.selection.as_mut() {
            selection.line = None;
            selection.use_line = false;
        }
    }

    /// Toggles line-based counting. Turning it on without a saved line
    /// reopens line setup, fetching the preview again if there is none.
    pub async fn set_use_line(&mut self, enabled: bool) -> Result<(), DashboardError> {
        if self.is_processing() {
            return Err(self.record(DashboardError::Validation(
                "Cannot change line settings while processing".into(),
            )));
        }
        let Some(selection) = self.selection.as_mut() else {
            return Err(self.record(DashboardError::Validation("Select a video first".into())));
        };

        if !enabled {
            selection.use_line = false;
            selection.line = None;
            return Ok(());
        }

        selection.use_line = true;
        if selection.line.is_some() {
            return Ok(());
        }

        match selection.preview.clone() {
            Some(preview) => {
                self.phase = WorkflowPhase::LineSetup(LineCapture::new(preview));
                Ok(())
            }
            None => self.load_preview().await,
        }
    }

    /// Uploads the selected video and starts polling the new task.
    pub async fn submit(&mut self) -> Result<String, DashboardError> {
        if self.is_processing() {
            return Err(self.record(DashboardError::Validation(
                "A video is already being processed".into(),
            )));
        }
        let Some(selection) = self.selection.as_ref() else {
            return Err(self.record(DashboardError::Validation("Select a video first".into())));
        };
        if selection.use_line && selection.line.is_none() {
            return Err(self.record(DashboardError::Validation(LINE_REQUIRED_MESSAGE.into())));
        }

        let file = selection.file.clone();
        let use_line = selection.use_line;
        let line = selection.line;

        self.error = None;
        self.phase = WorkflowPhase::Submitting;
        info!("Uploading {} (use_line={})", file.name, use_line);

        match self.api.upload_video(&file, use_line, line.as_ref()).await {
            Ok(response) => {
                info!("Task {} created", response.task_id);
                self.start_polling(response.task_id.clone());
                Ok(response.task_id)
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", file.name, e);
                self.phase = WorkflowPhase::Ready;
                Err(self.record(e))
            }
        }
    }

    /// Starts a fresh poll cycle for `task_id`, replacing any running one.
    /// The first status request goes out immediately.
    pub fn start_polling(&mut self, task_id: impl Into<String>) {
        self.stop_polling();

        let task_id = task_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let api = self.api.clone();
        let interval = self.poll_interval;
        let polled_id = task_id.clone();

        let ticker = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if tx.is_closed() {
                    break;
                }
                // Status reads are side-effect free, so a slow response may
                // overlap the next tick.
                let api = api.clone();
                let tx = tx.clone();
                let id = polled_id.clone();
                tokio::spawn(async move {
                    let _ = tx.send(api.get_task_status(&id).await);
                });
            }
        });

        self.phase = WorkflowPhase::Processing {
            task_id: task_id.clone(),
            progress: 0,
        };
        self.poller = Some(PollHandle {
            task_id,
            ticker,
            events: rx,
        });
    }

    fn stop_polling(&mut self) {
        self.poller.take();
    }

    /// Waits for the next status response and applies it. Returns `None`
    /// when nothing is being polled.
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        let handle = self.poller.as_mut()?;
        let result = handle.events.recv().await?;
        let task_id = handle.task_id.clone();
        Some(self.apply_poll(task_id, result))
    }

    fn apply_poll(&mut self, task_id: String, result: PollResult) -> WorkflowEvent {
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                let err = e.to_api_error();
                warn!("Status request for {} failed: {}", task_id, err);
                self.error = Some(err.error.clone());
                return WorkflowEvent::PollError(err);
            }
        };

        let progress = status.progress_percent();
        if status.status.is_terminal() {
            self.stop_polling();
        }
        match status.status {
            TaskStatus::Completed => {
                self.phase = WorkflowPhase::Completed {
                    task_id: task_id.clone(),
                };
                info!("Task {} completed", task_id);
                if let Some(handler) = self.on_complete.as_mut() {
                    handler(&task_id);
                }
                WorkflowEvent::Completed { task_id }
            }
            TaskStatus::Failed => {
                let message = status
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                warn!("Task {} failed: {}", task_id, message);
                self.error = Some(message.clone());
                self.phase = WorkflowPhase::Failed {
                    message: message.clone(),
                };
                WorkflowEvent::Failed { message }
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                if let WorkflowPhase::Processing { progress: p, .. } = &mut self.phase {
                    *p = progress;
                }
                WorkflowEvent::Progress {
                    task_id,
                    status: status.status,
                    progress,
                }
            }
        }
    }

    /// Drives polling until the task completes or fails.
    pub async fn run_to_completion(&mut self) -> WorkflowOutcome {
        while let Some(event) = self.next_event().await {
            match event {
                WorkflowEvent::Completed { task_id } => return WorkflowOutcome::Completed(task_id),
                WorkflowEvent::Failed { message } => return WorkflowOutcome::Failed(message),
                WorkflowEvent::Progress {
                    task_id, progress, ..
                } => info!("Task {}: {}%", task_id, progress),
                WorkflowEvent::PollError(_) => {}
            }
        }
        WorkflowOutcome::Stopped
    }

    /// Abandons the task in flight. Local state is reset first; the backend
    /// is then told, and a failure there is only logged.
    pub async fn cancel(&mut self) {
        let task_id = match &self.phase {
            WorkflowPhase::Processing { task_id, .. } => Some(task_id.clone()),
            _ => None,
        };
        let was_processing = self.is_processing();

        self.stop_polling();
        if was_processing {
            self.phase = WorkflowPhase::Cancelled;
        }

        let Some(task_id) = task_id else {
            return;
        };
        match self.api.cancel_task(&task_id).await {
            Ok(ack) => info!("Task {} cancelled: {}", task_id, ack.message),
            Err(e) => warn!("Backend cancel for {} failed: {}", task_id, e),
        }
    }

    /// Tears down polling when the view goes away, whatever the task state.
    /// A task still being followed is abandoned locally.
    pub fn deactivate(&mut self) {
        if self.poller.is_some() {
            info!("Workflow view closed, polling stopped");
        }
        self.stop_polling();
        if self.is_processing() {
            self.phase = WorkflowPhase::Cancelled;
        }
    }
}
