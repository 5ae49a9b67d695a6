// src/services/telemetry.rs
//! UI telemetry emission. Every failure is logged and dropped here; nothing
//! in this module returns an error to its caller.

use crate::models::{UiEventType, UiMetric};
use crate::services::api_client::VideoApi;
use log::warn;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct UiTelemetry {
    api: Arc<dyn VideoApi>,
}

impl UiTelemetry {
    pub fn new(api: Arc<dyn VideoApi>) -> Self {
        Self { api }
    }

    pub async fn send(&self, metric: UiMetric) {
        if let Err(e) = self.api.send_ui_metric(&metric).await {
            warn!(
                "Failed to send UI metric for {}: {}",
                metric.component,
                e.to_api_error()
            );
        }
    }

    /// Sends without waiting. Needs a running tokio runtime.
    pub fn emit(&self, metric: UiMetric) {
        let telemetry = self.clone();
        tokio::spawn(async move { telemetry.send(metric).await });
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Load/render timing for one component instance.
pub struct ComponentMetrics {
    telemetry: UiTelemetry,
    component: String,
    load_start: Instant,
    render_start: Option<Instant>,
}

impl ComponentMetrics {
    pub fn new(telemetry: UiTelemetry, component: impl Into<String>) -> Self {
        Self {
            telemetry,
            component: component.into(),
            load_start: Instant::now(),
            render_start: None,
        }
    }

    pub fn mark_render_start(&mut self) {
        self.render_start = Some(Instant::now());
    }

    /// Reports the time from load start to render start and the render
    /// time itself.
    pub fn mark_render_end(&self) {
        let render_start = self.render_start.unwrap_or(self.load_start);
        let load_time_ms = render_start.duration_since(self.load_start).as_secs_f64() * 1000.0;

        self.telemetry.emit(UiMetric {
            component: self.component.clone(),
            load_time_ms,
            render_time_ms: Some(elapsed_ms(render_start)),
            event_type: UiEventType::Render,
        });
    }

    pub fn mark_load_end(&self) {
        self.telemetry.emit(UiMetric {
            component: self.component.clone(),
            load_time_ms: elapsed_ms(self.load_start),
            render_time_ms: None,
            event_type: UiEventType::Load,
        });
    }
}

/// Runs `operation` and reports how long it took, whether it failed or not.
/// The report goes out in the background; the result is returned as soon as
/// `operation` finishes.
pub async fn measure_execution_time<T, E, Fut>(
    telemetry: &UiTelemetry,
    component: &str,
    event_type: UiEventType,
    operation: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = operation.await;

    telemetry.emit(UiMetric {
        component: component.to_string(),
        load_time_ms: elapsed_ms(start),
        render_time_ms: None,
        event_type,
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DashboardError;
    use crate::services::testing::FakeApi;
    use std::time::Duration;

    #[tokio::test]
    async fn send_swallows_backend_failures() {
        let api = Arc::new(FakeApi::default());
        api.fail_telemetry();
        let telemetry = UiTelemetry::new(api.clone());

        telemetry
            .send(UiMetric {
                component: "UploadScreen".into(),
                load_time_ms: 5.0,
                render_time_ms: None,
                event_type: UiEventType::Load,
            })
            .await;

        assert_eq!(api.ui_metrics_sent().len(), 1);
    }

    // Lets spawned sends run to completion.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn component_marks_emit_load_and_render_events() {
        let api = Arc::new(FakeApi::default());
        let mut metrics = ComponentMetrics::new(UiTelemetry::new(api.clone()), "ResultsScreen");

        metrics.mark_load_end();
        metrics.mark_render_start();
        metrics.mark_render_end();
        settle().await;

        let sent = api.ui_metrics_sent();
        assert_eq!(sent.len(), 2);
        let load = sent
            .iter()
            .find(|m| m.event_type == UiEventType::Load)
            .unwrap();
        assert!(load.render_time_ms.is_none());
        let render = sent
            .iter()
            .find(|m| m.event_type == UiEventType::Render)
            .unwrap();
        assert_eq!(render.component, "ResultsScreen");
        assert!(render.render_time_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn measured_failures_are_reported_and_propagated() {
        let api = Arc::new(FakeApi::default());
        let telemetry = UiTelemetry::new(api.clone());

        let result: Result<(), DashboardError> = measure_execution_time(
            &telemetry,
            "MetricsDashboard",
            UiEventType::Interaction,
            async { Err(DashboardError::Validation("nope".into())) },
        )
        .await;
        settle().await;

        assert!(result.is_err());
        let sent = api.ui_metrics_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_type, UiEventType::Interaction);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_telemetry_backend_does_not_hold_up_the_caller() {
        let api = Arc::new(FakeApi::default());
        api.with_telemetry_delay(Duration::from_secs(30));
        let telemetry = UiTelemetry::new(api.clone());
        let mut screen = ComponentMetrics::new(telemetry.clone(), "UploadScreen");

        let started = tokio::time::Instant::now();
        let result = measure_execution_time(
            &telemetry,
            "UploadScreen",
            UiEventType::Interaction,
            async { Ok::<_, DashboardError>(7) },
        )
        .await;
        screen.mark_load_end();
        screen.mark_render_start();
        screen.mark_render_end();

        assert_eq!(result.unwrap(), 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(api.ui_metrics_sent().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(api.ui_metrics_sent().len(), 3);
    }
}
