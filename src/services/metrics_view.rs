// src/services/metrics_view.rs
//! Operational metrics screen: four datasets per lookback window, one tab
//! per dataset.

use crate::errors::{ApiError, DashboardError};
use crate::models::{
    AiMetricsResponse, AiMetricsSummary, ApiMetricsResponse, ApiMetricsSummary, MetricsQuery,
    MetricsSummaryResponse, UiMetricsResponse, UiMetricsSummary,
};
use crate::services::api_client::VideoApi;
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use futures_util::future::join4;
use log::{debug, warn};
use std::str::FromStr;

/// Charts only show the most recent points of each series.
pub const CHART_POINT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsWindow {
    LastHour,
    #[default]
    LastDay,
    LastWeek,
}

impl MetricsWindow {
    pub fn hours(self) -> u32 {
        match self {
            MetricsWindow::LastHour => 1,
            MetricsWindow::LastDay => 24,
            MetricsWindow::LastWeek => 168,
        }
    }

    pub fn from_hours(hours: u32) -> Result<Self, DashboardError> {
        match hours {
            1 => Ok(MetricsWindow::LastHour),
            24 => Ok(MetricsWindow::LastDay),
            168 => Ok(MetricsWindow::LastWeek),
            other => Err(DashboardError::Validation(format!(
                "Unsupported metrics window: {}h (use 1, 24 or 168)",
                other
            ))),
        }
    }

    /// `[now - hours, now]` as ISO-8601 UTC with milliseconds.
    pub fn query(self, now: DateTime<Utc>) -> MetricsQuery {
        let start = now - Duration::hours(i64::from(self.hours()));
        MetricsQuery {
            start_time: Some(start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            end_time: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsTab {
    #[default]
    Summary,
    Api,
    Ai,
    Ui,
}

impl FromStr for MetricsTab {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Ok(MetricsTab::Summary),
            "api" => Ok(MetricsTab::Api),
            "ai" => Ok(MetricsTab::Ai),
            "ui" => Ok(MetricsTab::Ui),
            other => Err(DashboardError::Validation(format!(
                "Unknown metrics tab: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyPoint {
    pub time: String,
    pub response_time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePoint {
    pub frame: u64,
    pub confidence: f64,
    pub detections: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiTimingPoint {
    pub time: String,
    pub load_time_ms: f64,
    pub render_time_ms: f64,
}

pub enum TabView<'a> {
    Summary(&'a MetricsSummaryResponse),
    Api {
        summary: &'a ApiMetricsSummary,
        chart: Vec<LatencyPoint>,
    },
    Ai {
        summary: &'a AiMetricsSummary,
        chart: Vec<ConfidencePoint>,
    },
    Ui {
        summary: &'a UiMetricsSummary,
        chart: Vec<UiTimingPoint>,
    },
}

fn recent<T>(items: &[T]) -> &[T] {
    &items[items.len().saturating_sub(CHART_POINT_LIMIT)..]
}

/// `HH:MM:SS` of a backend timestamp. Timestamps without an offset are
/// taken as UTC; unparseable ones are shown as-is.
pub fn time_label(timestamp: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return parsed.with_timezone(&Utc).format("%H:%M:%S").to_string();
    }
    match NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.format("%H:%M:%S").to_string(),
        Err(_) => timestamp.to_string(),
    }
}

pub fn latency_chart(api: &ApiMetricsResponse) -> Vec<LatencyPoint> {
    recent(&api.metrics)
        .iter()
        .map(|m| LatencyPoint {
            time: time_label(&m.timestamp),
            response_time_ms: m.response_time_ms,
        })
        .collect()
}

pub fn confidence_chart(ai: &AiMetricsResponse) -> Vec<ConfidencePoint> {
    recent(&ai.metrics)
        .iter()
        .map(|m| ConfidencePoint {
            frame: m.frame,
            confidence: m.avg_confidence,
            detections: m.detections_count,
        })
        .collect()
}

pub fn ui_timing_chart(ui: &UiMetricsResponse) -> Vec<UiTimingPoint> {
    recent(&ui.metrics)
        .iter()
        .map(|m| UiTimingPoint {
            time: time_label(&m.timestamp),
            load_time_ms: m.load_time_ms,
            render_time_ms: m.render_time_ms.unwrap_or(0.0),
        })
        .collect()
}

/// The four datasets of one window. Each keeps its own outcome so a
/// failed fetch only blocks the tab that needs it.
pub struct MetricsSnapshot {
    pub window: MetricsWindow,
    pub summary: Result<MetricsSummaryResponse, ApiError>,
    pub api: Result<ApiMetricsResponse, ApiError>,
    pub ai: Result<AiMetricsResponse, ApiError>,
    pub ui: Result<UiMetricsResponse, ApiError>,
}

fn settle<T>(name: &str, result: Result<T, DashboardError>) -> Result<T, ApiError> {
    result.map_err(|e| {
        let err = e.to_api_error();
        warn!("Failed to load {} metrics: {}", name, err);
        err
    })
}

impl MetricsSnapshot {
    pub async fn load(api: &dyn VideoApi, window: MetricsWindow, now: DateTime<Utc>) -> Self {
        let query = window.query(now);
        debug!(
            "Loading metrics for the last {}h ({:?} .. {:?})",
            window.hours(),
            query.start_time,
            query.end_time
        );

        let (summary, api_metrics, ai_metrics, ui_metrics) = join4(
            api.get_metrics_summary(window.hours()),
            api.get_api_metrics(&query),
            api.get_ai_metrics(&query),
            api.get_ui_metrics(&query),
        )
        .await;

        Self {
            window,
            summary: settle("summary", summary),
            api: settle("API", api_metrics),
            ai: settle("AI", ai_metrics),
            ui: settle("UI", ui_metrics),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.summary.is_ok() && self.api.is_ok() && self.ai.is_ok() && self.ui.is_ok()
    }

    /// The data behind `tab`, or the error of the fetch it depends on.
    pub fn view(&self, tab: MetricsTab) -> Result<TabView<'_>, ApiError> {
        match tab {
            MetricsTab::Summary => match &self.summary {
                Ok(summary) => Ok(TabView::Summary(summary)),
                Err(e) => Err(e.clone()),
            },
            MetricsTab::Api => match &self.api {
                Ok(api) => Ok(TabView::Api {
                    summary: &api.summary,
                    chart: latency_chart(api),
                }),
                Err(e) => Err(e.clone()),
            },
            MetricsTab::Ai => match &self.ai {
                Ok(ai) => Ok(TabView::Ai {
                    summary: &ai.summary,
                    chart: confidence_chart(ai),
                }),
                Err(e) => Err(e.clone()),
            },
            MetricsTab::Ui => match &self.ui {
                Ok(ui) => Ok(TabView::Ui {
                    summary: &ui.summary,
                    chart: ui_timing_chart(ui),
                }),
                Err(e) => Err(e.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AiSummary, ApiMetric, ApiSummary, SummaryPeriod, UiMetricRecord, UiSummary,
    };
    use crate::services::testing::FakeApi;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn api_metrics(n: usize) -> ApiMetricsResponse {
        ApiMetricsResponse {
            metrics: (0..n)
                .map(|i| ApiMetric {
                    timestamp: format!("2024-05-01T11:{:02}:{:02}Z", i / 60 % 60, i % 60),
                    endpoint: "/tasks/t1".into(),
                    method: "GET".into(),
                    response_time_ms: i as f64,
                    status_code: 200,
                })
                .collect(),
            summary: ApiMetricsSummary::default(),
        }
    }

    fn summary() -> MetricsSummaryResponse {
        MetricsSummaryResponse {
            period: SummaryPeriod {
                start: "2024-04-30T12:00:00".into(),
                end: "2024-05-01T12:00:00".into(),
                hours: 24,
            },
            api: ApiSummary {
                total_requests: 10,
                avg_response_time_ms: 12.5,
                min_response_time_ms: 3.0,
                max_response_time_ms: 40.0,
            },
            ai: AiSummary {
                total_frames: 100,
                total_detections: 250,
                avg_confidence: 0.8,
            },
            ui: UiSummary {
                total_events: 4,
                avg_load_time_ms: 120.0,
            },
        }
    }

    #[test]
    fn window_is_iso_with_millis_and_z() {
        let query = MetricsWindow::LastWeek.query(now());
        assert_eq!(query.start_time.as_deref(), Some("2024-04-24T12:00:00.000Z"));
        assert_eq!(query.end_time.as_deref(), Some("2024-05-01T12:00:00.000Z"));
        assert!(MetricsWindow::from_hours(48).is_err());
        assert_eq!(MetricsWindow::from_hours(1).unwrap(), MetricsWindow::LastHour);
    }

    #[test]
    fn charts_keep_the_last_hundred_points() {
        let chart = latency_chart(&api_metrics(150));
        assert_eq!(chart.len(), CHART_POINT_LIMIT);
        assert_eq!(chart[0].response_time_ms, 50.0);
        assert_eq!(chart[99].response_time_ms, 149.0);
        assert_eq!(chart[0].time, "11:00:50");
    }

    #[test]
    fn ui_chart_defaults_missing_render_time() {
        let ui = UiMetricsResponse {
            metrics: vec![UiMetricRecord {
                timestamp: "2024-05-01T09:30:15.250".into(),
                component: "UploadScreen".into(),
                load_time_ms: 80.0,
                render_time_ms: None,
                event_type: "load".into(),
            }],
            summary: UiMetricsSummary::default(),
        };
        let chart = ui_timing_chart(&ui);
        assert_eq!(chart[0].render_time_ms, 0.0);
        assert_eq!(chart[0].time, "09:30:15");
    }

    #[test]
    fn time_label_falls_back_to_raw_text() {
        assert_eq!(time_label("yesterday"), "yesterday");
        assert_eq!(time_label("2024-05-01T10:00:00+02:00"), "08:00:00");
    }

    #[tokio::test]
    async fn one_failed_dataset_only_blocks_its_tab() {
        let api = FakeApi::default();
        api.with_summary(summary());
        api.with_api_metrics(api_metrics(3));
        api.with_ui_metrics(UiMetricsResponse {
            metrics: Vec::new(),
            summary: UiMetricsSummary::default(),
        });

        let snapshot = MetricsSnapshot::load(&api, MetricsWindow::LastDay, now()).await;

        assert!(!snapshot.is_complete());
        assert_eq!(api.count("get_metrics_summary:24"), 1);
        assert_eq!(api.count("get_"), 4);
        assert!(matches!(snapshot.view(MetricsTab::Summary), Ok(TabView::Summary(_))));
        assert!(matches!(
            snapshot.view(MetricsTab::Api),
            Ok(TabView::Api { ref chart, .. }) if chart.len() == 3
        ));
        assert_eq!(
            snapshot.view(MetricsTab::Ai).err(),
            Some(ApiError::new("AI metrics unavailable"))
        );
    }

    #[test]
    fn tabs_parse_case_insensitively() {
        assert_eq!("API".parse::<MetricsTab>().unwrap(), MetricsTab::Api);
        assert!("charts".parse::<MetricsTab>().is_err());
    }
}
