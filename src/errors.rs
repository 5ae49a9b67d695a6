// src/errors.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when nothing more specific is known about a failure.
pub const UNKNOWN_ERROR: &str = "Unknown error";

const TRANSPORT_FALLBACK: &str = "Request to the server failed";

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Connection refused, DNS failure, timeout, broken body stream.
    #[error("{0}")]
    Transport(String),

    /// Non-2xx response carrying a structured `{error, detail}` body.
    #[error("{error}")]
    Server {
        status: u16,
        error: String,
        detail: Option<String>,
    },

    /// Non-2xx response without a usable body.
    #[error("Request failed with status code {status}")]
    Http { status: u16 },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// The single error shape every screen renders.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{error}{}", detail_suffix(.detail))]
pub struct ApiError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<serde_json::Value>,
}

impl DashboardError {
    /// Classifies the body of a failed response.
    ///
    /// `{"error": ..}` is taken verbatim, a bare string `{"detail": ..}` is
    /// promoted to the message, anything else falls back to the status line.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let detail = parsed.detail.map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        match (parsed.error, detail) {
            (Some(error), detail) => DashboardError::Server {
                status,
                error,
                detail,
            },
            (None, Some(detail)) if !detail.is_empty() => DashboardError::Server {
                status,
                error: detail,
                detail: None,
            },
            _ => DashboardError::Http { status },
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        match self {
            DashboardError::Server { error, detail, .. } => ApiError {
                error: error.clone(),
                detail: detail.clone(),
            },
            DashboardError::Transport(message) if message.is_empty() => {
                ApiError::new(TRANSPORT_FALLBACK)
            }
            other => ApiError::new(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DashboardError::Decode(err.to_string())
        } else if err.is_timeout() {
            DashboardError::Transport(format!("Request timed out: {}", err))
        } else if let Some(status) = err.status() {
            DashboardError::Http {
                status: status.as_u16(),
            }
        } else {
            DashboardError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err.to_string())
    }
}

/// Collapses any failure into the uniform error shape.
pub fn handle_api_error(err: &anyhow::Error) -> ApiError {
    if let Some(dashboard) = err.downcast_ref::<DashboardError>() {
        return dashboard.to_api_error();
    }
    match err.downcast_ref::<ApiError>() {
        Some(api) => api.clone(),
        None => ApiError::new(UNKNOWN_ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_body_is_kept_verbatim() {
        let err = DashboardError::from_error_body(
            400,
            r#"{"error":"Invalid video","detail":"codec not supported"}"#,
        );
        assert_eq!(
            err.to_api_error(),
            ApiError {
                error: "Invalid video".into(),
                detail: Some("codec not supported".into()),
            }
        );
    }

    #[test]
    fn bare_detail_becomes_the_message() {
        let err = DashboardError::from_error_body(404, r#"{"detail":"Task not found"}"#);
        assert_eq!(err.to_api_error(), ApiError::new("Task not found"));
    }

    #[test]
    fn unstructured_body_falls_back_to_status_line() {
        let err = DashboardError::from_error_body(502, "<html>Bad Gateway</html>");
        assert_eq!(
            err.to_api_error(),
            ApiError::new("Request failed with status code 502")
        );
    }

    #[test]
    fn foreign_errors_get_the_generic_message() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(handle_api_error(&err), ApiError::new(UNKNOWN_ERROR));

        let err = anyhow::Error::new(DashboardError::Transport("connection refused".into()));
        assert_eq!(handle_api_error(&err), ApiError::new("connection refused"));

        let err = anyhow::Error::new(ApiError::new("AI metrics unavailable"));
        assert_eq!(handle_api_error(&err), ApiError::new("AI metrics unavailable"));
    }

    #[test]
    fn api_error_display_appends_detail_when_present() {
        assert_eq!(ApiError::new("Upload rejected").to_string(), "Upload rejected");

        let err = ApiError {
            error: "Invalid line".into(),
            detail: Some("points must differ".into()),
        };
        assert_eq!(err.to_string(), "Invalid line (points must differ)");
    }
}
