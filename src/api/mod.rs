/// Statistics backend API.
///
/// The backend serves three endpoints:
///
/// - `GET /api/options` → `{ success, options: FilterOptions }`
/// - `GET /api/statistics?<filter params>` → `{ success, message?, ...payload }`
/// - `GET /api/export` → spreadsheet download
///
/// [`DashboardApi`] is the seam the pipeline talks to; [`HttpApi`] is the
/// real implementation over HTTP.
pub mod http;

use std::io::Write;

use serde_json::Value;
use thiserror::Error;

use crate::filter::{FilterOptions, QueryParams};

pub use http::HttpApi;

/// Shown to the user when a failure carries no server-supplied message.
pub const GENERIC_FAILURE_MESSAGE: &str = "加载数据失败，请重试";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ways a backend call can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, timeout).
    #[error("request failed: {0}")]
    Transport(String),
    /// A response arrived but its body was not the expected JSON.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The backend answered with `success: false`.
    #[error("backend rejected request: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { message: Option<String> },
    /// Writing a download to its destination failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Text suitable for showing to the user.
    ///
    /// Application-level rejections surface the server's message; everything
    /// else collapses to [`GENERIC_FAILURE_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
            } if !message.trim().is_empty() => format!("加载数据失败：{message}"),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Aggregated statistics returned by the backend.
///
/// Opaque to the pipeline: the whole response object is kept as-is and
/// handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsResult {
    payload: Value,
}

impl StatisticsResult {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Top-level field of the payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

// ---------------------------------------------------------------------------
// API trait
// ---------------------------------------------------------------------------

/// Operations the dashboard needs from the backend.
pub trait DashboardApi {
    /// Fetch the available filter values.
    fn fetch_options(&self) -> Result<FilterOptions, ApiError>;

    /// Fetch aggregated statistics for one filter selection.
    fn fetch_statistics(&self, params: &QueryParams) -> Result<StatisticsResult, ApiError>;

    /// Stream the full data export into `out`, returning the byte count.
    fn download_export(&self, out: &mut dyn Write) -> Result<u64, ApiError>;
}

impl<T: DashboardApi + ?Sized> DashboardApi for &T {
    fn fetch_options(&self) -> Result<FilterOptions, ApiError> {
        (**self).fetch_options()
    }

    fn fetch_statistics(&self, params: &QueryParams) -> Result<StatisticsResult, ApiError> {
        (**self).fetch_statistics(params)
    }

    fn download_export(&self, out: &mut dyn Write) -> Result<u64, ApiError> {
        (**self).download_export(out)
    }
}

// ---------------------------------------------------------------------------
// Envelope handling
// ---------------------------------------------------------------------------

/// Check the `{ success, message? }` envelope and return the body on success.
///
/// A missing or non-`true` `success` flag counts as a rejection.
pub fn check_envelope(body: Value) -> Result<Value, ApiError> {
    if !body.is_object() {
        return Err(ApiError::Malformed("expected a JSON object".to_string()));
    }

    if body.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    Err(ApiError::Rejected { message })
}

/// Decode an options response body.
pub fn parse_options(body: Value) -> Result<FilterOptions, ApiError> {
    let mut body = check_envelope(body)?;
    let options = body
        .get_mut("options")
        .map(Value::take)
        .ok_or_else(|| ApiError::Malformed("response has no 'options' field".to_string()))?;
    serde_json::from_value(options).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Decode a statistics response body.
pub fn parse_statistics(body: Value) -> Result<StatisticsResult, ApiError> {
    check_envelope(body).map(StatisticsResult::new)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_accepts_success_true() {
        let body = json!({ "success": true, "total_spend": 12.5 });
        let result = parse_statistics(body.clone()).unwrap();
        assert_eq!(result.payload(), &body);
        assert_eq!(result.get("total_spend"), Some(&json!(12.5)));
    }

    #[test]
    fn envelope_surfaces_server_message() {
        let err = parse_statistics(json!({ "success": false, "message": "no data" })).unwrap_err();
        assert!(matches!(&err, ApiError::Rejected { message: Some(m) } if m == "no data"));
        assert_eq!(err.user_message(), "加载数据失败：no data");
    }

    #[test]
    fn rejection_without_message_uses_generic_text() {
        let err = parse_statistics(json!({ "success": false })).unwrap_err();
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn missing_success_flag_is_a_rejection() {
        let err = parse_statistics(json!({ "total_spend": 1 })).unwrap_err();
        assert!(matches!(err, ApiError::Rejected { message: None }));
    }

    #[test]
    fn non_object_body_is_malformed() {
        let err = parse_statistics(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn transport_errors_use_generic_text() {
        let err = ApiError::Transport("connection refused".to_string());
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn options_are_decoded_from_envelope() {
        let body = json!({
            "success": true,
            "options": { "agents": ["奇异果"], "dates": ["2024-01-02", "2024-01-01"] }
        });
        let options = parse_options(body).unwrap();
        assert_eq!(options.agents, vec!["奇异果"]);
        assert_eq!(options.date_range(), Some(("2024-01-01", "2024-01-02")));
    }

    #[test]
    fn options_without_payload_are_malformed() {
        let err = parse_options(json!({ "success": true })).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }
}
