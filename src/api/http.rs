/// HTTP implementation of [`DashboardApi`] over the synchronous `ureq` client.
///
/// Every call issues exactly one request. No timeout is applied unless one is
/// configured, so by default the transport's own behavior decides when a
/// stalled request gives up.
use std::io::{self, Write};
use std::time::Duration;

use serde_json::Value;

use super::{ApiError, DashboardApi, StatisticsResult, parse_options, parse_statistics};
use crate::config::schema::ServerConfig;
use crate::filter::{FilterOptions, QueryParams};

const OPTIONS_PATH: &str = "/api/options";
const STATISTICS_PATH: &str = "/api/statistics";
const EXPORT_PATH: &str = "/api/export";

/// Blocking client for the statistics backend.
#[derive(Debug)]
pub struct HttpApi {
    base_url: String,
    timeout: Option<Duration>,
    agent: ureq::Agent,
}

impl HttpApi {
    /// Build a client for `base_url` with an optional request timeout.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        let base_url = pin_localhost_ipv4(base_url.trim_end_matches('/'));

        let mut builder = ureq::AgentBuilder::new().user_agent(concat!(
            "spendboard/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Self {
            base_url,
            timeout,
            agent: builder.build(),
        }
    }

    /// Build a client from the resolved `[server]` config section.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            &config.base_url,
            config.timeout_ms.map(Duration::from_millis),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl DashboardApi for HttpApi {
    fn fetch_options(&self) -> Result<FilterOptions, ApiError> {
        let result = self.agent.get(&self.url(OPTIONS_PATH)).call();
        parse_options(read_json(result)?)
    }

    fn fetch_statistics(&self, params: &QueryParams) -> Result<StatisticsResult, ApiError> {
        let request = params
            .iter()
            .fold(self.agent.get(&self.url(STATISTICS_PATH)), |req, (k, v)| {
                req.query(k, v)
            });
        parse_statistics(read_json(request.call())?)
    }

    fn download_export(&self, out: &mut dyn Write) -> Result<u64, ApiError> {
        let response = match self.agent.get(&self.url(EXPORT_PATH)).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => {
                // Failed exports answer with the usual JSON envelope.
                let body = response
                    .into_json::<Value>()
                    .map_err(|e| ApiError::Malformed(e.to_string()))?;
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Err(ApiError::Rejected { message });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ApiError::Transport(transport.to_string()));
            }
        };

        let mut reader = response.into_reader();
        let written = io::copy(&mut reader, out)?;
        out.flush()?;
        Ok(written)
    }
}

/// Rewrite a plain-HTTP `localhost` host to `127.0.0.1`.
///
/// On Windows "localhost" may resolve to ::1 first, which stalls when the
/// backend only binds IPv4. Only the exact host is rewritten, and never for
/// `https`, where the certificate is checked against the host name.
fn pin_localhost_ipv4(base_url: &str) -> String {
    const PREFIX: &str = "http://localhost";
    match base_url.strip_prefix(PREFIX) {
        Some(rest) if rest.is_empty() || rest.starts_with([':', '/']) => {
            format!("http://127.0.0.1{rest}")
        }
        _ => base_url.to_string(),
    }
}

/// Read a JSON body from a response, including error-status responses.
///
/// The backend reports application failures as `4xx/5xx` with a JSON
/// envelope, so the body is parsed regardless of status.
fn read_json(result: Result<ureq::Response, ureq::Error>) -> Result<Value, ApiError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(ApiError::Transport(transport.to_string()));
        }
    };

    response
        .into_json::<Value>()
        .map_err(|e| ApiError::Malformed(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
