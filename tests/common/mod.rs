//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use serde_json::{Value, json};

use spendboard::api::{ApiError, DashboardApi, StatisticsResult, parse_statistics};
use spendboard::filter::{FilterOptions, QueryParams};
use spendboard::pipeline::{LoadingIndicator, Renderer};

/// Scripted backend. Each call pops the next scripted answer; `Err(text)`
/// is a transport failure, `Ok(body)` goes through the normal envelope check.
#[derive(Default)]
pub struct FakeApi {
    options: Mutex<VecDeque<Result<FilterOptions, String>>>,
    statistics: Mutex<VecDeque<Result<Value, String>>>,
    pub requests: Mutex<Vec<QueryParams>>,
    export_bytes: Vec<u8>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(self, options: Result<FilterOptions, String>) -> Self {
        lock(&self.options).push_back(options);
        self
    }

    pub fn with_statistics(self, body: Result<Value, String>) -> Self {
        lock(&self.statistics).push_back(body);
        self
    }

    pub fn with_export(mut self, bytes: &[u8]) -> Self {
        self.export_bytes = bytes.to_vec();
        self
    }

    pub fn requests(&self) -> Vec<QueryParams> {
        lock(&self.requests).clone()
    }
}

impl DashboardApi for FakeApi {
    fn fetch_options(&self) -> Result<FilterOptions, ApiError> {
        match lock(&self.options).pop_front() {
            Some(Ok(options)) => Ok(options),
            Some(Err(text)) => Err(ApiError::Transport(text)),
            None => Err(ApiError::Transport("no scripted options".to_string())),
        }
    }

    fn fetch_statistics(&self, params: &QueryParams) -> Result<StatisticsResult, ApiError> {
        lock(&self.requests).push(params.clone());
        match lock(&self.statistics).pop_front() {
            Some(Ok(body)) => parse_statistics(body),
            Some(Err(text)) => Err(ApiError::Transport(text)),
            None => Err(ApiError::Transport("no scripted statistics".to_string())),
        }
    }

    fn download_export(&self, out: &mut dyn Write) -> Result<u64, ApiError> {
        out.write_all(&self.export_bytes)?;
        Ok(self.export_bytes.len() as u64)
    }
}

/// Records every render call as a short string.
#[derive(Default)]
pub struct RecordingRenderer {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

fn marker(result: &StatisticsResult) -> String {
    result
        .get("marker")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string()
}

impl Renderer for RecordingRenderer {
    fn render_metrics(&self, result: &StatisticsResult) {
        lock(&self.calls).push(format!("metrics:{}", marker(result)));
    }

    fn render_charts(&self, result: &StatisticsResult) {
        lock(&self.calls).push(format!("charts:{}", marker(result)));
    }

    fn report_failure(&self, message: &str) {
        lock(&self.calls).push(format!("failure:{message}"));
    }
}

/// Counts show/hide calls.
#[derive(Default)]
pub struct RecordingIndicator {
    pub calls: Mutex<Vec<&'static str>>,
}

impl RecordingIndicator {
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }
}

impl LoadingIndicator for RecordingIndicator {
    fn show(&self) {
        lock(&self.calls).push("show");
    }

    fn hide(&self) {
        lock(&self.calls).push("hide");
    }
}

/// A successful statistics body tagged with `marker`.
pub fn stats_body(marker: &str) -> Value {
    json!({
        "success": true,
        "marker": marker,
        "total_spend": 100.0,
        "daily_stats": [],
    })
}

pub fn sample_options() -> FilterOptions {
    FilterOptions {
        agents: vec!["奇异果".into(), "蓝鲸".into()],
        bidding_methods: vec!["OCPC".into(), "CPC".into()],
        targetings: vec!["A".into(), "B".into(), "C".into()],
        resources: vec!["信息流".into()],
        materials: vec!["大图".into()],
        benefits: vec!["免息".into()],
        dates: vec!["2024-03-05".into(), "2024-03-01".into(), "2024-03-31".into()],
    }
}

pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
