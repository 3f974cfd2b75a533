/// Terminal and JSON implementations of the render capability.
///
/// [`TerminalRenderer`] prints metric cards and bar tables; [`JsonRenderer`]
/// prints the payload as received. Both write to any `io::Write` so output
/// can be captured.
pub mod charts;
pub mod format;

use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use colored::Colorize;
use serde_json::Value;

use crate::api::StatisticsResult;
use crate::config::schema::DisplayConfig;
use crate::pipeline::{LoadingIndicator, Renderer};

use charts::{Chart, ChartKind, ChartUnit};
use format::{
    display_width, format_currency, format_percent, format_quantity, format_share, number, pad,
    truncate,
};

// ---------------------------------------------------------------------------
// Metric cards
// ---------------------------------------------------------------------------

/// One headline figure, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: String,
}

/// A titled group of cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricGroup {
    pub title: &'static str,
    pub cards: Vec<MetricCard>,
}

fn card(label: &'static str, value: String) -> MetricCard {
    MetricCard { label, value }
}

/// Build the metric cards for a payload.
///
/// Impressions, clicks and downloads are summed from `daily_stats`; every
/// other figure is read from a top-level total or from `cost_metrics`.
pub fn metric_groups(payload: &Value) -> Vec<MetricGroup> {
    let total = |key: &str| number(payload.get(key));
    let daily_sum = |key: &str| -> f64 {
        payload
            .get("daily_stats")
            .and_then(Value::as_array)
            .map(|days| days.iter().map(|d| number(d.get(key))).sum())
            .unwrap_or(0.0)
    };
    let cost = |key: &str| number(payload.get("cost_metrics").and_then(|c| c.get(key)));

    vec![
        MetricGroup {
            title: "投放",
            cards: vec![
                card("总花费", format_currency(total("total_spend"))),
                card("结算花费", format_currency(total("total_settlement"))),
                card("曝光量", format_quantity(daily_sum(charts::IMPRESSIONS))),
                card("点击量", format_quantity(daily_sum(charts::CLICKS))),
                card("下载量", format_quantity(daily_sum(charts::DOWNLOADS))),
            ],
        },
        MetricGroup {
            title: "转化",
            cards: vec![
                card("注册数", format_quantity(total("total_register"))),
                card("进件数", format_quantity(total("total_entry"))),
                card("授信数", format_quantity(total("total_credit"))),
                card("支用数", format_quantity(total("total_loan"))),
                card("支用订单数", format_quantity(total("total_loan_orders"))),
                card("支用金额", format_currency(total("total_loan_amount"))),
                card("授信金额", format_currency(total("total_credit_amount"))),
                card("平均授信金额", format_currency(total("avg_credit_amount"))),
                card("单均支用金额", format_currency(total("avg_loan_per_order"))),
                card("平均执行率", format_percent(total("avg_exec_rate"))),
            ],
        },
        MetricGroup {
            title: "成本",
            cards: vec![
                card("下载成本", format_currency(cost("下载成本"))),
                card("注册成本", format_currency(cost("注册成本"))),
                card("进件成本", format_currency(cost("进件成本"))),
                card("授信成本", format_currency(cost("授信成本"))),
                card("支用成本", format_currency(cost("支用成本"))),
            ],
        },
    ]
}

// ---------------------------------------------------------------------------
// Chart tables
// ---------------------------------------------------------------------------

const LABEL_CHARS: usize = 16;

fn format_value(unit: ChartUnit, value: Option<f64>) -> String {
    match (unit, value) {
        (_, None) => "-".to_string(),
        (ChartUnit::Currency, Some(v)) => format_currency(v),
        (ChartUnit::Count, Some(v)) => format_quantity(v),
        (ChartUnit::Percent, Some(v)) => format_percent(v),
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * width as f64).round() as usize;
    "█".repeat(len.clamp(1, width.max(1)))
}

/// Plain-text rows for one chart, without the title.
///
/// Trend charts list every label; breakdowns stop after `max_rows`. Stacked
/// charts show each series' share of its row, distributions the row's share
/// of the grand total.
pub fn chart_lines(chart: &Chart, display: &DisplayConfig) -> Vec<String> {
    if chart.is_empty() {
        return vec!["  (no data)".to_string()];
    }

    let limit = match chart.kind {
        ChartKind::Trend => chart.labels.len(),
        ChartKind::Stacked | ChartKind::Distribution => display.max_rows.max(1),
    };
    let label_width = chart
        .labels
        .iter()
        .take(limit)
        .map(|l| display_width(&truncate(l, LABEL_CHARS)))
        .max()
        .unwrap_or(0);

    let bar_max = match chart.kind {
        ChartKind::Stacked => (0..chart.labels.len())
            .map(|i| chart.label_total(i))
            .fold(0.0, f64::max),
        _ => chart.max_value(),
    };
    let grand_total = chart.grand_total();

    let mut lines = Vec::new();
    for (i, label) in chart.labels.iter().enumerate().take(limit) {
        let mut line = format!("  {}", pad(&truncate(label, LABEL_CHARS), label_width));

        match chart.kind {
            ChartKind::Trend => {
                for series in &chart.series {
                    let value = series.values.get(i).copied().flatten();
                    line.push_str(&format!("  {} {}", series.label, format_value(chart.unit, value)));
                }
            }
            ChartKind::Stacked => {
                let row_total = chart.label_total(i);
                line.push_str(&format!("  {}", format_value(chart.unit, Some(row_total))));
                for series in &chart.series {
                    let value = series.values.get(i).copied().flatten().unwrap_or(0.0);
                    line.push_str(&format!(
                        "  {} {} ({})",
                        series.label,
                        format_value(chart.unit, Some(value)),
                        format_share(value, row_total)
                    ));
                }
                line.push_str(&format!("  {}", bar(row_total, bar_max, display.bar_width)));
            }
            ChartKind::Distribution => {
                let value = chart.label_total(i);
                line.push_str(&format!(
                    "  {} ({})  {}",
                    format_value(chart.unit, Some(value)),
                    format_share(value, grand_total),
                    bar(value, bar_max, display.bar_width)
                ));
            }
        }
        lines.push(line.trim_end().to_string());
    }

    let hidden = chart.labels.len().saturating_sub(limit);
    if hidden > 0 {
        lines.push(format!("  … {hidden} more"));
    }
    lines
}

// ---------------------------------------------------------------------------
// Terminal renderer
// ---------------------------------------------------------------------------

/// Renders metric cards and chart tables as colored text.
pub struct TerminalRenderer<W: Write = io::Stdout> {
    out: Mutex<W>,
    display: DisplayConfig,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout(display: DisplayConfig) -> Self {
        Self::new(io::stdout(), display)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, display: DisplayConfig) -> Self {
        Self {
            out: Mutex::new(out),
            display,
        }
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    /// Recover the writer, e.g. to inspect captured output.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_with(&self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = f(&mut *out).and_then(|()| out.flush());
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render_metrics(&self, result: &StatisticsResult) {
        let groups = metric_groups(result.payload());
        self.write_with(|out| {
            writeln!(out)?;
            for group in &groups {
                writeln!(out, "{}", group.title.bold().cyan())?;
                let width = group
                    .cards
                    .iter()
                    .map(|c| display_width(c.label))
                    .max()
                    .unwrap_or(0);
                for card in &group.cards {
                    writeln!(out, "  {} {}", pad(card.label, width).bold(), card.value)?;
                }
                writeln!(out)?;
            }
            Ok(())
        });
    }

    fn render_charts(&self, result: &StatisticsResult) {
        let charts = charts::all_charts(result.payload());
        self.write_with(|out| {
            for chart in &charts {
                writeln!(out, "{}", chart.title.bold().cyan())?;
                for line in chart_lines(chart, &self.display) {
                    if chart.is_empty() {
                        writeln!(out, "{}", line.dimmed())?;
                    } else {
                        writeln!(out, "{line}")?;
                    }
                }
                writeln!(out)?;
            }
            Ok(())
        });
    }

    fn report_failure(&self, message: &str) {
        self.write_with(|out| writeln!(out, "{} {}", "✗".red().bold(), message.red()));
    }
}

// ---------------------------------------------------------------------------
// JSON renderer
// ---------------------------------------------------------------------------

/// Prints the statistics payload unchanged, one pretty JSON document per
/// refresh. Failures are printed as `{"success": false, "message": ...}`.
pub struct JsonRenderer<W: Write = io::Stdout> {
    out: Mutex<W>,
}

impl JsonRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn print(&self, value: &Value) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(json) = serde_json::to_string_pretty(value) {
            let _ = writeln!(out, "{json}").and_then(|()| out.flush());
        }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render_metrics(&self, result: &StatisticsResult) {
        self.print(result.payload());
    }

    // The payload was already printed whole by `render_metrics`.
    fn render_charts(&self, _result: &StatisticsResult) {}

    fn report_failure(&self, message: &str) {
        self.print(&serde_json::json!({ "success": false, "message": message }));
    }
}

// ---------------------------------------------------------------------------
// Loading indicator
// ---------------------------------------------------------------------------

/// "loading…" on stderr while a request is in flight. Silent when stderr is
/// not a terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalIndicator {
    enabled: bool,
}

const LOADING_TEXT: &str = "loading…";

impl TerminalIndicator {
    pub fn new() -> Self {
        Self {
            enabled: io::stderr().is_terminal(),
        }
    }
}

impl Default for TerminalIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingIndicator for TerminalIndicator {
    fn show(&self) {
        if self.enabled {
            eprint!("{}", LOADING_TEXT.dimmed());
            let _ = io::stderr().flush();
        }
    }

    fn hide(&self) {
        if self.enabled {
            eprint!("\r{}\r", " ".repeat(display_width(LOADING_TEXT)));
            let _ = io::stderr().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "success": true,
            "total_spend": 123456.0,
            "total_settlement": 99.5,
            "avg_exec_rate": 87.126,
            "daily_stats": [
                {"时间": "2024-03-01", "花费": 100.0, "曝光量": 8000, "点击量": 40, "下载量": 3},
                {"时间": "2024-03-02", "花费": 200.0, "曝光量": 4000, "点击量": 20, "下载量": 2}
            ],
            "cost_metrics": {"下载成本": 60.0},
            "resource_spend": [
                {"资源位": "信息流", "花费": 300.0},
                {"资源位": "开屏", "花费": 100.0}
            ]
        })
    }

    fn find<'a>(groups: &'a [MetricGroup], label: &str) -> &'a str {
        groups
            .iter()
            .flat_map(|g| g.cards.iter())
            .find(|c| c.label == label)
            .map(|c| c.value.as_str())
            .unwrap()
    }

    #[test]
    fn metric_cards_sum_daily_traffic_and_format_totals() {
        let groups = metric_groups(&sample_payload());
        assert_eq!(find(&groups, "总花费"), "12.35万元");
        assert_eq!(find(&groups, "结算花费"), "99.5元");
        assert_eq!(find(&groups, "曝光量"), "1.20万");
        assert_eq!(find(&groups, "点击量"), "60");
        assert_eq!(find(&groups, "下载量"), "5");
        assert_eq!(find(&groups, "平均执行率"), "87.13%");
        assert_eq!(find(&groups, "下载成本"), "60元");
        assert_eq!(find(&groups, "支用成本"), "0元");
    }

    #[test]
    fn distribution_rows_show_share_of_total() {
        let chart = charts::resource_spend(&sample_payload());
        let lines = chart_lines(&chart, &DisplayConfig::default());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("300元 (75.00%)"));
        assert!(lines[1].contains("100元 (25.00%)"));
    }

    #[test]
    fn breakdowns_are_capped_at_max_rows() {
        let rows: Vec<Value> = (0..5)
            .map(|i| json!({"定向": format!("T{i}"), "花费": 10.0}))
            .collect();
        let chart = charts::targeting_spend(&json!({ "targeting_spend": rows }));
        let display = DisplayConfig {
            max_rows: 3,
            ..DisplayConfig::default()
        };
        let lines = chart_lines(&chart, &display);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "  … 2 more");
    }

    #[test]
    fn empty_chart_says_so() {
        let chart = charts::bidding_method(&json!({}));
        assert_eq!(chart_lines(&chart, &DisplayConfig::default()), vec!["  (no data)"]);
    }

    #[test]
    fn bars_scale_to_width() {
        assert_eq!(bar(50.0, 100.0, 10).chars().count(), 5);
        assert_eq!(bar(0.0, 100.0, 10), "");
        assert_eq!(bar(0.01, 100.0, 10).chars().count(), 1);
    }

    #[test]
    fn terminal_renderer_writes_metrics_and_failures() {
        let renderer = TerminalRenderer::new(Vec::new(), DisplayConfig::default());
        let result = StatisticsResult::new(sample_payload());
        renderer.render_metrics(&result);
        renderer.render_charts(&result);
        renderer.report_failure("no data");
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.contains("12.35万元"));
        assert!(text.contains("资源位花费分布"));
        assert!(text.contains("no data"));
    }

    #[test]
    fn json_renderer_prints_payload_unchanged() {
        let renderer = JsonRenderer::new(Vec::new());
        let payload = sample_payload();
        renderer.render_metrics(&StatisticsResult::new(payload.clone()));
        renderer.render_charts(&StatisticsResult::new(payload.clone()));
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        let printed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(printed, payload);
    }
}
