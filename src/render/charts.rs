/// Chart series shaped from a statistics payload.
///
/// Pure functions: each takes the raw payload and returns a [`Chart`] with
/// category labels and one or more aligned value series. Missing arrays are
/// treated as empty, missing numbers as 0 (rates excepted: a null rate stays
/// a gap).
use serde_json::Value;

use super::format::number;

// Payload keys as produced by the backend.
pub const DATE: &str = "时间";
pub const SPEND: &str = "花费";
pub const SETTLEMENT: &str = "结算花费";
pub const IMPRESSIONS: &str = "曝光量";
pub const CLICKS: &str = "点击量";
pub const DOWNLOADS: &str = "下载量";
pub const AGENT: &str = "代理商来源";
pub const BIDDING_CATEGORY: &str = "出价类别";
pub const BIDDING_METHOD: &str = "出价方式";
pub const TARGETING: &str = "定向";
pub const RESOURCE: &str = "资源位";
pub const ENTRY_RATE: &str = "准入通过率";
pub const CREDIT_RATE: &str = "授信通过率";
pub const LOAN_RATE: &str = "支用通过率";

/// Bidding categories stacked in the agent chart, with display labels.
const BIDDING_CATEGORIES: [(&str, &str); 3] = [("OCPC", "OCPC"), ("CPC", "CPC"), ("OTHER", "其他")];

// ---------------------------------------------------------------------------
// Chart model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartUnit {
    Currency,
    Count,
    Percent,
}

/// How values relate to each other, which decides the share column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Values over time; no shares.
    Trend,
    /// Several series stacked per label; shares are within each label.
    Stacked,
    /// One series split across labels; shares are of the grand total.
    Distribution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    /// One entry per chart label. `None` is a gap.
    pub values: Vec<Option<f64>>,
}

impl Series {
    fn new(label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    fn has_positive(&self) -> bool {
        self.values.iter().flatten().any(|v| *v > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: &'static str,
    pub kind: ChartKind,
    pub unit: ChartUnit,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

impl Chart {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() || self.series.is_empty()
    }

    /// Sum of every series at label `index`.
    pub fn label_total(&self, index: usize) -> f64 {
        self.series
            .iter()
            .filter_map(|s| s.values.get(index).copied().flatten())
            .sum()
    }

    /// Sum of every value in every series.
    pub fn grand_total(&self) -> f64 {
        (0..self.labels.len()).map(|i| self.label_total(i)).sum()
    }

    /// Largest single value, used to scale bars.
    pub fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().flatten())
            .fold(0.0, |max, v| if *v > max { *v } else { max })
    }
}

// ---------------------------------------------------------------------------
// Payload access
// ---------------------------------------------------------------------------

fn records<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// A record's label field as text. Numbers are accepted; null is not.
fn text(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Distinct values of `key` in first-seen order.
fn distinct(records: &[Value], key: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for label in records.iter().filter_map(|r| text(r, key)) {
        if !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}

fn sorted_dates(records: &[Value]) -> Vec<String> {
    let mut dates = distinct(records, DATE);
    dates.sort();
    dates
}

fn find_by<'a>(records: &'a [Value], key: &str, label: &str) -> Option<&'a Value> {
    records
        .iter()
        .find(|r| text(r, key).as_deref() == Some(label))
}

/// One value per date, 0 when the day or field is missing.
fn per_date(records: &[Value], dates: &[String], field: &str) -> Vec<Option<f64>> {
    dates
        .iter()
        .map(|date| Some(find_by(records, DATE, date).map_or(0.0, |r| number(r.get(field)))))
        .collect()
}

/// Labels and spend of a grouped breakdown, in payload order.
fn distribution(
    payload: &Value,
    array: &str,
    label_key: &str,
    title: &'static str,
) -> Chart {
    let rows = records(payload, array);
    let (labels, values): (Vec<String>, Vec<Option<f64>>) = rows
        .iter()
        .filter_map(|r| Some((text(r, label_key)?, Some(number(r.get(SPEND))))))
        .unzip();
    Chart {
        title,
        kind: ChartKind::Distribution,
        unit: ChartUnit::Currency,
        labels,
        series: vec![Series::new("花费", values)],
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

/// Daily spend and settlement spend, dates ascending.
pub fn daily_spend(payload: &Value) -> Chart {
    let rows = records(payload, "daily_stats");
    let dates = sorted_dates(rows);
    Chart {
        title: "每日花费趋势",
        kind: ChartKind::Trend,
        unit: ChartUnit::Currency,
        series: vec![
            Series::new("花费", per_date(rows, &dates, SPEND)),
            Series::new("结算花费", per_date(rows, &dates, SETTLEMENT)),
        ],
        labels: dates,
    }
}

/// Daily impressions and clicks, dates ascending.
pub fn daily_traffic(payload: &Value) -> Chart {
    let rows = records(payload, "daily_stats");
    let dates = sorted_dates(rows);
    Chart {
        title: "每日曝光/点击趋势",
        kind: ChartKind::Trend,
        unit: ChartUnit::Count,
        series: vec![
            Series::new("曝光量", per_date(rows, &dates, IMPRESSIONS)),
            Series::new("点击量", per_date(rows, &dates, CLICKS)),
        ],
        labels: dates,
    }
}

/// Spend per agent stacked by bidding category.
///
/// Agents come from `agent_stats`, or from the mix itself when that list is
/// empty. Categories with no positive spend anywhere are left out.
pub fn agent_spend(payload: &Value) -> Chart {
    let stats = records(payload, "agent_stats");
    let mix = records(payload, "agent_bidding_mix");
    let agents = if stats.is_empty() {
        distinct(mix, AGENT)
    } else {
        stats.iter().filter_map(|r| text(r, AGENT)).collect()
    };

    let series = BIDDING_CATEGORIES
        .iter()
        .map(|&(category, label)| {
            let values = agents
                .iter()
                .map(|agent| {
                    let spend = mix
                        .iter()
                        .find(|r| {
                            text(r, AGENT).as_deref() == Some(agent.as_str())
                                && text(r, BIDDING_CATEGORY).as_deref() == Some(category)
                        })
                        .map_or(0.0, |r| number(r.get(SPEND)));
                    Some(spend)
                })
                .collect();
            Series::new(label, values)
        })
        .filter(Series::has_positive)
        .collect();

    Chart {
        title: "代理商花费对比",
        kind: ChartKind::Stacked,
        unit: ChartUnit::Currency,
        labels: agents,
        series,
    }
}

pub fn bidding_method(payload: &Value) -> Chart {
    distribution(payload, "bidding_stats", BIDDING_METHOD, "出价方式花费分布")
}

pub fn targeting_spend(payload: &Value) -> Chart {
    distribution(payload, "targeting_spend", TARGETING, "定向花费分布")
}

pub fn resource_spend(payload: &Value) -> Chart {
    distribution(payload, "resource_spend", RESOURCE, "资源位花费分布")
}

/// Entry, credit and loan pass rates in percent, dates ascending.
///
/// The payload carries fractions; values are scaled by 100 and rounded to two
/// decimals. A null or missing rate stays `None`.
pub fn rate_trend(payload: &Value) -> Chart {
    let rows = records(payload, "rate_trend");
    let dates = sorted_dates(rows);
    let rate = |field: &str| -> Vec<Option<f64>> {
        dates
            .iter()
            .map(|date| {
                let fraction = find_by(rows, DATE, date)?.get(field)?.as_f64()?;
                Some((fraction * 100.0 * 100.0).round() / 100.0)
            })
            .collect()
    };
    Chart {
        title: "通过率趋势",
        kind: ChartKind::Trend,
        unit: ChartUnit::Percent,
        series: vec![
            Series::new(ENTRY_RATE, rate(ENTRY_RATE)),
            Series::new(CREDIT_RATE, rate(CREDIT_RATE)),
            Series::new(LOAN_RATE, rate(LOAN_RATE)),
        ],
        labels: dates,
    }
}

/// Every chart in display order.
pub fn all_charts(payload: &Value) -> Vec<Chart> {
    vec![
        daily_spend(payload),
        daily_traffic(payload),
        agent_spend(payload),
        bidding_method(payload),
        targeting_spend(payload),
        resource_spend(payload),
        rate_trend(payload),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn daily_charts_sort_dates_and_fill_missing_fields() {
        let payload = json!({
            "daily_stats": [
                {"时间": "2024-03-02", "花费": 200.0, "曝光量": 50},
                {"时间": "2024-03-01", "花费": 100.0, "结算花费": 90.0, "曝光量": 10, "点击量": 2}
            ]
        });
        let spend = daily_spend(&payload);
        assert_eq!(spend.labels, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(spend.series[0].values, vec![Some(100.0), Some(200.0)]);
        assert_eq!(spend.series[1].values, vec![Some(90.0), Some(0.0)]);

        let traffic = daily_traffic(&payload);
        assert_eq!(traffic.series[0].values, vec![Some(10.0), Some(50.0)]);
        assert_eq!(traffic.series[1].values, vec![Some(2.0), Some(0.0)]);
    }

    #[test]
    fn missing_arrays_give_empty_charts() {
        let charts = all_charts(&json!({"success": true}));
        assert_eq!(charts.len(), 7);
        assert!(charts.iter().all(Chart::is_empty));
    }

    #[test]
    fn agent_chart_stacks_categories_and_drops_empty_ones() {
        let payload = json!({
            "agent_stats": [{"代理商来源": "奇异果"}, {"代理商来源": "蓝鲸"}],
            "agent_bidding_mix": [
                {"代理商来源": "奇异果", "出价类别": "OCPC", "花费": 300.0},
                {"代理商来源": "奇异果", "出价类别": "CPC", "花费": 100.0},
                {"代理商来源": "蓝鲸", "出价类别": "CPC", "花费": 50.0}
            ]
        });
        let chart = agent_spend(&payload);
        assert_eq!(chart.labels, vec!["奇异果", "蓝鲸"]);
        let labels: Vec<_> = chart.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["OCPC", "CPC"]);
        assert_eq!(chart.series[0].values, vec![Some(300.0), Some(0.0)]);
        assert_eq!(chart.label_total(0), 400.0);
        assert_eq!(chart.label_total(1), 50.0);
    }

    #[test]
    fn agent_chart_falls_back_to_mix_agents() {
        let payload = json!({
            "agent_stats": [],
            "agent_bidding_mix": [
                {"代理商来源": "B", "出价类别": "OTHER", "花费": 5.0},
                {"代理商来源": "A", "出价类别": "OTHER", "花费": 7.0},
                {"代理商来源": "B", "出价类别": "OCPC", "花费": 0.0}
            ]
        });
        let chart = agent_spend(&payload);
        assert_eq!(chart.labels, vec!["B", "A"]);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].label, "其他");
    }

    #[test]
    fn distributions_keep_payload_order() {
        let payload = json!({
            "resource_spend": [
                {"资源位": "信息流", "花费": 300.0},
                {"资源位": "开屏", "花费": 100.0},
                {"资源位": null, "花费": 1.0}
            ]
        });
        let chart = resource_spend(&payload);
        assert_eq!(chart.labels, vec!["信息流", "开屏"]);
        assert_eq!(chart.kind, ChartKind::Distribution);
        assert_eq!(chart.grand_total(), 400.0);
        assert_eq!(chart.max_value(), 300.0);
    }

    #[test]
    fn rate_trend_scales_to_percent_and_keeps_gaps() {
        let payload = json!({
            "rate_trend": [
                {"时间": "2024-03-02", "准入通过率": 0.5, "授信通过率": null, "支用通过率": 0.12346},
                {"时间": "2024-03-01", "准入通过率": 0.25}
            ]
        });
        let chart = rate_trend(&payload);
        assert_eq!(chart.labels, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(chart.series[0].values, vec![Some(25.0), Some(50.0)]);
        assert_eq!(chart.series[1].values, vec![None, None]);
        assert_eq!(chart.series[2].values, vec![None, Some(12.35)]);
    }
}
