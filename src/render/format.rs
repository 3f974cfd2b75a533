/// Number formatting for metric cards and chart tables.
///
/// Large values are scaled to 万 (1e4) or 亿 (1e8) with two decimals; smaller
/// values keep up to two decimals with thousands separators.
use serde_json::Value;

const YI: f64 = 100_000_000.0;
const WAN: f64 = 10_000.0;

/// Read a numeric field, treating missing, null and non-numeric values as 0.
pub fn number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// `12345` → `1.23万`, `999.5` → `999.5`.
pub fn format_quantity(n: f64) -> String {
    scaled(n, "")
}

/// Like [`format_quantity`] with a currency unit: `元`, `万元` or `亿元`.
pub fn format_currency(n: f64) -> String {
    scaled(n, "元")
}

/// A value that is already a percentage: `12.3456` → `12.35%`.
pub fn format_percent(n: f64) -> String {
    format!("{n:.2}%")
}

/// `part` as a share of `total`, `0.00%` when the total is zero.
pub fn format_share(part: f64, total: f64) -> String {
    if total > 0.0 {
        format_percent(part / total * 100.0)
    } else {
        "0.00%".to_string()
    }
}

fn scaled(n: f64, unit: &str) -> String {
    let n = if n.is_finite() { n } else { 0.0 };
    if n >= YI {
        format!("{:.2}亿{unit}", n / YI)
    } else if n >= WAN {
        format!("{:.2}万{unit}", n / WAN)
    } else {
        format!("{}{unit}", format_grouped(n))
    }
}

/// Up to two decimals, trailing zeros dropped, comma-grouped integer part.
pub fn format_grouped(n: f64) -> String {
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let mut out: String = grouped.chars().rev().collect();
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    if n < 0.0 && out.chars().any(|c| c != '0' && c != '.' && c != ',') {
        out.insert(0, '-');
    }
    out
}

/// Truncate to `max_chars` characters, appending "…" if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Terminal columns taken by `s`; East Asian wide characters count as two.
pub fn display_width(s: &str) -> usize {
    s.chars().map(|c| if is_wide(c) { 2 } else { 1 }).sum()
}

/// Pad `s` with spaces to `width` terminal columns.
pub fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(fill))
}

fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
    )
}
