use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

pub const EMPTY_CELL: &str = "-";

static DATETIME_RE: OnceLock<Regex> = OnceLock::new();

fn datetime_re() -> &'static Regex {
    DATETIME_RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").unwrap()
    })
}

pub fn parse_header(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once(':')
        .ok_or_else(|| "expected format 'Key: Value'".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((key.to_string(), val.trim().to_string()))
}

pub fn parse_page_size(value: &str) -> Result<u32, String> {
    let size: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid page size '{}'", value.trim()))?;
    if size == 0 {
        return Err("page size must be at least 1".to_string());
    }
    Ok(size)
}

pub fn looks_like_datetime(value: &str) -> bool {
    datetime_re().is_match(value)
}

/// Offsets are kept as sent; nothing is converted to the local zone.
pub fn format_datetime(value: &str) -> Option<String> {
    const OUT: &str = "%Y-%m-%d %H:%M";
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format(OUT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.format(OUT).to_string());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.format(OUT).to_string());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn format_grouped(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    let digits = int_part.len();
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (digits - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    let is_zero = formatted.chars().all(|c| c == '0' || c == '.');
    if value.is_sign_negative() && !is_zero {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn format_quantity(value: f64) -> String {
    let out = format_grouped(value, 3);
    if out.contains('.') {
        out.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        out
    }
}

pub fn format_trend(ratio: f64) -> String {
    let pct = ratio * 100.0;
    let sign = if pct >= 0.0 { "+" } else { "" };
    format!("{sign}{pct:.1}%")
}

pub fn humanize_header(key: &str) -> String {
    let mut out = String::new();
    let mut prev: Option<char> = None;
    for ch in key.chars() {
        if ch == '_' {
            out.push(' ');
        } else {
            if ch.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
            {
                out.push(' ');
            }
            out.push(ch);
        }
        prev = Some(ch);
    }
    let mut chars = out.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
