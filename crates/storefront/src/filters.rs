//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Vietnam is UTC+7 all year round.
const VIETNAM_OFFSET_SECONDS: i32 = 7 * 60 * 60;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a backend timestamp as `dd/mm/yyyy HH:MM` in Vietnam time.
///
/// Usage in templates: `{{ order.created_at|vn_datetime }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn vn_datetime(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_vn_datetime(&value.to_string()))
}

/// Timestamps without an offset are taken as UTC. Unparsable input is
/// returned unchanged.
#[must_use]
pub fn format_vn_datetime(raw: &str) -> String {
    let Some(utc) = parse_timestamp(raw.trim()) else {
        return raw.to_string();
    };
    let Some(offset) = FixedOffset::east_opt(VIETNAM_OFFSET_SECONDS) else {
        return raw.to_string();
    };
    utc.with_timezone(&offset)
        .format("%d/%m/%Y %H:%M")
        .to_string()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
