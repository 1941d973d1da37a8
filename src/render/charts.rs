//! Chart shaping
//!
//! Produces label/dataset structures the browser feeds straight into its
//! charting library: the inspection schedule by month and the per-service
//! trend series.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::dates::{display_date, month_key, parse_date};
use crate::upstream::records::{ScheduleEntry, TrendPoint};
use crate::upstream::RecordId;

pub const DONE_COLOR: &str = "#28a745";
pub const PLANNED_COLOR: &str = "#f9c74f";

/// One calendar month of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    /// `MM/YYYY`
    pub label: String,
    pub done: bool,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRow {
    #[serde(flatten)]
    pub record: ScheduleEntry,
    pub planned_display: Option<String>,
    pub status_text: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleView {
    pub months: Vec<MonthBucket>,
    pub rows: Vec<ScheduleRow>,
}

fn status_color(done: bool) -> &'static str {
    if done {
        DONE_COLOR
    } else {
        PLANNED_COLOR
    }
}

/// Group dated items by calendar month, chronologically. Items without a
/// parseable date are left out.
pub fn group_by_month<'a, T>(
    items: &'a [T],
    date_of: impl Fn(&T) -> Option<NaiveDate>,
) -> Vec<(String, Vec<&'a T>)> {
    let mut buckets: BTreeMap<(i32, u32), (String, Vec<&'a T>)> = BTreeMap::new();
    for item in items {
        if let Some(date) = date_of(item) {
            buckets
                .entry((date.year(), date.month()))
                .or_insert_with(|| (month_key(date), Vec::new()))
                .1
                .push(item);
        }
    }
    buckets.into_values().collect()
}

pub fn schedule_view(mut entries: Vec<ScheduleEntry>) -> ScheduleView {
    let planned = |entry: &ScheduleEntry| entry.planned_date.as_deref().and_then(parse_date);

    // undated entries sort last
    entries.sort_by_key(|entry| (planned(entry).is_none(), planned(entry)));

    let months = group_by_month(&entries, planned)
        .into_iter()
        .map(|(label, bucket)| {
            let done = bucket.iter().any(|entry| entry.is_done());
            MonthBucket {
                label,
                done,
                color: status_color(done),
            }
        })
        .collect();

    let rows = entries
        .into_iter()
        .map(|record| {
            let done = record.is_done();
            ScheduleRow {
                planned_display: display_date(record.planned_date.as_deref()),
                status_text: if done { "Proběhlá" } else { "Plánovaná" },
                color: status_color(done),
                record,
            }
        })
        .collect();

    ScheduleView { months, rows }
}

/// Trend chart for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSeries {
    pub service_id: RecordId,
    pub service_name: Option<String>,
    /// `M/YYYY`, one per point
    pub labels: Vec<String>,
    pub max_values: Vec<Option<f64>>,
    pub avg_values: Vec<Option<f64>>,
    pub limits: Vec<Option<f64>>,
    /// Highest limit over the series
    pub limit: Option<f64>,
    pub unit: Option<String>,
    pub last_value: Option<f64>,
    pub last_comment: Option<String>,
    pub within_limit: bool,
    pub comments: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOption {
    pub service_id: RecordId,
    pub service_name: Option<String>,
}

/// Distinct services in first-seen order.
pub fn services(points: &[TrendPoint]) -> Vec<ServiceOption> {
    let mut seen: Vec<ServiceOption> = Vec::new();
    for point in points {
        if !seen.iter().any(|s| s.service_id == point.service_id) {
            seen.push(ServiceOption {
                service_id: point.service_id.clone(),
                service_name: point.service_name.clone(),
            });
        }
    }
    seen
}

pub fn service_series(points: &[TrendPoint], service_id: &RecordId) -> ServiceSeries {
    let mut series: Vec<&TrendPoint> = points.iter().filter(|p| &p.service_id == service_id).collect();
    series.sort_by_key(|p| (p.year, p.month));

    let limit = series
        .iter()
        .filter_map(|p| p.limit)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));
    let last = series.last();
    let last_value = last.and_then(|p| p.max_value);
    let within_limit = match limit {
        Some(limit) => last_value.unwrap_or(0.0) <= limit,
        None => true,
    };

    ServiceSeries {
        service_id: service_id.clone(),
        service_name: series.iter().find_map(|p| p.service_name.clone()),
        labels: series.iter().map(|p| format!("{}/{}", p.month, p.year)).collect(),
        max_values: series.iter().map(|p| p.max_value).collect(),
        avg_values: series.iter().map(|p| p.avg_value).collect(),
        limits: series.iter().map(|p| p.limit).collect(),
        limit,
        unit: series.iter().find_map(|p| p.unit.clone()),
        last_value,
        last_comment: last.and_then(|p| p.comment.clone()),
        within_limit,
        comments: series.iter().map(|p| p.comment.clone()).collect(),
    }
}

/// One series per service, in first-seen order.
pub fn all_series(points: &[TrendPoint]) -> Vec<ServiceSeries> {
    services(points)
        .iter()
        .map(|s| service_series(points, &s.service_id))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendsView {
    pub services: Vec<ServiceOption>,
    pub selected: Option<RecordId>,
    pub series: Option<ServiceSeries>,
}

/// Trend detail: the requested service, or the first one known.
pub fn trends_view(points: &[TrendPoint], requested: Option<&str>) -> TrendsView {
    let services = services(points);
    let selected = requested
        .and_then(|id| services.iter().find(|s| s.service_id.as_str() == id))
        .or_else(|| services.first())
        .map(|s| s.service_id.clone());
    let series = selected.as_ref().map(|id| service_series(points, id));

    TrendsView {
        services,
        selected,
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(date: &str, flag: i64) -> ScheduleEntry {
        serde_json::from_value(json!({ "PlanovaneDatum": date, "StatusKontrolyFlag": flag })).unwrap()
    }

    fn point(service: i64, year: i32, month: u32, max: f64, limit: f64) -> TrendPoint {
        serde_json::from_value(json!({
            "SluzbaID": service,
            "ServiceName": format!("Služba {service}"),
            "Year": year,
            "Month": month,
            "MaxStav": max,
            "AvgStav": max / 2.0,
            "MaxTarget": limit,
            "Vyhodnocení_jednotka": "%",
            "Komentar": format!("{month}/{year}")
        }))
        .unwrap()
    }

    #[test]
    fn test_grouping_ignores_day_of_month() {
        let entries = vec![entry("2024-03-01", 0), entry("2024-03-31", 0), entry("2024-04-15", 0)];
        let groups = group_by_month(&entries, |e| e.planned_date.as_deref().and_then(parse_date));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "03/2024");
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_month_is_done_if_any_entry_done() {
        let view = schedule_view(vec![
            entry("2024-05-20", 0),
            entry("2024-05-02", 1),
            entry("2024-06-10", 0),
        ]);
        assert_eq!(view.months[0].label, "05/2024");
        assert!(view.months[0].done);
        assert_eq!(view.months[0].color, DONE_COLOR);
        assert!(!view.months[1].done);
        assert_eq!(view.months[1].color, PLANNED_COLOR);

        // rows ascending by planned date
        assert_eq!(view.rows[0].planned_display.as_deref(), Some("02.05.2024"));
        assert_eq!(view.rows[0].status_text, "Proběhlá");
    }

    #[test]
    fn test_month_labels_are_chronological_across_years() {
        let view = schedule_view(vec![entry("2025-01-10", 0), entry("2024-12-10", 0), entry("2024-02-10", 0)]);
        let labels: Vec<_> = view.months.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["02/2024", "12/2024", "01/2025"]);
    }

    #[test]
    fn test_series_sorted_and_checked_against_highest_limit() {
        let points = vec![
            point(1, 2024, 3, 4.0, 5.0),
            point(1, 2023, 12, 9.0, 3.0),
            point(2, 2024, 1, 1.0, 1.0),
            point(1, 2024, 1, 2.0, 5.0),
        ];
        let series = service_series(&points, &RecordId::from(1));
        assert_eq!(series.labels, vec!["12/2023", "1/2024", "3/2024"]);
        assert_eq!(series.limit, Some(5.0));
        assert_eq!(series.last_value, Some(4.0));
        assert!(series.within_limit);
        assert_eq!(series.last_comment.as_deref(), Some("3/2024"));
        assert_eq!(series.unit.as_deref(), Some("%"));
    }

    #[test]
    fn test_over_limit_is_flagged() {
        let series = service_series(&[point(1, 2024, 1, 7.5, 5.0)], &RecordId::from(1));
        assert!(!series.within_limit);
    }

    #[test]
    fn test_trends_view_falls_back_to_first_service() {
        let points = vec![point(2, 2024, 1, 1.0, 1.0), point(1, 2024, 1, 1.0, 1.0)];
        let view = trends_view(&points, Some("99"));
        assert_eq!(view.selected, Some(RecordId::from(2)));
        assert_eq!(view.services.len(), 2);

        let view = trends_view(&points, Some("1"));
        assert_eq!(view.selected, Some(RecordId::from(1)));
        assert!(trends_view(&[], None).series.is_none());
    }
}
