use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{parse_clock, SchedulingError, SpecialistScheduling, WorkingWindow};

/// Template applied whenever a specialist has no usable working-hours
/// configuration: 08:00-12:00 and 13:30-17:30.
pub fn default_windows() -> Vec<WorkingWindow> {
    vec![
        WorkingWindow {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
        },
        WorkingWindow {
            start: NaiveTime::from_hms_opt(13, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or(NaiveTime::MIN),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct WindowSpec {
    start: String,
    end: String,
}

/// The two persisted shapes of the `working_hours` column: a flat list of
/// windows applied every day, or a map keyed by weekday name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkingHoursConfig {
    Flat(Vec<WindowSpec>),
    ByWeekday(HashMap<String, Vec<WindowSpec>>),
}

/// Resolve the ordered, disjoint working windows for one date. Pure in its
/// inputs, and total: missing, empty or unparseable configuration always
/// falls back to the default template.
pub fn resolve_windows(raw: Option<&Value>, date: NaiveDate) -> Vec<WorkingWindow> {
    let Some(raw) = raw else {
        return default_windows();
    };

    // A text column arrives as a JSON string wrapping the real document.
    let parsed: Result<WorkingHoursConfig, _> = match raw {
        Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    };

    let config = match parsed {
        Ok(config) => config,
        Err(e) => {
            warn!("unparseable working_hours configuration, using default template: {}", e);
            return default_windows();
        }
    };

    let specs = match &config {
        WorkingHoursConfig::Flat(list) => list.as_slice(),
        WorkingHoursConfig::ByWeekday(map) => weekday_entry(map, date.weekday()),
    };

    let windows: Vec<WorkingWindow> = specs.iter().filter_map(parse_window).collect();
    if windows.is_empty() {
        return default_windows();
    }
    windows
}

fn weekday_entry(map: &HashMap<String, Vec<WindowSpec>>, weekday: Weekday) -> &[WindowSpec] {
    let (full, short) = match weekday {
        Weekday::Mon => ("monday", "mon"),
        Weekday::Tue => ("tuesday", "tue"),
        Weekday::Wed => ("wednesday", "wed"),
        Weekday::Thu => ("thursday", "thu"),
        Weekday::Fri => ("friday", "fri"),
        Weekday::Sat => ("saturday", "sat"),
        Weekday::Sun => ("sunday", "sun"),
    };

    map.iter()
        .find(|(key, specs)| {
            let key = key.trim().to_lowercase();
            (key == full || key == short) && !specs.is_empty()
        })
        .map(|(_, specs)| specs.as_slice())
        .unwrap_or(&[])
}

fn parse_window(spec: &WindowSpec) -> Option<WorkingWindow> {
    let start = parse_clock(spec.start.trim())?;
    let end = parse_clock(spec.end.trim())?;
    if start >= end {
        return None;
    }
    Some(WorkingWindow { start, end })
}

/// Storage-backed grid builder: fetches the specialist row and resolves its
/// windows for a date.
pub struct AvailabilityService {
    db: Arc<PostgrestClient>,
}

impl AvailabilityService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    pub async fn specialist(
        &self,
        specialist_id: Uuid,
        auth_token: &str,
    ) -> Result<SpecialistScheduling, SchedulingError> {
        let path = format!(
            "/rest/v1/specialists?id=eq.{}&select=id,accepts_plan,consultation_minutes,working_hours",
            specialist_id
        );
        let rows: Vec<SpecialistScheduling> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(SchedulingError::SpecialistNotFound)
    }

    pub fn windows_for(&self, specialist: &SpecialistScheduling, date: NaiveDate) -> Vec<WorkingWindow> {
        let windows = resolve_windows(specialist.working_hours.as_ref(), date);
        debug!(
            "specialist {} has {} working window(s) on {}",
            specialist.id,
            windows.len(),
            date
        );
        windows
    }
}
