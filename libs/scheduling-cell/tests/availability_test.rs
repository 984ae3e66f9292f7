// Grid builder: pure resolution of working-hours configuration into
// disjoint windows, with the default template as the universal fallback.

use chrono::{NaiveDate, NaiveTime};
use serde_json::json;

use scheduling_cell::services::availability::{default_windows, resolve_windows};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// 2026-03-02 is a Monday.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

#[test]
fn missing_configuration_falls_back_to_default_template() {
    let windows = resolve_windows(None, monday());
    assert_eq!(windows, default_windows());
    assert_eq!(windows[0].start, t(8, 0));
    assert_eq!(windows[0].end, t(12, 0));
    assert_eq!(windows[1].start, t(13, 30));
    assert_eq!(windows[1].end, t(17, 30));
}

#[test]
fn malformed_json_falls_back_to_default_template() {
    // The column held text that is not JSON at all.
    let raw = json!("this is {not json");
    assert_eq!(resolve_windows(Some(&raw), monday()), default_windows());
}

#[test]
fn unexpected_shape_falls_back_to_default_template() {
    let raw = json!(42);
    assert_eq!(resolve_windows(Some(&raw), monday()), default_windows());
}

#[test]
fn flat_list_applies_to_every_day() {
    let raw = json!([
        { "start": "09:00", "end": "11:00" },
        { "start": "14:00", "end": "18:00" }
    ]);

    for date in [monday(), sunday()] {
        let windows = resolve_windows(Some(&raw), date);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, t(9, 0));
        assert_eq!(windows[0].end, t(11, 0));
        assert_eq!(windows[1].start, t(14, 0));
        assert_eq!(windows[1].end, t(18, 0));
    }
}

#[test]
fn flat_list_encoded_as_text_column_is_accepted() {
    let raw = json!("[{\"start\":\"10:00\",\"end\":\"12:00\"}]");
    let windows = resolve_windows(Some(&raw), monday());
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start, t(10, 0));
}

#[test]
fn weekday_map_selects_the_entry_for_the_date() {
    let raw = json!({
        "monday": [ { "start": "07:00", "end": "13:00" } ],
        "sunday": [ { "start": "10:00", "end": "12:00" } ]
    });

    let monday_windows = resolve_windows(Some(&raw), monday());
    assert_eq!(monday_windows.len(), 1);
    assert_eq!(monday_windows[0].start, t(7, 0));

    let sunday_windows = resolve_windows(Some(&raw), sunday());
    assert_eq!(sunday_windows[0].start, t(10, 0));
}

#[test]
fn weekday_map_accepts_short_names_case_insensitively() {
    let raw = json!({ "Mon": [ { "start": "08:30", "end": "12:30" } ] });
    let windows = resolve_windows(Some(&raw), monday());
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start, t(8, 30));
}

#[test]
fn weekday_map_without_entry_for_the_date_falls_back() {
    let raw = json!({ "friday": [ { "start": "08:00", "end": "12:00" } ] });
    assert_eq!(resolve_windows(Some(&raw), monday()), default_windows());
}

#[test]
fn empty_list_falls_back_to_default_template() {
    let raw = json!([]);
    assert_eq!(resolve_windows(Some(&raw), monday()), default_windows());
}

#[test]
fn inverted_and_unparseable_windows_are_dropped() {
    let raw = json!([
        { "start": "12:00", "end": "08:00" },
        { "start": "half past", "end": "noon" },
        { "start": "14:00", "end": "16:00" }
    ]);
    let windows = resolve_windows(Some(&raw), monday());
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start, t(14, 0));
}

#[test]
fn all_windows_invalid_falls_back_to_default_template() {
    let raw = json!([ { "start": "12:00", "end": "08:00" } ]);
    assert_eq!(resolve_windows(Some(&raw), monday()), default_windows());
}

#[test]
fn seconds_in_clock_strings_are_accepted() {
    let raw = json!([ { "start": "08:00:00", "end": "12:00:00" } ]);
    let windows = resolve_windows(Some(&raw), monday());
    assert_eq!(windows[0].start, t(8, 0));
    assert_eq!(windows[0].end, t(12, 0));
}

#[test]
fn resolution_is_a_pure_function_of_configuration_and_date() {
    let raw = json!({
        "monday": [ { "start": "07:00", "end": "13:00" } ],
        "tuesday": [ { "start": "09:00", "end": "15:00" } ]
    });

    let first = resolve_windows(Some(&raw), monday());
    let second = resolve_windows(Some(&raw), monday());
    assert_eq!(first, second);
}
