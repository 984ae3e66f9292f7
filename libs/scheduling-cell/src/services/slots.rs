use chrono::NaiveTime;

use crate::models::{minutes_of, time_from_minutes, WorkingWindow};

/// Lazy enumeration of fixed-duration candidate start times inside a set of
/// working windows. Within each window the cursor starts at the window start
/// and steps by the slot duration; a start is emitted only while the whole
/// slot still fits (`start + duration <= window end`), so no partial trailing
/// slot appears. Cloning the iterator restarts or forks the walk.
#[derive(Debug, Clone)]
pub struct SlotIter {
    windows: Vec<WorkingWindow>,
    duration_min: i32,
    window_idx: usize,
    cursor_min: i32,
}

impl SlotIter {
    pub fn new(windows: &[WorkingWindow], duration_minutes: i32) -> Self {
        let mut iter = Self {
            windows: windows.to_vec(),
            duration_min: duration_minutes,
            window_idx: 0,
            cursor_min: 0,
        };
        if duration_minutes <= 0 {
            // Nothing sensible to emit.
            iter.window_idx = iter.windows.len();
        } else if let Some(first) = iter.windows.first() {
            iter.cursor_min = minutes_of(first.start);
        }
        iter
    }
}

impl Iterator for SlotIter {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        while self.window_idx < self.windows.len() {
            let window = self.windows[self.window_idx].interval();

            if self.cursor_min + self.duration_min <= window.end_min {
                let slot = time_from_minutes(self.cursor_min);
                self.cursor_min += self.duration_min;
                return Some(slot);
            }

            self.window_idx += 1;
            if let Some(next_window) = self.windows.get(self.window_idx) {
                self.cursor_min = minutes_of(next_window.start);
            }
        }
        None
    }
}
