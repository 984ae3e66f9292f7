use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{Appointment, SchedulingError, TimeInterval};

/// Answers overlap and count queries against the tenant's persisted
/// appointments. Rows for the day are fetched and filtered in process with
/// the half-open interval rule.
pub struct OccupancyService {
    db: Arc<PostgrestClient>,
}

impl OccupancyService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    /// All of a specialist's appointments on one date, ordered by start time.
    pub async fn specialist_day(
        &self,
        specialist_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?specialist_id=eq.{}&date=eq.{}&order=start_time.asc",
            specialist_id, date
        );
        self.fetch(&path, auth_token).await
    }

    /// True when any of the specialist's appointments that day overlaps the
    /// interval.
    pub async fn specialist_busy(
        &self,
        specialist_id: Uuid,
        date: NaiveDate,
        interval: TimeInterval,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let appointments = self.specialist_day(specialist_id, date, auth_token).await?;
        Ok(any_overlap(&appointments, interval, exclude))
    }

    /// True when the client has any overlapping appointment that day, with
    /// any specialist.
    pub async fn client_busy(
        &self,
        client_id: Uuid,
        date: NaiveDate,
        interval: TimeInterval,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?client_id=eq.{}&date=eq.{}&order=start_time.asc",
            client_id, date
        );
        let appointments = self.fetch(&path, auth_token).await?;
        Ok(any_overlap(&appointments, interval, exclude))
    }

    /// Number of plan-governed appointments for (specialist, plan) on a date.
    pub async fn plan_count(
        &self,
        specialist_id: Uuid,
        plan_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<i64, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?specialist_id=eq.{}&plan_id=eq.{}&date=eq.{}&select=id",
            specialist_id, plan_id, date
        );
        let rows: Vec<serde_json::Value> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let count = rows.len() as i64;
        debug!(
            "specialist {} holds {} appointment(s) for plan {} on {}",
            specialist_id, count, plan_id, date
        );
        Ok(count)
    }

    async fn fetch(&self, path: &str, auth_token: &str) -> Result<Vec<Appointment>, SchedulingError> {
        self.db
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))
    }
}

fn any_overlap(appointments: &[Appointment], interval: TimeInterval, exclude: Option<Uuid>) -> bool {
    appointments
        .iter()
        .filter(|apt| Some(apt.id) != exclude)
        .any(|apt| apt.interval().overlaps(&interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn appointment(start: (u32, u32), duration: i32) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            specialist_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            duration_minutes: duration,
            plan_id: None,
            warning: None,
            created_at: Utc::now(),
        }
    }

    fn interval(start: (u32, u32), duration: i32) -> TimeInterval {
        TimeInterval::starting_at(NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(), duration)
    }

    #[test]
    fn half_open_intervals_do_not_overlap_back_to_back() {
        let existing = [appointment((9, 0), 30)];
        assert!(!any_overlap(&existing, interval((9, 30), 30), None));
        assert!(!any_overlap(&existing, interval((8, 30), 30), None));
    }

    #[test]
    fn partial_overlap_is_detected() {
        let existing = [appointment((9, 0), 30)];
        assert!(any_overlap(&existing, interval((9, 15), 30), None));
        assert!(any_overlap(&existing, interval((8, 45), 30), None));
        assert!(any_overlap(&existing, interval((9, 0), 30), None));
    }

    #[test]
    fn excluded_appointment_is_ignored() {
        let existing = [appointment((9, 0), 30)];
        let id = existing[0].id;
        assert!(!any_overlap(&existing, interval((9, 0), 30), Some(id)));
    }
}
