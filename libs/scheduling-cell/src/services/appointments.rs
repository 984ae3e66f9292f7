use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    time_from_minutes, AdmissionDecision, Appointment, AppointmentView, OpenSlot,
    RejectionReason, SchedulingError, TimeInterval,
};
use crate::services::availability::AvailabilityService;
use crate::services::occupancy::OccupancyService;
use crate::services::slots::SlotIter;

#[derive(Debug, Clone, Deserialize)]
struct NamedRow {
    id: Uuid,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub date: Option<NaiveDate>,
    pub specialist_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

/// Effective timing of an appointment after a partial update is applied.
#[derive(Debug, Clone, Copy)]
pub struct AppointmentChanges {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.duration_minutes.is_none()
    }

    fn touches_timing(&self) -> bool {
        !self.is_empty()
    }
}

/// Listing, lookup, partial update and cancellation of persisted
/// appointments. Creation goes through the admission controller only.
pub struct AppointmentService {
    db: Arc<PostgrestClient>,
    availability: AvailabilityService,
    occupancy: OccupancyService,
    revalidate_on_update: bool,
}

impl AppointmentService {
    pub fn new(db: Arc<PostgrestClient>, config: &AppConfig) -> Self {
        Self {
            availability: AvailabilityService::new(Arc::clone(&db)),
            occupancy: OccupancyService::new(Arc::clone(&db)),
            revalidate_on_update: config.revalidate_on_update,
            db,
        }
    }

    pub async fn list(
        &self,
        filter: &AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<AppointmentView>, SchedulingError> {
        let mut query_parts = Vec::new();
        if let Some(date) = filter.date {
            query_parts.push(format!("date=eq.{}", date));
        }
        if let Some(specialist_id) = filter.specialist_id {
            query_parts.push(format!("specialist_id=eq.{}", specialist_id));
        }
        if let Some(client_id) = filter.client_id {
            query_parts.push(format!("client_id=eq.{}", client_id));
        }
        query_parts.push("order=date.asc,start_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let appointments: Vec<Appointment> = self.fetch(&path, auth_token).await?;

        let specialists = self.names("/rest/v1/specialists?select=id,name", auth_token).await?;
        let clients = self.names("/rest/v1/clients?select=id,name", auth_token).await?;

        debug!("listing {} appointment(s)", appointments.len());

        Ok(appointments
            .into_iter()
            .map(|apt| AppointmentView {
                id: apt.id,
                client_id: apt.client_id,
                client_name: clients.get(&apt.client_id).cloned().flatten(),
                specialist_id: apt.specialist_id,
                specialist_name: specialists.get(&apt.specialist_id).cloned().flatten(),
                date: apt.date,
                time: apt.start_time,
                duration_minutes: apt.duration_minutes,
                plan_id: apt.plan_id,
                warning: apt.warning,
            })
            .collect())
    }

    pub async fn get(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self.fetch(&path, auth_token).await?;
        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    /// Apply a partial update. When re-validation is enabled and any timing
    /// field changes, the window-containment and conflict gates run again for
    /// the appointment's effective interval (excluding the row itself);
    /// plan quota and lead time are not re-run.
    pub async fn update(
        &self,
        appointment_id: Uuid,
        changes: AppointmentChanges,
        auth_token: &str,
    ) -> Result<AdmissionDecision, SchedulingError> {
        let current = self.get(appointment_id, auth_token).await?;

        let date = changes.date.unwrap_or(current.date);
        let time = changes.time.unwrap_or(current.start_time);
        let duration = changes.duration_minutes.unwrap_or(current.duration_minutes);

        if self.revalidate_on_update && changes.touches_timing() {
            if let Some(rejection) = self
                .revalidate(&current, date, time, duration, auth_token)
                .await?
            {
                return Ok(AdmissionDecision::rejected(rejection));
            }
        }

        let mut fields = Map::new();
        if let Some(new_date) = changes.date {
            fields.insert("date".to_string(), json!(new_date));
        }
        if let Some(new_time) = changes.time {
            fields.insert(
                "start_time".to_string(),
                json!(new_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(new_duration) = changes.duration_minutes {
            fields.insert("duration_minutes".to_string(), json!(new_duration));
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let rows: Vec<Appointment> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(fields)),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let updated = rows.into_iter().next().ok_or(SchedulingError::NotFound)?;
        info!("appointment {} updated", appointment_id);
        Ok(AdmissionDecision::Accepted(updated))
    }

    /// Cancellation deletes the row outright; admission rules are not
    /// re-checked on delete.
    pub async fn delete(&self, appointment_id: Uuid, auth_token: &str) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let rows: Vec<Appointment> = self
            .db
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        if rows.is_empty() {
            return Err(SchedulingError::NotFound);
        }
        info!("appointment {} cancelled", appointment_id);
        Ok(())
    }

    /// The free slots a specialist still has on one date: grid windows,
    /// stepped by the slot duration, minus occupied intervals.
    pub async fn open_slots(
        &self,
        specialist_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<OpenSlot>, SchedulingError> {
        let specialist = self.availability.specialist(specialist_id, auth_token).await?;
        let duration = duration_minutes
            .filter(|d| *d > 0)
            .unwrap_or_else(|| specialist.slot_minutes());

        let windows = self.availability.windows_for(&specialist, date);
        let busy: Vec<TimeInterval> = self
            .occupancy
            .specialist_day(specialist_id, date, auth_token)
            .await?
            .iter()
            .map(|apt| apt.interval())
            .collect();

        Ok(SlotIter::new(&windows, duration)
            .map(|start| TimeInterval::starting_at(start, duration))
            .filter(|slot| !busy.iter().any(|taken| taken.overlaps(slot)))
            .map(|slot| OpenSlot {
                date,
                start: time_from_minutes(slot.start_min),
                end: time_from_minutes(slot.end_min),
                duration_minutes: duration,
            })
            .collect())
    }

    async fn revalidate(
        &self,
        current: &Appointment,
        date: NaiveDate,
        time: NaiveTime,
        duration: i32,
        auth_token: &str,
    ) -> Result<Option<RejectionReason>, SchedulingError> {
        let interval = TimeInterval::starting_at(time, duration);

        let specialist = self
            .availability
            .specialist(current.specialist_id, auth_token)
            .await?;
        let windows = self.availability.windows_for(&specialist, date);
        if !windows.iter().any(|w| w.interval().contains(&interval)) {
            return Ok(Some(RejectionReason::OutsideHours));
        }

        if self
            .occupancy
            .client_busy(current.client_id, date, interval, Some(current.id), auth_token)
            .await?
        {
            return Ok(Some(RejectionReason::ClientConflict));
        }

        if self
            .occupancy
            .specialist_busy(
                current.specialist_id,
                date,
                interval,
                Some(current.id),
                auth_token,
            )
            .await?
        {
            return Ok(Some(RejectionReason::SpecialistConflict));
        }

        Ok(None)
    }

    async fn names(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, Option<String>>, SchedulingError> {
        let rows: Vec<NamedRow> = self.fetch(path, auth_token).await?;
        Ok(rows.into_iter().map(|row| (row.id, row.name)).collect())
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<T, SchedulingError> {
        self.db
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))
    }
}
