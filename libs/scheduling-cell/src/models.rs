use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub specialist_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub plan_id: Option<Uuid>,
    pub warning: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::starting_at(self.start_time, self.duration_minutes)
    }
}

/// Half-open interval within one day, in minutes since midnight. Doing the
/// arithmetic on plain minutes keeps overlap checks away from clock-time
/// wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start_min: i32,
    pub end_min: i32,
}

impl TimeInterval {
    pub fn starting_at(start: NaiveTime, duration_minutes: i32) -> Self {
        let start_min = minutes_of(start);
        Self {
            start_min,
            end_min: start_min + duration_minutes.max(0),
        }
    }

    /// Overlap per the half-open rule: `startA < endB && startB < endA`.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start_min < other.end_min && other.start_min < self.end_min
    }

    pub fn contains(&self, inner: &TimeInterval) -> bool {
        self.start_min <= inner.start_min && inner.end_min <= self.end_min
    }
}

pub fn minutes_of(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

pub fn time_from_minutes(minutes: i32) -> NaiveTime {
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
        .unwrap_or(NaiveTime::MIN)
}

/// One contiguous availability window within a working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingWindow {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval {
            start_min: minutes_of(self.start),
            end_min: minutes_of(self.end),
        }
    }
}

// ==============================================================================
// STORAGE ROW VIEWS
// ==============================================================================

/// The slice of a specialist row the scheduling engine needs.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecialistScheduling {
    pub id: Uuid,
    #[serde(default)]
    pub accepts_plan: bool,
    #[serde(default)]
    pub consultation_minutes: i32,
    /// Raw `working_hours` column: JSON text or a jsonb array/object.
    #[serde(default)]
    pub working_hours: Option<Value>,
}

impl SpecialistScheduling {
    pub const DEFAULT_CONSULTATION_MINUTES: i32 = 30;

    pub fn slot_minutes(&self) -> i32 {
        if self.consultation_minutes > 0 {
            self.consultation_minutes
        } else {
            Self::DEFAULT_CONSULTATION_MINUTES
        }
    }
}

/// The slice of a client row the scheduling engine needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientScheduling {
    pub id: Uuid,
    #[serde(default)]
    pub has_plan: bool,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
}

impl ClientScheduling {
    pub fn coverage(&self) -> PlanCoverage {
        PlanCoverage {
            has_plan: self.has_plan,
            plan_id: if self.has_plan { self.plan_id } else { None },
        }
    }
}

/// Explicit plan-coverage pair (not a tuple): a client either carries a plan
/// id or carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCoverage {
    pub has_plan: bool,
    pub plan_id: Option<Uuid>,
}

/// Per (specialist, plan) booking policy. A missing row reads as all-zero:
/// no daily cap, no minimum lead time.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PlanPolicy {
    #[serde(default)]
    pub max_daily: i32,
    #[serde(default)]
    pub min_lead_days: i64,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

/// Validated booking request, ready for the admission controller.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub client_id: Uuid,
    pub specialist_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub override_plan_limit: bool,
}

/// Raw creation payload. Fields arrive as strings so that missing and
/// malformed values can both be reported by name.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentPayload {
    pub domain: Option<String>,
    pub client_id: Option<String>,
    pub specialist_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    #[serde(default)]
    pub override_plan_limit: bool,
}

impl CreateAppointmentPayload {
    pub fn validate(self) -> Result<(String, BookingRequest), Vec<String>> {
        let mut bad_fields = Vec::new();

        let domain = match self.domain.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => Some(d.to_string()),
            _ => {
                bad_fields.push("domain".to_string());
                None
            }
        };
        let client_id = parse_field(self.client_id.as_deref(), "client_id", &mut bad_fields, |s| {
            Uuid::parse_str(s).ok()
        });
        let specialist_id = parse_field(
            self.specialist_id.as_deref(),
            "specialist_id",
            &mut bad_fields,
            |s| Uuid::parse_str(s).ok(),
        );
        let date = parse_field(self.date.as_deref(), "date", &mut bad_fields, parse_date);
        let time = parse_field(self.time.as_deref(), "time", &mut bad_fields, parse_clock);

        match (domain, client_id, specialist_id, date, time) {
            (Some(domain), Some(client_id), Some(specialist_id), Some(date), Some(time)) => Ok((
                domain,
                BookingRequest {
                    client_id,
                    specialist_id,
                    date,
                    start_time: time,
                    override_plan_limit: self.override_plan_limit,
                },
            )),
            _ => Err(bad_fields),
        }
    }
}

fn parse_field<T>(
    raw: Option<&str>,
    name: &str,
    bad_fields: &mut Vec<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => match parse(value) {
            Some(parsed) => Some(parsed),
            None => {
                bad_fields.push(name.to_string());
                None
            }
        },
        _ => {
            bad_fields.push(name.to_string());
            None
        }
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Partial update for an existing appointment; only provided fields change.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAppointmentPayload {
    pub domain: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_minutes: Option<i32>,
}

// ==============================================================================
// ADMISSION OUTCOME MODELS
// ==============================================================================

/// Why a booking request was turned down. Wire codes are part of the caller
/// contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    #[serde(rename = "PAST_DATE")]
    PastDate,
    #[serde(rename = "OUTSIDE_HOURS")]
    OutsideHours,
    #[serde(rename = "CLIENT_CONFLICT")]
    ClientConflict,
    #[serde(rename = "SPECIALIST_CONFLICT")]
    SpecialistConflict,
    #[serde(rename = "PLAN_NOT_ACCEPTED")]
    PlanNotAccepted,
    #[serde(rename = "ANTECEDENCIA_INSUFICIENTE")]
    InsufficientLeadTime,
    #[serde(rename = "LIMITE_CONVENIO")]
    PlanLimitReached,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::PastDate => "Requested date is in the past",
            RejectionReason::OutsideHours => {
                "Requested time falls outside the specialist's working hours"
            }
            RejectionReason::ClientConflict => {
                "Client already has an appointment overlapping this time"
            }
            RejectionReason::SpecialistConflict => {
                "Specialist already has an appointment overlapping this time"
            }
            RejectionReason::PlanNotAccepted => "Specialist does not accept the client's plan",
            RejectionReason::InsufficientLeadTime => {
                "Requested date is closer than the plan's minimum advance notice"
            }
            RejectionReason::PlanLimitReached => {
                "Specialist reached the plan's daily appointment limit for this date"
            }
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            RejectionReason::PastDate => "PAST_DATE",
            RejectionReason::OutsideHours => "OUTSIDE_HOURS",
            RejectionReason::ClientConflict => "CLIENT_CONFLICT",
            RejectionReason::SpecialistConflict => "SPECIALIST_CONFLICT",
            RejectionReason::PlanNotAccepted => "PLAN_NOT_ACCEPTED",
            RejectionReason::InsufficientLeadTime => "ANTECEDENCIA_INSUFICIENTE",
            RejectionReason::PlanLimitReached => "LIMITE_CONVENIO",
        };
        write!(f, "{}", code)
    }
}

/// Extra detail carried by the soft `LIMITE_CONVENIO` rejection.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuotaExcess {
    #[serde(rename = "canOverride")]
    pub can_override: bool,
    #[serde(rename = "maxDiario")]
    pub max_daily: i32,
    #[serde(rename = "qtdAtual")]
    pub current_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedSlot {
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_clock")]
    pub time: NaiveTime,
}

fn serialize_clock<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format("%H:%M").to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub message: String,
    pub suggestions: Vec<SuggestedSlot>,
    pub quota: Option<QuotaExcess>,
}

impl Rejection {
    pub fn new(reason: RejectionReason) -> Self {
        Self {
            reason,
            message: reason.message().to_string(),
            suggestions: Vec::new(),
            quota: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<SuggestedSlot>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_quota(mut self, quota: QuotaExcess) -> Self {
        self.quota = Some(quota);
        self
    }
}

/// The admission controller's verdict. A rejection is an expected, structured
/// outcome, never an error.
#[derive(Debug, Clone)]
pub enum AdmissionDecision {
    Accepted(Appointment),
    Rejected(Rejection),
}

impl AdmissionDecision {
    pub fn rejected(reason: RejectionReason) -> Self {
        AdmissionDecision::Rejected(Rejection::new(reason))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionDecision::Accepted(_))
    }
}

// ==============================================================================
// DISPLAY MODELS
// ==============================================================================

/// Appointment joined with the names shown on agenda listings.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub specialist_id: Uuid,
    pub specialist_name: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub plan_id: Option<Uuid>,
    pub warning: Option<String>,
}

/// A free slot offered by the open-slot listing.
#[derive(Debug, Clone, Serialize)]
pub struct OpenSlot {
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_clock")]
    pub start: NaiveTime,
    #[serde(serialize_with = "serialize_clock")]
    pub end: NaiveTime,
    pub duration_minutes: i32,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("appointment not found")]
    NotFound,

    #[error("client not found")]
    ClientNotFound,

    #[error("specialist not found")]
    SpecialistNotFound,

    #[error("storage error: {0}")]
    Database(String),
}
