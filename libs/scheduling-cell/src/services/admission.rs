use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};

use crate::models::{
    AdmissionDecision, Appointment, BookingRequest, ClientScheduling, PlanPolicy, QuotaExcess,
    Rejection, RejectionReason, SchedulingError, SpecialistScheduling, TimeInterval,
};
use crate::services::availability::AvailabilityService;
use crate::services::occupancy::OccupancyService;
use crate::services::suggestion::{SuggestionQuery, SuggestionService};

/// Plan context resolved once per request: whether the client's plan is
/// accepted by the specialist, and the policy that governs it.
struct PlanContext {
    plan_id: Uuid,
    accepted: bool,
    policy: PlanPolicy,
}

/// The admission controller: validates a booking request through a fixed
/// sequence of gates and either commits the appointment or rejects with a
/// structured reason. No persistent side effect happens before commit.
pub struct AdmissionService {
    db: Arc<PostgrestClient>,
    availability: AvailabilityService,
    occupancy: OccupancyService,
    suggestions: SuggestionService,
    suggestion_k: usize,
    suggestion_horizon_days: i64,
}

impl AdmissionService {
    pub fn new(db: Arc<PostgrestClient>, config: &AppConfig) -> Self {
        Self {
            availability: AvailabilityService::new(Arc::clone(&db)),
            occupancy: OccupancyService::new(Arc::clone(&db)),
            suggestions: SuggestionService::new(Arc::clone(&db)),
            suggestion_k: config.suggestion_count,
            suggestion_horizon_days: config.suggestion_horizon_days,
            db,
        }
    }

    pub async fn admit(
        &self,
        request: &BookingRequest,
        auth_token: &str,
    ) -> Result<AdmissionDecision, SchedulingError> {
        info!(
            "admission request: client {} with specialist {} on {} at {}",
            request.client_id, request.specialist_id, request.date, request.start_time
        );

        let today = Utc::now().date_naive();

        // Gate 1: the date must not already have passed.
        if request.date < today {
            return Ok(AdmissionDecision::rejected(RejectionReason::PastDate));
        }

        let specialist = self
            .availability
            .specialist(request.specialist_id, auth_token)
            .await?;
        let client = self.fetch_client(request.client_id, auth_token).await?;

        let duration = specialist.slot_minutes();
        let interval = TimeInterval::starting_at(request.start_time, duration);

        // Gate 2: the whole interval must sit inside one working window.
        let windows = self.availability.windows_for(&specialist, request.date);
        if !windows.iter().any(|w| w.interval().contains(&interval)) {
            return Ok(AdmissionDecision::rejected(RejectionReason::OutsideHours));
        }

        // Plan context is resolved up front; its rejections still fire only
        // at the plan gate, after the conflict gates.
        let plan_ctx = self.resolve_plan_context(&specialist, &client, auth_token).await?;

        // Gate 3: the client must be free, across all specialists.
        if self
            .occupancy
            .client_busy(request.client_id, request.date, interval, None, auth_token)
            .await?
        {
            return Ok(AdmissionDecision::rejected(RejectionReason::ClientConflict));
        }

        // Gate 4: the specialist must be free.
        if self
            .occupancy
            .specialist_busy(request.specialist_id, request.date, interval, None, auth_token)
            .await?
        {
            let suggestions = self
                .alternatives(&specialist, request, duration, plan_ctx.as_ref(), auth_token)
                .await;
            return Ok(AdmissionDecision::Rejected(
                Rejection::new(RejectionReason::SpecialistConflict).with_suggestions(suggestions),
            ));
        }

        // Gate 5: plan branch.
        let Some(ctx) = plan_ctx else {
            // Self-pay path: straight to commit with no plan attached.
            return self.commit(request, duration, None, None, auth_token).await;
        };

        if !ctx.accepted {
            return Ok(AdmissionDecision::rejected(RejectionReason::PlanNotAccepted));
        }

        let lead_days = request.date.signed_duration_since(today).num_days();
        if lead_days < ctx.policy.min_lead_days {
            debug!(
                "lead time {} below minimum {} for plan {}",
                lead_days, ctx.policy.min_lead_days, ctx.plan_id
            );
            let suggestions = self
                .alternatives(&specialist, request, duration, Some(&ctx), auth_token)
                .await;
            return Ok(AdmissionDecision::Rejected(
                Rejection::new(RejectionReason::InsufficientLeadTime).with_suggestions(suggestions),
            ));
        }

        let count = self
            .occupancy
            .plan_count(request.specialist_id, ctx.plan_id, request.date, auth_token)
            .await?;
        if ctx.policy.max_daily > 0 && count >= ctx.policy.max_daily as i64 {
            if request.override_plan_limit {
                // Explicit caller opt-in: commit anyway, but leave an audit
                // trail on the row.
                warn!(
                    "plan limit override: specialist {} plan {} on {} ({}/{})",
                    request.specialist_id, ctx.plan_id, request.date, count, ctx.policy.max_daily
                );
                let warning = format!(
                    "Plan daily limit {} exceeded by explicit override (count at booking: {})",
                    ctx.policy.max_daily, count
                );
                return self
                    .commit(request, duration, Some(ctx.plan_id), Some(warning), auth_token)
                    .await;
            }

            let suggestions = self
                .alternatives(&specialist, request, duration, Some(&ctx), auth_token)
                .await;
            return Ok(AdmissionDecision::Rejected(
                Rejection::new(RejectionReason::PlanLimitReached)
                    .with_suggestions(suggestions)
                    .with_quota(QuotaExcess {
                        can_override: true,
                        max_daily: ctx.policy.max_daily,
                        current_count: count,
                    }),
            ));
        }

        self.commit(request, duration, Some(ctx.plan_id), None, auth_token)
            .await
    }

    /// Persist the appointment. A constraint violation at the storage layer
    /// means a concurrent request won the slot after our checks passed; it is
    /// translated back into the matching conflict rejection.
    async fn commit(
        &self,
        request: &BookingRequest,
        duration: i32,
        plan_id: Option<Uuid>,
        warning: Option<String>,
        auth_token: &str,
    ) -> Result<AdmissionDecision, SchedulingError> {
        let body = json!({
            "client_id": request.client_id,
            "specialist_id": request.specialist_id,
            "date": request.date,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "duration_minutes": duration,
            "plan_id": plan_id,
            "warning": warning,
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Result<Vec<Appointment>, DbError> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await;

        match result {
            Ok(rows) => {
                let appointment = rows
                    .into_iter()
                    .next()
                    .ok_or_else(|| SchedulingError::Database("insert returned no row".into()))?;
                info!("appointment {} committed", appointment.id);
                Ok(AdmissionDecision::Accepted(appointment))
            }
            Err(DbError::Conflict { constraint }) => {
                let reason = if constraint.contains("client") {
                    RejectionReason::ClientConflict
                } else {
                    RejectionReason::SpecialistConflict
                };
                warn!(
                    "commit lost to a concurrent booking ({}), rejecting as {}",
                    constraint, reason
                );
                Ok(AdmissionDecision::rejected(reason))
            }
            Err(e) => Err(SchedulingError::Database(e.to_string())),
        }
    }

    async fn fetch_client(
        &self,
        client_id: Uuid,
        auth_token: &str,
    ) -> Result<ClientScheduling, SchedulingError> {
        let path = format!(
            "/rest/v1/clients?id=eq.{}&select=id,has_plan,plan_id",
            client_id
        );
        let rows: Vec<ClientScheduling> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(SchedulingError::ClientNotFound)
    }

    async fn resolve_plan_context(
        &self,
        specialist: &SpecialistScheduling,
        client: &ClientScheduling,
        auth_token: &str,
    ) -> Result<Option<PlanContext>, SchedulingError> {
        let coverage = client.coverage();
        let Some(plan_id) = coverage.plan_id else {
            return Ok(None);
        };

        let accepted = specialist.accepts_plan
            && self
                .plan_accepted(specialist.id, plan_id, auth_token)
                .await?;

        let policy = if accepted {
            self.fetch_policy(specialist.id, plan_id, auth_token).await?
        } else {
            PlanPolicy::default()
        };

        Ok(Some(PlanContext {
            plan_id,
            accepted,
            policy,
        }))
    }

    async fn plan_accepted(
        &self,
        specialist_id: Uuid,
        plan_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/specialist_plans?specialist_id=eq.{}&plan_id=eq.{}&select=plan_id",
            specialist_id, plan_id
        );
        let rows: Vec<serde_json::Value> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn fetch_policy(
        &self,
        specialist_id: Uuid,
        plan_id: Uuid,
        auth_token: &str,
    ) -> Result<PlanPolicy, SchedulingError> {
        let path = format!(
            "/rest/v1/plan_policies?specialist_id=eq.{}&plan_id=eq.{}&select=max_daily,min_lead_days",
            specialist_id, plan_id
        );
        let rows: Vec<PlanPolicy> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        // No policy row: no cap, no lead requirement.
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Best-effort alternative search for rejections a caller can act on.
    /// A failing search never masks the rejection itself.
    async fn alternatives(
        &self,
        specialist: &SpecialistScheduling,
        request: &BookingRequest,
        duration: i32,
        plan_ctx: Option<&PlanContext>,
        auth_token: &str,
    ) -> Vec<crate::models::SuggestedSlot> {
        let governed = plan_ctx.filter(|ctx| ctx.accepted);
        let query = SuggestionQuery {
            specialist_id: request.specialist_id,
            plan_id: governed.map(|ctx| ctx.plan_id),
            desired_date: request.date,
            desired_time: request.start_time,
            duration_minutes: duration,
            min_lead_days: governed.map(|ctx| ctx.policy.min_lead_days).unwrap_or(0),
            max_daily: governed.map(|ctx| ctx.policy.max_daily).unwrap_or(0),
            k: self.suggestion_k,
            horizon_days: self.suggestion_horizon_days,
        };

        match self.suggestions.suggest(specialist, &query, auth_token).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("suggestion search failed, returning none: {}", e);
                Vec::new()
            }
        }
    }
}
