use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use futures::StreamExt;
use tracing::debug;
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{
    minutes_of, SchedulingError, SpecialistScheduling, SuggestedSlot, TimeInterval,
};
use crate::services::availability::resolve_windows;
use crate::services::occupancy::OccupancyService;
use crate::services::slots::SlotIter;

/// Stop collecting once the scored pool grows past this size; the horizon
/// bound alone can produce far more candidates than any caller needs.
const CANDIDATE_POOL_LIMIT: usize = 50;

/// Per-day reads are pure and independent; evaluate a few days at a time.
const DAY_CONCURRENCY: usize = 4;

/// Ranking policy for alternative slots. Kept behind a trait so the heuristic
/// can be swapped without touching the search loop.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, candidate: NaiveTime, desired: NaiveTime, day_offset: i64) -> i64;
}

/// Default ranking: distance in minutes from the desired clock time, plus a
/// mild penalty of 5 points per day away from the desired date.
pub struct ClockProximity;

impl ScoringStrategy for ClockProximity {
    fn score(&self, candidate: NaiveTime, desired: NaiveTime, day_offset: i64) -> i64 {
        let clock_distance = (minutes_of(candidate) - minutes_of(desired)).abs() as i64;
        clock_distance + 5 * day_offset
    }
}

#[derive(Debug, Clone)]
pub struct SuggestionQuery {
    pub specialist_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub desired_date: NaiveDate,
    pub desired_time: NaiveTime,
    pub duration_minutes: i32,
    pub min_lead_days: i64,
    pub max_daily: i32,
    pub k: usize,
    pub horizon_days: i64,
}

type Candidate = (i64, NaiveDate, NaiveTime);

/// Searches forward across a bounded horizon of days for the best-ranked
/// alternative slots that would pass admission.
pub struct SuggestionService {
    occupancy: OccupancyService,
    scoring: Arc<dyn ScoringStrategy>,
}

impl SuggestionService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self::with_scoring(db, Arc::new(ClockProximity))
    }

    pub fn with_scoring(db: Arc<PostgrestClient>, scoring: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            occupancy: OccupancyService::new(db),
            scoring,
        }
    }

    /// Returns at most `k` suggestions, deduplicated and sorted by ascending
    /// score. An exhausted horizon yields an empty list, not an error.
    pub async fn suggest(
        &self,
        specialist: &SpecialistScheduling,
        query: &SuggestionQuery,
        auth_token: &str,
    ) -> Result<Vec<SuggestedSlot>, SchedulingError> {
        let today = Utc::now().date_naive();
        let mut scored: Vec<Candidate> = Vec::new();

        let mut days = futures::stream::iter(
            (0..=query.horizon_days.max(0))
                .map(|delta| self.day_candidates(specialist, query, delta, today, auth_token)),
        )
        .buffered(DAY_CONCURRENCY);

        // Consume in day order so output does not depend on completion order.
        while let Some(day_result) = days.next().await {
            scored.extend(day_result?);
            if scored.len() > CANDIDATE_POOL_LIMIT {
                break;
            }
        }
        drop(days);
        scored.sort_by_key(|(score, date, time)| (*score, *date, *time));

        let mut seen: HashSet<(NaiveDate, NaiveTime)> = HashSet::new();
        let suggestions: Vec<SuggestedSlot> = scored
            .into_iter()
            .filter(|(_, date, time)| seen.insert((*date, *time)))
            .take(query.k)
            .map(|(_, date, time)| SuggestedSlot { date, time })
            .collect();

        debug!(
            "suggestion search for specialist {} produced {} slot(s)",
            query.specialist_id,
            suggestions.len()
        );
        Ok(suggestions)
    }

    async fn day_candidates(
        &self,
        specialist: &SpecialistScheduling,
        query: &SuggestionQuery,
        day_offset: i64,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Candidate>, SchedulingError> {
        let day = query.desired_date + Duration::days(day_offset);

        if day.signed_duration_since(today).num_days() < query.min_lead_days {
            return Ok(Vec::new());
        }

        // A saturated plan quota rules the whole day out.
        if let Some(plan_id) = query.plan_id {
            if query.max_daily > 0 {
                let count = self
                    .occupancy
                    .plan_count(query.specialist_id, plan_id, day, auth_token)
                    .await?;
                if count >= query.max_daily as i64 {
                    return Ok(Vec::new());
                }
            }
        }

        let windows = resolve_windows(specialist.working_hours.as_ref(), day);
        let busy: Vec<TimeInterval> = self
            .occupancy
            .specialist_day(query.specialist_id, day, auth_token)
            .await?
            .iter()
            .map(|apt| apt.interval())
            .collect();

        let mut hits = Vec::new();
        for start in SlotIter::new(&windows, query.duration_minutes) {
            let slot = TimeInterval::starting_at(start, query.duration_minutes);
            if busy.iter().any(|taken| taken.overlaps(&slot)) {
                continue;
            }
            let score = self.scoring.score(start, query.desired_time, day_offset);
            hits.push((score, day, start));
        }
        Ok(hits)
    }
}
