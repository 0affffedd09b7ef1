//! Net Promoter Score arithmetic.
//!
//! Everything here is synchronous and pure: callers filter first with
//! [`filter_evaluations`], then aggregate with [`compute_nps`].

use crate::domain::classification::{classify_score, Zone};
use crate::domain::models::{Evaluation, EvaluationFilters, NpsBreakdown};
use crate::time_utils;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Partitions the input into promoters, passives and detractors and derives the score.
///
/// An empty input yields an all-zero breakdown.
pub fn compute_nps<I>(evaluations: I) -> NpsBreakdown
where
    I: IntoIterator,
    I::Item: Borrow<Evaluation>,
{
    let mut breakdown = NpsBreakdown::default();
    for evaluation in evaluations {
        match classify_score(evaluation.borrow().score) {
            Zone::Promoter => breakdown.promoters += 1,
            Zone::Passive => breakdown.passives += 1,
            Zone::Detractor => breakdown.detractors += 1,
        }
        breakdown.total_evaluations += 1;
    }

    if breakdown.total_evaluations > 0 {
        breakdown.nps_score = rounded_percentage(
            breakdown.promoters as i64 - breakdown.detractors as i64,
            breakdown.total_evaluations as i64,
        );
    }
    breakdown
}

/// `round(numerator / denominator * 100)`, ties rounded away from zero.
///
/// Integer arithmetic keeps ties exact (e.g. 1/8 is 12.5 and rounds to 13, -1/8 to -13).
pub fn rounded_percentage(numerator: i64, denominator: i64) -> i32 {
    if denominator <= 0 {
        return 0;
    }
    let scaled = numerator * 100;
    let magnitude = (2 * scaled.abs() + denominator) / (2 * denominator);
    (scaled.signum() * magnitude) as i32
}

/// Returns the evaluations matching every provided filter, in input order.
pub fn filter_evaluations<'a>(
    evaluations: &'a [Evaluation],
    filters: &EvaluationFilters,
) -> Vec<&'a Evaluation> {
    evaluations
        .iter()
        .filter(|evaluation| matches_filters(evaluation, filters))
        .collect()
}

pub fn matches_filters(evaluation: &Evaluation, filters: &EvaluationFilters) -> bool {
    let score = evaluation.score.value();

    filters.company_id.map_or(true, |id| evaluation.company_id == id)
        && filters.date_from.map_or(true, |from| evaluation.created_at >= from)
        && filters.date_to.map_or(true, |to| evaluation.created_at <= to)
        && filters.min_score.map_or(true, |min| score >= min)
        && filters.max_score.map_or(true, |max| score <= max)
        && filters.gender.map_or(true, |gender| evaluation.gender == gender)
        && filters.age_from.map_or(true, |from| evaluation.age >= from)
        && filters.age_to.map_or(true, |to| evaluation.age <= to)
}

/// Rounded share of each zone, for the stacked bars on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneShares {
    pub promoters_pct: i32,
    pub passives_pct: i32,
    pub detractors_pct: i32,
}

pub fn zone_shares(breakdown: &NpsBreakdown) -> ZoneShares {
    let total = breakdown.total_evaluations as i64;
    ZoneShares {
        promoters_pct: rounded_percentage(breakdown.promoters as i64, total),
        passives_pct: rounded_percentage(breakdown.passives as i64, total),
        detractors_pct: rounded_percentage(breakdown.detractors as i64, total),
    }
}

/// Mean score rounded to one decimal place; `0.0` for an empty input.
pub fn average_score<I>(evaluations: I) -> f64
where
    I: IntoIterator,
    I::Item: Borrow<Evaluation>,
{
    let (sum, count) = evaluations
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), e| {
            (sum + e.borrow().score.value() as i64, count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    let tenths = (2 * sum * 10 + count) / (2 * count);
    tenths as f64 / 10.0
}

/// Period presets offered by the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateWindow {
    /// Narrows `filters` to this window. "Today" starts at local midnight in `timezone`.
    pub fn apply(
        self,
        mut filters: EvaluationFilters,
        now: DateTime<Utc>,
        timezone: &str,
    ) -> EvaluationFilters {
        let from = match self {
            DateWindow::All => return filters,
            DateWindow::Today => time_utils::start_of_local_day(timezone, now),
            DateWindow::Week => now - Duration::days(7),
            DateWindow::Month => now - Duration::days(30),
        };
        filters.date_from = Some(filters.date_from.map_or(from, |existing| existing.max(from)));
        filters
    }
}
