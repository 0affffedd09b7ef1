use crate::db::SharedGateway;
use crate::domain::classification::{
    classification_band, ClassificationBand, SatisfactionLevel, Zone,
};
use crate::domain::models::{
    Company, Evaluation, EvaluationDraft, EvaluationFilters, NpsBreakdown, Score,
};
use crate::domain::nps::{self, DateWindow, ZoneShares};
use crate::error::AppError;
use crate::local_store::{keys, LocalStore};
use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Where a listing came from, so callers can show a non-blocking notice.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Remote,
    Local,
}

/// Display hints for a single score.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ScoreFeedback {
    pub zone: Zone,
    pub zone_label: &'static str,
    pub zone_color: &'static str,
    pub satisfaction: SatisfactionLevel,
    pub label: &'static str,
    pub color: &'static str,
}

impl ScoreFeedback {
    pub fn for_score(score: Score) -> Self {
        let satisfaction = SatisfactionLevel::for_score(score);
        let zone = satisfaction.zone();
        Self {
            zone,
            zone_label: zone.label(),
            zone_color: zone.color(),
            satisfaction,
            label: satisfaction.label(),
            color: satisfaction.color(),
        }
    }
}

/// A band plus how the dashboard renders it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BandBadge {
    pub band: ClassificationBand,
    pub label: &'static str,
    pub color: &'static str,
}

impl From<ClassificationBand> for BandBadge {
    fn from(band: ClassificationBand) -> Self {
        Self {
            band,
            label: band.label(),
            color: band.color(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub evaluation: Evaluation,
    pub feedback: ScoreFeedback,
    pub stored_locally: bool,
    pub today_count: u32,
}

#[derive(Debug, Serialize)]
pub struct EvaluationListing {
    pub evaluations: Vec<Evaluation>,
    pub source: DataSource,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TodayStats {
    pub total_today: u32,
    pub average_score_today: f64,
    pub source: DataSource,
}

#[derive(Debug, Serialize)]
pub struct CompanyNps {
    pub company: Company,
    #[serde(flatten)]
    pub breakdown: NpsBreakdown,
    pub band: BandBadge,
    pub average_score: f64,
}

#[derive(Debug, Serialize)]
pub struct NpsOverview {
    #[serde(flatten)]
    pub breakdown: NpsBreakdown,
    pub band: BandBadge,
    pub shares: ZoneShares,
    pub average_score: f64,
    pub source: DataSource,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClearReport {
    pub remote_deleted: u64,
    pub local_keys_removed: usize,
}

#[derive(Clone)]
pub struct EvaluationService {
    gateway: SharedGateway,
    store: LocalStore,
    timezone: String,
}

impl EvaluationService {
    pub fn new(gateway: SharedGateway, store: LocalStore, timezone: String) -> Self {
        Self {
            gateway,
            store,
            timezone,
        }
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Saves remotely, falling back to the local cache when the remote store is unreachable.
    pub async fn submit(&self, draft: EvaluationDraft) -> Result<SubmissionReceipt, AppError> {
        let draft = draft.validated()?;

        let (evaluation, stored_locally) = match self.gateway.create_evaluation(draft.clone()).await {
            Ok(evaluation) => (evaluation, false),
            Err(e) => {
                tracing::warn!("Remote create failed, saving evaluation locally: {:#}", e);
                let evaluation = draft.into_evaluation(Utc::now());
                self.store
                    .push_json(keys::CACHED_EVALUATIONS, evaluation.clone())
                    .await
                    .map_err(|e| AppError::Internal(e.into()))?;
                (evaluation, true)
            }
        };

        let today = time_utils::local_date(&self.timezone, evaluation.created_at);
        let today_count = match self.store.increment_day_count(today).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Failed to bump local day counter: {}", e);
                self.store.day_count(today).await
            }
        };

        tracing::info!(
            "Evaluation recorded: id={}, company={}, score={}, stored_locally={}",
            evaluation.id,
            evaluation.company_id,
            evaluation.score.value(),
            stored_locally
        );

        Ok(SubmissionReceipt {
            feedback: ScoreFeedback::for_score(evaluation.score),
            evaluation,
            stored_locally,
            today_count,
        })
    }

    pub async fn list(&self, filters: &EvaluationFilters) -> EvaluationListing {
        match self.gateway.list_evaluations(filters).await {
            Ok(evaluations) => EvaluationListing {
                evaluations,
                source: DataSource::Remote,
            },
            Err(e) => {
                tracing::warn!("Remote list failed, serving cached evaluations: {:#}", e);
                let cached = self.cached_evaluations().await;
                let mut evaluations: Vec<Evaluation> = nps::filter_evaluations(&cached, filters)
                    .into_iter()
                    .cloned()
                    .collect();
                evaluations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                EvaluationListing {
                    evaluations,
                    source: DataSource::Local,
                }
            }
        }
    }

    pub async fn companies(&self) -> Result<Vec<Company>, AppError> {
        Ok(self.gateway.list_companies().await?)
    }

    pub async fn today_stats(&self, now: DateTime<Utc>) -> TodayStats {
        let filters = EvaluationFilters {
            date_from: Some(time_utils::start_of_local_day(&self.timezone, now)),
            date_to: Some(now),
            ..Default::default()
        };
        match self.gateway.list_evaluations(&filters).await {
            Ok(evaluations) => TodayStats {
                total_today: evaluations.len() as u32,
                average_score_today: nps::average_score(&evaluations),
                source: DataSource::Remote,
            },
            Err(e) => {
                tracing::warn!("Remote today stats failed, using cached evaluations: {:#}", e);
                let cached = self.cached_evaluations().await;
                let todays = nps::filter_evaluations(&cached, &filters);
                TodayStats {
                    total_today: todays.len() as u32,
                    average_score_today: nps::average_score(todays),
                    source: DataSource::Local,
                }
            }
        }
    }

    pub async fn overview(
        &self,
        filters: EvaluationFilters,
        window: DateWindow,
        now: DateTime<Utc>,
    ) -> NpsOverview {
        let filters = window.apply(filters, now, &self.timezone);
        let listing = self.list(&filters).await;
        let breakdown = nps::compute_nps(&listing.evaluations);
        NpsOverview {
            band: classification_band(breakdown.nps_score).into(),
            shares: nps::zone_shares(&breakdown),
            average_score: nps::average_score(&listing.evaluations),
            breakdown,
            source: listing.source,
        }
    }

    /// Per-company breakdowns, best NPS first. Companies without answers score 0.
    pub async fn company_rankings(
        &self,
        window: DateWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompanyNps>, AppError> {
        let companies = self.companies().await?;
        let filters = window.apply(EvaluationFilters::default(), now, &self.timezone);
        let listing = self.list(&filters).await;

        let mut by_company: HashMap<Uuid, Vec<&Evaluation>> = HashMap::new();
        for evaluation in &listing.evaluations {
            by_company
                .entry(evaluation.company_id)
                .or_default()
                .push(evaluation);
        }

        let mut rankings: Vec<CompanyNps> = companies
            .into_iter()
            .map(|company| {
                let rows = by_company.remove(&company.id).unwrap_or_default();
                let breakdown = nps::compute_nps(rows.iter().copied());
                CompanyNps {
                    band: classification_band(breakdown.nps_score).into(),
                    average_score: nps::average_score(rows),
                    breakdown,
                    company,
                }
            })
            .collect();
        rankings.sort_by(|a, b| b.breakdown.nps_score.cmp(&a.breakdown.nps_score));
        Ok(rankings)
    }

    /// Irreversibly deletes every evaluation, remote first, then the local cache and
    /// counters. Local cleanup runs even when the remote delete fails; any failure on
    /// either side is returned as an error and nothing is retried.
    pub async fn clear_all(&self) -> Result<ClearReport, AppError> {
        let remote = self.gateway.clear_all_evaluations().await;
        let local = self.clear_local().await;

        match (remote, local) {
            (Ok(remote_deleted), Ok(local_keys_removed)) => {
                tracing::warn!(
                    "All evaluations cleared: {} remote rows, {} local keys",
                    remote_deleted,
                    local_keys_removed
                );
                Ok(ClearReport {
                    remote_deleted,
                    local_keys_removed,
                })
            }
            (Err(remote_err), Ok(_)) => Err(AppError::PartialFailure(format!(
                "local cache cleared but the remote store was not: {remote_err:#}"
            ))),
            (Ok(_), Err(local_err)) => Err(AppError::PartialFailure(format!(
                "remote store cleared but the local cache was not: {local_err}"
            ))),
            (Err(remote_err), Err(local_err)) => Err(AppError::Internal(anyhow::anyhow!(
                "clearing failed everywhere: remote: {remote_err:#}; local: {local_err}"
            ))),
        }
    }

    async fn clear_local(&self) -> Result<usize, crate::local_store::StoreError> {
        let had_cache = self.store.get(keys::CACHED_EVALUATIONS).await.is_some();
        self.store.remove(keys::CACHED_EVALUATIONS).await?;
        let counters = self.store.remove_prefix(keys::DAY_COUNTER_PREFIX).await?;
        Ok(counters + usize::from(had_cache))
    }

    pub async fn remember_company(&self, company_id: Uuid) -> Result<(), AppError> {
        self.store
            .set(keys::SELECTED_COMPANY, company_id.to_string())
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// The remembered company, if it still exists. A stale or garbled id is forgotten.
    pub async fn selected_company(&self, companies: &[Company]) -> Option<Company> {
        let raw = self.store.get(keys::SELECTED_COMPANY).await?;
        let found = Uuid::parse_str(raw.trim())
            .ok()
            .and_then(|id| companies.iter().find(|c| c.id == id).cloned());
        if found.is_none() {
            if let Err(e) = self.store.remove(keys::SELECTED_COMPANY).await {
                tracing::warn!("Failed to forget selected company: {}", e);
            }
        }
        found
    }

    async fn cached_evaluations(&self) -> Vec<Evaluation> {
        self.store
            .get_json(keys::CACHED_EVALUATIONS)
            .await
            .unwrap_or_default()
    }
}
