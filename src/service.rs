use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Benchmarks, Period, Provider, QualityScore, Recommendation};
use crate::quality;
use crate::store::QualityStore;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

pub async fn require_provider(
    store: &dyn QualityStore,
    provider_id: Uuid,
) -> Result<Provider, AppError> {
    store
        .provider(provider_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Provider not found".into()))
}

pub async fn calculate_and_save(
    store: &dyn QualityStore,
    provider_id: Uuid,
    period: Period,
    now: DateTime<Utc>,
) -> Result<QualityScore, AppError> {
    let provider = require_provider(store, provider_id).await?;
    calculate_for(store, &provider, period, now).await
}

/// Recomputes the provider's score for the window ending at `now` and makes it
/// the active record for (provider, period).
pub async fn calculate_for(
    store: &dyn QualityStore,
    provider: &Provider,
    period: Period,
    now: DateTime<Utc>,
) -> Result<QualityScore, AppError> {
    let provider_id = provider.id;
    let window = period.window_ending(now);
    let activity = store.activity(provider_id, &window).await?;
    debug!(
        %provider_id,
        %period,
        appointments = activity.appointments.len(),
        reviews = activity.reviews.len(),
        complaints = activity.complaints.len(),
        "Aggregating provider activity"
    );

    let metrics = quality::compute_metrics(&activity, &window);
    let score = QualityScore::calculate(provider_id, period, window, metrics, now);
    let superseded = store.replace_active(&score).await?;

    info!(
        %provider_id,
        %period,
        sqi = score.sqi(),
        classification = %score.classification(),
        superseded,
        "Saved quality score"
    );

    Ok(score)
}

pub async fn current_score(
    store: &dyn QualityStore,
    provider_id: Uuid,
    period: Period,
) -> Result<QualityScore, AppError> {
    store
        .active_score(provider_id, period)
        .await?
        .ok_or_else(|| AppError::NotFound("No quality score found for this provider".into()))
}

pub async fn recommendations_for(
    store: &dyn QualityStore,
    provider_id: Uuid,
    period: Period,
) -> Result<(QualityScore, Vec<Recommendation>), AppError> {
    let score = current_score(store, provider_id, period).await?;
    let items = quality::recommendations(&score);
    Ok((score, items))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page < 1 {
            return Err(AppError::invalid("page", "page must be at least 1"));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::invalid(
                "limit",
                format!("limit must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }
        // offset() must stay representable
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::invalid("page", "page is out of range"));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

pub async fn score_history(
    store: &dyn QualityStore,
    provider_id: Uuid,
    period: Period,
    page: Page,
) -> Result<(Vec<QualityScore>, i64), AppError> {
    let history = store
        .score_history(provider_id, period, page.limit, page.offset())
        .await?;
    Ok(history)
}

pub async fn top_providers(
    store: &dyn QualityStore,
    period: Period,
    limit: usize,
) -> Result<Vec<QualityScore>, AppError> {
    let mut scores = store.active_scores(period).await?;
    scores.sort_by(|a, b| {
        b.sqi()
            .partial_cmp(&a.sqi())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores.truncate(limit);
    Ok(scores)
}

pub async fn benchmarks_for(
    store: &dyn QualityStore,
    period: Period,
) -> Result<Benchmarks, AppError> {
    let scores = store.active_scores(period).await?;
    Ok(quality::benchmarks(period, &scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AppointmentRecord, AppointmentStatus, ProviderActivity, QualityTier, ReviewRecord,
    };
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn store_with_provider() -> (MemoryStore, Uuid) {
        let store = MemoryStore::default();
        let provider_id = Uuid::new_v4();
        store
            .insert_provider(Provider {
                id: provider_id,
                name: "Dr. Mira Okafor".to_string(),
                email: "mira.okafor@okaforpediatrics.com".to_string(),
                category: "doctor".to_string(),
                owner_user_id: Uuid::new_v4(),
            })
            .unwrap();
        (store, provider_id)
    }

    fn completed_visit(provider_id: Uuid, hours_ago: i64) -> AppointmentRecord {
        let requested_at = now() - Duration::hours(hours_ago);
        AppointmentRecord {
            id: Uuid::new_v4(),
            provider_id,
            status: AppointmentStatus::Completed,
            requested_at,
            responded_at: Some(requested_at + Duration::hours(1)),
        }
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let store = MemoryStore::default();
        let result = calculate_and_save(&store, Uuid::new_v4(), Period::Monthly, now()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn provider_without_history_gets_a_defaulted_score() {
        let (store, provider_id) = store_with_provider();
        let score = calculate_and_save(&store, provider_id, Period::Monthly, now())
            .await
            .unwrap();

        assert_eq!(score.metrics.total_appointments, 0);
        assert_eq!(score.metrics.appointment_completion_rate, 0.0);
        assert_eq!(score.metrics.complaint_rate, 0.0);
        assert!(score.is_active);
        assert!(matches!(
            score.classification(),
            QualityTier::Poor | QualityTier::Average
        ));
    }

    #[tokio::test]
    async fn recalculation_supersedes_the_previous_active_score() {
        let (store, provider_id) = store_with_provider();

        let first = calculate_and_save(&store, provider_id, Period::Weekly, now())
            .await
            .unwrap();

        store
            .insert_activity(ProviderActivity {
                appointments: vec![completed_visit(provider_id, 5), completed_visit(provider_id, 30)],
                reviews: vec![ReviewRecord {
                    id: Uuid::new_v4(),
                    provider_id,
                    rating: 5,
                    is_visible: true,
                    created_at: now() - Duration::hours(2),
                }],
                complaints: Vec::new(),
            })
            .unwrap();

        let later = now() + Duration::minutes(5);
        let second = calculate_and_save(&store, provider_id, Period::Weekly, later)
            .await
            .unwrap();
        assert!(second.sqi() > first.sqi());

        let current = current_score(&store, provider_id, Period::Weekly).await.unwrap();
        assert_eq!(current.id, second.id);

        let (history, total) = score_history(&store, provider_id, Period::Weekly, Page::new(None, None).unwrap())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(history.iter().filter(|s| s.is_active).count(), 1);
        assert_eq!(history[1].id, first.id);
        assert!(!history[1].is_active);
    }

    #[tokio::test]
    async fn recommendations_need_an_active_score() {
        let (store, provider_id) = store_with_provider();
        let missing = recommendations_for(&store, provider_id, Period::Monthly).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        calculate_and_save(&store, provider_id, Period::Monthly, now())
            .await
            .unwrap();
        let (score, items) = recommendations_for(&store, provider_id, Period::Monthly)
            .await
            .unwrap();
        assert_eq!(items, quality::recommendations(&score));
        assert!(!items.is_empty());
    }

    #[tokio::test]
    async fn top_providers_are_ordered_by_sqi() {
        let dataset = crate::seed::demo_dataset(now()).unwrap();
        let ids: Vec<Uuid> = dataset.providers.iter().map(|p| p.id).collect();
        let store = MemoryStore::from_dataset(dataset);

        for id in &ids {
            calculate_and_save(&store, *id, Period::Monthly, now())
                .await
                .unwrap();
        }

        let top = top_providers(&store, Period::Monthly, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert!(top[0].sqi() >= top[1].sqi());
        assert_eq!(top[0].provider_id, ids[0]);

        let summary = benchmarks_for(&store, Period::Monthly).await.unwrap();
        assert_eq!(summary.provider_count, 3);
    }

    #[test]
    fn page_validation() {
        assert_eq!(Page::new(None, None).unwrap(), Page { page: 1, limit: 10 });
        assert_eq!(Page::new(Some(3), Some(20)).unwrap().offset(), 40);
        assert!(matches!(Page::new(Some(0), None), Err(AppError::Validation(_))));
        assert!(matches!(Page::new(None, Some(500)), Err(AppError::Validation(_))));
    }

    #[test]
    fn page_beyond_offset_range_is_rejected() {
        assert!(matches!(
            Page::new(Some(i64::MAX), Some(MAX_PAGE_LIMIT)),
            Err(AppError::Validation(_))
        ));
        let last = i64::MAX / MAX_PAGE_LIMIT + 1;
        let page = Page::new(Some(last), Some(MAX_PAGE_LIMIT)).unwrap();
        assert_eq!(page.offset(), (last - 1) * MAX_PAGE_LIMIT);
        assert!(matches!(
            Page::new(Some(last + 1), Some(MAX_PAGE_LIMIT)),
            Err(AppError::Validation(_))
        ));
    }
}
