use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    AppointmentRecord, ComplaintRecord, Period, PeriodWindow, Provider, ProviderActivity,
    QualityScore, ReviewRecord,
};
use crate::seed::DemoDataset;

/// Backed by `db::PgStore` in production and by `MemoryStore` for
/// `serve --memory` and tests.
#[async_trait]
pub trait QualityStore: Send + Sync {
    async fn provider(&self, provider_id: Uuid) -> anyhow::Result<Option<Provider>>;

    /// Appointments, reviews and complaints for a provider inside `window`.
    async fn activity(
        &self,
        provider_id: Uuid,
        window: &PeriodWindow,
    ) -> anyhow::Result<ProviderActivity>;

    async fn active_score(
        &self,
        provider_id: Uuid,
        period: Period,
    ) -> anyhow::Result<Option<QualityScore>>;

    /// Deactivates the current active score for the same (provider, period)
    /// and stores `score` as the new active one. Returns how many records were
    /// deactivated.
    async fn replace_active(&self, score: &QualityScore) -> anyhow::Result<u64>;

    /// Newest first. Returns the page plus the total number of records.
    async fn score_history(
        &self,
        provider_id: Uuid,
        period: Period,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<QualityScore>, i64)>;

    async fn active_scores(&self, period: Period) -> anyhow::Result<Vec<QualityScore>>;
}

#[derive(Default)]
struct MemoryState {
    providers: Vec<Provider>,
    appointments: Vec<AppointmentRecord>,
    reviews: Vec<ReviewRecord>,
    complaints: Vec<ComplaintRecord>,
    scores: Vec<QualityScore>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn from_dataset(dataset: DemoDataset) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                providers: dataset.providers,
                appointments: dataset.appointments,
                reviews: dataset.reviews,
                complaints: dataset.complaints,
                scores: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn insert_provider(&self, provider: Provider) -> anyhow::Result<()> {
        self.lock()?.providers.push(provider);
        Ok(())
    }

    pub fn insert_activity(&self, activity: ProviderActivity) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        state.appointments.extend(activity.appointments);
        state.reviews.extend(activity.reviews);
        state.complaints.extend(activity.complaints);
        Ok(())
    }
}

#[async_trait]
impl QualityStore for MemoryStore {
    async fn provider(&self, provider_id: Uuid) -> anyhow::Result<Option<Provider>> {
        let state = self.lock()?;
        Ok(state
            .providers
            .iter()
            .find(|provider| provider.id == provider_id)
            .cloned())
    }

    async fn activity(
        &self,
        provider_id: Uuid,
        window: &PeriodWindow,
    ) -> anyhow::Result<ProviderActivity> {
        let state = self.lock()?;
        Ok(ProviderActivity {
            appointments: state
                .appointments
                .iter()
                .filter(|a| a.provider_id == provider_id && window.contains(a.requested_at))
                .cloned()
                .collect(),
            reviews: state
                .reviews
                .iter()
                .filter(|r| r.provider_id == provider_id && window.contains(r.created_at))
                .cloned()
                .collect(),
            complaints: state
                .complaints
                .iter()
                .filter(|c| c.provider_id == provider_id && window.contains(c.filed_at))
                .cloned()
                .collect(),
        })
    }

    async fn active_score(
        &self,
        provider_id: Uuid,
        period: Period,
    ) -> anyhow::Result<Option<QualityScore>> {
        let state = self.lock()?;
        Ok(state
            .scores
            .iter()
            .find(|s| s.provider_id == provider_id && s.period == period && s.is_active)
            .cloned())
    }

    async fn replace_active(&self, score: &QualityScore) -> anyhow::Result<u64> {
        let mut state = self.lock()?;
        let mut deactivated = 0;
        for existing in state.scores.iter_mut() {
            if existing.provider_id == score.provider_id
                && existing.period == score.period
                && existing.is_active
            {
                existing.is_active = false;
                deactivated += 1;
            }
        }

        let mut stored = score.clone();
        stored.is_active = true;
        state.scores.push(stored);
        Ok(deactivated)
    }

    async fn score_history(
        &self,
        provider_id: Uuid,
        period: Period,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<QualityScore>, i64)> {
        let state = self.lock()?;
        let mut matching: Vec<QualityScore> = state
            .scores
            .iter()
            .filter(|s| s.provider_id == provider_id && s.period == period)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn active_scores(&self, period: Period) -> anyhow::Result<Vec<QualityScore>> {
        let state = self.lock()?;
        Ok(state
            .scores
            .iter()
            .filter(|s| s.period == period && s.is_active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QualityMetrics;
    use chrono::{Duration, Utc};

    fn empty_metrics() -> QualityMetrics {
        QualityMetrics {
            review_rating: 0.0,
            review_count: 0,
            appointment_completion_rate: 0.0,
            total_appointments: 0,
            completed_appointments: 0,
            response_speed: 24.0,
            complaint_rate: 0.0,
            complaint_count: 0,
        }
    }

    fn score(provider_id: Uuid, period: Period, minutes_ago: i64) -> QualityScore {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        QualityScore::calculate(
            provider_id,
            period,
            period.window_ending(at),
            empty_metrics(),
            at,
        )
    }

    fn active_count(scores: &[QualityScore]) -> usize {
        scores.iter().filter(|s| s.is_active).count()
    }

    #[tokio::test]
    async fn replacing_deactivates_only_the_matching_period() {
        let store = MemoryStore::default();
        let provider_id = Uuid::new_v4();

        assert_eq!(store.replace_active(&score(provider_id, Period::Monthly, 30)).await.unwrap(), 0);
        assert_eq!(store.replace_active(&score(provider_id, Period::Weekly, 20)).await.unwrap(), 0);
        assert_eq!(store.replace_active(&score(provider_id, Period::Monthly, 10)).await.unwrap(), 1);

        let (monthly, total) = store
            .score_history(provider_id, Period::Monthly, 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(active_count(&monthly), 1);
        assert!(monthly[0].is_active);
        assert!(!monthly[1].is_active);

        let weekly = store.active_score(provider_id, Period::Weekly).await.unwrap();
        assert!(weekly.is_some());
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let store = MemoryStore::default();
        let provider_id = Uuid::new_v4();
        for minutes_ago in [50, 40, 30, 20, 10] {
            store
                .replace_active(&score(provider_id, Period::Daily, minutes_ago))
                .await
                .unwrap();
        }

        let (page, total) = store
            .score_history(provider_id, Period::Daily, 2, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert!(page[0].calculated_at > page[1].calculated_at);
    }

    #[tokio::test]
    async fn activity_is_scoped_to_provider_and_window() {
        let dataset = crate::seed::demo_dataset(Utc::now()).unwrap();
        let provider_id = dataset.providers[0].id;
        let store = MemoryStore::from_dataset(dataset);

        let window = Period::Yearly.window_ending(Utc::now() + Duration::seconds(1));
        let activity = store.activity(provider_id, &window).await.unwrap();
        assert!(!activity.appointments.is_empty());
        assert!(activity
            .appointments
            .iter()
            .all(|a| a.provider_id == provider_id));

        let unknown = store.activity(Uuid::new_v4(), &window).await.unwrap();
        assert!(unknown.appointments.is_empty());
    }
}
