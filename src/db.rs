use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AppointmentRecord, AppointmentStatus, ComplaintRecord, Period, PeriodWindow, Provider,
    ProviderActivity, QualityMetrics, QualityScore, ReviewRecord,
};
use crate::seed;
use crate::store::QualityStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_provider(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
    category: &str,
    owner_user_id: Uuid,
) -> anyhow::Result<Uuid> {
    let provider_id: Uuid = sqlx::query(
        r#"
        INSERT INTO quality_index.providers (id, name, email, category, owner_user_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE
        SET name = EXCLUDED.name, category = EXCLUDED.category
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(category)
    .bind(owner_user_id)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(provider_id)
}

async fn insert_appointment(
    pool: &PgPool,
    id: Uuid,
    provider_id: Uuid,
    status: AppointmentStatus,
    requested_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO quality_index.appointments
        (id, provider_id, status, requested_at, responded_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(provider_id)
    .bind(status.as_str())
    .bind(requested_at)
    .bind(responded_at)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let dataset = seed::demo_dataset(Utc::now())?;
    let mut provider_ids = HashMap::new();

    for provider in &dataset.providers {
        let stored_id = upsert_provider(
            pool,
            provider.id,
            &provider.name,
            &provider.email,
            &provider.category,
            provider.owner_user_id,
        )
        .await?;
        provider_ids.insert(provider.id, stored_id);
    }

    let resolve = |id: Uuid| provider_ids.get(&id).copied().unwrap_or(id);

    for (index, appointment) in dataset.appointments.iter().enumerate() {
        insert_appointment(
            pool,
            appointment.id,
            resolve(appointment.provider_id),
            appointment.status,
            appointment.requested_at,
            appointment.responded_at,
            &format!("seed-appointment-{index:03}"),
        )
        .await?;
    }

    for (index, review) in dataset.reviews.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO quality_index.reviews
            (id, provider_id, rating, is_visible, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(review.id)
        .bind(resolve(review.provider_id))
        .bind(review.rating)
        .bind(review.is_visible)
        .bind(review.created_at)
        .bind(format!("seed-review-{index:03}"))
        .execute(pool)
        .await?;
    }

    for (index, complaint) in dataset.complaints.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO quality_index.complaints
            (id, provider_id, appointment_id, reason, filed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(complaint.id)
        .bind(resolve(complaint.provider_id))
        .bind(complaint.appointment_id)
        .bind(&complaint.reason)
        .bind(complaint.filed_at)
        .bind(format!("seed-complaint-{index:03}"))
        .execute(pool)
        .await?;
    }

    info!(
        providers = dataset.providers.len(),
        appointments = dataset.appointments.len(),
        "Seed data applied"
    );
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        provider_email: String,
        provider_name: String,
        category: String,
        status: String,
        requested_at: DateTime<Utc>,
        responded_at: Option<DateTime<Utc>>,
        owner_user_id: Option<Uuid>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let status: AppointmentStatus = row
            .status
            .parse()
            .with_context(|| format!("invalid status on CSV row {}", line + 1))?;

        let provider_id = upsert_provider(
            pool,
            Uuid::new_v4(),
            &row.provider_name,
            &row.provider_email,
            &row.category,
            row.owner_user_id.unwrap_or_else(Uuid::new_v4),
        )
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_appointment(
            pool,
            Uuid::new_v4(),
            provider_id,
            status,
            row.requested_at,
            row.responded_at,
            &source_key,
        )
        .await?
        {
            inserted += 1;
        }
    }

    Ok(inserted)
}

const SCORE_COLUMNS: &str = "id, provider_id, sqi, review_rating, review_count, \
     appointment_completion_rate, total_appointments, completed_appointments, \
     response_speed, complaint_rate, complaint_count, period, period_start, period_end, \
     is_active, calculated_at";

fn score_from_row(row: &PgRow) -> anyhow::Result<QualityScore> {
    let period: String = row.try_get("period")?;
    let metrics = QualityMetrics {
        review_rating: row.try_get("review_rating")?,
        review_count: row.try_get("review_count")?,
        appointment_completion_rate: row.try_get("appointment_completion_rate")?,
        total_appointments: row.try_get("total_appointments")?,
        completed_appointments: row.try_get("completed_appointments")?,
        response_speed: row.try_get("response_speed")?,
        complaint_rate: row.try_get("complaint_rate")?,
        complaint_count: row.try_get("complaint_count")?,
    };

    Ok(QualityScore::restore(
        row.try_get("id")?,
        row.try_get("provider_id")?,
        row.try_get("sqi")?,
        metrics,
        period.parse()?,
        PeriodWindow {
            start: row.try_get("period_start")?,
            end: row.try_get("period_end")?,
        },
        row.try_get("is_active")?,
        row.try_get("calculated_at")?,
    ))
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn provider_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM quality_index.providers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

#[async_trait]
impl QualityStore for PgStore {
    async fn provider(&self, provider_id: Uuid) -> anyhow::Result<Option<Provider>> {
        let row = sqlx::query(
            "SELECT id, name, email, category, owner_user_id \
             FROM quality_index.providers WHERE id = $1",
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load provider")?;

        Ok(row.map(|row| Provider {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            category: row.get("category"),
            owner_user_id: row.get("owner_user_id"),
        }))
    }

    async fn activity(
        &self,
        provider_id: Uuid,
        window: &PeriodWindow,
    ) -> anyhow::Result<ProviderActivity> {
        let appointment_rows = sqlx::query(
            "SELECT id, provider_id, status, requested_at, responded_at \
             FROM quality_index.appointments \
             WHERE provider_id = $1 AND requested_at >= $2 AND requested_at < $3",
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .context("failed to load appointments")?;

        let mut appointments = Vec::with_capacity(appointment_rows.len());
        for row in appointment_rows {
            let status: String = row.get("status");
            appointments.push(AppointmentRecord {
                id: row.get("id"),
                provider_id: row.get("provider_id"),
                status: status.parse()?,
                requested_at: row.get("requested_at"),
                responded_at: row.get("responded_at"),
            });
        }

        let reviews = sqlx::query(
            "SELECT id, provider_id, rating, is_visible, created_at \
             FROM quality_index.reviews \
             WHERE provider_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .context("failed to load reviews")?
        .into_iter()
        .map(|row| ReviewRecord {
            id: row.get("id"),
            provider_id: row.get("provider_id"),
            rating: row.get("rating"),
            is_visible: row.get("is_visible"),
            created_at: row.get("created_at"),
        })
        .collect();

        let complaints = sqlx::query(
            "SELECT id, provider_id, appointment_id, reason, filed_at \
             FROM quality_index.complaints \
             WHERE provider_id = $1 AND filed_at >= $2 AND filed_at < $3",
        )
        .bind(provider_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .context("failed to load complaints")?
        .into_iter()
        .map(|row| ComplaintRecord {
            id: row.get("id"),
            provider_id: row.get("provider_id"),
            appointment_id: row.get("appointment_id"),
            reason: row.get("reason"),
            filed_at: row.get("filed_at"),
        })
        .collect();

        Ok(ProviderActivity {
            appointments,
            reviews,
            complaints,
        })
    }

    async fn active_score(
        &self,
        provider_id: Uuid,
        period: Period,
    ) -> anyhow::Result<Option<QualityScore>> {
        let query = format!(
            "SELECT {SCORE_COLUMNS} FROM quality_index.quality_scores \
             WHERE provider_id = $1 AND period = $2 AND is_active"
        );
        let row = sqlx::query(&query)
            .bind(provider_id)
            .bind(period.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("failed to load active score")?;

        row.as_ref().map(score_from_row).transpose()
    }

    async fn replace_active(&self, score: &QualityScore) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent recalculations of the same (provider, period).
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", score.provider_id, score.period))
            .execute(&mut *tx)
            .await?;

        let deactivated = sqlx::query(
            "UPDATE quality_index.quality_scores SET is_active = FALSE \
             WHERE provider_id = $1 AND period = $2 AND is_active",
        )
        .bind(score.provider_id)
        .bind(score.period.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let metrics = &score.metrics;
        sqlx::query(&format!(
            "INSERT INTO quality_index.quality_scores ({SCORE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, TRUE, $15)"
        ))
        .bind(score.id)
        .bind(score.provider_id)
        .bind(score.sqi())
        .bind(metrics.review_rating)
        .bind(metrics.review_count)
        .bind(metrics.appointment_completion_rate)
        .bind(metrics.total_appointments)
        .bind(metrics.completed_appointments)
        .bind(metrics.response_speed)
        .bind(metrics.complaint_rate)
        .bind(metrics.complaint_count)
        .bind(score.period.as_str())
        .bind(score.period_start)
        .bind(score.period_end)
        .bind(score.calculated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(provider_id = %score.provider_id, deactivated, "Replaced active score");
        Ok(deactivated)
    }

    async fn score_history(
        &self,
        provider_id: Uuid,
        period: Period,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<QualityScore>, i64)> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM quality_index.quality_scores \
             WHERE provider_id = $1 AND period = $2",
        )
        .bind(provider_id)
        .bind(period.as_str())
        .fetch_one(&self.pool)
        .await?
        .get("total");

        let query = format!(
            "SELECT {SCORE_COLUMNS} FROM quality_index.quality_scores \
             WHERE provider_id = $1 AND period = $2 \
             ORDER BY calculated_at DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&query)
            .bind(provider_id)
            .bind(period.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("failed to load score history")?;

        let scores = rows
            .iter()
            .map(score_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((scores, total))
    }

    async fn active_scores(&self, period: Period) -> anyhow::Result<Vec<QualityScore>> {
        let query = format!(
            "SELECT {SCORE_COLUMNS} FROM quality_index.quality_scores \
             WHERE period = $1 AND is_active"
        );
        let rows = sqlx::query(&query)
            .bind(period.as_str())
            .fetch_all(&self.pool)
            .await
            .context("failed to load active scores")?;

        rows.iter().map(score_from_row).collect()
    }
}
