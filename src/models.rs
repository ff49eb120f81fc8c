use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quality;

/// Aggregation window width for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period '{0}', expected one of daily, weekly, monthly, quarterly, yearly")]
pub struct ParsePeriodError(pub String);

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        }
    }

    /// Window of this width that closes at `end` (exclusive).
    pub fn window_ending(&self, end: DateTime<Utc>) -> PeriodWindow {
        let start = match self {
            Period::Daily => end - Duration::days(1),
            Period::Weekly => end - Duration::days(7),
            Period::Monthly => sub_months(end, 1),
            Period::Quarterly => sub_months(end, 3),
            Period::Yearly => sub_months(end, 12),
        };

        PeriodWindow { start, end }
    }

    /// Parses an optional period parameter, falling back to monthly when absent or blank.
    pub fn parse_or_default(value: Option<&str>) -> Result<Period, ParsePeriodError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Period::default()),
            Some(raw) => raw.parse(),
        }
    }
}

fn sub_months(end: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    end.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "quarterly" => Ok(Period::Quarterly),
            "yearly" => Ok(Period::Yearly),
            _ => Err(ParsePeriodError(value.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub category: String,
    pub owner_user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "rejected" => Ok(AppointmentStatus::Rejected),
            "no_show" | "no-show" => Ok(AppointmentStatus::NoShow),
            other => anyhow::bail!("unknown appointment status '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub status: AppointmentStatus,
    pub requested_at: DateTime<Utc>,
    /// When the provider confirmed or rejected the request.
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub rating: i32,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ComplaintRecord {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub reason: String,
    pub filed_at: DateTime<Utc>,
}

/// Raw activity a score is derived from.
#[derive(Debug, Clone, Default)]
pub struct ProviderActivity {
    pub appointments: Vec<AppointmentRecord>,
    pub reviews: Vec<ReviewRecord>,
    pub complaints: Vec<ComplaintRecord>,
}

/// The four component metrics plus the counts behind them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub review_rating: f64,
    pub review_count: i64,
    pub appointment_completion_rate: f64,
    pub total_appointments: i64,
    pub completed_appointments: i64,
    pub response_speed: f64,
    pub complaint_rate: f64,
    pub complaint_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Average,
    Poor,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Average => "average",
            QualityTier::Poor => "poor",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted quality score. `sqi` and `classification` are always derived
/// from `metrics`; there is no way to set them directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScore {
    pub id: Uuid,
    pub provider_id: Uuid,
    sqi: f64,
    classification: QualityTier,
    #[serde(flatten)]
    pub metrics: QualityMetrics,
    pub period: Period,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub is_active: bool,
    pub calculated_at: DateTime<Utc>,
}

impl QualityScore {
    /// Builds a fresh, active score for `provider_id` over `window`.
    pub fn calculate(
        provider_id: Uuid,
        period: Period,
        window: PeriodWindow,
        metrics: QualityMetrics,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        let sqi = quality::composite_sqi(&metrics);
        Self {
            id: Uuid::new_v4(),
            provider_id,
            sqi,
            classification: quality::classify(sqi),
            metrics,
            period,
            period_start: window.start,
            period_end: window.end,
            is_active: true,
            calculated_at,
        }
    }

    /// Rehydrates a stored score. The stored `sqi` is kept so historical
    /// records survive later weight changes.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        provider_id: Uuid,
        sqi: f64,
        metrics: QualityMetrics,
        period: Period,
        window: PeriodWindow,
        is_active: bool,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            provider_id,
            sqi,
            classification: quality::classify(sqi),
            metrics,
            period,
            period_start: window.start,
            period_end: window.end,
            is_active,
            calculated_at,
        }
    }

    pub fn sqi(&self) -> f64 {
        self.sqi
    }

    pub fn classification(&self) -> QualityTier {
        self.classification
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationCategory {
    ReviewRating,
    AppointmentCompletionRate,
    ResponseSpeed,
    ComplaintRate,
    OverallQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: RecommendationPriority,
    pub title: &'static str,
    pub current: f64,
    pub target: f64,
    pub actions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TierDistribution {
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub poor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmarks {
    pub period: Period,
    pub provider_count: usize,
    pub average_sqi: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub average_review_rating: Option<f64>,
    pub average_completion_rate: Option<f64>,
    pub average_response_speed: Option<f64>,
    pub average_complaint_rate: Option<f64>,
    pub tiers: TierDistribution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<Period>().unwrap(), Period::Weekly);
        assert_eq!(" yearly ".parse::<Period>().unwrap(), Period::Yearly);
        assert!("fortnightly".parse::<Period>().is_err());
    }

    #[test]
    fn missing_period_defaults_to_monthly() {
        assert_eq!(Period::parse_or_default(None).unwrap(), Period::Monthly);
        assert_eq!(Period::parse_or_default(Some("  ")).unwrap(), Period::Monthly);
        assert_eq!(
            Period::parse_or_default(Some("quarterly")).unwrap(),
            Period::Quarterly
        );
    }

    #[test]
    fn windows_use_calendar_months() {
        let end = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();

        let monthly = Period::Monthly.window_ending(end);
        assert_eq!(monthly.start, Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap());

        let quarterly = Period::Quarterly.window_ending(end);
        assert_eq!(quarterly.start, Utc.with_ymd_and_hms(2025, 12, 31, 12, 0, 0).unwrap());

        let weekly = Period::Weekly.window_ending(end);
        assert_eq!(weekly.start, Utc.with_ymd_and_hms(2026, 3, 24, 12, 0, 0).unwrap());
    }

    #[test]
    fn window_is_half_open() {
        let end = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let window = Period::Daily.window_ending(end);
        assert!(window.contains(window.start));
        assert!(!window.contains(end));
    }

    #[test]
    fn status_accepts_common_spellings() {
        assert_eq!(
            "canceled".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::Cancelled
        );
        assert_eq!(
            "no-show".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::NoShow
        );
        assert!("archived".parse::<AppointmentStatus>().is_err());
    }
}
