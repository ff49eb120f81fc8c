use crate::models::{
    AppointmentStatus, Benchmarks, Period, PeriodWindow, ProviderActivity, QualityMetrics,
    QualityScore, QualityTier, Recommendation, RecommendationCategory, RecommendationPriority,
    TierDistribution,
};

// Composite weights. They sum to 1.0 so a perfect provider scores 100.
pub const WEIGHT_REVIEW_RATING: f64 = 0.35;
pub const WEIGHT_COMPLETION_RATE: f64 = 0.30;
pub const WEIGHT_RESPONSE_SPEED: f64 = 0.15;
pub const WEIGHT_COMPLAINT_RATE: f64 = 0.20;

pub const MAX_REVIEW_RATING: f64 = 5.0;
/// Response times at or beyond this many hours earn no response credit.
pub const RESPONSE_SPEED_CEILING_HOURS: f64 = 48.0;
/// Used when no appointment in the window has been answered yet.
pub const DEFAULT_RESPONSE_SPEED_HOURS: f64 = 24.0;

pub const EXCELLENT_MIN_SQI: f64 = 90.0;
pub const GOOD_MIN_SQI: f64 = 70.0;
pub const AVERAGE_MIN_SQI: f64 = 50.0;

// Recommendation thresholds.
pub const TARGET_REVIEW_RATING: f64 = 4.0;
pub const TARGET_COMPLETION_RATE: f64 = 85.0;
pub const TARGET_RESPONSE_SPEED_HOURS: f64 = 4.0;
pub const TARGET_COMPLAINT_RATE: f64 = 5.0;
pub const TARGET_SQI: f64 = 70.0;

/// Aggregates the activity that falls inside `window` into component metrics.
pub fn compute_metrics(activity: &ProviderActivity, window: &PeriodWindow) -> QualityMetrics {
    let ratings: Vec<f64> = activity
        .reviews
        .iter()
        .filter(|review| review.is_visible && window.contains(review.created_at))
        .map(|review| review.rating as f64)
        .collect();
    let review_rating = mean(&ratings).unwrap_or(0.0);

    let appointments: Vec<_> = activity
        .appointments
        .iter()
        .filter(|appointment| window.contains(appointment.requested_at))
        .collect();
    let total_appointments = appointments.len() as i64;
    let completed_appointments = appointments
        .iter()
        .filter(|appointment| appointment.status == AppointmentStatus::Completed)
        .count() as i64;

    let response_hours: Vec<f64> = appointments
        .iter()
        .filter_map(|appointment| {
            let responded_at = appointment.responded_at?;
            let elapsed = responded_at - appointment.requested_at;
            Some((elapsed.num_seconds().max(0) as f64) / 3600.0)
        })
        .collect();
    let response_speed = mean(&response_hours).unwrap_or(DEFAULT_RESPONSE_SPEED_HOURS);

    let complaint_count = activity
        .complaints
        .iter()
        .filter(|complaint| window.contains(complaint.filed_at))
        .count() as i64;

    QualityMetrics {
        review_rating,
        review_count: ratings.len() as i64,
        appointment_completion_rate: percentage(completed_appointments, total_appointments),
        total_appointments,
        completed_appointments,
        response_speed,
        complaint_rate: percentage(complaint_count, total_appointments).min(100.0),
        complaint_count,
    }
}

fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Weighted blend of the four components, clamped to `[0, 100]`.
pub fn composite_sqi(metrics: &QualityMetrics) -> f64 {
    let rating = (metrics.review_rating / MAX_REVIEW_RATING * 100.0).clamp(0.0, 100.0);
    let completion = metrics.appointment_completion_rate.clamp(0.0, 100.0);
    let response = response_component(metrics.response_speed);
    let complaints = 100.0 - metrics.complaint_rate.clamp(0.0, 100.0);

    let blended = rating * WEIGHT_REVIEW_RATING
        + completion * WEIGHT_COMPLETION_RATE
        + response * WEIGHT_RESPONSE_SPEED
        + complaints * WEIGHT_COMPLAINT_RATE;

    if blended.is_nan() {
        return 0.0;
    }
    blended.clamp(0.0, 100.0)
}

fn response_component(hours: f64) -> f64 {
    let capped = hours.clamp(0.0, RESPONSE_SPEED_CEILING_HOURS);
    100.0 * (1.0 - capped / RESPONSE_SPEED_CEILING_HOURS)
}

/// Maps an SQI onto its display tier. Non-finite input lands in `Poor`.
pub fn classify(sqi: f64) -> QualityTier {
    if sqi >= EXCELLENT_MIN_SQI {
        QualityTier::Excellent
    } else if sqi >= GOOD_MIN_SQI {
        QualityTier::Good
    } else if sqi >= AVERAGE_MIN_SQI {
        QualityTier::Average
    } else {
        QualityTier::Poor
    }
}

const REVIEW_ACTIONS: &[&str] = &[
    "Follow up with customers after each completed appointment",
    "Respond publicly and constructively to critical reviews",
    "Ask satisfied customers to leave a review",
];

const COMPLETION_ACTIONS: &[&str] = &[
    "Send appointment reminders 24 hours in advance",
    "Keep availability calendars up to date to avoid cancellations",
    "Offer rescheduling instead of cancelling",
];

const RESPONSE_ACTIONS: &[&str] = &[
    "Enable notifications for new booking requests",
    "Set aside fixed times each day to answer requests",
    "Use auto-confirmation for routine appointment types",
];

const COMPLAINT_ACTIONS: &[&str] = &[
    "Review recent complaints for recurring causes",
    "Clarify service descriptions and pricing up front",
    "Contact complaining customers to resolve issues directly",
];

const OVERALL_ACTIONS: &[&str] = &[
    "Address the high priority recommendations first",
    "Track the quality index weekly until it recovers",
];

/// Improvement actions for every metric that misses its threshold, in fixed category order.
pub fn recommendations(score: &QualityScore) -> Vec<Recommendation> {
    let metrics = &score.metrics;
    let mut items = Vec::new();

    if metrics.review_rating < TARGET_REVIEW_RATING {
        items.push(Recommendation {
            category: RecommendationCategory::ReviewRating,
            priority: RecommendationPriority::High,
            title: "Improve customer review rating",
            current: metrics.review_rating,
            target: TARGET_REVIEW_RATING,
            actions: REVIEW_ACTIONS,
        });
    }

    if metrics.appointment_completion_rate < TARGET_COMPLETION_RATE {
        items.push(Recommendation {
            category: RecommendationCategory::AppointmentCompletionRate,
            priority: RecommendationPriority::High,
            title: "Increase appointment completion rate",
            current: metrics.appointment_completion_rate,
            target: TARGET_COMPLETION_RATE,
            actions: COMPLETION_ACTIONS,
        });
    }

    if metrics.response_speed > TARGET_RESPONSE_SPEED_HOURS {
        items.push(Recommendation {
            category: RecommendationCategory::ResponseSpeed,
            priority: RecommendationPriority::Medium,
            title: "Respond to booking requests faster",
            current: metrics.response_speed,
            target: TARGET_RESPONSE_SPEED_HOURS,
            actions: RESPONSE_ACTIONS,
        });
    }

    if metrics.complaint_rate > TARGET_COMPLAINT_RATE {
        items.push(Recommendation {
            category: RecommendationCategory::ComplaintRate,
            priority: RecommendationPriority::High,
            title: "Reduce complaint rate",
            current: metrics.complaint_rate,
            target: TARGET_COMPLAINT_RATE,
            actions: COMPLAINT_ACTIONS,
        });
    }

    if score.sqi() < TARGET_SQI {
        items.push(Recommendation {
            category: RecommendationCategory::OverallQuality,
            priority: RecommendationPriority::Medium,
            title: "Raise the overall quality index",
            current: score.sqi(),
            target: TARGET_SQI,
            actions: OVERALL_ACTIONS,
        });
    }

    items
}

/// Cross-provider statistics over the active scores of one period.
pub fn benchmarks(period: Period, scores: &[QualityScore]) -> Benchmarks {
    let mut sqis: Vec<f64> = scores.iter().map(QualityScore::sqi).collect();
    sqis.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut tiers = TierDistribution::default();
    for score in scores {
        match score.classification() {
            QualityTier::Excellent => tiers.excellent += 1,
            QualityTier::Good => tiers.good += 1,
            QualityTier::Average => tiers.average += 1,
            QualityTier::Poor => tiers.poor += 1,
        }
    }

    let component = |pick: fn(&QualityMetrics) -> f64| -> Option<f64> {
        let values: Vec<f64> = scores.iter().map(|score| pick(&score.metrics)).collect();
        mean(&values)
    };

    Benchmarks {
        period,
        provider_count: scores.len(),
        average_sqi: mean(&sqis),
        p25: percentile(&sqis, 0.25),
        median: percentile(&sqis, 0.5),
        p75: percentile(&sqis, 0.75),
        p90: percentile(&sqis, 0.9),
        average_review_rating: component(|m| m.review_rating),
        average_completion_rate: component(|m| m.appointment_completion_rate),
        average_response_speed: component(|m| m.response_speed),
        average_complaint_rate: component(|m| m.complaint_rate),
        tiers,
    }
}

/// Continuous percentile of an ascending slice, interpolating between closest ranks.
pub fn percentile(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
