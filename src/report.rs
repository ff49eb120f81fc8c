use std::fmt::Write;

use crate::models::{Provider, QualityScore, RecommendationPriority};
use crate::quality;

/// Markdown quality report for one provider. `history` is newest first and
/// includes `score` itself.
pub fn build_report(provider: &Provider, score: &QualityScore, history: &[QualityScore]) -> String {
    let metrics = &score.metrics;
    let mut output = String::new();

    let _ = writeln!(output, "# Service Quality Report: {}", provider.name);
    let _ = writeln!(
        output,
        "Generated for {} ({}) over the {} window {} to {}",
        provider.email,
        provider.category,
        score.period,
        score.period_start.format("%Y-%m-%d %H:%M"),
        score.period_end.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "**SQI {:.1} ({})**",
        score.sqi(),
        score.classification()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Components");
    let _ = writeln!(output, "| Metric | Value | Basis |");
    let _ = writeln!(output, "| --- | --- | --- |");
    let _ = writeln!(
        output,
        "| Review rating | {:.2} / 5 | {} visible reviews |",
        metrics.review_rating, metrics.review_count
    );
    let _ = writeln!(
        output,
        "| Completion rate | {:.1}% | {} of {} appointments |",
        metrics.appointment_completion_rate,
        metrics.completed_appointments,
        metrics.total_appointments
    );
    let _ = writeln!(
        output,
        "| Response speed | {:.1} h | average time to confirm or reject |",
        metrics.response_speed
    );
    let _ = writeln!(
        output,
        "| Complaint rate | {:.1}% | {} complaints |",
        metrics.complaint_rate, metrics.complaint_count
    );

    let recommendations = quality::recommendations(score);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");

    if recommendations.is_empty() {
        let _ = writeln!(output, "All metrics meet their targets.");
    } else {
        for item in &recommendations {
            let priority = match item.priority {
                RecommendationPriority::High => "high",
                RecommendationPriority::Medium => "medium",
            };
            let _ = writeln!(
                output,
                "- [{}] {} (current {:.1}, target {:.1})",
                priority, item.title, item.current, item.target
            );
            for action in item.actions {
                let _ = writeln!(output, "  - {action}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Scores");

    if history.is_empty() {
        let _ = writeln!(output, "No earlier scores recorded for this period.");
    } else {
        for (index, entry) in history.iter().take(5).enumerate() {
            let change = history
                .get(index + 1)
                .map(|previous| format!(" ({:+.1})", entry.sqi() - previous.sqi()))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {}: {:.1} {}{}",
                entry.calculated_at.format("%Y-%m-%d %H:%M"),
                entry.sqi(),
                entry.classification(),
                change
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Period, QualityMetrics};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn provider() -> Provider {
        Provider {
            id: Uuid::new_v4(),
            name: "Northside Dental".to_string(),
            email: "hello@northsidedental.com".to_string(),
            category: "dentist".to_string(),
            owner_user_id: Uuid::new_v4(),
        }
    }

    fn score(provider_id: Uuid, completion: f64, days_ago: i64) -> QualityScore {
        let at = Utc.with_ymd_and_hms(2026, 4, 30, 8, 0, 0).unwrap() - Duration::days(days_ago);
        QualityScore::calculate(
            provider_id,
            Period::Monthly,
            Period::Monthly.window_ending(at),
            QualityMetrics {
                review_rating: 3.0,
                review_count: 4,
                appointment_completion_rate: completion,
                total_appointments: 12,
                completed_appointments: 6,
                response_speed: 18.0,
                complaint_rate: 25.0,
                complaint_count: 3,
            },
            at,
        )
    }

    #[test]
    fn report_lists_components_recommendations_and_trend() {
        let provider = provider();
        let latest = score(provider.id, 50.0, 0);
        let previous = score(provider.id, 40.0, 7);
        let report = build_report(&provider, &latest, &[latest.clone(), previous]);

        assert!(report.starts_with("# Service Quality Report: Northside Dental"));
        assert!(report.contains("| Completion rate | 50.0% | 6 of 12 appointments |"));
        assert!(report.contains("[high] Improve customer review rating"));
        assert!(report.contains("[medium] Respond to booking requests faster"));
        assert!(report.contains("(+3.0)"));
    }

    #[test]
    fn report_without_history_says_so() {
        let provider = provider();
        let latest = score(provider.id, 50.0, 0);
        let report = build_report(&provider, &latest, &[]);
        assert!(report.contains("No earlier scores recorded for this period."));
    }
}
