use super::super::super::pairing::domain::{PerformanceMetrics, Session, SessionStatus};
use super::config::ScoringConfig;
use super::{MetricComponent, PerformanceMetric};

/// Raw counts accumulated from completed sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct SessionTally {
    pub completed: u32,
    pub attendance_recorded: u32,
    pub attended: u32,
    pub graded: u32,
    pub assignment_total: f64,
    pub examined: u32,
    pub exam_total: f64,
    pub rated: u32,
    pub rating_total: f64,
}

fn percent_sample(value: Option<f64>) -> Option<f64> {
    value
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 100.0))
}

pub(crate) fn tally_sessions(sessions: &[Session]) -> SessionTally {
    let mut tally = SessionTally::default();

    for session in sessions
        .iter()
        .filter(|session| session.status == SessionStatus::Completed)
    {
        tally.completed += 1;

        if let Some(attended) = session.student_attended {
            tally.attendance_recorded += 1;
            if attended {
                tally.attended += 1;
            }
        }

        if let Some(score) = percent_sample(session.assignment_score) {
            tally.graded += 1;
            tally.assignment_total += score;
        }

        if let Some(score) = percent_sample(session.exam_score) {
            tally.examined += 1;
            tally.exam_total += score;
        }

        if let Some(rating) = session.student_rating.filter(|rating| (1..=5).contains(rating)) {
            tally.rated += 1;
            tally.rating_total += f64::from(rating);
        }
    }

    tally
}

fn mean(total: f64, samples: u32) -> Option<f64> {
    (samples > 0).then(|| total / f64::from(samples))
}

pub(crate) fn score_tally(
    tally: &SessionTally,
    config: &ScoringConfig,
) -> (PerformanceMetrics, Vec<MetricComponent>, f64) {
    let attendance_pct =
        mean(f64::from(tally.attended), tally.attendance_recorded).map(|ratio| ratio * 100.0);
    let assignments_pct = mean(tally.assignment_total, tally.graded);
    let exams_pct = mean(tally.exam_total, tally.examined);
    let reviews_pct = mean(tally.rating_total, tally.rated).map(|rating| rating / 5.0 * 100.0);

    let has_minimum_data = tally.completed >= config.min_completed_sessions
        && tally.graded >= config.min_graded_assignments;

    let weights = &config.weights;
    let inputs = [
        (
            PerformanceMetric::Attendance,
            attendance_pct,
            weights.attendance,
            tally.attendance_recorded,
        ),
        (
            PerformanceMetric::Assignments,
            assignments_pct,
            weights.assignments,
            tally.graded,
        ),
        (
            PerformanceMetric::Exams,
            exams_pct,
            weights.exams,
            tally.examined,
        ),
        (
            PerformanceMetric::Reviews,
            reviews_pct,
            weights.reviews,
            tally.rated,
        ),
    ];

    let mut components = Vec::new();
    let mut weighted_total = 0.0;
    let mut weight_total = 0.0;

    for (metric, value, weight, samples) in inputs {
        // Metrics without samples drop out and the remaining weights renormalize.
        let Some(value) = value else {
            continue;
        };
        components.push(MetricComponent {
            metric,
            value,
            weight,
            samples,
            notes: format!("{} {:.1}% over {} sample(s)", metric.label(), value, samples),
        });
        if weight > 0.0 {
            weighted_total += value * weight;
            weight_total += weight;
        }
    }

    let score = if weight_total > 0.0 {
        (weighted_total / weight_total).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let metrics = PerformanceMetrics {
        attendance_pct,
        assignments_pct,
        exams_pct,
        reviews_pct,
        completed_sessions: tally.completed,
        graded_assignments: tally.graded,
        has_minimum_data,
    };

    (metrics, components, score)
}
