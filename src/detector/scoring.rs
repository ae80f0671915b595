use tracing::warn;

use crate::alert::{Alert, AlertKind, Severity};
use crate::error::ScoringError;
use crate::train::Train;

use super::DetectorConfig;

/// Average speed assumed when both trains of a pair are standing (km/h).
const MIN_AVERAGE_SPEED_KMH: f64 = 1.0;

/// External conflict-probability model.
///
/// Implementations are typically thin clients to an ML service and may fail;
/// a failure only suppresses the alert for the pair being scored.
pub trait RiskScorer: Send + Sync {
    /// Probability in `[0, 1]` that the pair described by the features conflicts.
    fn score_conflict(&self, track_id: u32, time_gap_minutes: f64, opposite_direction: bool) -> Result<f64, ScoringError>;
}

impl<F> RiskScorer for F
where
    F: Fn(u32, f64, bool) -> Result<f64, ScoringError> + Send + Sync,
{
    fn score_conflict(&self, track_id: u32, time_gap_minutes: f64, opposite_direction: bool) -> Result<f64, ScoringError> {
        self(track_id, time_gap_minutes, opposite_direction)
    }
}

/// Features derived for one adjacent pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictFeatures {
    pub track_id: u32,
    /// Estimated closing time gap: `gap / average_speed`, in minutes.
    pub time_gap_minutes: f64,
    pub opposite_direction: bool,
}

impl ConflictFeatures {
    /// Derives features for a trailing/leading pair.
    #[must_use]
    pub fn between(trailing: &Train, leading: &Train, track_id: u32) -> Self {
        let gap = leading.distance - trailing.distance;
        let mut average_speed = (trailing.speed + leading.speed) / 2.0;
        if !(average_speed >= MIN_AVERAGE_SPEED_KMH) {
            average_speed = MIN_AVERAGE_SPEED_KMH;
        }
        Self {
            track_id,
            time_gap_minutes: gap / average_speed * 60.0,
            opposite_direction: trailing.direction != leading.direction,
        }
    }
}

/// Scores every adjacent pair (by distance) and raises alerts above the configured probabilities.
///
/// Scorer failures and out-of-range probabilities are logged and skipped.
#[must_use]
pub fn check_predicted_conflicts<'a, I>(trains: I, scorer: &dyn RiskScorer, config: &DetectorConfig) -> Vec<Alert>
where
    I: IntoIterator<Item = &'a Train>,
{
    let mut sorted: Vec<&Train> = trains.into_iter().collect();
    sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut alerts = Vec::new();
    for pair in sorted.windows(2) {
        let (trailing, leading) = (pair[0], pair[1]);
        let features = ConflictFeatures::between(trailing, leading, config.track_id);

        let probability = match scorer.score_conflict(
            features.track_id,
            features.time_gap_minutes,
            features.opposite_direction,
        ) {
            Ok(p) if (0.0..=1.0).contains(&p) => p,
            Ok(p) => {
                warn!(trailing = %trailing.id, leading = %leading.id, error = %ScoringError::InvalidProbability { value: p }, "risk scoring rejected");
                continue;
            }
            Err(err) => {
                warn!(trailing = %trailing.id, leading = %leading.id, error = %err, "risk scoring failed");
                continue;
            }
        };

        if probability <= config.conflict_major_probability {
            continue;
        }
        let severity = if probability > config.conflict_critical_probability {
            Severity::Critical
        } else {
            Severity::Major
        };

        alerts.push(Alert::new(
            severity,
            AlertKind::PredictedConflict {
                first: trailing.id.clone(),
                second: leading.id.clone(),
                probability,
            },
            format!(
                "Predicted conflict: {:.0}% probability between {} and {}",
                probability * 100.0,
                trailing.name,
                leading.name
            ),
        ));
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::train::Direction;

    fn at(id: &str, distance: f64, speed: f64) -> Train {
        Train::builder(id, id).distance(distance).speed(speed).build().unwrap()
    }

    fn fixed(p: f64) -> impl Fn(u32, f64, bool) -> Result<f64, ScoringError> {
        move |_, _, _| Ok(p)
    }

    #[test]
    fn probability_thresholds_map_to_severity() {
        let trains = [at("A", 0.0, 60.0), at("B", 20.0, 60.0)];
        let cfg = DetectorConfig::default();

        assert!(check_predicted_conflicts(&trains, &fixed(0.5), &cfg).is_empty());
        assert!(check_predicted_conflicts(&trains, &fixed(0.6), &cfg).is_empty());

        let major = check_predicted_conflicts(&trains, &fixed(0.7), &cfg);
        assert_eq!(major.len(), 1);
        assert_eq!(major[0].severity, Severity::Major);

        let critical = check_predicted_conflicts(&trains, &fixed(0.95), &cfg);
        assert_eq!(critical[0].severity, Severity::Critical);
    }

    #[test]
    fn failing_pair_does_not_abort_other_pairs() {
        let trains = [at("A", 0.0, 60.0), at("B", 10.0, 60.0), at("C", 30.0, 60.0)];
        let calls = AtomicUsize::new(0);
        let scorer = |_: u32, _: f64, _: bool| -> Result<f64, ScoringError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ScoringError::Backend { message: "boom".to_string() })
            } else {
                Ok(0.9)
            }
        };

        let alerts = check_predicted_conflicts(&trains, &scorer, &DetectorConfig::default());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn out_of_range_probability_is_ignored() {
        let trains = [at("A", 0.0, 60.0), at("B", 1.0, 60.0)];
        assert!(check_predicted_conflicts(&trains, &fixed(1.5), &DetectorConfig::default()).is_empty());
        assert!(check_predicted_conflicts(&trains, &fixed(f64::NAN), &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn features_guard_against_standing_trains() {
        let a = at("A", 0.0, 0.0);
        let b = at("B", 3.0, 0.0);
        let f = ConflictFeatures::between(&a, &b, 1);
        assert!(f.time_gap_minutes.is_finite());
        assert_eq!(f.time_gap_minutes, 180.0);
        assert!(!f.opposite_direction);

        let mut c = at("C", 6.0, 60.0);
        c.direction = Direction::Westbound;
        let f = ConflictFeatures::between(&b, &c, 1);
        assert!(f.opposite_direction);
        assert!((f.time_gap_minutes - 6.0).abs() < 1e-9);
    }
}
