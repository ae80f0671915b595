use crate::alert::{Alert, AlertKind, Severity};
use crate::train::{Direction, Train};

use super::DetectorConfig;

/// Splits an adjacent pair (`lower` has the smaller distance) into `(trailing, leading)`.
///
/// Eastbound pairs trail from the lower km, westbound pairs from the higher
/// km. For an opposing pair the faster train is trailing, since it closes
/// more of the gap; on equal speeds the eastbound train is.
fn orient<'a>(lower: &'a Train, upper: &'a Train) -> (&'a Train, &'a Train) {
    match (lower.direction, upper.direction) {
        (Direction::Eastbound, Direction::Eastbound) => (lower, upper),
        (Direction::Westbound, Direction::Westbound) => (upper, lower),
        _ => {
            let lower_first = if lower.speed == upper.speed {
                lower.direction == Direction::Eastbound
            } else {
                lower.speed > upper.speed
            };
            if lower_first {
                (lower, upper)
            } else {
                (upper, lower)
            }
        }
    }
}

/// Raises an alert for every adjacent pair (by distance) closer than the safe distance.
///
/// Pairs at exactly the same distance (gap 0) are not reported.
#[must_use]
pub fn check_rear_end<'a, I>(trains: I, config: &DetectorConfig) -> Vec<Alert>
where
    I: IntoIterator<Item = &'a Train>,
{
    let mut sorted: Vec<&Train> = trains.into_iter().collect();
    sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut alerts = Vec::new();
    for pair in sorted.windows(2) {
        let gap = pair[1].distance - pair[0].distance;
        if gap > 0.0 && gap < config.safe_distance_km {
            let (trailing, leading) = orient(pair[0], pair[1]);
            let severity = if gap < config.critical_distance_km {
                Severity::Critical
            } else {
                Severity::Major
            };
            alerts.push(Alert::new(
                severity,
                AlertKind::RearEnd {
                    leading: leading.id.clone(),
                    trailing: trailing.id.clone(),
                    gap_km: gap,
                },
                format!(
                    "Collision Risk: {} and {} are too close ({gap:.2}km)",
                    trailing.name, leading.name
                ),
            ));
        }
    }
    alerts
}
