//! Suggestion generation.
//!
//! A pure mapping from the current alert set and train states to advisory
//! operator actions. Suggestions are recomputed every tick and never applied
//! automatically.

use crate::alert::{Alert, AlertKind, Severity};
use crate::suggestion::{Action, RankedAction, Suggestion};
use crate::train::{Train, TrainStatus};

/// Delayed trains running slower than this qualify for a priority pass (km/h).
pub const PRIORITY_PASS_MAX_SPEED: f64 = 40.0;

fn ranked(items: &[(Action, f64)]) -> Vec<RankedAction> {
    items
        .iter()
        .map(|&(action, score)| RankedAction { action, score })
        .collect()
}

/// Maps a single alert to a suggestion.
#[must_use]
pub fn suggest_for_alert(alert: &Alert) -> Suggestion {
    let suggestion = match &alert.kind {
        AlertKind::RearEnd { trailing, gap_km, .. } => {
            if alert.severity == Severity::Critical {
                Suggestion::new(
                    trailing.clone(),
                    Action::EmergencyStop,
                    format!("Immediate collision risk: only {gap_km:.2}km to the train ahead"),
                    0.99,
                )
                .with_effect("Trailing train halts before closing the gap")
                .with_candidates(ranked(&[
                    (Action::EmergencyStop, 0.99),
                    (Action::HoldAtSignal, 0.6),
                    (Action::ReduceSpeed, 0.3),
                ]))
            } else {
                Suggestion::new(
                    trailing.clone(),
                    Action::ReduceSpeed,
                    format!("Headway below safe distance ({gap_km:.2}km)"),
                    0.9,
                )
                .with_effect("Gap to the train ahead stops shrinking")
                .with_candidates(ranked(&[
                    (Action::ReduceSpeed, 0.9),
                    (Action::HoldAtSignal, 0.7),
                    (Action::RerouteToLoop, 0.4),
                ]))
            }
        }
        AlertKind::Overspeed { train, speed, limit, .. } => {
            if alert.severity >= Severity::Major {
                Suggestion::new(
                    train.clone(),
                    Action::ApplyBrakes,
                    format!("Running at {speed:.0}km/h against a {limit:.0}km/h limit"),
                    0.98,
                )
                .with_effect(format!("Speed brought back under {limit:.0}km/h"))
                .with_candidates(ranked(&[(Action::ApplyBrakes, 0.98), (Action::ReduceSpeed, 0.8)]))
            } else {
                Suggestion::new(train.clone(), Action::ReduceSpeed, "Speed exceeds block limit", 0.95)
                    .with_effect(format!("Speed brought back under {limit:.0}km/h"))
                    .with_candidates(ranked(&[(Action::ReduceSpeed, 0.95), (Action::ApplyBrakes, 0.6)]))
            }
        }
        AlertKind::PredictedConflict { first, probability, .. } => {
            let pct = probability * 100.0;
            if alert.severity == Severity::Critical {
                Suggestion::new(
                    first.clone(),
                    Action::RerouteToLoop,
                    format!("High predicted conflict probability ({pct:.0}%)"),
                    0.85,
                )
                .with_effect("Train clears the main line via the loop")
                .with_candidates(ranked(&[
                    (Action::RerouteToLoop, 0.85),
                    (Action::HoldAtSignal, 0.7),
                    (Action::ReduceSpeed, 0.5),
                ]))
            } else {
                Suggestion::new(
                    first.clone(),
                    Action::HoldAtSignal,
                    format!("Elevated predicted conflict probability ({pct:.0}%)"),
                    0.7,
                )
                .with_effect("Headway restored before the next block")
                .with_candidates(ranked(&[
                    (Action::HoldAtSignal, 0.7),
                    (Action::ReduceSpeed, 0.6),
                    (Action::RerouteToLoop, 0.5),
                ]))
            }
        }
    };
    suggestion.for_alert(alert.id)
}

/// Builds the full suggestion set for one tick.
///
/// Every alert yields one suggestion; independently, each delayed train
/// crawling below [`PRIORITY_PASS_MAX_SPEED`] yields a priority pass.
#[must_use]
pub fn generate_suggestions<'a, I>(trains: I, alerts: &[Alert]) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a Train>,
{
    let mut suggestions: Vec<Suggestion> = alerts.iter().map(suggest_for_alert).collect();

    for train in trains {
        if train.status == TrainStatus::Delayed && train.speed > 0.0 && train.speed < PRIORITY_PASS_MAX_SPEED {
            suggestions.push(
                Suggestion::new(
                    train.id.clone(),
                    Action::PriorityPass,
                    format!("Train {} is significantly delayed", train.name),
                    0.75,
                )
                .with_effect("Delay recovered by clearing the path ahead"),
            );
        }
    }

    suggestions
}
