use crate::alert::{Alert, AlertKind, Severity};
use crate::block::Block;
use crate::train::Train;

use super::DetectorConfig;

/// Raises an alert when the train's commanded speed exceeds the block limit
/// scaled by `limit_factor`.
#[must_use]
pub fn check_overspeed(train: &Train, block: &Block, limit_factor: f64, config: &DetectorConfig) -> Option<Alert> {
    let limit = block.speed_limit * limit_factor;
    if train.speed <= limit {
        return None;
    }

    let excess = train.speed - limit;
    let severity = if excess > config.overspeed_major_excess_kmh {
        Severity::Major
    } else {
        Severity::Warning
    };

    Some(Alert::new(
        severity,
        AlertKind::Overspeed {
            train: train.id.clone(),
            block: Some(block.id.clone()),
            speed: train.speed,
            limit,
        },
        format!("Overspeed: {} at {:.0}km/h (Limit: {limit:.0})", train.name, train.speed),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;

    fn block(limit: f64) -> Block {
        Block::new(BlockId::new("B"), "S", 0.0, 10.0, limit).unwrap()
    }

    fn train(speed: f64) -> Train {
        Train::builder("1", "T1").speed(speed).distance(5.0).build().unwrap()
    }

    #[test]
    fn excess_above_threshold_is_major() {
        let alert = check_overspeed(&train(130.0), &block(100.0), 1.0, &DetectorConfig::default()).unwrap();
        assert_eq!(alert.severity, Severity::Major);
    }

    #[test]
    fn small_excess_is_warning() {
        let alert = check_overspeed(&train(110.0), &block(100.0), 1.0, &DetectorConfig::default()).unwrap();
        assert_eq!(alert.severity, Severity::Warning);
    }

    #[test]
    fn at_limit_is_fine() {
        assert!(check_overspeed(&train(100.0), &block(100.0), 1.0, &DetectorConfig::default()).is_none());
    }

    #[test]
    fn scaled_limit_is_reported() {
        let alert = check_overspeed(&train(80.0), &block(100.0), 0.5, &DetectorConfig::default()).unwrap();
        let AlertKind::Overspeed { limit, .. } = alert.kind else {
            panic!("expected overspeed");
        };
        assert_eq!(limit, 50.0);
        assert_eq!(alert.severity, Severity::Major);
    }
}
