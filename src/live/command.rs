use crate::train::TrainId;
use crate::weather::WeatherCondition;

/// External mutation queued for the next tick.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    SetWeather(WeatherCondition),
    InjectDelay { train: TrainId, minutes: f64 },
}
