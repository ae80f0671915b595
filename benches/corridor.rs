use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use corridor::detector::check_rear_end;
use corridor::{
    ConflictDetector, DetectorConfig, Direction, Route, ScenarioConfig, ScenarioModifier, Train, WeatherCondition,
    WhatIfEngine,
};

fn fleet(count: u32) -> Vec<Train> {
    // Alternate directions and pack trains 1.5 km apart so most pairs are close.
    (0..count)
        .map(|i| {
            let direction = if i % 2 == 0 { Direction::Eastbound } else { Direction::Westbound };
            Train::builder(format!("T{i:03}"), format!("Bench {i}"))
                .distance(f64::from(i) * 1.5)
                .speed(60.0 + f64::from(i % 5) * 10.0)
                .direction(direction)
                .build()
                .unwrap()
        })
        .collect()
}

fn bench_rear_end_detection(c: &mut Criterion) {
    let trains = fleet(50);
    let config = DetectorConfig::default();

    let mut group = c.benchmark_group("corridor");
    group.throughput(Throughput::Elements(trains.len() as u64));
    group.bench_function("rear_end_50_trains", |b| {
        b.iter(|| check_rear_end(&trains, &config));
    });
    group.bench_function("detector_pass_50_trains", |b| {
        let detector = ConflictDetector::default();
        let blocks = Route::sc_kzj().station_blocks();
        let refs: Vec<&Train> = trains.iter().collect();
        b.iter(|| detector.detect(&refs, &blocks, WeatherCondition::Rain.live_factor()));
    });
    group.finish();
}

fn bench_what_if_hour(c: &mut Criterion) {
    let trains = fleet(12);
    let blocks = Route::sc_kzj().station_blocks();
    let scenario = ScenarioConfig::new(
        "bench",
        ScenarioModifier::builder()
            .delay("T001", 10.0)
            .maintenance("BLK-GT-BN")
            .weather(WeatherCondition::Fog)
            .build(),
    );

    c.bench_function("corridor/what_if_60_min", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let mut engine = WhatIfEngine::new(&trains, &blocks);
                engine.apply_scenario(&scenario);
                let _ = engine.run(60).unwrap();
            }
            start.elapsed()
        });
    });
}

criterion_group!(benches, bench_rear_end_detection, bench_what_if_hour);
criterion_main!(benches);
