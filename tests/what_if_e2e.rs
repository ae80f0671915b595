use corridor::{
    AlertCategory, BlockId, Direction, LiveConfig, LiveEngine, Route, ScenarioConfig, ScenarioModifier, Train,
    TrainId, TrainStatus, WeatherCondition, WhatIfConfig, WhatIfEngine,
};

fn train(id: &str, distance: f64, speed: f64) -> Train {
    Train::builder(id, id).distance(distance).speed(speed).build().unwrap()
}

#[test]
fn what_if_never_touches_the_live_state() {
    let engine = LiveEngine::builder().config(LiveConfig::default()).build().unwrap();
    engine.tick_once().unwrap();
    let before = engine.snapshot().unwrap();

    let mut sandbox = WhatIfEngine::new(&before.trains, &before.blocks);
    sandbox.apply_scenario(&ScenarioConfig::new(
        "closure",
        ScenarioModifier::builder()
            .maintenance("BLK-SC-MJF")
            .maintenance("BLK-MJF-CHZ")
            .delay("12723", 30.0)
            .weather(WeatherCondition::Storm)
            .build(),
    ));
    let result = sandbox.run(120).unwrap();
    assert_eq!(result.scenario_name, "closure");

    let after = engine.snapshot().unwrap();
    assert_eq!(after.trains, before.trains);
    assert_eq!(after.blocks, before.blocks);
    assert!(after.blocks.iter().all(|b| b.speed_limit > 0.0));
}

#[test]
fn red_signal_holds_a_train_close_behind_another() {
    let trains = [train("LEAD", 11.5, 60.0), train("FOLLOW", 10.0, 80.0)];
    let mut sandbox = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks());

    sandbox.step();

    assert_eq!(sandbox.target_speed(&TrainId::new("FOLLOW")), Some(0.0));
    assert_eq!(sandbox.train(&TrainId::new("FOLLOW")).unwrap().distance, 10.0);
    assert_eq!(sandbox.target_speed(&TrainId::new("LEAD")), Some(60.0));
}

#[test]
fn yellow_signal_caps_speed() {
    let trains = [train("LEAD", 14.0, 60.0), train("FOLLOW", 10.0, 80.0)];
    let mut sandbox = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks());
    sandbox.step();

    let cap = WhatIfConfig::default().yellow_speed_kmh;
    assert_eq!(sandbox.target_speed(&TrainId::new("FOLLOW")), Some(cap));
}

#[test]
fn confined_train_fills_only_its_block() {
    let trains = [train("PARKED", 7.0, 0.0)];
    let sandbox = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks());
    let result = sandbox.run(30).unwrap();

    let parked_block = BlockId::new("BLK-MJF-CHZ");
    assert!((result.utilization(&parked_block) - 100.0).abs() < 1e-9);
    for (id, utilization) in &result.block_utilization {
        if id != &parked_block {
            assert_eq!(*utilization, 0.0, "{id} should be empty");
        }
    }
    assert!((result.max_delays[&TrainId::new("PARKED")] - 30.0).abs() < 1e-6);
}

#[test]
fn maintenance_block_stops_traffic_unless_rerouted() {
    let trains = [train("MAIN", 6.0, 80.0), train("LOOP", 6.0, 80.0)];
    let mut sandbox = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks());
    sandbox.apply_scenario(&ScenarioConfig::new(
        "closed",
        ScenarioModifier::builder().maintenance("BLK-MJF-CHZ").reroute("LOOP").build(),
    ));

    sandbox.step();

    assert_eq!(sandbox.target_speed(&TrainId::new("MAIN")), Some(0.0));
    assert_eq!(sandbox.target_speed(&TrainId::new("LOOP")), Some(80.0));
    assert!(sandbox.train(&TrainId::new("LOOP")).unwrap().distance > 6.0);
}

#[test]
fn close_pair_predicts_a_rear_end_conflict_once_per_window() {
    let trains = [train("LEAD", 30.0, 0.0), train("FOLLOW", 29.0, 80.0)];
    let sandbox = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks());
    let result = sandbox.run(4).unwrap();

    let rear_end: Vec<_> = result
        .predicted_conflicts
        .iter()
        .filter(|a| a.kind.category() == AlertCategory::RearEnd)
        .collect();
    assert_eq!(rear_end.len(), 1);
    assert_eq!(result.metrics.conflict_count, result.predicted_conflicts.len());
}

#[test]
fn eastbound_train_halts_at_the_terminus() {
    let trains = [train("LAST", 136.5, 100.0)];
    let sandbox = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks());
    let result = sandbox.run(10).unwrap();

    let last = result.train(&TrainId::new("LAST")).unwrap();
    assert_eq!(last.distance, 137.0);
    assert_eq!(last.status, TrainStatus::Stopped);
    assert_eq!(last.speed, 0.0);
    assert_eq!(result.metrics.trains_arrived, 1);
}

#[test]
fn westbound_train_halts_at_the_origin() {
    let up = Train::builder("UP", "Up")
        .distance(0.5)
        .speed(100.0)
        .direction(Direction::Westbound)
        .build()
        .unwrap();
    let result = WhatIfEngine::new([&up], &Route::sc_kzj().station_blocks()).run(10).unwrap();
    let up = result.train(&TrainId::new("UP")).unwrap();
    assert_eq!(up.distance, 0.0);
    assert_eq!(up.status, TrainStatus::Stopped);
}

#[test]
fn result_serializes_for_the_api() {
    let trains = [train("A", 10.0, 80.0)];
    let result = WhatIfEngine::new(&trains, &Route::sc_kzj().station_blocks()).run(10).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["block_utilization"].is_object());
    assert_eq!(json["metrics"]["duration_simulated_min"], 10);
    assert!(json["etas"]["A"].is_string());
}

#[test]
fn zero_speed_scenario_leaves_live_speeds_alone() {
    let engine = LiveEngine::builder().build().unwrap();
    let live = engine.snapshot().unwrap();

    let mut modifier = ScenarioModifier::builder();
    for block in &live.blocks {
        modifier = modifier.speed_limit(block.id.clone(), 0.0);
    }
    let mut sandbox = WhatIfEngine::new(&live.trains, &live.blocks);
    sandbox.apply_scenario(&ScenarioConfig::new("standstill", modifier.build()));
    let result = sandbox.run(10).unwrap();
    assert!(result.final_trains.iter().all(|t| t.speed == 0.0));

    let speeds: Vec<f64> = engine.trains().unwrap().iter().map(|t| t.speed).collect();
    assert_eq!(speeds, vec![80.0, 70.0, 60.0]);
}
