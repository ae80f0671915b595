//! Corridor simulation demo
//!
//! Runs the live engine for a number of ticks, printing every state update as
//! JSON, then runs one what-if scenario against the final live state.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use corridor::{ControlSurface, CorridorConfig, CorridorResult, LiveEngine, ScenarioConfig};

/// Demo configuration
struct Config {
    /// Number of live ticks to observe
    ticks: u64,
    /// Overrides `live.tick_interval_ms`
    interval_ms: Option<u64>,
    /// JSON scenario file
    scenario: Option<PathBuf>,
    /// TOML configuration file
    config: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticks: 10,
            interval_ms: None,
            scenario: None,
            config: None,
        }
    }
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    if let Some(value) = args.get(i + 1) {
        value.clone()
    } else {
        eprintln!("error: {flag} requires a value");
        std::process::exit(1);
    }
}

fn parse_number(value: &str, flag: &str) -> u64 {
    value.parse().unwrap_or_else(|_| {
        eprintln!("error: invalid number for {flag}: {value}");
        std::process::exit(1);
    })
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" | "-t" => {
                config.ticks = parse_number(&value_of(&args, i, "--ticks"), "--ticks");
                i += 2;
            }
            "--interval-ms" | "-i" => {
                config.interval_ms = Some(parse_number(&value_of(&args, i, "--interval-ms"), "--interval-ms"));
                i += 2;
            }
            "--scenario" | "-s" => {
                config.scenario = Some(PathBuf::from(value_of(&args, i, "--scenario")));
                i += 2;
            }
            "--config" | "-c" => {
                config.config = Some(PathBuf::from(value_of(&args, i, "--config")));
                i += 2;
            }
            "--help" | "-h" => {
                println!("corridor-sim - Rail corridor simulation demo");
                println!();
                println!("USAGE:");
                println!("    corridor-sim [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -t, --ticks <N>           Live ticks to observe [default: 10]");
                println!("    -i, --interval-ms <MS>    Tick interval override");
                println!("    -s, --scenario <FILE>     What-if scenario as JSON [default: empty scenario]");
                println!("    -c, --config <FILE>       Corridor configuration as TOML");
                println!("    -h, --help                Print help information");
                println!();
                println!("Log verbosity follows RUST_LOG [default: info].");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    config
}

fn load_scenario(path: Option<&PathBuf>) -> Result<ScenarioConfig, String> {
    let Some(path) = path else {
        return Ok(ScenarioConfig::default());
    };
    let content =
        std::fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&content).map_err(|err| format!("invalid scenario {}: {err}", path.display()))
}

fn run(args: &Config, scenario: &ScenarioConfig) -> CorridorResult<()> {
    let mut config = match &args.config {
        Some(path) => CorridorConfig::load(path)?,
        None => CorridorConfig::default(),
    };
    if let Some(ms) = args.interval_ms {
        config.live.tick_interval_ms = ms;
    }

    let control = ControlSurface::new(config.clone())?;
    control.attach(LiveEngine::with_defaults(&config)?)?;
    let stream = control.subscribe()?;
    control.start()?;
    info!(ticks = args.ticks, "observing live engine");

    let wait = Duration::from_millis(config.live.tick_interval_ms.saturating_mul(10).max(1000));
    for _ in 0..args.ticks {
        let update = stream.recv_timeout(wait)?;
        match update.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => error!(error = %err, "failed to encode state update"),
        }
    }
    control.stop()?;

    let result = control.run_what_if(scenario)?;
    info!(
        scenario = %result.scenario_name,
        conflicts = result.predicted_conflicts.len(),
        average_delay_min = result.metrics.average_delay_min,
        "what-if complete"
    );
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(err) => error!(error = %err, "failed to encode what-if result"),
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let scenario = match load_scenario(args.scenario.as_ref()) {
        Ok(scenario) => scenario,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &scenario) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "corridor-sim failed");
            ExitCode::FAILURE
        }
    }
}
