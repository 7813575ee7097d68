// PSync simple scenario
//
//      +----------+     1Mbps      +--------+     1Mbps      +----------+
//      | consumer | <------------> | router | <------------> | producer |
//      +----------+         10ms   +--------+          10ms  +----------+
//
// Usage:
//   cargo run --bin psync_simple
//   cargo run --bin psync_simple -- --sm 50 --ds 20 --duration 120
//   cargo run --bin psync_simple -- --scenario scenarios/short-run.yaml --csv events.csv
//
// Flags given on the command line win over the scenario file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use psync_sim::ps_event_sinks::{ConsoleEventSink, CsvEventSink, MultiEventSink};
use psync_sim::ps_scenario_file::ScenarioFile;
use psync_sim::{run_scenario, MemoryEngine, RunReport, ScenarioConfig, ScenarioError, ScenarioOverrides};

#[derive(Parser, Debug)]
#[command(name = "psync_simple")]
#[command(about = "PSync consumer and producer on a three-node chain")]
struct Args {
    #[command(flatten)]
    overrides: ScenarioOverrides,

    /// Scenario YAML file with parameter overrides
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Export application lifecycle events as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "info")]
    log_level: LevelFilter,

    /// Do not log individual lifecycle events
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = SimpleLogger::new().with_level(args.log_level).init() {
        eprintln!("failed to initialize logger: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(report) => {
            info!(
                "done at {} ({:?}, {} events)",
                report.final_time, report.outcome, report.events_fired
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunReport, ScenarioError> {
    let file_overrides = match &args.scenario {
        Some(path) => {
            let file = ScenarioFile::load(path)?;
            if let Some(ref desc) = file.meta.description {
                info!("{}", desc.trim());
            }
            file.overrides()?
        }
        None => ScenarioOverrides::default(),
    };

    let config = ScenarioConfig::from_overrides(&file_overrides.merged_with(&args.overrides));
    config.log_summary();

    let mut sinks = MultiEventSink::new();
    sinks.add_sink(Box::new(ConsoleEventSink::new(!args.quiet)));
    if let Some(path) = &args.csv {
        let csv = CsvEventSink::new(path).map_err(|source| ScenarioError::Output {
            path: path.display().to_string(),
            source,
        })?;
        sinks.add_sink(Box::new(csv));
    }

    run_scenario(config, MemoryEngine::with_sink(Box::new(sinks)))
}
