// Simulation Driver
//
// Owns the engine for one run and walks it through
// Configuring -> TopologyBuilt -> Scheduled -> Running -> Drained | Stopped,
// or Scheduled -> Failed when the stop event cannot be registered.
// There is no way back and no pause: once running, only the terminal stop
// event or an empty queue ends the run, and engine state is destroyed
// afterwards whatever the outcome.

use std::fmt;

use log::{info, warn};
use thiserror::Error;

use crate::ps_config::{ConfigError, ScenarioConfig};
use crate::ps_interface::{EngineError, RunOutcome, RunReport, SimTime, SimulationEngine};
use crate::ps_scheduler::{self, AppRole, Schedule, ScheduleError};
use crate::ps_topology::{self, Topology};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Configuring,
    TopologyBuilt,
    Scheduled,
    Running,
    /// Queue emptied before the stop event
    Drained,
    /// Terminal stop event fired
    Stopped,
    /// Stop event rejected by the engine; engine state already destroyed
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot do that while {actual}, expected {expected}")]
    InvalidPhase { expected: RunPhase, actual: RunPhase },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("failed to open output {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One scenario run against an engine
pub struct Scenario<E: SimulationEngine> {
    config: ScenarioConfig,
    engine: E,
    phase: RunPhase,
    topology: Option<Topology>,
    schedule: Option<Schedule>,
}

impl<E: SimulationEngine> Scenario<E> {
    pub fn new(config: ScenarioConfig, engine: E) -> Self {
        Self {
            config,
            engine,
            phase: RunPhase::Configuring,
            topology: None,
            schedule: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Global stop time
    pub fn stop_time(&self) -> SimTime {
        SimTime::from_secs_f64(self.config.duration_secs as f64)
    }

    fn expect_phase(&self, expected: RunPhase) -> Result<(), ScenarioError> {
        if self.phase != expected {
            return Err(ScenarioError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    pub fn build_topology(&mut self) -> Result<&Topology, ScenarioError> {
        self.expect_phase(RunPhase::Configuring)?;

        let topology = ps_topology::build_topology(&mut self.engine)?;
        self.phase = RunPhase::TopologyBuilt;
        Ok(self.topology.insert(topology))
    }

    pub fn schedule_applications(&mut self) -> Result<&Schedule, ScenarioError> {
        self.expect_phase(RunPhase::TopologyBuilt)?;

        let topology = self
            .topology
            .as_ref()
            .ok_or(ScenarioError::InvalidPhase {
                expected: RunPhase::TopologyBuilt,
                actual: self.phase,
            })?;
        let schedule = ps_scheduler::schedule_applications(&mut self.engine, topology, &self.config)?;
        self.phase = RunPhase::Scheduled;
        Ok(self.schedule.insert(schedule))
    }

    /// Cancel the pending transitions of one role before the run starts
    pub fn cancel(&mut self, role: AppRole) -> Result<usize, ScenarioError> {
        self.expect_phase(RunPhase::Scheduled)?;

        let Some(schedule) = self.schedule.as_ref() else {
            return Ok(0);
        };
        let binding = match role {
            AppRole::Consumer => &schedule.consumer,
            AppRole::Producer => &schedule.producer,
        };
        let cancelled = ps_scheduler::cancel(&mut self.engine, binding);
        info!("cancelled {} pending {} event(s)", cancelled, role);
        Ok(cancelled)
    }

    /// Register the stop event, run the clock, then destroy engine state
    pub fn run(&mut self) -> Result<RunReport, ScenarioError> {
        self.expect_phase(RunPhase::Scheduled)?;

        if let Err(e) = self.engine.stop_at(self.stop_time()) {
            self.engine.destroy();
            self.phase = RunPhase::Failed;
            return Err(e.into());
        }

        self.phase = RunPhase::Running;
        info!("running until {}", self.stop_time());
        let report = self.engine.run();

        self.phase = match report.outcome {
            RunOutcome::Stopped => RunPhase::Stopped,
            RunOutcome::Drained => {
                warn!("event queue drained at {} before the stop event", report.final_time);
                RunPhase::Drained
            }
        };
        info!(
            "simulation finished at {} after {} event(s)",
            report.final_time, report.events_fired
        );

        self.engine.destroy();
        Ok(report)
    }
}

/// Build, schedule and run in one go
pub fn run_scenario<E: SimulationEngine>(
    config: ScenarioConfig,
    engine: E,
) -> Result<RunReport, ScenarioError> {
    let mut scenario = Scenario::new(config, engine);
    scenario.build_topology()?;
    scenario.schedule_applications()?;
    scenario.run()
}
