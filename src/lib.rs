//! # psync-sim - PSync Simple Scenario Driver
//!
//! Configures and drives a discrete-event simulation of a three-node chain
//! running a publish/subscribe synchronization protocol: a sync consumer on
//! the first node, a router in the middle, a sync producer on the last node.
//!
//! ## Core Components
//!
//! - **ScenarioConfig**: scenario parameters, overrides and normalization
//! - **Topology**: the 3-node, 2-link chain with its forwarding stack
//! - **Scheduler**: consumer/producer bindings and their start/stop events
//! - **Scenario**: the run state machine, global stop event and teardown
//!
//! ## Engine Port
//!
//! The driver reaches the simulation framework only through the
//! `SimulationEngine` trait. `MemoryEngine` is an in-memory implementation
//! that orders lifecycle transitions on a simulated clock and reports them to
//! an `EventSink`; it does not simulate packets or protocol behavior.
//!
//! ```no_run
//! use psync_sim::{run_scenario, MemoryEngine, ScenarioConfig};
//!
//! let config = ScenarioConfig::default();
//! let report = run_scenario(config, MemoryEngine::new()).unwrap();
//! assert_eq!(report.final_time.as_secs_f64(), 300.0);
//! ```

// Scenario core
pub mod ps_config;
pub mod ps_driver;
pub mod ps_scheduler;
pub mod ps_topology;

// Engine port and implementations
pub mod ps_event_sinks;
pub mod ps_interface;
pub mod ps_memory_engine;

pub mod ps_scenario_file;

// Re-export commonly used types
pub use ps_config::{ConfigError, ScenarioConfig, ScenarioOverrides, UNBOUNDED_PUBLISH_COUNT};
pub use ps_driver::{run_scenario, RunPhase, Scenario, ScenarioError};
pub use ps_interface::{
    Action, ApplicationSpec, AttributeValue, EngineError, Event, EventSink, LinkDefaults,
    NoOpSink, RunOutcome, RunReport, SimTime, SimulationEngine,
};
pub use ps_memory_engine::MemoryEngine;
pub use ps_scheduler::{AppRole, ApplicationBinding, Schedule, ScheduleError};
pub use ps_topology::Topology;
