//! Application Scheduler
//!
//! Installs the sync consumer on the first node of the chain and the sync
//! producer on the last one, then schedules their start and stop transitions.
//!
//! The producer stops 5 seconds before the end of the run and the consumer 1
//! second before, so the consumer outlives the producer. With a duration under
//! 6 seconds the producer's stop lands before its start; intervals like that
//! are rejected instead of being handed to the engine.

use std::fmt;

use log::info;
use thiserror::Error;

use crate::ps_config::ScenarioConfig;
use crate::ps_interface::{
    Action, AppId, ApplicationSpec, AttributeValue, EngineError, EventId, NodeId, SimTime,
    SimulationEngine,
};
use crate::ps_topology::{Topology, SYNC_PREFIX};

pub const CONSUMER_APP: &str = "PSyncConsumerApp";
pub const PRODUCER_APP: &str = "PSyncProducerApp";

/// Topic name the producer publishes under
pub const USER_PREFIX: &str = "topic";

pub const ATTR_PREFIX: &str = "Prefix";
pub const ATTR_NUM_SUBSCRIBE_MESSAGE: &str = "NumSubscribeMessage";
pub const ATTR_USER_PREFIX: &str = "UserPrefix";
pub const ATTR_MAX_PUBLISH_MESSAGE: &str = "MaxPublishMessage";
pub const ATTR_TOTAL_DATA_STREAM: &str = "TotalDataStream";

const CONSUMER_STOP_LEAD_SECS: f64 = 1.0;
const PRODUCER_STOP_LEAD_SECS: f64 = 5.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppRole {
    Consumer,
    Producer,
}

impl AppRole {
    pub fn type_name(&self) -> &'static str {
        match self {
            AppRole::Consumer => CONSUMER_APP,
            AppRole::Producer => PRODUCER_APP,
        }
    }
}

impl fmt::Display for AppRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppRole::Consumer => f.write_str("consumer"),
            AppRole::Producer => f.write_str("producer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("{role} start offset {secs} is not a finite number of seconds")]
    NonFiniteStart { role: AppRole, secs: f64 },

    #[error("{role} would start at negative time {start}")]
    NegativeStart { role: AppRole, start: SimTime },

    #[error("{role} would stop at {stop}, before its start at {start}")]
    InvertedInterval {
        role: AppRole,
        start: SimTime,
        stop: SimTime,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// An installed application and its scheduled [start, stop) interval
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationBinding {
    pub role: AppRole,
    pub node: NodeId,
    pub app: AppId,
    pub spec: ApplicationSpec,
    pub start: SimTime,
    pub stop: SimTime,
    pub start_event: EventId,
    pub stop_event: EventId,
}

/// Both bindings of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub consumer: ApplicationBinding,
    pub producer: ApplicationBinding,
}

// ============================================================================
// Scheduling Arithmetic
// ============================================================================

pub fn consumer_start(config: &ScenarioConfig) -> SimTime {
    SimTime::from_secs_f64(config.consumer_start_secs)
}

pub fn consumer_stop(config: &ScenarioConfig) -> SimTime {
    SimTime::from_secs_f64(config.duration_secs as f64 - CONSUMER_STOP_LEAD_SECS)
}

pub fn producer_start(config: &ScenarioConfig) -> SimTime {
    SimTime::from_secs_f64(config.producer_start_secs)
}

pub fn producer_stop(config: &ScenarioConfig) -> SimTime {
    SimTime::from_secs_f64(config.duration_secs as f64 - PRODUCER_STOP_LEAD_SECS)
}

/// Start offsets must be finite before they are turned into simulated time
pub fn check_start_offset(role: AppRole, secs: f64) -> Result<(), ScheduleError> {
    if !secs.is_finite() {
        return Err(ScheduleError::NonFiniteStart { role, secs });
    }
    Ok(())
}

/// Start must be non-negative and stop must not precede start
pub fn check_interval(role: AppRole, start: SimTime, stop: SimTime) -> Result<(), ScheduleError> {
    if start.is_negative() {
        return Err(ScheduleError::NegativeStart { role, start });
    }
    if stop < start {
        return Err(ScheduleError::InvertedInterval { role, start, stop });
    }
    Ok(())
}

// ============================================================================
// Application Specs
// ============================================================================

pub fn consumer_spec(config: &ScenarioConfig) -> ApplicationSpec {
    ApplicationSpec::new(CONSUMER_APP)
        .with_attribute(ATTR_PREFIX, AttributeValue::String(SYNC_PREFIX.to_string()))
        .with_attribute(
            ATTR_NUM_SUBSCRIBE_MESSAGE,
            AttributeValue::Uinteger(config.subscribe_count as u64),
        )
}

pub fn producer_spec(config: &ScenarioConfig) -> ApplicationSpec {
    ApplicationSpec::new(PRODUCER_APP)
        .with_attribute(ATTR_PREFIX, AttributeValue::String(SYNC_PREFIX.to_string()))
        .with_attribute(ATTR_USER_PREFIX, AttributeValue::String(USER_PREFIX.to_string()))
        .with_attribute(
            ATTR_MAX_PUBLISH_MESSAGE,
            AttributeValue::Uinteger(config.max_publish_count),
        )
        .with_attribute(
            ATTR_TOTAL_DATA_STREAM,
            AttributeValue::Uinteger(config.data_stream_count as u64),
        )
}

// ============================================================================
// Scheduling
// ============================================================================

/// Install both applications and schedule their lifecycles.
///
/// Both intervals are checked before anything is installed, so an interval
/// rejection leaves the engine untouched. An engine error while binding the
/// producer leaves the consumer installed and scheduled.
pub fn schedule_applications<E: SimulationEngine + ?Sized>(
    engine: &mut E,
    topology: &Topology,
    config: &ScenarioConfig,
) -> Result<Schedule, ScheduleError> {
    check_start_offset(AppRole::Consumer, config.consumer_start_secs)?;
    check_start_offset(AppRole::Producer, config.producer_start_secs)?;

    let consumer_interval = (consumer_start(config), consumer_stop(config));
    let producer_interval = (producer_start(config), producer_stop(config));
    check_interval(AppRole::Consumer, consumer_interval.0, consumer_interval.1)?;
    check_interval(AppRole::Producer, producer_interval.0, producer_interval.1)?;

    let consumer = bind(
        engine,
        AppRole::Consumer,
        topology.consumer_node(),
        consumer_spec(config),
        consumer_interval,
    )?;
    let producer = bind(
        engine,
        AppRole::Producer,
        topology.producer_node(),
        producer_spec(config),
        producer_interval,
    )?;

    Ok(Schedule { consumer, producer })
}

fn bind<E: SimulationEngine + ?Sized>(
    engine: &mut E,
    role: AppRole,
    node: NodeId,
    spec: ApplicationSpec,
    (start, stop): (SimTime, SimTime),
) -> Result<ApplicationBinding, ScheduleError> {
    let app = engine.install_application(node, spec.clone())?;
    let start_event = engine.schedule_at(start, Action::Start(app))?;
    let stop_event = engine.schedule_at(stop, Action::Stop(app))?;

    info!("{} on node {}: [{}, {})", role, node, start, stop);

    Ok(ApplicationBinding {
        role,
        node,
        app,
        spec,
        start,
        stop,
        start_event,
        stop_event,
    })
}

/// Cancel whichever of the binding's transitions have not fired yet.
/// Returns how many were cancelled.
pub fn cancel<E: SimulationEngine + ?Sized>(engine: &mut E, binding: &ApplicationBinding) -> usize {
    [binding.start_event, binding.stop_event]
        .into_iter()
        .filter(|&event| engine.cancel(event))
        .count()
}
