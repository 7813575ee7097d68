// Shared types and the engine port used by the scenario driver.
//
// The driver never talks to a simulation framework directly. Everything it
// needs (nodes, links, stack, strategy, applications, clock) goes through the
// `SimulationEngine` trait so the scenario logic can run against the
// in-memory engine in ps_memory_engine.rs or any other implementation.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

pub type NodeId = usize;
pub type LinkId = usize;
pub type AppId = usize;
pub type EventId = u64;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;
const NANOS_PER_MILLI: i64 = 1_000_000;

// ============================================================================
// Simulated Time
// ============================================================================

/// Point on the simulated clock, in nanoseconds.
///
/// Signed on purpose: stop times are computed as `duration - k` and can go
/// below zero for short runs. The scheduler checks for that before anything
/// reaches the engine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(i64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * NANOS_PER_MILLI)
    }

    /// Seconds to nanoseconds, rounded to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC).round() as i64)
    }

    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

// ============================================================================
// Link Defaults
// ============================================================================

/// Link speed in bits per second
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataRate(pub u64);

impl DataRate {
    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps * 1_000_000)
    }

    pub const fn bits_per_second(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            bps if bps != 0 && bps % 1_000_000 == 0 => write!(f, "{}Mbps", bps / 1_000_000),
            bps if bps != 0 && bps % 1_000 == 0 => write!(f, "{}Kbps", bps / 1_000),
            bps => write!(f, "{}bps", bps),
        }
    }
}

/// Attributes applied to every point-to-point link created after they are set
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkDefaults {
    pub data_rate: DataRate,
    pub delay: SimTime,
    pub queue_max_packets: u32,
}

impl Default for LinkDefaults {
    fn default() -> Self {
        Self {
            data_rate: DataRate::from_mbps(1),
            delay: SimTime::from_millis(10),
            queue_max_packets: 20,
        }
    }
}

impl fmt::Display for LinkDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}ms {}p",
            self.data_rate,
            self.delay.as_nanos() / NANOS_PER_MILLI,
            self.queue_max_packets
        )
    }
}

/// Forwarding stack options
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StackOptions {
    /// Every face gets a default route, so any prefix is reachable over
    /// the node's links. Only sound for chain-like topologies.
    pub default_routes: bool,
}

// ============================================================================
// Applications
// ============================================================================

/// Value of a single named application attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Uinteger(u64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Uinteger(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
        }
    }
}

/// Named attribute bag, kept in insertion order
pub type Attributes = IndexMap<String, AttributeValue>;

/// What to install on a node: an application type plus its attributes
#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationSpec {
    pub type_name: String,
    pub attributes: Attributes,
}

impl ApplicationSpec {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// Lifecycle transition scheduled on the clock
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Start(AppId),
    Stop(AppId),
}

// ============================================================================
// Run Results
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The terminal stop event fired
    Stopped,
    /// The queue emptied before any stop event
    Drained,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub final_time: SimTime,
    pub events_fired: usize,
    pub outcome: RunOutcome,
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle events emitted by the engine while the clock runs
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    ApplicationStarted {
        app: AppId,
        node: NodeId,
        type_name: String,
    },
    ApplicationStopped {
        app: AppId,
        node: NodeId,
        type_name: String,
    },
    SimulationStopped,
}

/// Trait for consuming lifecycle events from the engine
pub trait EventSink {
    fn log(&mut self, time: SimTime, event: Event);
}

/// Event sink that drops everything
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _time: SimTime, _event: Event) {}
}

// ============================================================================
// Engine Port
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("cannot link node {0} to itself")]
    SelfLink(NodeId),

    #[error("no forwarding stack installed on node {0}")]
    StackNotInstalled(NodeId),

    #[error("unknown application {0}")]
    UnknownApplication(AppId),

    #[error("cannot schedule at negative time {0}")]
    NegativeTime(SimTime),

    #[error("cannot schedule at {at}, clock is already at {now}")]
    InThePast { at: SimTime, now: SimTime },
}

/// Capabilities the scenario needs from a discrete-event simulation framework
pub trait SimulationEngine {
    /// Link attributes used by every link created afterwards
    fn set_link_defaults(&mut self, defaults: LinkDefaults);

    fn create_node(&mut self) -> Result<NodeId, EngineError>;

    /// Point-to-point link between two existing nodes
    fn create_link(&mut self, a: NodeId, b: NodeId) -> Result<LinkId, EngineError>;

    fn install_stack(&mut self, nodes: &[NodeId], options: StackOptions) -> Result<(), EngineError>;

    /// Forwarding strategy for `prefix` on each of `nodes`
    fn install_strategy(
        &mut self,
        nodes: &[NodeId],
        prefix: &str,
        strategy: &str,
    ) -> Result<(), EngineError>;

    fn install_application(
        &mut self,
        node: NodeId,
        spec: ApplicationSpec,
    ) -> Result<AppId, EngineError>;

    fn schedule_at(&mut self, time: SimTime, action: Action) -> Result<EventId, EngineError>;

    /// Remove a pending event. Returns false if it already fired or never existed.
    fn cancel(&mut self, event: EventId) -> bool;

    /// Register the terminal stop event
    fn stop_at(&mut self, time: SimTime) -> Result<EventId, EngineError>;

    fn now(&self) -> SimTime;

    /// Fire events in time order until a stop event fires or the queue is empty
    fn run(&mut self) -> RunReport;

    /// Drop nodes, links, applications and pending events, and reset the clock
    fn destroy(&mut self);
}
