// In-memory simulation engine
//
// Minimal implementation of the engine port: keeps the topology as plain
// vectors and fires application lifecycle transitions from a time-ordered
// queue. No packets, queues or protocol logic are simulated; the engine only
// tracks which application is running when, and reports transitions to an
// event sink.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use hashbrown::HashMap;
use log::debug;

use crate::ps_interface::{
    Action, AppId, ApplicationSpec, EngineError, Event, EventId, EventSink, LinkDefaults, LinkId,
    NodeId, NoOpSink, RunOutcome, RunReport, SimTime, SimulationEngine, StackOptions,
};

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug, Default)]
struct SimNode {
    stack: Option<StackOptions>,
    /// prefix -> strategy name
    strategies: BTreeMap<String, String>,
    links: Vec<LinkId>,
    apps: Vec<AppId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimLink {
    pub a: NodeId,
    pub b: NodeId,
    pub attributes: LinkDefaults,
}

#[derive(Debug)]
struct SimApp {
    node: NodeId,
    spec: ApplicationSpec,
    running: bool,
}

#[derive(Debug, Clone, Copy)]
enum PendingEvent {
    Transition(Action),
    Stop,
}

/// Queue entry. Event ids grow monotonically, so ordering by (time, id)
/// fires equal-time events in insertion order.
#[derive(Debug, PartialEq, Eq)]
struct Scheduled {
    time: SimTime,
    id: EventId,
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse the ordering for min-heap
        (other.time, other.id).cmp(&(self.time, self.id))
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct MemoryEngine {
    link_defaults: LinkDefaults,
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    apps: Vec<SimApp>,

    queue: BinaryHeap<Scheduled>,
    pending: HashMap<EventId, PendingEvent>,
    next_event: EventId,
    now: SimTime,

    sink: Box<dyn EventSink>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_sink(Box::new(NoOpSink))
    }

    pub fn with_sink(sink: Box<dyn EventSink>) -> Self {
        Self {
            link_defaults: LinkDefaults::default(),
            nodes: Vec::new(),
            links: Vec::new(),
            apps: Vec::new(),
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
            next_event: 0,
            now: SimTime::ZERO,
            sink,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link(&self, link: LinkId) -> Option<&SimLink> {
        self.links.get(link)
    }

    pub fn links_of(&self, node: NodeId) -> &[LinkId] {
        self.nodes.get(node).map(|n| n.links.as_slice()).unwrap_or(&[])
    }

    pub fn stack(&self, node: NodeId) -> Option<StackOptions> {
        self.nodes.get(node).and_then(|n| n.stack)
    }

    pub fn strategy(&self, node: NodeId, prefix: &str) -> Option<&str> {
        self.nodes
            .get(node)
            .and_then(|n| n.strategies.get(prefix))
            .map(|s| s.as_str())
    }

    pub fn application(&self, app: AppId) -> Option<&ApplicationSpec> {
        self.apps.get(app).map(|a| &a.spec)
    }

    pub fn applications_on(&self, node: NodeId) -> &[AppId] {
        self.nodes.get(node).map(|n| n.apps.as_slice()).unwrap_or(&[])
    }

    pub fn node_of(&self, app: AppId) -> Option<NodeId> {
        self.apps.get(app).map(|a| a.node)
    }

    pub fn is_running(&self, app: AppId) -> bool {
        self.apps.get(app).map(|a| a.running).unwrap_or(false)
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    fn check_node(&self, node: NodeId) -> Result<&SimNode, EngineError> {
        self.nodes.get(node).ok_or(EngineError::UnknownNode(node))
    }

    fn check_time(&self, time: SimTime) -> Result<(), EngineError> {
        if time.is_negative() {
            return Err(EngineError::NegativeTime(time));
        }
        if time < self.now {
            return Err(EngineError::InThePast { at: time, now: self.now });
        }
        Ok(())
    }

    fn enqueue(&mut self, time: SimTime, event: PendingEvent) -> EventId {
        let id = self.next_event;
        self.next_event += 1;
        self.pending.insert(id, event);
        self.queue.push(Scheduled { time, id });
        id
    }

    fn fire(&mut self, action: Action) {
        let (app, running) = match action {
            Action::Start(app) => (app, true),
            Action::Stop(app) => (app, false),
        };

        // Only applications known at schedule time are queued
        let Some(state) = self.apps.get_mut(app) else {
            return;
        };
        state.running = running;

        let node = state.node;
        let type_name = state.spec.type_name.clone();
        let event = if running {
            Event::ApplicationStarted { app, node, type_name }
        } else {
            Event::ApplicationStopped { app, node, type_name }
        };
        self.sink.log(self.now, event);
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationEngine for MemoryEngine {
    fn set_link_defaults(&mut self, defaults: LinkDefaults) {
        debug!("link defaults: {}", defaults);
        self.link_defaults = defaults;
    }

    fn create_node(&mut self) -> Result<NodeId, EngineError> {
        self.nodes.push(SimNode::default());
        Ok(self.nodes.len() - 1)
    }

    fn create_link(&mut self, a: NodeId, b: NodeId) -> Result<LinkId, EngineError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(EngineError::SelfLink(a));
        }

        let id = self.links.len();
        self.links.push(SimLink {
            a,
            b,
            attributes: self.link_defaults,
        });
        self.nodes[a].links.push(id);
        self.nodes[b].links.push(id);
        Ok(id)
    }

    fn install_stack(&mut self, nodes: &[NodeId], options: StackOptions) -> Result<(), EngineError> {
        for &node in nodes {
            self.check_node(node)?;
        }
        for &node in nodes {
            self.nodes[node].stack = Some(options);
        }
        Ok(())
    }

    fn install_strategy(
        &mut self,
        nodes: &[NodeId],
        prefix: &str,
        strategy: &str,
    ) -> Result<(), EngineError> {
        for &node in nodes {
            if self.check_node(node)?.stack.is_none() {
                return Err(EngineError::StackNotInstalled(node));
            }
        }
        for &node in nodes {
            self.nodes[node]
                .strategies
                .insert(prefix.to_string(), strategy.to_string());
        }
        Ok(())
    }

    fn install_application(
        &mut self,
        node: NodeId,
        spec: ApplicationSpec,
    ) -> Result<AppId, EngineError> {
        if self.check_node(node)?.stack.is_none() {
            return Err(EngineError::StackNotInstalled(node));
        }

        let id = self.apps.len();
        self.apps.push(SimApp {
            node,
            spec,
            running: false,
        });
        self.nodes[node].apps.push(id);
        Ok(id)
    }

    fn schedule_at(&mut self, time: SimTime, action: Action) -> Result<EventId, EngineError> {
        self.check_time(time)?;
        let app = match action {
            Action::Start(app) | Action::Stop(app) => app,
        };
        if app >= self.apps.len() {
            return Err(EngineError::UnknownApplication(app));
        }
        Ok(self.enqueue(time, PendingEvent::Transition(action)))
    }

    fn cancel(&mut self, event: EventId) -> bool {
        // The heap entry stays behind and is skipped when popped
        self.pending.remove(&event).is_some()
    }

    fn stop_at(&mut self, time: SimTime) -> Result<EventId, EngineError> {
        self.check_time(time)?;
        Ok(self.enqueue(time, PendingEvent::Stop))
    }

    fn now(&self) -> SimTime {
        self.now
    }

    fn run(&mut self) -> RunReport {
        let mut events_fired = 0;

        while let Some(Scheduled { time, id }) = self.queue.pop() {
            let Some(event) = self.pending.remove(&id) else {
                continue;
            };

            self.now = time;
            events_fired += 1;

            match event {
                PendingEvent::Transition(action) => self.fire(action),
                PendingEvent::Stop => {
                    self.sink.log(self.now, Event::SimulationStopped);
                    return RunReport {
                        final_time: self.now,
                        events_fired,
                        outcome: RunOutcome::Stopped,
                    };
                }
            }
        }

        RunReport {
            final_time: self.now,
            events_fired,
            outcome: RunOutcome::Drained,
        }
    }

    fn destroy(&mut self) {
        debug!(
            "destroying {} nodes, {} links, {} apps, {} pending events",
            self.nodes.len(),
            self.links.len(),
            self.apps.len(),
            self.pending.len()
        );
        self.nodes.clear();
        self.links.clear();
        self.apps.clear();
        self.queue.clear();
        self.pending.clear();
        self.now = SimTime::ZERO;
        self.link_defaults = LinkDefaults::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps_event_sinks::CollectorEventSink;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn secs(s: f64) -> SimTime {
        SimTime::from_secs_f64(s)
    }

    fn engine_with_app() -> (MemoryEngine, AppId) {
        let mut engine = MemoryEngine::new();
        let node = engine.create_node().unwrap();
        engine.install_stack(&[node], StackOptions::default()).unwrap();
        let app = engine
            .install_application(node, ApplicationSpec::new("TestApp"))
            .unwrap();
        (engine, app)
    }

    #[test]
    fn test_links_take_current_defaults() {
        let mut engine = MemoryEngine::new();
        let a = engine.create_node().unwrap();
        let b = engine.create_node().unwrap();

        let custom = LinkDefaults {
            queue_max_packets: 5,
            ..LinkDefaults::default()
        };
        engine.set_link_defaults(custom);
        let link = engine.create_link(a, b).unwrap();

        assert_eq!(engine.link(link).unwrap().attributes, custom);
        assert_eq!(engine.links_of(a), &[link]);
        assert_eq!(engine.links_of(b), &[link]);
    }

    #[test]
    fn test_construction_errors() {
        let mut engine = MemoryEngine::new();
        let a = engine.create_node().unwrap();

        assert_eq!(engine.create_link(a, 7), Err(EngineError::UnknownNode(7)));
        assert_eq!(engine.create_link(a, a), Err(EngineError::SelfLink(a)));
        assert_eq!(
            engine.install_application(a, ApplicationSpec::new("TestApp")),
            Err(EngineError::StackNotInstalled(a))
        );
        assert_eq!(
            engine.install_strategy(&[a], "/prefix", "best-route"),
            Err(EngineError::StackNotInstalled(a))
        );
        assert_eq!(
            engine.install_stack(&[a, 3], StackOptions::default()),
            Err(EngineError::UnknownNode(3))
        );
        assert_eq!(engine.stack(a), None, "failed install must not be partial");
    }

    #[test]
    fn test_events_fire_in_time_order() {
        let sink = Rc::new(RefCell::new(CollectorEventSink::new()));
        let mut engine = MemoryEngine::with_sink(Box::new(sink.clone()));
        let node = engine.create_node().unwrap();
        engine.install_stack(&[node], StackOptions::default()).unwrap();
        let app = engine
            .install_application(node, ApplicationSpec::new("TestApp"))
            .unwrap();

        engine.schedule_at(secs(9.0), Action::Stop(app)).unwrap();
        engine.schedule_at(secs(2.0), Action::Start(app)).unwrap();
        engine.stop_at(secs(10.0)).unwrap();

        let report = engine.run();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.final_time, secs(10.0));
        assert_eq!(report.events_fired, 3);

        let times: Vec<SimTime> = sink.borrow().events.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![secs(2.0), secs(9.0), secs(10.0)]);
        assert!(!engine.is_running(app));
    }

    #[test]
    fn test_equal_times_fire_in_insertion_order() {
        let sink = Rc::new(RefCell::new(CollectorEventSink::new()));
        let mut engine = MemoryEngine::with_sink(Box::new(sink.clone()));
        let node = engine.create_node().unwrap();
        engine.install_stack(&[node], StackOptions::default()).unwrap();
        let first = engine
            .install_application(node, ApplicationSpec::new("First"))
            .unwrap();
        let second = engine
            .install_application(node, ApplicationSpec::new("Second"))
            .unwrap();

        engine.schedule_at(secs(1.0), Action::Start(second)).unwrap();
        engine.schedule_at(secs(1.0), Action::Start(first)).unwrap();
        engine.run();

        let apps: Vec<AppId> = sink
            .borrow()
            .events
            .iter()
            .filter_map(|r| match r.event {
                Event::ApplicationStarted { app, .. } => Some(app),
                _ => None,
            })
            .collect();
        assert_eq!(apps, vec![second, first]);
    }

    #[test]
    fn test_stop_at_terminates_with_no_other_events() {
        let mut engine = MemoryEngine::new();
        engine.stop_at(secs(300.0)).unwrap();

        let report = engine.run();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.final_time, secs(300.0));
        assert_eq!(report.events_fired, 1);
    }

    #[test]
    fn test_drains_without_stop_event() {
        let (mut engine, app) = engine_with_app();
        engine.schedule_at(secs(3.0), Action::Start(app)).unwrap();

        let report = engine.run();
        assert_eq!(report.outcome, RunOutcome::Drained);
        assert_eq!(report.final_time, secs(3.0));
        assert!(engine.is_running(app));
    }

    #[test]
    fn test_events_after_stop_do_not_fire() {
        let (mut engine, app) = engine_with_app();
        engine.stop_at(secs(5.0)).unwrap();
        engine.schedule_at(secs(6.0), Action::Start(app)).unwrap();

        let report = engine.run();
        assert_eq!(report.final_time, secs(5.0));
        assert!(!engine.is_running(app));
        assert_eq!(engine.pending_events(), 1);
    }

    #[test]
    fn test_cancelled_event_never_fires() {
        let (mut engine, app) = engine_with_app();
        engine.schedule_at(secs(1.0), Action::Start(app)).unwrap();
        let stop = engine.schedule_at(secs(2.0), Action::Stop(app)).unwrap();

        assert!(engine.cancel(stop));
        assert!(!engine.cancel(stop));

        let report = engine.run();
        assert_eq!(report.events_fired, 1);
        assert!(engine.is_running(app));
    }

    #[test]
    fn test_schedule_rejects_bad_times_and_apps() {
        let (mut engine, app) = engine_with_app();

        assert_eq!(
            engine.schedule_at(secs(-1.0), Action::Stop(app)),
            Err(EngineError::NegativeTime(secs(-1.0)))
        );
        assert_eq!(
            engine.schedule_at(secs(1.0), Action::Start(app + 1)),
            Err(EngineError::UnknownApplication(app + 1))
        );

        engine.schedule_at(secs(4.0), Action::Start(app)).unwrap();
        engine.run();
        assert!(matches!(
            engine.schedule_at(secs(2.0), Action::Stop(app)),
            Err(EngineError::InThePast { .. })
        ));
    }

    #[test]
    fn test_destroy_resets_everything() {
        let (mut engine, app) = engine_with_app();
        engine.schedule_at(secs(1.0), Action::Start(app)).unwrap();
        engine.stop_at(secs(2.0)).unwrap();
        engine.run();

        engine.destroy();
        assert_eq!(engine.node_count(), 0);
        assert_eq!(engine.link_count(), 0);
        assert_eq!(engine.pending_events(), 0);
        assert_eq!(engine.now(), SimTime::ZERO);
        assert!(engine.application(app).is_none());
    }
}
