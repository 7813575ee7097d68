// Topology Builder
//
//      +----------+     1Mbps      +--------+     1Mbps      +----------+
//      | consumer | <------------> | router | <------------> | producer |
//      +----------+         10ms   +--------+          10ms  +----------+
//
// Three nodes in a chain, two identical point-to-point links, the forwarding
// stack with default routes on every node and best-route for the sync prefix.

use log::info;

use crate::ps_interface::{EngineError, LinkDefaults, LinkId, NodeId, SimulationEngine, StackOptions};

/// Name prefix shared by the sync consumer and producer
pub const SYNC_PREFIX: &str = "/prefix";

pub const BEST_ROUTE_STRATEGY: &str = "/localhost/nfd/strategy/best-route";

pub const NODE_COUNT: usize = 3;

/// Nodes and links of the chain, in creation order
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    nodes: Vec<NodeId>,
    links: Vec<LinkId>,
    link_defaults: LinkDefaults,
}

impl Topology {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn link_defaults(&self) -> LinkDefaults {
        self.link_defaults
    }

    /// First node of the chain
    pub fn consumer_node(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn router_node(&self) -> NodeId {
        self.nodes[1]
    }

    /// Last node of the chain
    pub fn producer_node(&self) -> NodeId {
        self.nodes[NODE_COUNT - 1]
    }
}

/// Build the chain on `engine`. Any engine failure aborts the build.
pub fn build_topology<E: SimulationEngine + ?Sized>(engine: &mut E) -> Result<Topology, EngineError> {
    // Defaults must be in place before any link exists
    let link_defaults = LinkDefaults::default();
    engine.set_link_defaults(link_defaults);

    let nodes = (0..NODE_COUNT)
        .map(|_| engine.create_node())
        .collect::<Result<Vec<_>, _>>()?;

    let links = nodes
        .windows(2)
        .map(|pair| engine.create_link(pair[0], pair[1]))
        .collect::<Result<Vec<_>, _>>()?;

    engine.install_stack(&nodes, StackOptions { default_routes: true })?;
    engine.install_strategy(&nodes, SYNC_PREFIX, BEST_ROUTE_STRATEGY)?;

    info!(
        "topology: {} nodes, {} links ({})",
        nodes.len(),
        links.len(),
        link_defaults
    );

    Ok(Topology {
        nodes,
        links,
        link_defaults,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps_interface::{
        Action, AppId, ApplicationSpec, EventId, RunReport, SimTime,
    };
    use crate::ps_memory_engine::MemoryEngine;

    #[test]
    fn test_chain_shape() {
        let mut engine = MemoryEngine::new();
        let topology = build_topology(&mut engine).unwrap();

        assert_eq!(topology.nodes().len(), 3);
        assert_eq!(topology.links().len(), 2);
        assert_eq!(engine.node_count(), 3);
        assert_eq!(engine.link_count(), 2);

        let first = engine.link(topology.links()[0]).unwrap();
        let second = engine.link(topology.links()[1]).unwrap();
        assert_eq!((first.a, first.b), (topology.consumer_node(), topology.router_node()));
        assert_eq!((second.a, second.b), (topology.router_node(), topology.producer_node()));

        // The router is the only node with two links
        assert_eq!(engine.links_of(topology.router_node()).len(), 2);
        assert_eq!(engine.links_of(topology.consumer_node()).len(), 1);
        assert_eq!(engine.links_of(topology.producer_node()).len(), 1);
    }

    #[test]
    fn test_links_use_fixed_defaults() {
        let mut engine = MemoryEngine::new();
        let topology = build_topology(&mut engine).unwrap();

        for &link in topology.links() {
            let attrs = engine.link(link).unwrap().attributes;
            assert_eq!(attrs.data_rate.bits_per_second(), 1_000_000);
            assert_eq!(attrs.delay, SimTime::from_millis(10));
            assert_eq!(attrs.queue_max_packets, 20);
        }
    }

    #[test]
    fn test_stack_and_strategy_on_every_node() {
        let mut engine = MemoryEngine::new();
        let topology = build_topology(&mut engine).unwrap();

        for &node in topology.nodes() {
            assert_eq!(
                engine.stack(node),
                Some(StackOptions { default_routes: true })
            );
            assert_eq!(engine.strategy(node, SYNC_PREFIX), Some(BEST_ROUTE_STRATEGY));
            assert_eq!(engine.strategy(node, "/other"), None);
        }
    }

    /// Engine whose link creation always fails
    struct BrokenLinks(MemoryEngine);

    impl SimulationEngine for BrokenLinks {
        fn set_link_defaults(&mut self, defaults: LinkDefaults) {
            self.0.set_link_defaults(defaults)
        }
        fn create_node(&mut self) -> Result<NodeId, EngineError> {
            self.0.create_node()
        }
        fn create_link(&mut self, a: NodeId, _b: NodeId) -> Result<LinkId, EngineError> {
            Err(EngineError::UnknownNode(a))
        }
        fn install_stack(&mut self, nodes: &[NodeId], options: StackOptions) -> Result<(), EngineError> {
            self.0.install_stack(nodes, options)
        }
        fn install_strategy(&mut self, nodes: &[NodeId], prefix: &str, strategy: &str) -> Result<(), EngineError> {
            self.0.install_strategy(nodes, prefix, strategy)
        }
        fn install_application(&mut self, node: NodeId, spec: ApplicationSpec) -> Result<AppId, EngineError> {
            self.0.install_application(node, spec)
        }
        fn schedule_at(&mut self, time: SimTime, action: Action) -> Result<EventId, EngineError> {
            self.0.schedule_at(time, action)
        }
        fn cancel(&mut self, event: EventId) -> bool {
            self.0.cancel(event)
        }
        fn stop_at(&mut self, time: SimTime) -> Result<EventId, EngineError> {
            self.0.stop_at(time)
        }
        fn now(&self) -> SimTime {
            self.0.now()
        }
        fn run(&mut self) -> RunReport {
            self.0.run()
        }
        fn destroy(&mut self) {
            self.0.destroy()
        }
    }

    #[test]
    fn test_link_failure_aborts_build() {
        let mut engine = BrokenLinks(MemoryEngine::new());
        let result = build_topology(&mut engine);

        assert_eq!(result, Err(EngineError::UnknownNode(0)));
        assert_eq!(engine.0.stack(0), None, "stack must not be installed after a failure");
    }
}
