use crate::error::{Error, Result};
use crate::instance::CuttingStockInstance;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Index of a node in a [`Graph`].
pub type NodeId = usize;

/// Index of an arc in a [`Graph`].
pub type ArcId = usize;

/// An immutable graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    /// Tail node.
    pub from: NodeId,
    /// Head node.
    pub to: NodeId,
    /// Cost before dual weighting.
    pub cost: f64,
    /// Consumption of each resource when the arc is traversed.
    pub consumption: Vec<i64>,
    /// Item covered by traversing the arc, if any; its dual is subtracted from `cost`.
    #[serde(default)]
    pub item: Option<usize>,
}

impl Arc {
    /// Creates an arc that covers no item.
    pub fn new(from: NodeId, to: NodeId, cost: f64, consumption: Vec<i64>) -> Self {
        Arc {
            from,
            to,
            cost,
            consumption,
            item: None,
        }
    }

    /// Marks the arc as covering one piece of `item`.
    pub fn covering(mut self, item: usize) -> Self {
        self.item = Some(item);
        self
    }
}

/// Global feasibility bounds `[min, max]` of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceWindow {
    /// Smallest admissible accumulated consumption.
    pub min: i64,
    /// Largest admissible accumulated consumption.
    pub max: i64,
}

impl ResourceWindow {
    /// Creates the window `[min, max]`.
    pub fn new(min: i64, max: i64) -> Self {
        ResourceWindow { min, max }
    }

    /// A window without upper limit, the resource is then only used for dominance.
    pub fn unbounded() -> Self {
        ResourceWindow {
            min: 0,
            max: i64::MAX,
        }
    }

    /// Returns true if `value` lies in the window.
    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Returns true if the window has a finite upper limit.
    pub fn is_bounded(&self) -> bool {
        self.max != i64::MAX
    }
}

/// Directed graph of a resource-constrained shortest path problem.
///
/// Every graph in circulation has been validated:
/// - arc endpoints, `source` and `sink` are nodes,
/// - each arc has one non-negative consumption per resource window,
/// - every window has `min <= max`,
/// - arcs that consume nothing of any bounded resource form no cycle.
///
/// Since consumption never decreases along a path, the last rule makes the set of feasible labels
/// finite, so label setting always terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGraph", into = "RawGraph")]
pub struct Graph {
    n_nodes: usize,
    arcs: Vec<Arc>,
    windows: Vec<ResourceWindow>,
    source: NodeId,
    sink: NodeId,
    outgoing: Vec<Vec<ArcId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGraph {
    n_nodes: usize,
    arcs: Vec<Arc>,
    windows: Vec<ResourceWindow>,
    source: NodeId,
    sink: NodeId,
}

impl Graph {
    /// Creates and validates a graph.
    ///
    /// # Arguments
    ///
    /// * `n_nodes` - Number of nodes, nodes are `0..n_nodes`.
    /// * `arcs` - The arcs, their position becomes their [`ArcId`].
    /// * `windows` - One window per resource.
    /// * `source` - Node where every path starts.
    /// * `sink` - Node where priced paths end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if one of the rules listed on the type is violated.
    pub fn new(
        n_nodes: usize,
        arcs: Vec<Arc>,
        windows: Vec<ResourceWindow>,
        source: NodeId,
        sink: NodeId,
    ) -> Result<Self> {
        if source >= n_nodes || sink >= n_nodes {
            return Err(Error::InvalidInput(format!(
                "source {source} or sink {sink} is not one of the {n_nodes} nodes"
            )));
        }
        if let Some(k) = windows.iter().position(|w| w.min > w.max) {
            return Err(Error::InvalidInput(format!(
                "resource window {k} has min {} above max {}",
                windows[k].min, windows[k].max
            )));
        }

        let mut outgoing = vec![Vec::new(); n_nodes];
        for (id, arc) in arcs.iter().enumerate() {
            if arc.from >= n_nodes || arc.to >= n_nodes {
                return Err(Error::InvalidInput(format!(
                    "arc {id} ({} -> {}) leaves the graph",
                    arc.from, arc.to
                )));
            }
            if arc.consumption.len() != windows.len() {
                return Err(Error::InvalidInput(format!(
                    "arc {id} consumes {} resources, expected {}",
                    arc.consumption.len(),
                    windows.len()
                )));
            }
            if arc.consumption.iter().any(|&c| c < 0) {
                return Err(Error::InvalidInput(format!(
                    "arc {id} has negative consumption"
                )));
            }
            outgoing[arc.from].push(id);
        }

        let graph = Graph {
            n_nodes,
            arcs,
            windows,
            source,
            sink,
            outgoing,
        };
        if graph.has_free_cycle() {
            return Err(Error::InvalidInput(
                "a cycle consumes no bounded resource, label setting would not terminate"
                    .to_string(),
            ));
        }
        Ok(graph)
    }

    /// Decodes and validates a graph from JSON:
    /// `{"n_nodes": .., "arcs": [{"from", "to", "cost", "consumption", "item"?}], "windows": [{"min", "max"}], "source": .., "sink": ..}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Like [`Graph::from_json_str`], reading from any `Read` source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Builds the arc-flow graph of a cutting-stock instance.
    ///
    /// Node `w` stands for "the first `w` width units of the roll are used". For every `w` there is an
    /// arc `w -> w + width_i` covering item `i` (when it fits) and a loss arc `w -> w + 1`. The only
    /// resource is the used width, bounded by `[0, capacity]`. Paths run from `0` to `capacity`, so
    /// pricing this graph is the same as solving the unbounded knapsack.
    pub fn arc_flow(instance: &CuttingStockInstance) -> Self {
        let capacity = instance.capacity();
        let mut arcs = Vec::new();
        let mut outgoing = vec![Vec::new(); capacity + 1];
        for w in 0..capacity {
            for (i, item) in instance.items().iter().enumerate() {
                if w + item.width <= capacity {
                    outgoing[w].push(arcs.len());
                    arcs.push(Arc::new(w, w + item.width, 0.0, vec![item.width as i64]).covering(i));
                }
            }
            outgoing[w].push(arcs.len());
            arcs.push(Arc::new(w, w + 1, 0.0, vec![1]));
        }

        // every arc consumes width and goes forward, nothing left to validate
        Graph {
            n_nodes: capacity + 1,
            arcs,
            windows: vec![ResourceWindow::new(0, capacity as i64)],
            source: 0,
            sink: capacity,
            outgoing,
        }
    }

    /// Returns the number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Returns all arcs.
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Returns the arc with the given id.
    pub fn arc(&self, id: ArcId) -> &Arc {
        &self.arcs[id]
    }

    /// Returns the ids of the arcs leaving `node`.
    pub fn outgoing(&self, node: NodeId) -> &[ArcId] {
        &self.outgoing[node]
    }

    /// Returns the resource windows.
    pub fn windows(&self) -> &[ResourceWindow] {
        &self.windows
    }

    /// Returns the number of resources.
    pub fn n_resources(&self) -> usize {
        self.windows.len()
    }

    /// Returns the source node.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Returns the sink node.
    pub fn sink(&self) -> NodeId {
        self.sink
    }

    /// Returns the largest item index referenced by an arc, if any.
    pub fn max_item(&self) -> Option<usize> {
        self.arcs.iter().filter_map(|a| a.item).max()
    }

    /// Returns true if every accumulated resource lies in its window.
    pub fn is_feasible(&self, resources: &[i64]) -> bool {
        self.windows
            .iter()
            .zip(resources)
            .all(|(window, &r)| window.contains(r))
    }

    /// Returns true if the arcs that consume nothing of a bounded resource contain a cycle.
    fn has_free_cycle(&self) -> bool {
        let is_free = |arc: &Arc| {
            arc.consumption
                .iter()
                .zip(&self.windows)
                .all(|(&c, w)| c == 0 || !w.is_bounded())
        };

        let mut free = DiGraph::<(), ()>::with_capacity(self.n_nodes, self.arcs.len());
        let nodes: Vec<_> = (0..self.n_nodes).map(|_| free.add_node(())).collect();
        for arc in self.arcs.iter().filter(|a| is_free(a)) {
            free.add_edge(nodes[arc.from], nodes[arc.to], ());
        }
        is_cyclic_directed(&free)
    }
}

impl TryFrom<RawGraph> for Graph {
    type Error = Error;

    fn try_from(raw: RawGraph) -> Result<Self> {
        Graph::new(raw.n_nodes, raw.arcs, raw.windows, raw.source, raw.sink)
    }
}

impl From<Graph> for RawGraph {
    fn from(graph: Graph) -> Self {
        RawGraph {
            n_nodes: graph.n_nodes,
            arcs: graph.arcs,
            windows: graph.windows,
            source: graph.source,
            sink: graph.sink,
        }
    }
}
