use crate::column::{DualVector, Pattern};
use crate::error::{Error, Result};
use crate::instance::CuttingStockInstance;
use crate::pricer::{check_duals, Pricer, PricingResult};
use crate::spprc::graph::{ArcId, Graph};
use crate::spprc::label::{Label, LabelArena, LabelId, LabelSet};
use std::collections::VecDeque;

/// Cheapest feasible source-sink path found by label setting.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    /// Arcs from source to sink.
    pub arcs: Vec<ArcId>,
    /// Dual-weighted cost of the path.
    pub cost: f64,
    /// Sum of the arc costs before dual weighting.
    pub base_cost: f64,
    /// Accumulated resource consumption at the sink.
    pub resources: Vec<i64>,
}

/// Pricing oracle solving a shortest path problem with resource constraints by label setting.
///
/// Each arc costs `arc.cost − duals[arc.item]`. Labels start at the source with zero cost and
/// zero resources and are extended along outgoing arcs; an extension leaving a resource window is
/// dropped at once, the others go through two-sided dominance at their head node. Nodes whose label
/// set changed wait in a FIFO worklist until processed. The column is the cheapest live label at
/// the sink; it covers the items of its arcs and costs `column_cost + base_cost`.
#[derive(Debug, Clone)]
pub struct SpprcPricer {
    graph: Graph,
    n_items: usize,
    column_cost: f64,
    arena: LabelArena,
    sets: Vec<LabelSet>,
    extended: Vec<bool>,
}

impl SpprcPricer {
    /// Creates a pricer over `graph` for `n_items` covering constraints, with unit column cost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an arc covers an item `>= n_items`.
    pub fn new(graph: Graph, n_items: usize) -> Result<Self> {
        if let Some(item) = graph.max_item().filter(|&i| i >= n_items) {
            return Err(Error::InvalidInput(format!(
                "an arc covers item {item} but only {n_items} items exist"
            )));
        }
        Ok(SpprcPricer {
            graph,
            n_items,
            column_cost: 1.0,
            arena: LabelArena::default(),
            sets: Vec::new(),
            extended: Vec::new(),
        })
    }

    /// Creates the arc-flow pricer of a cutting-stock instance, see [`Graph::arc_flow`].
    pub fn for_instance(instance: &CuttingStockInstance) -> Self {
        SpprcPricer {
            graph: Graph::arc_flow(instance),
            n_items: instance.n_items(),
            column_cost: 1.0,
            arena: LabelArena::default(),
            sets: Vec::new(),
            extended: Vec::new(),
        }
    }

    /// Sets the fixed cost every column pays on top of its arc costs.
    pub fn with_column_cost(mut self, column_cost: f64) -> Self {
        self.column_cost = column_cost;
        self
    }

    /// Returns the graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the labels created by the last call.
    pub fn arena(&self) -> &LabelArena {
        &self.arena
    }

    /// Returns the live labels per node after the last call.
    pub fn label_sets(&self) -> &[LabelSet] {
        &self.sets
    }

    /// Runs label setting under the given duals.
    ///
    /// Returns `None` if no resource-feasible path reaches the sink. Among equally cheap sink
    /// labels the first one created wins.
    pub fn solve(&mut self, duals: &DualVector) -> Result<Option<ShortestPath>> {
        check_duals(self.n_items, duals)?;
        self.label(duals);

        let sink = self.graph.sink();
        let best = self.sets[sink].ids().iter().copied().min_by(|&a, &b| {
            let (la, lb) = (self.arena.get(a), self.arena.get(b));
            la.cost().total_cmp(&lb.cost()).then(a.cmp(&b))
        });

        Ok(best.map(|id| {
            let label = self.arena.get(id);
            let arcs = self.arena.path(id);
            let base_cost = arcs.iter().map(|&a| self.graph.arc(a).cost).sum();
            ShortestPath {
                arcs,
                cost: label.cost(),
                base_cost,
                resources: label.resources().to_vec(),
            }
        }))
    }

    /// Counts how often each item is covered along `path`.
    pub fn pattern_of(&self, path: &ShortestPath) -> Pattern {
        let mut pattern = Pattern::empty(self.n_items);
        for item in path.arcs.iter().filter_map(|&a| self.graph.arc(a).item) {
            pattern.add(item);
        }
        pattern
    }

    fn arc_cost(&self, arc: ArcId, duals: &DualVector) -> f64 {
        let arc = self.graph.arc(arc);
        arc.cost - arc.item.and_then(|i| duals.get(i)).unwrap_or(0.0)
    }

    /// Resets the per-call state and extends labels until the worklist is empty.
    fn label(&mut self, duals: &DualVector) {
        let n_nodes = self.graph.n_nodes();
        self.arena.clear();
        self.extended.clear();
        self.sets.clear();
        self.sets.resize(n_nodes, LabelSet::default());

        let source = self.graph.source();
        let initial = Label::initial(source, self.graph.n_resources());
        if !self.graph.is_feasible(initial.resources()) {
            log::trace!("source label violates the resource windows");
            return;
        }

        let mut queued = vec![false; n_nodes];
        let mut worklist = VecDeque::new();
        if self.sets[source].insert(&mut self.arena, initial).is_some() {
            self.extended.push(false);
            queued[source] = true;
            worklist.push_back(source);
        }

        let (mut infeasible, mut rejected) = (0usize, 0usize);
        while let Some(node) = worklist.pop_front() {
            queued[node] = false;

            let pending: Vec<LabelId> = self.sets[node]
                .ids()
                .iter()
                .copied()
                .filter(|id| !self.extended[id.index()])
                .collect();

            for id in pending {
                // a self loop may have pruned it in the meantime
                if self.arena.get(id).is_dominated() {
                    continue;
                }
                self.extended[id.index()] = true;

                for &arc_id in self.graph.outgoing(node) {
                    let arc = self.graph.arc(arc_id);
                    let cost = self.arc_cost(arc_id, duals);
                    let label = self.arena.get(id).extend(id, arc_id, arc, cost);
                    if !self.graph.is_feasible(label.resources()) {
                        infeasible += 1;
                        continue;
                    }

                    let head = arc.to;
                    match self.sets[head].insert(&mut self.arena, label) {
                        Some(_) => {
                            self.extended.resize(self.arena.len(), false);
                            if !queued[head] {
                                queued[head] = true;
                                worklist.push_back(head);
                            }
                        }
                        None => rejected += 1,
                    }
                }
            }

            self.sets[node].sweep(&mut self.arena);
        }

        log::trace!(
            "label setting created {} labels ({} out of window, {} dominated on arrival)",
            self.arena.len(),
            infeasible,
            rejected
        );
    }
}

impl Pricer for SpprcPricer {
    fn n_items(&self) -> usize {
        self.n_items
    }

    fn price(&mut self, duals: &DualVector) -> Result<PricingResult> {
        match self.solve(duals)? {
            Some(path) => {
                let pattern = self.pattern_of(&path);
                Ok(PricingResult::new(
                    pattern,
                    self.column_cost + path.base_cost,
                    duals,
                ))
            }
            None => Ok(PricingResult::new(
                Pattern::empty(self.n_items),
                self.column_cost,
                duals,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knapsack::KnapsackPricer;
    use crate::spprc::graph::{Arc, ResourceWindow};
    use petgraph::algo::dijkstra;
    use petgraph::graph::{DiGraph, NodeIndex};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn chain(window_max: i64) -> Graph {
        Graph::new(
            3,
            vec![
                Arc::new(0, 1, 1.0, vec![2, 1]).covering(0),
                Arc::new(1, 2, 2.0, vec![3, 1]).covering(1),
            ],
            vec![ResourceWindow::new(0, window_max), ResourceWindow::new(0, 10)],
            0,
            2,
        )
        .unwrap()
    }

    #[test]
    fn single_feasible_path() {
        let mut pricer = SpprcPricer::new(chain(5), 2).unwrap();
        let duals = DualVector::new(vec![0.0, 0.0]);
        let path = pricer.solve(&duals).unwrap().unwrap();
        assert_eq!(path.arcs, vec![0, 1]);
        assert_eq!(path.cost, 3.0);
        assert_eq!(path.base_cost, 3.0);
        assert_eq!(path.resources, vec![5, 2]);

        let res = pricer.price(&DualVector::new(vec![0.5, 4.0])).unwrap();
        assert_eq!(res.pattern.counts(), &[1, 1]);
        assert_eq!(res.objective_coefficient, 4.0);
        assert!((res.reduced_cost + 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_path_over_window_is_infeasible() {
        let mut pricer = SpprcPricer::new(chain(4), 2).unwrap();
        let duals = DualVector::new(vec![3.0, 3.0]);
        assert!(pricer.solve(&duals).unwrap().is_none());

        let res = pricer.price(&duals).unwrap();
        assert!(res.pattern.is_empty());
        assert_eq!(res.reduced_cost, 1.0);
        assert!(!res.is_improving(1e-6));
    }

    #[test]
    fn source_outside_window() {
        let graph = Graph::new(
            2,
            vec![Arc::new(0, 1, 0.0, vec![5])],
            vec![ResourceWindow::new(1, 10)],
            0,
            1,
        )
        .unwrap();
        let mut pricer = SpprcPricer::new(graph, 0).unwrap();
        assert!(pricer.solve(&DualVector::default()).unwrap().is_none());
        assert!(pricer.arena().is_empty());
    }

    #[test]
    fn source_is_sink() {
        let graph = Graph::new(1, vec![], vec![ResourceWindow::new(0, 1)], 0, 0).unwrap();
        let mut pricer = SpprcPricer::new(graph, 0).unwrap();
        let path = pricer.solve(&DualVector::default()).unwrap().unwrap();
        assert!(path.arcs.is_empty());
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn resource_window_prunes_cheaper_path() {
        let graph = Graph::from_reader(std::fs::File::open("data/test/spprc_small.json").unwrap())
            .unwrap();
        let mut pricer = SpprcPricer::new(graph, 2).unwrap();
        let path = pricer
            .solve(&DualVector::new(vec![0.0, 0.0]))
            .unwrap()
            .unwrap();
        // 0-1-3 is cheapest but needs 6 units of the second resource
        assert_eq!(path.arcs, vec![0, 4, 3]);
        assert_eq!(path.cost, 2.5);
        assert_eq!(path.resources, vec![4, 4]);

        // a large dual on item 1 makes the same path even more attractive
        let res = pricer.price(&DualVector::new(vec![0.0, 5.0])).unwrap();
        assert_eq!(res.pattern.counts(), &[0, 1]);
        assert_eq!(res.objective_coefficient, 3.5);
        assert!((res.reduced_cost + 1.5).abs() < 1e-12);
    }

    #[test]
    fn keeps_pareto_labels_at_every_node() {
        let mut rng = StdRng::seed_from_u64(23);
        let arcs = (0..40)
            .map(|_| {
                let from = rng.gen_range(0..7);
                let to = rng.gen_range(from + 1..8);
                Arc::new(
                    from,
                    to,
                    rng.gen_range(-3..5) as f64,
                    vec![rng.gen_range(0..4), rng.gen_range(0..4)],
                )
            })
            .collect();
        let graph = Graph::new(
            8,
            arcs,
            vec![ResourceWindow::new(0, 9), ResourceWindow::new(0, 9)],
            0,
            7,
        )
        .unwrap();
        let mut pricer = SpprcPricer::new(graph, 0).unwrap();
        pricer.solve(&DualVector::default()).unwrap();

        for set in pricer.label_sets() {
            assert!(set.is_pareto(pricer.arena()));
            for &id in set.ids() {
                let label = pricer.arena().get(id);
                assert!(!label.is_dominated());
                assert!(pricer.graph().is_feasible(label.resources()));
            }
        }
    }

    #[test]
    fn agrees_with_dijkstra_without_binding_windows() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let n = 12;
            let mut arcs = Vec::new();
            let mut reference = DiGraph::<(), f64>::new();
            let nodes: Vec<NodeIndex> = (0..n).map(|_| reference.add_node(())).collect();
            for _ in 0..40 {
                let (from, to) = (rng.gen_range(0..n), rng.gen_range(0..n));
                let cost = rng.gen_range(0..10) as f64;
                arcs.push(Arc::new(from, to, cost, vec![1]));
                reference.add_edge(nodes[from], nodes[to], cost);
            }
            // arc count as resource: walks longer than n arcs are never shortest
            let graph = Graph::new(n, arcs, vec![ResourceWindow::new(0, n as i64)], 0, n - 1)
                .unwrap();
            let mut pricer = SpprcPricer::new(graph, 0).unwrap();

            let expected = dijkstra(&reference, nodes[0], Some(nodes[n - 1]), |e| *e.weight())
                .get(&nodes[n - 1])
                .copied();
            let found = pricer.solve(&DualVector::default()).unwrap().map(|p| p.cost);
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn arc_flow_matches_knapsack() {
        let instance = CuttingStockInstance::new(&[20, 35, 50, 12], &[1, 1, 1, 1], 100).unwrap();
        let mut spprc = SpprcPricer::for_instance(&instance);
        let mut knapsack = KnapsackPricer::for_instance(&instance);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..30 {
            let duals = DualVector::new((0..4).map(|_| rng.gen_range(-0.1..0.6)).collect());
            let a = spprc.price(&duals).unwrap();
            let b = knapsack.price(&duals).unwrap();
            assert!((a.reduced_cost - b.reduced_cost).abs() < 1e-9);
            assert_eq!(a.objective_coefficient, 1.0);
            assert!(a.pattern.total_width(&instance.widths()) <= instance.capacity());
        }
    }

    #[test]
    fn reduced_cost_identity_holds() {
        let graph = Graph::from_reader(std::fs::File::open("data/test/spprc_small.json").unwrap())
            .unwrap();
        let mut pricer = SpprcPricer::new(graph, 2).unwrap().with_column_cost(2.0);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..50 {
            let duals = DualVector::new(vec![rng.gen_range(-2.0..6.0), rng.gen_range(-2.0..6.0)]);
            let res = pricer.price(&duals).unwrap();
            let value: f64 = res
                .pattern
                .counts()
                .iter()
                .zip(duals.as_slice())
                .map(|(&c, d)| c as f64 * d)
                .sum();
            assert_eq!(res.reduced_cost, res.objective_coefficient - value);
        }
    }

    #[test]
    fn arc_flow_matches_knapsack_on_paper_rolls() {
        let file = std::fs::File::open("data/test/paper_rolls.json").unwrap();
        let instance = CuttingStockInstance::from_reader(file).unwrap();
        let mut spprc = SpprcPricer::for_instance(&instance);
        let mut knapsack = KnapsackPricer::for_instance(&instance);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..30 {
            let duals = DualVector::new((0..10).map(|_| rng.gen_range(0.0..0.5)).collect());
            let a = spprc.price(&duals).unwrap();
            let b = knapsack.price(&duals).unwrap();
            assert!((a.reduced_cost - b.reduced_cost).abs() < 1e-9);
        }
    }

    #[test]
    fn state_is_rebuilt_on_every_call() {
        let instance = CuttingStockInstance::new(&[3, 4], &[1, 1], 10).unwrap();
        let mut reused = SpprcPricer::for_instance(&instance);
        let first = DualVector::new(vec![0.5, 0.1]);
        let second = DualVector::new(vec![0.1, 0.5]);
        reused.price(&first).unwrap();
        let again = reused.price(&second).unwrap();
        let fresh = SpprcPricer::for_instance(&instance).price(&second).unwrap();
        assert_eq!(again, fresh);
        assert_eq!(again.pattern.counts(), &[0, 2]);
    }

    #[test]
    fn rejects_unknown_items_and_bad_duals() {
        assert!(matches!(
            SpprcPricer::new(chain(5), 1),
            Err(Error::InvalidInput(_))
        ));
        let mut pricer = SpprcPricer::new(chain(5), 2).unwrap();
        assert!(matches!(
            pricer.price(&DualVector::new(vec![1.0])),
            Err(Error::DualLengthMismatch {
                expected: 2,
                found: 1
            })
        ));
    }
}
