use crate::spprc::graph::{Arc, ArcId, NodeId};

/// Index of a label in a [`LabelArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(usize);

impl LabelId {
    /// Returns the position of the label in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A partial path from the source, summarised by its end node, resources and cost.
///
/// Labels never change after creation, except for the dominated flag which only ever goes from
/// `false` to `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    node: NodeId,
    resources: Vec<i64>,
    cost: f64,
    predecessor: Option<LabelId>,
    arc: Option<ArcId>,
    dominated: bool,
}

impl Label {
    /// Creates the label of the empty path at `source`.
    pub fn initial(source: NodeId, n_resources: usize) -> Self {
        Label {
            node: source,
            resources: vec![0; n_resources],
            cost: 0.0,
            predecessor: None,
            arc: None,
            dominated: false,
        }
    }

    /// Creates a label from raw parts, mostly useful to exercise dominance directly.
    pub fn from_parts(node: NodeId, resources: Vec<i64>, cost: f64) -> Self {
        Label {
            node,
            resources,
            cost,
            predecessor: None,
            arc: None,
            dominated: false,
        }
    }

    /// Extends the label stored as `id` along `arc`, whose dual-weighted cost is `arc_cost`.
    ///
    /// Resources saturate instead of wrapping, a saturated value never fits a bounded window.
    pub fn extend(&self, id: LabelId, arc_id: ArcId, arc: &Arc, arc_cost: f64) -> Label {
        let resources = self
            .resources
            .iter()
            .zip(&arc.consumption)
            .map(|(&r, &c)| r.saturating_add(c))
            .collect();
        Label {
            node: arc.to,
            resources,
            cost: self.cost + arc_cost,
            predecessor: Some(id),
            arc: Some(arc_id),
            dominated: false,
        }
    }

    /// Returns the node the path ends in.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the accumulated resource consumption.
    pub fn resources(&self) -> &[i64] {
        &self.resources
    }

    /// Returns the accumulated dual-weighted cost.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Returns the label this one was extended from.
    pub fn predecessor(&self) -> Option<LabelId> {
        self.predecessor
    }

    /// Returns the arc this label was extended along.
    pub fn arc(&self) -> Option<ArcId> {
        self.arc
    }

    /// Returns true once the label has been dominated.
    pub fn is_dominated(&self) -> bool {
        self.dominated
    }
}

/// Owns every label created during one pricing call; predecessors are indices into it.
#[derive(Debug, Default, Clone)]
pub struct LabelArena {
    labels: Vec<Label>,
}

impl LabelArena {
    /// Drops all labels, keeping the allocation for the next call.
    pub fn clear(&mut self) {
        self.labels.clear();
    }

    /// Stores a label and returns its id.
    pub fn push(&mut self, label: Label) -> LabelId {
        self.labels.push(label);
        LabelId(self.labels.len() - 1)
    }

    /// Returns the label with the given id.
    pub fn get(&self, id: LabelId) -> &Label {
        &self.labels[id.0]
    }

    /// Flags a label as dominated. There is no way back.
    pub fn mark_dominated(&mut self, id: LabelId) {
        self.labels[id.0].dominated = true;
    }

    /// Returns the number of labels created so far.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if no label has been created.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the arcs of the path ending in `id`, from the source onwards.
    pub fn path(&self, id: LabelId) -> Vec<ArcId> {
        let mut arcs = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let label = self.get(id);
            arcs.extend(label.arc);
            current = label.predecessor;
        }
        arcs.reverse();
        arcs
    }
}

/// The live labels of one node, in insertion order up to swap removals.
#[derive(Debug, Default, Clone)]
pub struct LabelSet {
    pub(crate) live: Vec<LabelId>,
}

impl LabelSet {
    /// Returns the ids of the live labels.
    pub fn ids(&self) -> &[LabelId] {
        &self.live
    }

    /// Returns the number of live labels.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if the node holds no live label.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
