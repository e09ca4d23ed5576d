use crate::spprc::label::{Label, LabelArena, LabelId, LabelSet};

/// Returns true if `l1` dominates `l2`: no more expensive and no more resource in any dimension.
///
/// This is a preorder; equal labels dominate each other.
pub fn dominates(l1: &Label, l2: &Label) -> bool {
    l1.cost() <= l2.cost()
        && l1
            .resources()
            .iter()
            .zip(l2.resources())
            .all(|(r1, r2)| r1 <= r2)
}

impl LabelSet {
    /// Inserts `label` unless a live label dominates it, then prunes the labels it dominates.
    ///
    /// Returns the id of the stored label, or `None` if it was rejected. Rejected labels never
    /// enter the arena; pruned labels are flagged as dominated and leave the set.
    pub fn insert(&mut self, arena: &mut LabelArena, label: Label) -> Option<LabelId> {
        if self.live.iter().any(|&id| dominates(arena.get(id), &label)) {
            return None;
        }

        let id = arena.push(label);
        let mut i = 0;
        while i < self.live.len() {
            let other = self.live[i];
            if dominates(arena.get(id), arena.get(other)) {
                arena.mark_dominated(other);
                self.live.swap_remove(i);
            } else {
                i += 1;
            }
        }
        self.live.push(id);
        Some(id)
    }

    /// Pairwise dominance pass over the live labels; returns how many were removed.
    ///
    /// Of two mutually dominating labels the older one survives.
    pub fn sweep(&mut self, arena: &mut LabelArena) -> usize {
        let n = self.live.len();
        for i in 0..n {
            if arena.get(self.live[i]).is_dominated() {
                continue;
            }
            for j in (i + 1)..n {
                let (a, b) = (self.live[i], self.live[j]);
                if arena.get(b).is_dominated() {
                    continue;
                }
                let keep_older = if a < b { (a, b) } else { (b, a) };
                if dominates(arena.get(keep_older.0), arena.get(keep_older.1)) {
                    arena.mark_dominated(keep_older.1);
                } else if dominates(arena.get(keep_older.1), arena.get(keep_older.0)) {
                    arena.mark_dominated(keep_older.0);
                }
                if arena.get(a).is_dominated() {
                    break;
                }
            }
        }
        let before = self.live.len();
        self.live.retain(|&id| !arena.get(id).is_dominated());
        before - self.live.len()
    }

    /// Returns true if no two live labels dominate one another.
    pub fn is_pareto(&self, arena: &LabelArena) -> bool {
        self.live.iter().enumerate().all(|(i, &a)| {
            self.live[i + 1..].iter().all(|&b| {
                !dominates(arena.get(a), arena.get(b)) && !dominates(arena.get(b), arena.get(a))
            })
        })
    }
}
