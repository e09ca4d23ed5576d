use std::fmt;

/// How many pieces of each item one column cuts.
///
/// Counts are indexed by item and are non-negative by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pattern {
    counts: Vec<usize>,
}

impl Pattern {
    /// Creates the pattern that cuts nothing.
    pub fn empty(n_items: usize) -> Self {
        Pattern {
            counts: vec![0; n_items],
        }
    }

    /// Creates a pattern from per-item counts.
    pub fn from_counts(counts: Vec<usize>) -> Self {
        Pattern { counts }
    }

    /// Creates the pattern holding exactly one piece of `item`.
    pub fn single(n_items: usize, item: usize) -> Self {
        let mut pattern = Pattern::empty(n_items);
        pattern.add(item);
        pattern
    }

    pub(crate) fn add(&mut self, item: usize) {
        self.counts[item] += 1;
    }

    /// Returns the per-item counts.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Returns how often `item` is cut.
    pub fn count(&self, item: usize) -> usize {
        self.counts.get(item).copied().unwrap_or(0)
    }

    /// Returns the number of item types the pattern is defined over.
    pub fn n_items(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no piece is cut.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Iterates over `(item, count)` for the items that are actually cut.
    pub fn nonzeros(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(i, &c)| (i, c))
    }

    /// Returns `Σ count[i] * widths[i]`.
    pub fn total_width(&self, widths: &[usize]) -> usize {
        self.counts.iter().zip(widths).map(|(c, w)| c * w).sum()
    }

    /// Returns `Σ count[i] * duals[i]`, the dual-weighted value of the pattern.
    pub fn dual_value(&self, duals: &DualVector) -> f64 {
        self.counts
            .iter()
            .zip(duals.as_slice())
            .map(|(&c, d)| c as f64 * d)
            .sum()
    }

    /// Returns a name usable for the master variable, e.g. `pattern_2-0-1`.
    pub fn var_name(&self) -> String {
        let counts = self
            .counts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("-");
        format!("pattern_{counts}")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (n, (item, count)) in self.nonzeros().enumerate() {
            if n > 0 {
                write!(f, " ")?;
            }
            write!(f, "{count}x{item}")?;
        }
        write!(f, "]")
    }
}

/// One dual value per covering constraint, refreshed after every master solve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DualVector(Vec<f64>);

impl DualVector {
    /// Wraps the given values.
    pub fn new(values: Vec<f64>) -> Self {
        DualVector(values)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the dual of covering constraint `item`.
    pub fn get(&self, item: usize) -> Option<f64> {
        self.0.get(item).copied()
    }

    /// Returns the values as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for DualVector {
    fn from(values: Vec<f64>) -> Self {
        DualVector(values)
    }
}

/// Reduced cost of a column, `objective_coefficient − Σ duals[i] * pattern[i]`.
///
/// Under minimization the column improves the master iff the result is below `−tolerance`.
pub fn reduced_cost(objective_coefficient: f64, duals: &DualVector, pattern: &Pattern) -> f64 {
    objective_coefficient - pattern.dual_value(duals)
}
