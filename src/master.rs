use crate::column::{DualVector, Pattern};
use crate::error::{Error, Result};
use crate::instance::CuttingStockInstance;
use crate::status::Status;

/// Handle of a variable owned by a [`MasterProblem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    /// Creates the handle of the `index`-th variable of an adapter.
    pub fn new(index: usize) -> Self {
        VarId(index)
    }

    /// Returns the creation index of the variable.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle of a constraint owned by a [`MasterProblem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsId(usize);

impl ConsId {
    /// Creates the handle of the `index`-th constraint of an adapter.
    pub fn new(index: usize) -> Self {
        ConsId(index)
    }

    /// Returns the creation index of the constraint.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Domain of a master variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// Real-valued, used while generating columns.
    Continuous,
    /// Integer-valued, used by the integer restriction.
    Integer,
}

#[cfg(feature = "scip")]
impl From<VarType> for crate::ffi::SCIP_Vartype {
    fn from(var_type: VarType) -> Self {
        match var_type {
            VarType::Continuous => crate::ffi::SCIP_Vartype_SCIP_VARTYPE_CONTINUOUS,
            VarType::Integer => crate::ffi::SCIP_Vartype_SCIP_VARTYPE_INTEGER,
        }
    }
}

/// A minimisation LP/MIP engine the column generation loop can drive.
///
/// Variables and constraints are only ever added, handles stay valid for the lifetime of the
/// adapter. Values are only readable after a [`MasterProblem::solve`] that ended optimally and
/// before the next modification.
pub trait MasterProblem {
    /// Adds a variable `lb <= x <= ub` with objective coefficient `obj`.
    fn add_variable(
        &mut self,
        name: &str,
        lb: f64,
        ub: f64,
        obj: f64,
        var_type: VarType,
    ) -> Result<VarId>;

    /// Adds the linear constraint `lhs <= Σ coef * var <= rhs`.
    ///
    /// A `modifiable` constraint may receive new coefficients after creation, which is what
    /// covering constraints need when columns are generated.
    fn add_constraint(
        &mut self,
        name: &str,
        terms: &[(VarId, f64)],
        lhs: f64,
        rhs: f64,
        modifiable: bool,
    ) -> Result<ConsId>;

    /// Adds `coef * var` to an existing constraint.
    fn add_coefficient(&mut self, cons: ConsId, var: VarId, coef: f64) -> Result<()>;

    /// Solves the problem and returns its status.
    fn solve(&mut self) -> Result<Status>;

    /// Status of the last solve, [`Status::Other`] if the problem changed since.
    fn status(&self) -> Status;

    /// Objective value of the last solve.
    fn objective(&self) -> Result<f64>;

    /// Dual value of a constraint in the last LP solve.
    fn dual(&self, cons: ConsId) -> Result<f64>;

    /// Value of a variable in the best solution of the last solve.
    fn primal(&self, var: VarId) -> Result<f64>;

    /// Restricts a variable to integer values.
    fn set_integer(&mut self, var: VarId) -> Result<()>;

    /// Value the engine treats as infinite.
    fn infinity(&self) -> f64 {
        f64::INFINITY
    }
}

impl<M: MasterProblem + ?Sized> MasterProblem for Box<M> {
    fn add_variable(
        &mut self,
        name: &str,
        lb: f64,
        ub: f64,
        obj: f64,
        var_type: VarType,
    ) -> Result<VarId> {
        (**self).add_variable(name, lb, ub, obj, var_type)
    }

    fn add_constraint(
        &mut self,
        name: &str,
        terms: &[(VarId, f64)],
        lhs: f64,
        rhs: f64,
        modifiable: bool,
    ) -> Result<ConsId> {
        (**self).add_constraint(name, terms, lhs, rhs, modifiable)
    }

    fn add_coefficient(&mut self, cons: ConsId, var: VarId, coef: f64) -> Result<()> {
        (**self).add_coefficient(cons, var, coef)
    }

    fn solve(&mut self) -> Result<Status> {
        (**self).solve()
    }

    fn status(&self) -> Status {
        (**self).status()
    }

    fn objective(&self) -> Result<f64> {
        (**self).objective()
    }

    fn dual(&self, cons: ConsId) -> Result<f64> {
        (**self).dual(cons)
    }

    fn primal(&self, var: VarId) -> Result<f64> {
        (**self).primal(var)
    }

    fn set_integer(&mut self, var: VarId) -> Result<()> {
        (**self).set_integer(var)
    }

    fn infinity(&self) -> f64 {
        (**self).infinity()
    }
}

/// A column of the restricted master: its variable, the pattern it cuts and its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Master variable of the column.
    pub var: VarId,
    /// Pieces cut per item.
    pub pattern: Pattern,
    /// Objective coefficient.
    pub cost: f64,
}

/// The restricted master problem of a covering model.
///
/// One covering constraint `demand_i <= Σ_j pattern_j[i] * x_j` per item and one non-negative
/// variable per column. Columns are append-only.
#[derive(Debug)]
pub struct RestrictedMaster<M> {
    master: M,
    covering: Vec<ConsId>,
    columns: Vec<Column>,
    integral: bool,
}

impl<M: MasterProblem> RestrictedMaster<M> {
    /// Adds one empty modifiable covering constraint per demand; there are no columns yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `demands` is empty or contains a negative or non-finite
    /// value.
    pub fn new(mut master: M, demands: &[f64]) -> Result<Self> {
        if demands.is_empty() {
            return Err(Error::InvalidInput("no covering constraints".to_string()));
        }
        if let Some(d) = demands.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(Error::InvalidInput(format!("invalid demand {d}")));
        }

        let infinity = master.infinity();
        let covering = demands
            .iter()
            .enumerate()
            .map(|(i, &demand)| {
                master.add_constraint(&format!("demand_{i}"), &[], demand, infinity, true)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RestrictedMaster {
            master,
            covering,
            columns: Vec::new(),
            integral: false,
        })
    }

    /// Builds the master of a cutting-stock instance, seeded with one single-piece roll per item.
    ///
    /// The seed makes the first master feasible whatever the demands.
    pub fn cutting_stock(master: M, instance: &CuttingStockInstance) -> Result<Self> {
        let demands: Vec<f64> = instance.items().iter().map(|i| i.demand as f64).collect();
        let mut restricted = RestrictedMaster::new(master, &demands)?;
        for item in 0..instance.n_items() {
            restricted.add_column(Pattern::single(instance.n_items(), item), 1.0)?;
        }
        Ok(restricted)
    }

    /// Returns the number of covering constraints.
    pub fn n_items(&self) -> usize {
        self.covering.len()
    }

    /// Returns the covering constraint handles, by item.
    pub fn covering(&self) -> &[ConsId] {
        &self.covering
    }

    /// Returns the columns in the order they were added.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns true once [`RestrictedMaster::solve_integer_restriction`] made the columns integer.
    pub fn is_integral(&self) -> bool {
        self.integral
    }

    /// Returns the underlying adapter.
    pub fn master(&self) -> &M {
        &self.master
    }

    /// Returns the underlying adapter, mutably.
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Consumes the restricted master and returns the adapter.
    pub fn into_inner(self) -> M {
        self.master
    }

    /// Adds a column covering `pattern` with objective coefficient `cost`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the pattern is not defined over the master's items.
    pub fn add_column(&mut self, pattern: Pattern, cost: f64) -> Result<VarId> {
        if pattern.n_items() != self.n_items() {
            return Err(Error::InvalidInput(format!(
                "pattern over {} items added to a master with {} items",
                pattern.n_items(),
                self.n_items()
            )));
        }

        let infinity = self.master.infinity();
        let var = self.master.add_variable(
            &pattern.var_name(),
            0.0,
            infinity,
            cost,
            VarType::Continuous,
        )?;
        for (item, count) in pattern.nonzeros() {
            self.master
                .add_coefficient(self.covering[item], var, count as f64)?;
        }
        self.columns.push(Column { var, pattern, cost });
        Ok(var)
    }

    /// Solves the master and returns its status.
    pub fn solve(&mut self) -> Result<Status> {
        self.master.solve()
    }

    /// Returns the objective value of the last solve.
    pub fn objective(&self) -> Result<f64> {
        self.master.objective()
    }

    /// Reads the dual of every covering constraint, in item order.
    pub fn duals(&self) -> Result<DualVector> {
        let values = self
            .covering
            .iter()
            .map(|&cons| self.master.dual(cons))
            .collect::<Result<Vec<_>>>()?;
        Ok(DualVector::new(values))
    }

    /// Reads the value of every column, in column order.
    pub fn solution(&self) -> Result<Vec<f64>> {
        self.columns
            .iter()
            .map(|col| self.master.primal(col.var))
            .collect()
    }

    /// Makes every column integer, solves again and returns the objective.
    ///
    /// This only restricts the columns generated so far, the result is an upper bound on the
    /// integer optimum. It ends the LP phase of the master: the switch is permanent and
    /// [`ColumnGenerator::generate`](crate::ColumnGenerator::generate) refuses to price it again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MasterNotSolved`] if the integer problem is not solved to optimality.
    pub fn solve_integer_restriction(&mut self) -> Result<f64> {
        self.integral = true;
        for col in &self.columns {
            self.master.set_integer(col.var)?;
        }
        let status = self.master.solve()?;
        if !status.is_optimal() {
            return Err(Error::MasterNotSolved(status));
        }
        self.master.objective()
    }
}
