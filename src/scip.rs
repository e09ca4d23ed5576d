use crate::column::{DualVector, Pattern};
use crate::error::{Error, Result};
use crate::ffi;
use crate::master::{ConsId, MasterProblem, RestrictedMaster, VarId, VarType};
use crate::pricer::{Pricer, PricingResult};
use crate::retcode::{scip_call, Retcode};
use crate::status::Status;
use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;

/// Owner of a SCIP instance, of one reference to every variable and constraint created through it
/// and of the data of the included pricers.
#[derive(Debug)]
pub(crate) struct ScipPtr {
    pub(crate) raw: *mut ffi::SCIP,
    vars: Vec<*mut ffi::SCIP_VAR>,
    conss: Vec<*mut ffi::SCIP_CONS>,
    plugins: Vec<*mut PricingPlugin>,
}

impl ScipPtr {
    pub(crate) fn new() -> std::result::Result<Self, Retcode> {
        let mut scip_ptr = MaybeUninit::uninit();
        scip_call!(ffi::SCIPcreate(scip_ptr.as_mut_ptr()));
        let scip_ptr = unsafe { scip_ptr.assume_init() };
        Ok(ScipPtr {
            raw: scip_ptr,
            vars: Vec::new(),
            conss: Vec::new(),
            plugins: Vec::new(),
        })
    }

    pub(crate) fn include_default_plugins(&self) -> std::result::Result<(), Retcode> {
        scip_call!(ffi::SCIPincludeDefaultPlugins(self.raw));
        Ok(())
    }

    pub(crate) fn set_int_param(&self, param: &CStr, value: i32) -> std::result::Result<(), Retcode> {
        scip_call! { ffi::SCIPsetIntParam(self.raw, param.as_ptr(), value) };
        Ok(())
    }

    /// Turns off everything that would make the solved problem differ from the stated LP.
    pub(crate) fn set_pure_lp(&self) -> std::result::Result<(), Retcode> {
        let off = ffi::SCIP_ParamSetting_SCIP_PARAMSETTING_OFF;
        scip_call! { ffi::SCIPsetPresolving(self.raw, off, true.into()) };
        scip_call! { ffi::SCIPsetHeuristics(self.raw, off, true.into()) };
        scip_call! { ffi::SCIPsetSeparating(self.raw, off, true.into()) };
        self.set_int_param(c"propagating/maxrounds", 0)?;
        self.set_int_param(c"propagating/maxroundsroot", 0)?;
        Ok(())
    }

    pub(crate) fn create_prob(&self, name: &CStr) -> std::result::Result<(), Retcode> {
        scip_call!(ffi::SCIPcreateProbBasic(self.raw, name.as_ptr()));
        scip_call!(ffi::SCIPsetObjsense(
            self.raw,
            ffi::SCIP_Objsense_SCIP_OBJSENSE_MINIMIZE
        ));
        Ok(())
    }

    pub(crate) fn stage(&self) -> ffi::SCIP_Stage {
        unsafe { ffi::SCIPgetStage(self.raw) }
    }

    /// Drops the transformed problem so the original one can be modified again.
    pub(crate) fn free_transform(&self) -> std::result::Result<(), Retcode> {
        if self.stage() > ffi::SCIP_Stage_SCIP_STAGE_PROBLEM {
            scip_call!(ffi::SCIPfreeTransform(self.raw));
        }
        Ok(())
    }

    pub(crate) fn n_vars(&self) -> usize {
        self.vars.len()
    }

    pub(crate) fn n_conss(&self) -> usize {
        self.conss.len()
    }

    pub(crate) fn var(&self, var: VarId) -> Option<*mut ffi::SCIP_VAR> {
        self.vars.get(var.index()).copied()
    }

    pub(crate) fn cons(&self, cons: ConsId) -> Option<*mut ffi::SCIP_CONS> {
        self.conss.get(cons.index()).copied()
    }

    pub(crate) fn create_var(
        &mut self,
        name: &CStr,
        lb: f64,
        ub: f64,
        obj: f64,
        var_type: VarType,
    ) -> std::result::Result<VarId, Retcode> {
        let mut var_ptr = MaybeUninit::uninit();
        scip_call! { ffi::SCIPcreateVarBasic(
            self.raw,
            var_ptr.as_mut_ptr(),
            name.as_ptr(),
            lb,
            ub,
            obj,
            var_type.into(),
        ) };
        let var_ptr = unsafe { var_ptr.assume_init() };
        // keep the creation reference, released on drop
        self.vars.push(var_ptr);
        scip_call! { ffi::SCIPaddVar(self.raw, var_ptr) };
        Ok(VarId::new(self.vars.len() - 1))
    }

    pub(crate) fn create_cons(
        &mut self,
        name: &CStr,
        terms: &[(*mut ffi::SCIP_VAR, f64)],
        lhs: f64,
        rhs: f64,
        modifiable: bool,
    ) -> std::result::Result<ConsId, Retcode> {
        let mut scip_cons = MaybeUninit::uninit();
        scip_call! { ffi::SCIPcreateConsBasicLinear(
            self.raw,
            scip_cons.as_mut_ptr(),
            name.as_ptr(),
            0,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            lhs,
            rhs,
        ) };
        let scip_cons = unsafe { scip_cons.assume_init() };
        self.conss.push(scip_cons);
        for &(var, coef) in terms {
            scip_call! { ffi::SCIPaddCoefLinear(self.raw, scip_cons, var, coef) };
        }
        scip_call!(ffi::SCIPsetConsModifiable(
            self.raw,
            scip_cons,
            modifiable.into()
        ));
        scip_call! { ffi::SCIPaddCons(self.raw, scip_cons) };
        Ok(ConsId::new(self.conss.len() - 1))
    }

    pub(crate) fn add_cons_coef(
        &self,
        cons: *mut ffi::SCIP_CONS,
        var: *mut ffi::SCIP_VAR,
        coef: f64,
    ) -> std::result::Result<(), Retcode> {
        scip_call! { ffi::SCIPaddCoefLinear(self.raw, cons, var, coef) };
        Ok(())
    }

    pub(crate) fn chg_var_type(
        &self,
        var: *mut ffi::SCIP_VAR,
        var_type: VarType,
    ) -> std::result::Result<(), Retcode> {
        let mut infeasible = MaybeUninit::uninit();
        scip_call! { ffi::SCIPchgVarType(self.raw, var, var_type.into(), infeasible.as_mut_ptr()) };
        Ok(())
    }

    pub(crate) fn solve(&self) -> std::result::Result<(), Retcode> {
        scip_call!(ffi::SCIPsolve(self.raw));
        Ok(())
    }

    pub(crate) fn status(&self) -> Status {
        let status = unsafe { ffi::SCIPgetStatus(self.raw) };
        status.into()
    }

    pub(crate) fn n_sols(&self) -> usize {
        unsafe { ffi::SCIPgetNSols(self.raw) as usize }
    }

    pub(crate) fn best_sol(&self) -> Option<*mut ffi::SCIP_SOL> {
        if self.n_sols() == 0 {
            return None;
        }
        Some(unsafe { ffi::SCIPgetBestSol(self.raw) })
    }

    pub(crate) fn obj_val(&self) -> f64 {
        unsafe { ffi::SCIPgetPrimalbound(self.raw) }
    }

    pub(crate) fn sol_val(&self, sol: *mut ffi::SCIP_SOL, var: *mut ffi::SCIP_VAR) -> f64 {
        unsafe { ffi::SCIPgetSolVal(self.raw, sol, var) }
    }

    /// Dual of a linear constraint, read from its transformed counterpart.
    pub(crate) fn dual_linear(&self, cons: *mut ffi::SCIP_CONS) -> std::result::Result<f64, Retcode> {
        let mut transformed = MaybeUninit::<*mut ffi::SCIP_CONS>::uninit();
        scip_call!(ffi::SCIPgetTransformedCons(
            self.raw,
            cons,
            transformed.as_mut_ptr()
        ));
        let transformed = unsafe { transformed.assume_init() };
        if transformed.is_null() {
            return Err(Retcode::InvalidCall);
        }
        Ok(unsafe { ffi::SCIPgetDualsolLinear(self.raw, transformed) })
    }

    pub(crate) fn infinity(&self) -> f64 {
        unsafe { ffi::SCIPinfinity(self.raw) }
    }

    /// Includes and activates a pricer whose callbacks work on `plugin`.
    ///
    /// The plugin data stays owned by `self` and is freed after the SCIP instance.
    pub(crate) fn include_pricer(
        &mut self,
        name: &CStr,
        desc: &CStr,
        plugin: PricingPlugin,
    ) -> std::result::Result<*mut PricingPlugin, Retcode> {
        unsafe extern "C" fn pricerinit(
            scip: *mut ffi::SCIP,
            pricer: *mut ffi::SCIP_PRICER,
        ) -> ffi::SCIP_Retcode {
            let Some(plugin) = (unsafe { plugin_of(pricer) }) else {
                return Retcode::InvalidData.into();
            };
            match plugin.init(scip) {
                Ok(()) => Retcode::Okay.into(),
                Err(retcode) => retcode.into(),
            }
        }

        unsafe extern "C" fn pricerredcost(
            scip: *mut ffi::SCIP,
            pricer: *mut ffi::SCIP_PRICER,
            _lowerbound: *mut f64,
            _stopearly: *mut ::std::os::raw::c_uint,
            result: *mut ffi::SCIP_RESULT,
        ) -> ffi::SCIP_Retcode {
            unsafe { call_pricer(scip, pricer, result, false) }
        }

        unsafe extern "C" fn pricerfarkas(
            scip: *mut ffi::SCIP,
            pricer: *mut ffi::SCIP_PRICER,
            result: *mut ffi::SCIP_RESULT,
        ) -> ffi::SCIP_Retcode {
            unsafe { call_pricer(scip, pricer, result, true) }
        }

        let plugin_ptr = Box::into_raw(Box::new(plugin));
        self.plugins.push(plugin_ptr);

        scip_call!(ffi::SCIPincludePricer(
            self.raw,
            name.as_ptr(),
            desc.as_ptr(),
            0,
            false.into(),
            None,
            None,
            Some(pricerinit),
            None,
            None,
            None,
            Some(pricerredcost),
            Some(pricerfarkas),
            plugin_ptr as *mut ffi::SCIP_PricerData,
        ));
        let pricer = unsafe { ffi::SCIPfindPricer(self.raw, name.as_ptr()) };
        if pricer.is_null() {
            return Err(Retcode::PluginNotFound);
        }
        scip_call!(ffi::SCIPactivatePricer(self.raw, pricer));
        Ok(plugin_ptr)
    }
}

/// Data behind the pricer plugin: the wrapped oracle and the covering constraints it prices for.
pub(crate) struct PricingPlugin {
    pricer: Box<dyn Pricer>,
    tolerance: f64,
    covering: Vec<*mut ffi::SCIP_CONS>,
    transformed: Vec<*mut ffi::SCIP_CONS>,
    priced: Vec<Pattern>,
    error: Option<Error>,
}

impl PricingPlugin {
    fn new(pricer: Box<dyn Pricer>, covering: Vec<*mut ffi::SCIP_CONS>, tolerance: f64) -> Self {
        PricingPlugin {
            pricer,
            tolerance,
            covering,
            transformed: Vec::new(),
            priced: Vec::new(),
            error: None,
        }
    }

    /// Runs once per transformation, priced columns of an earlier solve are gone by then.
    fn init(&mut self, scip: *mut ffi::SCIP) -> std::result::Result<(), Retcode> {
        self.transformed.clear();
        self.priced.clear();
        for &cons in &self.covering {
            let mut transformed = MaybeUninit::<*mut ffi::SCIP_CONS>::uninit();
            scip_call!(ffi::SCIPgetTransformedCons(
                scip,
                cons,
                transformed.as_mut_ptr()
            ));
            let transformed = unsafe { transformed.assume_init() };
            if transformed.is_null() {
                return Err(Retcode::InvalidCall);
            }
            self.transformed.push(transformed);
        }
        Ok(())
    }

    fn price(&mut self, scip: *mut ffi::SCIP, farkas: bool) -> Result<()> {
        let values = self
            .transformed
            .iter()
            .map(|&cons| unsafe {
                if farkas {
                    ffi::SCIPgetDualfarkasLinear(scip, cons)
                } else {
                    ffi::SCIPgetDualsolLinear(scip, cons)
                }
            })
            .collect();
        let duals = DualVector::new(values);

        let result = self.pricer.price(&duals)?;
        if result.pattern.n_items() != self.transformed.len() {
            return Err(Error::InvalidInput(format!(
                "pricer returned a pattern over {} items for {} covering constraints",
                result.pattern.n_items(),
                self.transformed.len()
            )));
        }
        let accepted = if farkas {
            result.repairs_infeasibility(&duals, self.tolerance)
        } else {
            result.is_improving(self.tolerance)
        };
        log::debug!(
            "{} pricing: column {} with reduced cost {:.6}{}",
            if farkas { "farkas" } else { "redcost" },
            result.pattern,
            result.reduced_cost,
            if accepted { ", added" } else { "" }
        );
        if accepted {
            self.add_priced_column(scip, &result)?;
            self.priced.push(result.pattern);
        }
        Ok(())
    }

    fn add_priced_column(&self, scip: *mut ffi::SCIP, result: &PricingResult) -> Result<()> {
        let name = c_name(&result.pattern.var_name())?;
        let mut var = MaybeUninit::uninit();
        scip_call! { ffi::SCIPcreateVarBasic(
            scip,
            var.as_mut_ptr(),
            name.as_ptr(),
            0.0,
            ffi::SCIPinfinity(scip),
            result.objective_coefficient,
            VarType::Continuous.into(),
        ) };
        let mut var = unsafe { var.assume_init() };
        scip_call!(ffi::SCIPaddPricedVar(scip, var, 1.0));
        for (item, count) in result.pattern.nonzeros() {
            scip_call!(ffi::SCIPaddCoefLinear(
                scip,
                self.transformed[item],
                var,
                count as f64
            ));
        }
        scip_call!(ffi::SCIPreleaseVar(scip, &mut var));
        Ok(())
    }
}

unsafe fn plugin_of<'a>(pricer: *mut ffi::SCIP_PRICER) -> Option<&'a mut PricingPlugin> {
    let data_ptr = unsafe { ffi::SCIPpricerGetData(pricer) } as *mut PricingPlugin;
    unsafe { data_ptr.as_mut() }
}

unsafe fn call_pricer(
    scip: *mut ffi::SCIP,
    pricer: *mut ffi::SCIP_PRICER,
    result: *mut ffi::SCIP_RESULT,
    farkas: bool,
) -> ffi::SCIP_Retcode {
    let Some(plugin) = (unsafe { plugin_of(pricer) }) else {
        return Retcode::InvalidData.into();
    };
    match plugin.price(scip, farkas) {
        Ok(()) => {
            unsafe { *result = ffi::SCIP_Result_SCIP_SUCCESS };
            Retcode::Okay.into()
        }
        Err(err) => {
            log::error!("pricing inside the solver failed: {err}");
            plugin.error = Some(err);
            Retcode::Error.into()
        }
    }
}

impl Drop for ScipPtr {
    fn drop(&mut self) {
        // release the references taken at creation before freeing the instance
        for var in self.vars.iter_mut() {
            let retcode = Retcode::from(unsafe { ffi::SCIPreleaseVar(self.raw, var) });
            if retcode != Retcode::Okay {
                log::warn!("releasing a variable failed with {retcode:?}");
            }
        }
        for cons in self.conss.iter_mut() {
            let retcode = Retcode::from(unsafe { ffi::SCIPreleaseCons(self.raw, cons) });
            if retcode != Retcode::Okay {
                log::warn!("releasing a constraint failed with {retcode:?}");
            }
        }
        unsafe { ffi::SCIPfree(&mut self.raw) };
        for plugin in self.plugins.drain(..) {
            drop(unsafe { Box::from_raw(plugin) });
        }
    }
}

/// Master problem adapter over SCIP, set up as a plain LP solver.
///
/// Presolving, heuristics, separation and propagation are switched off so that the duals read
/// after a solve belong to the constraints exactly as they were added. Output is hidden unless
/// [`ScipMaster::show_output`] is called. Modifying the problem after a solve frees the
/// transformed problem first, so the master can be solved again and again as columns come in.
/// Alternatively a [`Pricer`] can be included with [`ScipMaster::include_pricer`], SCIP then
/// generates the columns itself during the solve.
///
/// # Example
///
/// ```
/// use colgen::prelude::*;
///
/// let mut master = ScipMaster::new("lp").unwrap();
/// let x = master.add_variable("x", 0.0, 10.0, 1.0, VarType::Continuous).unwrap();
/// let inf = master.infinity();
/// let cons = master.add_constraint("c", &[(x, 2.0)], 3.0, inf, false).unwrap();
/// assert_eq!(master.solve().unwrap(), Status::Optimal);
/// assert!((master.objective().unwrap() - 1.5).abs() < 1e-9);
/// assert!((master.dual(cons).unwrap() - 0.5).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct ScipMaster {
    scip: ScipPtr,
    solved: bool,
    plugin: Option<*mut PricingPlugin>,
}

impl ScipMaster {
    /// Creates an empty minimisation problem called `name`.
    pub fn new(name: &str) -> Result<Self> {
        let name = c_name(name)?;
        let scip = ScipPtr::new()?;
        scip.include_default_plugins()?;
        scip.create_prob(&name)?;
        scip.set_pure_lp()?;
        scip.set_int_param(c"display/verblevel", 0)?;
        Ok(ScipMaster {
            scip,
            solved: false,
            plugin: None,
        })
    }

    /// Lets SCIP print its log to the console again.
    pub fn show_output(self) -> Result<Self> {
        self.scip.set_int_param(c"display/verblevel", 4)?;
        Ok(self)
    }

    /// Returns the number of variables added so far.
    pub fn n_vars(&self) -> usize {
        self.scip.n_vars()
    }

    /// Returns the number of constraints added so far.
    pub fn n_conss(&self) -> usize {
        self.scip.n_conss()
    }

    /// Hands `pricer` to SCIP so that it prices columns for the `covering` constraints from
    /// inside the LP loop of every following [`MasterProblem::solve`].
    ///
    /// In reduced cost pricing a column is added when its reduced cost is below `-tolerance`. When
    /// the LP is infeasible the pricer receives the Farkas multipliers instead and its column is
    /// added when it cuts off the infeasibility proof. Priced columns only exist in the solve that
    /// produced them, see [`ScipMaster::priced_patterns`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a pricer is already included or the pricer does not
    /// know one item per covering constraint.
    pub fn include_pricer(
        &mut self,
        pricer: Box<dyn Pricer>,
        covering: &[ConsId],
        tolerance: f64,
    ) -> Result<()> {
        if self.plugin.is_some() {
            return Err(Error::InvalidInput("a pricer is already included".to_string()));
        }
        if pricer.n_items() != covering.len() {
            return Err(Error::InvalidInput(format!(
                "pricer knows {} items, {} covering constraints given",
                pricer.n_items(),
                covering.len()
            )));
        }
        let covering = covering
            .iter()
            .map(|&cons| self.cons_ptr(cons))
            .collect::<Result<Vec<_>>>()?;

        self.modify()?;
        let plugin = PricingPlugin::new(pricer, covering, tolerance);
        let plugin = self
            .scip
            .include_pricer(c"colgen", c"column pricing through a colgen oracle", plugin)?;
        self.plugin = Some(plugin);
        Ok(())
    }

    /// Returns the patterns the included pricer added during the last solve, in pricing order.
    pub fn priced_patterns(&self) -> &[Pattern] {
        match self.plugin {
            Some(plugin) => unsafe { (*plugin).priced.as_slice() },
            None => &[],
        }
    }

    fn take_pricing_error(&mut self) -> Option<Error> {
        self.plugin.and_then(|plugin| unsafe { (*plugin).error.take() })
    }

    fn var_ptr(&self, var: VarId) -> Result<*mut ffi::SCIP_VAR> {
        self.scip.var(var).ok_or(Error::UnknownVariable(var))
    }

    fn cons_ptr(&self, cons: ConsId) -> Result<*mut ffi::SCIP_CONS> {
        self.scip.cons(cons).ok_or(Error::UnknownConstraint(cons))
    }

    fn modify(&mut self) -> Result<()> {
        self.scip.free_transform()?;
        self.solved = false;
        Ok(())
    }

    fn check_solved(&self) -> Result<()> {
        if !self.solved {
            return Err(Error::NoSolution);
        }
        let status = self.scip.status();
        if !status.is_optimal() {
            return Err(Error::MasterNotSolved(status));
        }
        Ok(())
    }
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidInput(format!("name {name:?} contains a NUL byte")))
}

impl MasterProblem for ScipMaster {
    fn add_variable(
        &mut self,
        name: &str,
        lb: f64,
        ub: f64,
        obj: f64,
        var_type: VarType,
    ) -> Result<VarId> {
        if lb > ub {
            return Err(Error::InvalidInput(format!(
                "variable {name} has lower bound {lb} above upper bound {ub}"
            )));
        }
        let name = c_name(name)?;
        self.modify()?;
        Ok(self.scip.create_var(&name, lb, ub, obj, var_type)?)
    }

    fn add_constraint(
        &mut self,
        name: &str,
        terms: &[(VarId, f64)],
        lhs: f64,
        rhs: f64,
        modifiable: bool,
    ) -> Result<ConsId> {
        if lhs > rhs {
            return Err(Error::InvalidInput(format!(
                "constraint {name} has lhs {lhs} above rhs {rhs}"
            )));
        }
        let name = c_name(name)?;
        let terms = terms
            .iter()
            .map(|&(var, coef)| Ok((self.var_ptr(var)?, coef)))
            .collect::<Result<Vec<_>>>()?;
        self.modify()?;
        Ok(self.scip.create_cons(&name, &terms, lhs, rhs, modifiable)?)
    }

    fn add_coefficient(&mut self, cons: ConsId, var: VarId, coef: f64) -> Result<()> {
        let cons = self.cons_ptr(cons)?;
        let var = self.var_ptr(var)?;
        self.modify()?;
        Ok(self.scip.add_cons_coef(cons, var, coef)?)
    }

    fn solve(&mut self) -> Result<Status> {
        if let Err(retcode) = self.scip.solve() {
            return Err(self.take_pricing_error().unwrap_or(Error::Scip(retcode)));
        }
        self.solved = true;
        Ok(self.scip.status())
    }

    fn status(&self) -> Status {
        if self.solved {
            self.scip.status()
        } else {
            Status::Other
        }
    }

    fn objective(&self) -> Result<f64> {
        self.check_solved()?;
        Ok(self.scip.obj_val())
    }

    fn dual(&self, cons: ConsId) -> Result<f64> {
        let cons = self.cons_ptr(cons)?;
        self.check_solved()?;
        Ok(self.scip.dual_linear(cons)?)
    }

    fn primal(&self, var: VarId) -> Result<f64> {
        let var = self.var_ptr(var)?;
        self.check_solved()?;
        let sol = self.scip.best_sol().ok_or(Error::NoSolution)?;
        Ok(self.scip.sol_val(sol, var))
    }

    fn set_integer(&mut self, var: VarId) -> Result<()> {
        let var = self.var_ptr(var)?;
        self.modify()?;
        Ok(self.scip.chg_var_type(var, VarType::Integer)?)
    }

    fn infinity(&self) -> f64 {
        self.scip.infinity()
    }
}

impl RestrictedMaster<ScipMaster> {
    /// Lets SCIP call `pricer` on the covering constraints during every solve, instead of running
    /// the explicit loop of [`ColumnGenerator`](crate::ColumnGenerator).
    ///
    /// A single [`RestrictedMaster::solve`] then returns the LP bound over all columns the pricer
    /// can produce. See [`ScipMaster::include_pricer`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the tolerance is negative or not finite, or if the
    /// pricer does not match the master.
    pub fn price_in_solver<P: Pricer + 'static>(&mut self, pricer: P, tolerance: f64) -> Result<()> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::InvalidInput(format!(
                "tolerance must be finite and non-negative, got {tolerance}"
            )));
        }
        let covering = self.covering().to_vec();
        self.master_mut()
            .include_pricer(Box::new(pricer), &covering, tolerance)
    }
}
