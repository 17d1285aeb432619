//! The evaluation engine: owns the equations, the symbol table and the
//! dependency graph, and drives ordered recomputation.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::cell_id::EquationId;
use crate::classify::classify;
use crate::dep_graph::DepGraph;
use crate::equation::{Equation, EvalType, Position, VisType};
use crate::error::{CellError, EngineError, EvaluationError};
use crate::events::{EngineEvent, EventCallback};
use crate::formula::{BuiltinSet, Evaluator, NumericEvaluator, PlotDomain, PlotSampler, SampleSet};
use crate::recalc::{CellRecalcInfo, RecalcError, RecalcReport};
use crate::record::CellRecord;
use crate::symbols::{Binding, SymbolTable};

/// Default quiescence interval for the change scheduler.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(300);

/// Engine tuning. Usually built from user settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Names never treated as variable references.
    pub builtins: BuiltinSet,
    /// Domain used for plots without a `| start, end, samples` suffix.
    pub plot_domain: PlotDomain,
    /// Significant digits used by the bundled evaluator.
    pub significant_digits: usize,
    /// Delay after the last edit before a cell is recomputed.
    pub quiescence: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            builtins: BuiltinSet::new(),
            plot_domain: PlotDomain::default(),
            significant_digits: crate::formula::eval::DEFAULT_SIGNIFICANT_DIGITS,
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    equations: BTreeMap<EquationId, Equation>,
    next_id: EquationId,
    /// name -> lowest-id cell assigning it
    owners: BTreeMap<String, EquationId>,
    graph: DepGraph,
    symbols: SymbolTable,
    evaluator: Box<dyn Evaluator>,
    sampler: Box<dyn PlotSampler>,
    event_callback: Option<EventCallback>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Engine backed by the bundled numeric evaluator.
    pub fn new(config: EngineConfig) -> Self {
        let numeric = NumericEvaluator::with_significant_digits(config.significant_digits);
        Self::with_backend(config, Box::new(numeric), Box::new(numeric))
    }

    /// Engine with a custom evaluator and plot sampler.
    pub fn with_backend(
        config: EngineConfig,
        evaluator: Box<dyn Evaluator>,
        sampler: Box<dyn PlotSampler>,
    ) -> Self {
        Self {
            config,
            equations: BTreeMap::new(),
            next_id: EquationId::from_raw(1),
            owners: BTreeMap::new(),
            graph: DepGraph::new(),
            symbols: SymbolTable::new(),
            evaluator,
            sampler,
            event_callback: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.event_callback = Some(callback);
    }

    fn emit(&mut self, event: EngineEvent) {
        if let Some(callback) = self.event_callback.as_mut() {
            callback(event);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn equation(&self, id: EquationId) -> Option<&Equation> {
        self.equations.get(&id)
    }

    /// All equations in id order.
    pub fn equations(&self) -> impl Iterator<Item = &Equation> + '_ {
        self.equations.values()
    }

    pub fn ids(&self) -> Vec<EquationId> {
        self.equations.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    pub fn contains(&self, id: EquationId) -> bool {
        self.equations.contains_key(&id)
    }

    pub fn result_text(&self, id: EquationId) -> Option<&str> {
        self.equations.get(&id).map(|e| e.result_text())
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    /// The cell that owns `name` (lowest-id claimant), if any.
    pub fn owner_of(&self, name: &str) -> Option<EquationId> {
        self.owners.get(name).copied()
    }

    // =========================================================================
    // Cell lifecycle
    // =========================================================================

    /// Create an empty cell at the origin.
    pub fn create_equation(&mut self) -> EquationId {
        self.create_equation_at(Position::default())
    }

    /// Create an empty cell at `position`.
    pub fn create_equation_at(&mut self, position: Position) -> EquationId {
        let id = self.next_id;
        self.next_id = id.next();
        self.equations.insert(id, Equation::new(id, position));
        debug!("created equation {}", id);
        id
    }

    fn ensure_equation(&mut self, id: EquationId) -> &mut Equation {
        if id >= self.next_id {
            self.next_id = id.next();
        }
        self.equations
            .entry(id)
            .or_insert_with(|| Equation::new(id, Position::default()))
    }

    /// Set a cell's raw text, creating the cell if `id` is new.
    ///
    /// Marks the cell, every cell that depended on it before or after the
    /// edit, and every other claimant of its old or new name for
    /// recalculation. Nothing is evaluated until `evaluate`/`recompute_all`.
    pub fn add_or_update_equation(&mut self, id: EquationId, raw_text: &str) {
        let old_name = self
            .equations
            .get(&id)
            .and_then(|e| e.defined_var_name.clone());

        let classification = classify(raw_text, &self.config.builtins);
        debug!(
            "classified {} as {:?} (defines {:?}, depends on {:?})",
            id, classification.eval_type, classification.defined_var_name, classification.depends_on
        );
        let new_name = classification.defined_var_name.clone();

        let names: BTreeSet<String> = old_name.into_iter().chain(new_name).collect();
        let before = self.affected_by(id, &names);

        self.ensure_equation(id).apply_text(raw_text, classification);
        self.rebuild_graph();

        let after = self.affected_by(id, &names);
        self.mark_dirty(before.union(&after).copied());
    }

    /// Remove a cell. Its binding is released and former dependents are
    /// marked for recalculation.
    pub fn remove_equation(&mut self, id: EquationId) -> Result<(), EngineError> {
        let Some(eq) = self.equations.get(&id) else {
            return Err(EngineError::UnknownEquation(id));
        };

        let names: BTreeSet<String> = eq.defined_var_name.iter().cloned().collect();
        let mut affected = self.affected_by(id, &names);

        self.equations.remove(&id);
        self.symbols.remove_owner(id);
        self.rebuild_graph();

        // The next claimant (if any) now owns the name; its dependents change too
        let claimants: Vec<EquationId> = names.iter().filter_map(|n| self.owner_of(n)).collect();
        affected.extend(self.graph.with_transitive_dependents(claimants));
        affected.remove(&id);
        self.mark_dirty(affected);

        debug!("removed equation {}", id);
        self.emit(EngineEvent::EquationRemoved { id });
        Ok(())
    }

    /// Remove several cells. Fails without removing anything if any id is unknown.
    pub fn remove_equations(&mut self, ids: &[EquationId]) -> Result<(), EngineError> {
        if let Some(missing) = ids.iter().find(|id| !self.equations.contains_key(id)) {
            return Err(EngineError::UnknownEquation(*missing));
        }
        let unique: BTreeSet<EquationId> = ids.iter().copied().collect();
        for id in unique {
            self.remove_equation(id)?;
        }
        Ok(())
    }

    /// Remove every cell. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        let ids = self.ids();
        self.equations.clear();
        self.owners.clear();
        self.graph = DepGraph::new();
        self.symbols = SymbolTable::new();
        for id in ids {
            self.emit(EngineEvent::EquationRemoved { id });
        }
    }

    // =========================================================================
    // Presentation state
    // =========================================================================

    pub fn set_vis_type(&mut self, id: EquationId, vis_type: VisType) -> Result<(), EngineError> {
        let eq = self
            .equations
            .get_mut(&id)
            .ok_or(EngineError::UnknownEquation(id))?;
        if eq.vis_type != vis_type {
            eq.vis_type = vis_type;
            self.emit(EngineEvent::VisTypeChanged { id, vis_type });
        }
        Ok(())
    }

    /// Toggle a selection: cells already showing `vis_type` go back to
    /// `Text`, the others switch to `vis_type`.
    pub fn toggle_vis_type(&mut self, ids: &[EquationId], vis_type: VisType) -> Result<(), EngineError> {
        if let Some(missing) = ids.iter().find(|id| !self.equations.contains_key(id)) {
            return Err(EngineError::UnknownEquation(*missing));
        }
        for &id in ids {
            let current = self.equations.get(&id).map(|e| e.vis_type);
            let target = if current == Some(vis_type) { VisType::Text } else { vis_type };
            self.set_vis_type(id, target)?;
        }
        Ok(())
    }

    pub fn set_position(&mut self, id: EquationId, position: Position) -> Result<(), EngineError> {
        let eq = self
            .equations
            .get_mut(&id)
            .ok_or(EngineError::UnknownEquation(id))?;
        eq.position = position;
        Ok(())
    }

    // =========================================================================
    // Graph maintenance
    // =========================================================================

    /// Recompute name ownership and the dependency graph from the records.
    fn rebuild_graph(&mut self) {
        let mut owners = BTreeMap::new();
        for eq in self.equations.values() {
            if eq.eval_type == EvalType::Assign {
                if let Some(name) = &eq.defined_var_name {
                    owners.entry(name.clone()).or_insert(eq.id);
                }
            }
        }
        self.owners = owners;
        self.graph = DepGraph::build(
            &self.owners,
            self.equations.values().map(|e| (e.id, &e.depends_on)),
        );
        debug!(
            "dependency graph rebuilt: {} cells, {} names, {} edges",
            self.equations.len(),
            self.owners.len(),
            self.graph.edge_count()
        );
    }

    /// `id`, every claimant of `names`, and all their transitive dependents
    /// under the current graph.
    fn affected_by(&self, id: EquationId, names: &BTreeSet<String>) -> BTreeSet<EquationId> {
        let claimants = self.equations.values().filter(|e| {
            e.defined_var_name
                .as_ref()
                .is_some_and(|n| names.contains(n))
        });
        let roots: Vec<EquationId> = std::iter::once(id).chain(claimants.map(|e| e.id)).collect();
        self.graph.with_transitive_dependents(roots)
    }

    fn mark_dirty<I: IntoIterator<Item = EquationId>>(&mut self, ids: I) {
        for id in ids {
            if let Some(eq) = self.equations.get_mut(&id) {
                eq.recalculation_required = true;
            }
        }
    }

    /// Build a fresh symbol table from every up-to-date, acyclic,
    /// successfully evaluated owner cell and swap it in. Dirty owners publish
    /// again when they are evaluated.
    fn rebuild_symbols(&mut self) {
        let fresh: SymbolTable = self
            .equations
            .values()
            .filter(|e| {
                e.eval_type == EvalType::Assign
                    && !e.recalculation_required
                    && !e.has_cyclic_dependency
                    && e.error.is_none()
                    && !e.result_text.is_empty()
            })
            .filter_map(|e| {
                let name = e.defined_var_name.as_ref()?;
                (self.owners.get(name) == Some(&e.id)).then(|| {
                    (
                        name.clone(),
                        Binding {
                            owner: e.id,
                            value: e.result_text.clone(),
                        },
                    )
                })
            })
            .collect();
        self.symbols = fresh;
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluate one cell against the current symbol table, then mark its
    /// direct dependents for recalculation. Cells still in a circular
    /// definition are left untouched.
    pub fn evaluate(&mut self, id: EquationId) -> Result<(), EngineError> {
        let eq = self.equations.get(&id).ok_or(EngineError::UnknownEquation(id))?;
        if eq.has_cyclic_dependency {
            if self.in_cycle(id) {
                trace!("skipping {}: circular definition", id);
                return Ok(());
            }
            self.set_cyclic(id, false);
        }

        self.rebuild_symbols();
        self.evaluate_cell(id);

        let dependents: Vec<EquationId> = self.graph.dependents(id).collect();
        self.mark_dirty(dependents);
        Ok(())
    }

    /// Recompute every dirty cell and its transitive dependents in one
    /// topological pass.
    pub fn recompute_all(&mut self) -> RecalcReport {
        let start = Instant::now();
        let mut report = RecalcReport::new();

        self.rebuild_graph();

        let dirty: Vec<EquationId> = self
            .equations
            .values()
            .filter(|e| e.recalculation_required || e.is_changed)
            .map(|e| e.id)
            .collect();
        let pending = self.graph.with_transitive_dependents(dirty);
        let plan = self.graph.eval_order(&pending);

        // Cycle members: flag, report, never evaluate
        for cycle in &plan.cycles {
            warn!("{}", cycle);
            report.had_cycles = true;
            report.cycle_cells += cycle.cells.len();

            let names: Vec<String> = cycle
                .cells
                .iter()
                .filter_map(|c| self.equations.get(c)?.defined_var_name.clone())
                .collect();
            let error = CellError::CyclicDependency(format!(
                "circular definition of {}",
                names.join(", ")
            ));
            for &cell in &cycle.cells {
                self.set_cyclic(cell, true);
                self.store_outcome(cell, Err(error.clone()));
                report.push_error(RecalcError::new(cell, error.to_string()));
            }
        }

        self.rebuild_symbols();

        let mut depths: BTreeMap<EquationId, usize> = BTreeMap::new();
        for (eval_order, &cell) in plan.order.iter().enumerate() {
            let max_pred_depth = self
                .graph
                .precedents(cell)
                .filter_map(|p| depths.get(&p).copied())
                .max()
                .unwrap_or(0);
            let depth = max_pred_depth + 1;
            depths.insert(cell, depth);
            report.max_depth = report.max_depth.max(depth);

            self.set_cyclic(cell, false);
            self.evaluate_cell(cell);

            if let Some(eq) = self.equations.get(&cell) {
                if eq.error.is_some() {
                    report.push_error(RecalcError::new(cell, eq.result_text.clone()));
                }
            }
            report.cell_info.insert(cell, CellRecalcInfo { depth, eval_order });
            report.cells_recomputed += 1;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!("{}", report.log_line());
        report
    }

    /// Mark every cell dirty, then recompute.
    pub fn force_recompute_all(&mut self) -> RecalcReport {
        let ids = self.ids();
        self.mark_dirty(ids);
        self.recompute_all()
    }

    /// Whether `id` is part of a circular definition in the current graph.
    fn in_cycle(&self, id: EquationId) -> bool {
        let scope = self.graph.with_transitive_dependents([id]);
        self.graph
            .eval_order(&scope)
            .cycles
            .iter()
            .any(|cycle| cycle.cells.contains(&id))
    }

    fn set_cyclic(&mut self, id: EquationId, cyclic: bool) {
        let Some(eq) = self.equations.get_mut(&id) else {
            return;
        };
        if eq.has_cyclic_dependency != cyclic {
            eq.has_cyclic_dependency = cyclic;
            if cyclic {
                self.symbols.remove_owner(id);
            }
            self.emit(EngineEvent::ErrorStateChanged {
                id,
                has_cyclic_dependency: cyclic,
            });
        }
    }

    /// Evaluate one cell against `self.symbols` and store the outcome.
    fn evaluate_cell(&mut self, id: EquationId) {
        let Some(eq) = self.equations.get(&id) else {
            return;
        };

        let outcome = match eq.eval_type {
            EvalType::NoEval => Ok(String::new()),
            EvalType::Solve => Err(CellError::NotSupported(
                "solving equations is not supported yet".to_string(),
            )),
            EvalType::Eval | EvalType::Assign => self.run_evaluator(eq),
        };
        self.store_outcome(id, outcome);
    }

    fn run_evaluator(&self, eq: &Equation) -> Result<String, CellError> {
        // Text that failed classification reports the classification error
        self.try_evaluate(eq).map_err(|e| match &eq.parse_error {
            Some(parse_error) => CellError::Parse(parse_error.clone()),
            None => e,
        })
    }

    fn try_evaluate(&self, eq: &Equation) -> Result<String, CellError> {
        if let Some(name) = &eq.defined_var_name {
            if let Some(&owner) = self.owners.get(name) {
                if owner != eq.id {
                    return Err(CellError::DuplicateDefinition {
                        name: name.clone(),
                        owner,
                    });
                }
            }
        }

        let bindings = self
            .symbols
            .resolve(&eq.depends_on)
            .map_err(|names| CellError::UndefinedVariable { names })?;

        trace!("evaluating {}: {} with {:?}", eq.id, eq.body, bindings);
        let evaluator = &self.evaluator;
        let result = catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&eq.body, &bindings)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!("evaluator panicked on {}: {}", eq.id, message);
                Err(EvaluationError::new(format!("evaluator panicked: {}", message)))
            });

        result.map_err(CellError::from)
    }

    fn store_outcome(&mut self, id: EquationId, outcome: Result<String, CellError>) {
        let Some(eq) = self.equations.get_mut(&id) else {
            return;
        };

        let (text, error) = match outcome {
            Ok(text) => (text, None),
            Err(e) => (e.to_string(), Some(e.kind())),
        };

        let owns_name = eq
            .defined_var_name
            .as_ref()
            .filter(|n| self.owners.get(*n) == Some(&id))
            .cloned();
        if let Some(name) = owns_name {
            if error.is_none() && eq.eval_type == EvalType::Assign {
                self.symbols.insert(name, id, text.clone());
            } else {
                self.symbols.remove(&name);
            }
        }

        let changed = eq.result_text != text;
        eq.result_text = text;
        eq.error = error;
        eq.is_changed = false;
        eq.recalculation_required = false;

        if changed {
            let result_text = eq.result_text.clone();
            trace!("{} => {}", id, result_text);
            self.emit(EngineEvent::ResultChanged { id, result_text });
        }
    }

    // =========================================================================
    // Plotting
    // =========================================================================

    /// Sample a cell's expression for plotting. Names bound in the symbol
    /// table are substituted; the remaining free names become axes.
    pub fn plot_samples(&self, id: EquationId) -> Result<SampleSet, EngineError> {
        let eq = self.equations.get(&id).ok_or(EngineError::UnknownEquation(id))?;
        match eq.eval_type {
            EvalType::Eval | EvalType::Assign => {}
            EvalType::Solve | EvalType::NoEval => {
                return Err(EngineError::Plot {
                    id,
                    source: EvaluationError::new("cell has no expression to plot"),
                });
            }
        }

        let bindings = self.symbols.resolve_partial(&eq.depends_on);
        let domain = eq.plot_domain.unwrap_or(self.config.plot_domain);
        self.sampler
            .sample(&eq.body, &bindings, &domain)
            .map_err(|source| EngineError::Plot { id, source })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Serializable records for every cell, in id order.
    pub fn records(&self) -> Vec<CellRecord> {
        self.equations.values().map(CellRecord::from_equation).collect()
    }

    /// Load records, replacing cells with the same id. Classification and
    /// the graph are rebuilt from raw text; stored result text is kept only
    /// until the next recompute.
    pub fn load_records<I: IntoIterator<Item = CellRecord>>(&mut self, records: I) {
        let mut loaded = 0usize;
        for record in records {
            let classification = classify(&record.raw_text, &self.config.builtins);
            let eq = self.ensure_equation(record.id);
            eq.apply_text(&record.raw_text, classification);
            eq.position = Position::new(record.position_x, record.position_y);
            eq.vis_type = record.vis_type;
            if eq.description.is_none() {
                eq.description = record.description;
            }
            if eq.eval_type != EvalType::NoEval {
                eq.result_text = record.result_text;
            }
            loaded += 1;
        }
        self.rebuild_graph();
        debug!("loaded {} records", loaded);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CellErrorKind;
    use crate::events::EventCollector;
    use crate::formula::Bindings;
    use std::sync::{Arc, Mutex};

    /// Engine plus a helper to add cells in one call.
    fn engine_with(cells: &[&str]) -> (Engine, Vec<EquationId>) {
        let mut engine = Engine::default();
        let ids = cells
            .iter()
            .map(|text| {
                let id = engine.create_equation();
                engine.add_or_update_equation(id, text);
                id
            })
            .collect();
        (engine, ids)
    }

    fn result(engine: &Engine, id: EquationId) -> &str {
        engine.result_text(id).unwrap()
    }

    fn collect_events(engine: &mut Engine) -> Arc<Mutex<EventCollector>> {
        let collector = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&collector);
        engine.set_event_callback(Box::new(move |event| sink.lock().unwrap().push(event)));
        collector
    }

    #[test]
    fn test_assign_then_reference() {
        let (mut engine, ids) = engine_with(&["x := 5", "y := x + 2"]);
        engine.recompute_all();
        assert_eq!(result(&engine, ids[0]), "5");
        assert_eq!(result(&engine, ids[1]), "7");
        assert_eq!(engine.symbols().value("y"), Some("7"));
        engine.graph().assert_consistent();
    }

    #[test]
    fn test_edit_propagates_to_dependents() {
        let (mut engine, ids) = engine_with(&["x := 5", "y := x + 2", "z := y * 2"]);
        engine.recompute_all();
        assert_eq!(result(&engine, ids[2]), "14");

        engine.add_or_update_equation(ids[0], "x := 10");
        assert!(engine.equation(ids[1]).unwrap().recalculation_required());
        assert!(engine.equation(ids[2]).unwrap().recalculation_required());

        let report = engine.recompute_all();
        assert_eq!(result(&engine, ids[1]), "12");
        assert_eq!(result(&engine, ids[2]), "24");
        assert_eq!(report.cells_recomputed, 3);
        assert_eq!(report.max_depth, 3);
    }

    #[test]
    fn test_definition_order_does_not_matter() {
        let (mut engine, ids) = engine_with(&["y := x * 3", "x := 2"]);
        engine.recompute_all();
        assert_eq!(result(&engine, ids[0]), "6");
    }

    #[test]
    fn test_only_dirty_cells_recompute() {
        let (mut engine, ids) = engine_with(&["a := 1", "b := a + 1", "c := 100"]);
        engine.recompute_all();

        engine.add_or_update_equation(ids[0], "a := 2");
        let report = engine.recompute_all();
        assert_eq!(report.cells_recomputed, 2);
        assert!(report.get_cell_info(&ids[2]).is_none());
        assert_eq!(result(&engine, ids[1]), "3");
    }

    #[test]
    fn test_mutual_cycle() {
        let (mut engine, ids) = engine_with(&["a := b + 1", "b := a + 1"]);
        let report = engine.recompute_all();

        assert!(report.had_cycles);
        assert_eq!(report.cycle_cells, 2);
        for id in &ids {
            let eq = engine.equation(*id).unwrap();
            assert!(eq.has_cyclic_dependency());
            assert_eq!(eq.error(), Some(CellErrorKind::CyclicDependency));
            assert!(eq.result_text().starts_with("CyclicDependencyError:"));
        }
        assert!(engine.symbols().is_empty());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let (mut engine, ids) = engine_with(&["x := x + 1"]);
        engine.recompute_all();
        let eq = engine.equation(ids[0]).unwrap();
        assert!(eq.has_cyclic_dependency());
        assert_eq!(eq.result_text(), "CyclicDependencyError: circular definition of x");
    }

    #[test]
    fn test_breaking_a_cycle_recovers() {
        let (mut engine, ids) = engine_with(&["a := b + 1", "b := a + 1", "c := a * 10"]);
        engine.recompute_all();
        assert!(result(&engine, ids[2]).starts_with("UndefinedVariableError"));

        engine.add_or_update_equation(ids[1], "b := 4");
        engine.recompute_all();
        assert!(!engine.equation(ids[0]).unwrap().has_cyclic_dependency());
        assert!(!engine.equation(ids[1]).unwrap().has_cyclic_dependency());
        assert_eq!(result(&engine, ids[0]), "5");
        assert_eq!(result(&engine, ids[1]), "4");
        assert_eq!(result(&engine, ids[2]), "50");
    }

    #[test]
    fn test_evaluate_after_breaking_a_cycle() {
        let (mut engine, ids) = engine_with(&["a := b + 1", "b := a + 1"]);
        engine.recompute_all();
        let events = collect_events(&mut engine);

        // Still circular: evaluate leaves the cell alone
        engine.add_or_update_equation(ids[1], "b := a + 2");
        engine.evaluate(ids[1]).unwrap();
        assert!(engine.equation(ids[1]).unwrap().has_cyclic_dependency());

        engine.add_or_update_equation(ids[1], "b := 4");
        engine.evaluate(ids[1]).unwrap();
        let eq = engine.equation(ids[1]).unwrap();
        assert!(!eq.has_cyclic_dependency());
        assert_eq!(eq.result_text(), "4");
        assert_eq!(engine.symbols().value("b"), Some("4"));

        engine.evaluate(ids[0]).unwrap();
        assert!(!engine.equation(ids[0]).unwrap().has_cyclic_dependency());
        assert_eq!(result(&engine, ids[0]), "5");

        let mut cleared = events.lock().unwrap().error_states_changed();
        cleared.sort();
        assert_eq!(cleared, vec![(ids[0], false), (ids[1], false)]);
    }

    #[test]
    fn test_cycle_does_not_block_unrelated_cells() {
        let (mut engine, ids) = engine_with(&["a := b", "b := a", "k := 3", "m := k + 1"]);
        engine.recompute_all();
        assert_eq!(result(&engine, ids[3]), "4");
    }

    #[test]
    fn test_remove_definition() {
        let (mut engine, ids) = engine_with(&["x := 5", "y := x + 1"]);
        engine.recompute_all();

        engine.remove_equation(ids[0]).unwrap();
        assert!(engine.equation(ids[0]).is_none());
        assert!(engine.symbols().value("x").is_none());

        engine.recompute_all();
        assert_eq!(result(&engine, ids[1]), "UndefinedVariableError: undefined variable x");
        assert_eq!(engine.equation(ids[1]).unwrap().error(), Some(CellErrorKind::UndefinedVariable));
        engine.graph().assert_consistent();
    }

    #[test]
    fn test_remove_unknown_equation() {
        let mut engine = Engine::default();
        let missing = EquationId::from_raw(42);
        assert_eq!(engine.remove_equation(missing), Err(EngineError::UnknownEquation(missing)));
        assert!(engine.evaluate(missing).is_err());
        assert!(engine.set_vis_type(missing, VisType::Plot).is_err());
    }

    #[test]
    fn test_remove_equations_is_all_or_nothing() {
        let (mut engine, ids) = engine_with(&["a := 1", "b := 2"]);
        let missing = EquationId::from_raw(99);
        assert!(engine.remove_equations(&[ids[0], missing]).is_err());
        assert_eq!(engine.len(), 2);

        engine.remove_equations(&[ids[0], ids[1], ids[0]]).unwrap();
        assert!(engine.is_empty());
    }

    #[test]
    fn test_duplicate_definition() {
        let (mut engine, ids) = engine_with(&["x := 1", "x := 2", "y := x"]);
        engine.recompute_all();
        assert_eq!(result(&engine, ids[0]), "1");
        assert_eq!(
            result(&engine, ids[1]),
            format!("DuplicateDefinitionError: `x` is already defined by {}", ids[0])
        );
        assert_eq!(result(&engine, ids[2]), "1");

        // Deleting the owner hands the name to the next claimant
        engine.remove_equation(ids[0]).unwrap();
        engine.recompute_all();
        assert_eq!(engine.owner_of("x"), Some(ids[1]));
        assert_eq!(result(&engine, ids[1]), "2");
        assert_eq!(result(&engine, ids[2]), "2");
    }

    #[test]
    fn test_renaming_releases_old_name() {
        let (mut engine, ids) = engine_with(&["x := 1", "y := x + 1"]);
        engine.recompute_all();

        engine.add_or_update_equation(ids[0], "w := 1");
        engine.recompute_all();
        assert!(result(&engine, ids[1]).starts_with("UndefinedVariableError"));
        assert!(engine.symbols().value("x").is_none());
        assert_eq!(engine.symbols().value("w"), Some("1"));
    }

    #[test]
    fn test_solve_is_not_supported() {
        let (mut engine, ids) = engine_with(&["x^2 = 4"]);
        engine.recompute_all();
        let eq = engine.equation(ids[0]).unwrap();
        assert_eq!(eq.eval_type(), EvalType::Solve);
        assert_eq!(eq.error(), Some(CellErrorKind::NotSupported));
        assert!(eq.result_text().starts_with("NotSupportedError:"));
    }

    #[test]
    fn test_parse_error_reported() {
        let (mut engine, ids) = engine_with(&["2x := 5"]);
        engine.recompute_all();
        let eq = engine.equation(ids[0]).unwrap();
        assert_eq!(eq.error(), Some(CellErrorKind::Parse));
        assert!(eq.result_text().starts_with("ParseError:"));
    }

    #[test]
    fn test_evaluation_error_is_cell_local() {
        let (mut engine, ids) = engine_with(&["a := 1 / 0", "b := 2"]);
        let report = engine.recompute_all();
        assert_eq!(result(&engine, ids[0]), "EvaluationError: division by zero");
        assert_eq!(result(&engine, ids[1]), "2");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].cell, ids[0]);
        // Failure still clears the dirty flags
        assert!(!engine.equation(ids[0]).unwrap().recalculation_required());
    }

    #[test]
    fn test_deeply_nested_cell_is_an_error() {
        let deep = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        let (mut engine, ids) = engine_with(&[deep.as_str(), "2 + 2"]);
        let report = engine.recompute_all();

        let eq = engine.equation(ids[0]).unwrap();
        assert_eq!(eq.error(), Some(CellErrorKind::Evaluation));
        assert!(eq.result_text().ends_with("expression nested too deeply"));
        assert_eq!(result(&engine, ids[1]), "4");
        assert_eq!(report.cells_recomputed, 2);
    }

    #[test]
    fn test_clearing_text_makes_no_eval() {
        let (mut engine, ids) = engine_with(&["x := 5", "y := x"]);
        engine.recompute_all();
        engine.add_or_update_equation(ids[0], "  ");
        engine.recompute_all();
        assert_eq!(result(&engine, ids[0]), "");
        assert_eq!(engine.equation(ids[0]).unwrap().eval_type(), EvalType::NoEval);
        assert!(result(&engine, ids[1]).starts_with("UndefinedVariableError"));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let (mut engine, ids) = engine_with(&["x := 3", "y := x^2", "y + sqrt(x)", "q := zz"]);
        engine.recompute_all();
        let first: Vec<String> = ids.iter().map(|id| result(&engine, *id).to_string()).collect();

        let report = engine.recompute_all();
        assert_eq!(report.cells_recomputed, 0);
        let second: Vec<String> = ids.iter().map(|id| result(&engine, *id).to_string()).collect();
        assert_eq!(first, second);

        engine.force_recompute_all();
        let third: Vec<String> = ids.iter().map(|id| result(&engine, *id).to_string()).collect();
        assert_eq!(first, third);
    }

    #[test]
    fn test_evaluate_single_cell_marks_dependents() {
        let (mut engine, ids) = engine_with(&["x := 5", "y := x + 2"]);
        engine.recompute_all();

        engine.add_or_update_equation(ids[0], "x := 6");
        engine.evaluate(ids[0]).unwrap();
        assert_eq!(result(&engine, ids[0]), "6");
        assert_eq!(engine.symbols().value("x"), Some("6"));
        assert!(engine.equation(ids[1]).unwrap().recalculation_required());

        engine.evaluate(ids[1]).unwrap();
        assert_eq!(result(&engine, ids[1]), "8");
    }

    #[test]
    fn test_units_through_bindings() {
        let (mut engine, ids) = engine_with(&["d := 100 m", "t := 20 s", "v := d / t"]);
        engine.recompute_all();
        assert_eq!(result(&engine, ids[2]), "5 m/s");
    }

    #[test]
    fn test_vis_type_and_events() {
        let (mut engine, ids) = engine_with(&["x := 1", "x + 1"]);
        let events = collect_events(&mut engine);

        engine.set_vis_type(ids[0], VisType::Symbolic).unwrap();
        engine.set_vis_type(ids[0], VisType::Symbolic).unwrap();
        assert_eq!(events.lock().unwrap().vis_types_changed(), vec![(ids[0], VisType::Symbolic)]);

        // Selection toggle: x already symbolic -> text, other -> symbolic
        engine.toggle_vis_type(&ids, VisType::Symbolic).unwrap();
        assert_eq!(engine.equation(ids[0]).unwrap().vis_type(), VisType::Text);
        assert_eq!(engine.equation(ids[1]).unwrap().vis_type(), VisType::Symbolic);

        engine.recompute_all();
        assert_eq!(
            events.lock().unwrap().results_changed(),
            vec![(ids[0], "1"), (ids[1], "2")]
        );

        // Unchanged results are not re-announced
        events.lock().unwrap().clear();
        engine.force_recompute_all();
        assert!(events.lock().unwrap().results_changed().is_empty());
    }

    #[test]
    fn test_cycle_events() {
        let (mut engine, ids) = engine_with(&["a := b", "b := 1"]);
        engine.recompute_all();
        let events = collect_events(&mut engine);

        engine.add_or_update_equation(ids[1], "b := a");
        engine.recompute_all();
        let mut flagged = events.lock().unwrap().error_states_changed();
        flagged.sort();
        assert_eq!(flagged, vec![(ids[0], true), (ids[1], true)]);

        engine.remove_equation(ids[1]).unwrap();
        engine.recompute_all();
        let collector = events.lock().unwrap();
        assert_eq!(collector.removed(), vec![ids[1]]);
        assert!(collector.error_states_changed().contains(&(ids[0], false)));
    }

    #[test]
    fn test_plot_samples() {
        let (mut engine, ids) = engine_with(&["a := 2", "f := a x | 0, 2, 3", "1 + 1", ""]);
        engine.recompute_all();

        match engine.plot_samples(ids[1]).unwrap() {
            SampleSet::Curve { variable, ys, .. } => {
                assert_eq!(variable.as_deref(), Some("x"));
                assert_eq!(ys, vec![0.0, 2.0, 4.0]);
            }
            other => panic!("expected curve, got {:?}", other),
        }

        // Default domain from config
        match engine.plot_samples(ids[2]).unwrap() {
            SampleSet::Curve { xs, .. } => assert_eq!(xs.len(), 10),
            other => panic!("expected curve, got {:?}", other),
        }

        assert!(matches!(engine.plot_samples(ids[3]), Err(EngineError::Plot { .. })));
    }

    #[test]
    fn test_records_round_trip() {
        let (mut engine, ids) = engine_with(&["x := 5 # five", "y := x + 2", "x + y"]);
        engine.set_position(ids[1], Position::new(3.0, 4.0)).unwrap();
        engine.set_vis_type(ids[2], VisType::Plot).unwrap();
        engine.recompute_all();

        let records = engine.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].description.as_deref(), Some("five"));
        assert_eq!(records[0].defined_var_name.as_deref(), Some("x"));

        engine.clear();
        assert!(engine.is_empty());

        engine.load_records(records.clone());
        engine.recompute_all();
        assert_eq!(engine.records(), records);
        assert_eq!(engine.equation(ids[1]).unwrap().position(), Position::new(3.0, 4.0));

        // Ids are never reused after loading
        let fresh = engine.create_equation();
        assert!(fresh > ids[2]);
    }

    #[test]
    fn test_add_with_unknown_id_creates_cell() {
        let mut engine = Engine::default();
        let id = EquationId::from_raw(7);
        engine.add_or_update_equation(id, "3 * 3");
        engine.recompute_all();
        assert_eq!(result(&engine, id), "9");
        assert_eq!(engine.create_equation(), EquationId::from_raw(8));
    }

    struct PanickingEvaluator;

    impl Evaluator for PanickingEvaluator {
        fn evaluate(&self, body: &str, _bindings: &Bindings) -> Result<String, EvaluationError> {
            if body == "13" {
                panic!("kaboom");
            }
            Ok(body.to_string())
        }
    }

    #[test]
    fn test_evaluator_panic_is_cell_local() {
        let mut engine = Engine::with_backend(
            EngineConfig::default(),
            Box::new(PanickingEvaluator),
            Box::new(NumericEvaluator::new()),
        );
        let a = engine.create_equation();
        let b = engine.create_equation();
        engine.add_or_update_equation(a, "13");
        engine.add_or_update_equation(b, "42");
        engine.recompute_all();
        assert_eq!(result(&engine, a), "EvaluationError: evaluator panicked: kaboom");
        assert_eq!(result(&engine, b), "42");
    }

    #[test]
    fn test_extra_builtins_are_not_dependencies() {
        let config = EngineConfig {
            builtins: BuiltinSet::with_extra(["gamma"]),
            ..Default::default()
        };
        let mut engine = Engine::new(config);
        let id = engine.create_equation();
        engine.add_or_update_equation(id, "gamma + 1");
        engine.recompute_all();
        assert!(engine.equation(id).unwrap().depends_on().is_empty());
        assert_eq!(result(&engine, id), "EvaluationError: unknown identifier gamma");
    }
}
