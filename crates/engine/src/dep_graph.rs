//! Dependency graph between equation cells.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (A defines a name that B references)
//! ```
//!
//! This makes "what must be recomputed if I change X?" trivial: follow
//! outgoing edges. The graph is derived data: the engine rebuilds it from
//! the equations' `depends_on` sets and never persists it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell_id::EquationId;
use crate::recalc::CycleReport;

/// Dependency graph keyed by equation id.
///
/// Maintains bidirectional adjacency:
/// - `preds[B]` = cells that B depends on (precedents)
/// - `succs[A]` = cells that depend on A (dependents)
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ preds[B] then B ∈ succs[A], and vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **No duplicate edges:** Set semantics enforced by FxHashSet.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    preds: FxHashMap<EquationId, FxHashSet<EquationId>>,
    succs: FxHashMap<EquationId, FxHashSet<EquationId>>,
}

/// Evaluation plan for one recompute pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalOrder {
    /// Acyclic cells, precedents strictly before dependents.
    pub order: Vec<EquationId>,
    /// One report per circular definition found among the planned cells.
    pub cycles: Vec<CycleReport>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `name -> owner` and each cell's referenced names.
    /// An edge owner → cell is added for every referenced name that has an owner.
    pub fn build<'a, I>(owners: &BTreeMap<String, EquationId>, references: I) -> Self
    where
        I: IntoIterator<Item = (EquationId, &'a BTreeSet<String>)>,
    {
        let mut graph = Self::new();
        for (cell, names) in references {
            let preds: FxHashSet<EquationId> = names
                .iter()
                .filter_map(|name| owners.get(name).copied())
                .collect();
            graph.replace_edges(cell, preds);
        }
        graph
    }

    /// Cells this cell depends on.
    pub fn precedents(&self, cell: EquationId) -> impl Iterator<Item = EquationId> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Cells that depend on this cell.
    pub fn dependents(&self, cell: EquationId) -> impl Iterator<Item = EquationId> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn precedent_count(&self, cell: EquationId) -> usize {
        self.preds.get(&cell).map_or(0, |s| s.len())
    }

    pub fn dependent_count(&self, cell: EquationId) -> usize {
        self.succs.get(&cell).map_or(0, |s| s.len())
    }

    pub fn edge_count(&self) -> usize {
        self.preds.values().map(|s| s.len()).sum()
    }

    /// Replace all incoming edges for a cell atomically.
    ///
    /// Pass an empty set to clear the cell's precedents.
    pub fn replace_edges(&mut self, cell: EquationId, new_preds: FxHashSet<EquationId>) {
        if let Some(old_preds) = self.preds.remove(&cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        if new_preds.is_empty() {
            return;
        }

        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(cell);
        }
        self.preds.insert(cell, new_preds);
    }

    /// The given cells plus everything reachable from them along dependent edges.
    pub fn with_transitive_dependents<I>(&self, roots: I) -> BTreeSet<EquationId>
    where
        I: IntoIterator<Item = EquationId>,
    {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<EquationId> = roots.into_iter().collect();

        while let Some(cell) = queue.pop_front() {
            if !seen.insert(cell) {
                continue;
            }
            queue.extend(self.dependents(cell).filter(|d| !seen.contains(d)));
        }

        seen
    }

    /// Order `cells` for evaluation and isolate circular definitions.
    ///
    /// Runs an iterative Tarjan SCC pass over the subgraph induced by
    /// `cells`, following precedent edges and visiting ids in ascending
    /// order. Tarjan completes a component only after every component it
    /// can reach, so completion order puts precedents first. Components of
    /// size > 1, or a single cell with a self-edge, are reported as cycles
    /// and left out of `order`.
    pub fn eval_order(&self, cells: &BTreeSet<EquationId>) -> EvalOrder {
        let mut plan = EvalOrder::default();
        if cells.is_empty() {
            return plan;
        }

        let mut index_counter: u32 = 0;
        let mut stack: Vec<EquationId> = Vec::new();
        let mut on_stack: FxHashSet<EquationId> = FxHashSet::default();
        let mut indices: FxHashMap<EquationId, u32> = FxHashMap::default();
        let mut lowlinks: FxHashMap<EquationId, u32> = FxHashMap::default();

        let sorted_neighbours = |cell: EquationId| -> Vec<EquationId> {
            let mut neighbours: Vec<EquationId> = self
                .precedents(cell)
                .filter(|c| cells.contains(c))
                .collect();
            neighbours.sort_unstable();
            neighbours
        };

        struct DfsFrame {
            cell: EquationId,
            neighbours: Vec<EquationId>,
            next_idx: usize,
        }

        for &root in cells {
            if indices.contains_key(&root) {
                continue;
            }

            indices.insert(root, index_counter);
            lowlinks.insert(root, index_counter);
            index_counter += 1;
            stack.push(root);
            on_stack.insert(root);

            let mut dfs_stack = vec![DfsFrame {
                cell: root,
                neighbours: sorted_neighbours(root),
                next_idx: 0,
            }];

            while let Some(frame) = dfs_stack.last_mut() {
                if frame.next_idx < frame.neighbours.len() {
                    let w = frame.neighbours[frame.next_idx];
                    frame.next_idx += 1;

                    if !indices.contains_key(&w) {
                        indices.insert(w, index_counter);
                        lowlinks.insert(w, index_counter);
                        index_counter += 1;
                        stack.push(w);
                        on_stack.insert(w);

                        dfs_stack.push(DfsFrame {
                            cell: w,
                            neighbours: sorted_neighbours(w),
                            next_idx: 0,
                        });
                    } else if on_stack.contains(&w) {
                        let w_idx = indices[&w];
                        if let Some(v_low) = lowlinks.get_mut(&frame.cell) {
                            *v_low = (*v_low).min(w_idx);
                        }
                    }
                    continue;
                }

                let v = frame.cell;
                dfs_stack.pop();
                let v_low = lowlinks[&v];
                let v_idx = indices[&v];

                if let Some(parent) = dfs_stack.last() {
                    if let Some(parent_low) = lowlinks.get_mut(&parent.cell) {
                        *parent_low = (*parent_low).min(v_low);
                    }
                }

                if v_low != v_idx {
                    continue;
                }

                let mut scc = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack.remove(&w);
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }

                let is_cycle = scc.len() > 1
                    || self.preds.get(&v).is_some_and(|p| p.contains(&v));

                if is_cycle {
                    scc.sort_unstable();
                    plan.cycles.push(if scc.len() == 1 {
                        CycleReport::self_reference(v)
                    } else {
                        CycleReport::cycle(scc)
                    });
                } else {
                    plan.order.push(v);
                }
            }
        }

        plan
    }

    /// Check all invariants. Panics if any are violated.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "Empty preds set stored for {}", cell);
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(cell)),
                    "Missing succ edge: {} should have {} in dependents",
                    pred,
                    cell
                );
            }
        }
        for (cell, deps) in &self.succs {
            assert!(!deps.is_empty(), "Empty succs set stored for {}", cell);
            for dep in deps {
                assert!(
                    self.preds.get(dep).is_some_and(|s| s.contains(cell)),
                    "Missing pred edge: {} should have {} in precedents",
                    dep,
                    cell
                );
            }
        }
    }
}
