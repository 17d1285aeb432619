//! Recalculation types and reporting.
//!
//! This module defines the types produced by an ordered recompute pass and
//! by cycle detection.

use crate::cell_id::EquationId;
use rustc_hash::FxHashMap;

/// Per-cell recalculation metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRecalcInfo {
    /// Dependency depth of this cell within the pass.
    /// A cell with no recomputed precedents has depth 1.
    /// A cell depending on others has depth = max(precedent depths) + 1.
    pub depth: usize,

    /// Position in the evaluation order (0-indexed).
    pub eval_order: usize,
}

/// Report from one recompute pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Time taken in milliseconds.
    pub duration_ms: u64,

    /// Number of cells that were evaluated (cycle members excluded).
    pub cells_recomputed: usize,

    /// Maximum dependency depth encountered.
    pub max_depth: usize,

    /// True if cycles were detected during recompute.
    pub had_cycles: bool,

    /// Number of cells participating in circular definitions.
    pub cycle_cells: usize,

    /// Cells whose recomputation ended in an error (truncated to first 100).
    pub errors: Vec<RecalcError>,

    /// Per-cell metadata for every evaluated cell.
    pub cell_info: FxHashMap<EquationId, CellRecalcInfo>,
}

/// Upper bound on `RecalcReport::errors`.
pub const MAX_REPORTED_ERRORS: usize = 100;

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as a concise one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} cells in {}ms, depth={}, cycles={}, errors={}",
            self.cells_recomputed,
            self.duration_ms,
            self.max_depth,
            self.had_cycles,
            self.errors.len()
        )
    }

    /// Format as a one-line log entry.
    ///
    /// Format: `[recalc] 14ms  628 cells  depth=7  cycles=0  errors=0`
    pub fn log_line(&self) -> String {
        format!(
            "[recalc] {:>4}ms  {} cells  depth={}  cycles={}  errors={}",
            self.duration_ms,
            self.cells_recomputed,
            self.max_depth,
            self.cycle_cells,
            self.errors.len()
        )
    }

    pub fn get_cell_info(&self, cell: &EquationId) -> Option<&CellRecalcInfo> {
        self.cell_info.get(cell)
    }

    /// All evaluated cells sorted by evaluation order.
    pub fn cells_by_eval_order(&self) -> Vec<(EquationId, &CellRecalcInfo)> {
        let mut cells: Vec<_> = self.cell_info.iter().map(|(c, i)| (*c, i)).collect();
        cells.sort_by_key(|(_, i)| i.eval_order);
        cells
    }

    pub(crate) fn push_error(&mut self, error: RecalcError) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(error);
        }
    }
}

/// An error that occurred during recomputation of a specific cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalcError {
    pub cell: EquationId,
    /// The cell's error text.
    pub error: String,
}

impl RecalcError {
    pub fn new(cell: EquationId, error: impl Into<String>) -> Self {
        Self {
            cell,
            error: error.into(),
        }
    }
}

/// Report when cycle detection finds a circular definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct CycleReport {
    /// Cells participating in the cycle, in ascending id order.
    pub cells: Vec<EquationId>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    pub fn new(cells: Vec<EquationId>, message: impl Into<String>) -> Self {
        Self {
            cells,
            message: message.into(),
        }
    }

    /// Cycle report for a cell that references its own name.
    pub fn self_reference(cell: EquationId) -> Self {
        Self {
            cells: vec![cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Cycle report for a multi-cell cycle.
    pub fn cycle(cells: Vec<EquationId>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = match cell_list.as_slice() {
            [first, .., last] if cells.len() > 5 => format!(
                "Circular definition involving {} cells: {} → ... → {}",
                cells.len(),
                first,
                last
            ),
            _ => format!("Circular definition: {}", cell_list.join(" → ")),
        };
        Self { cells, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> EquationId {
        EquationId::from_raw(n)
    }

    #[test]
    fn test_recalc_report_default() {
        let report = RecalcReport::default();
        assert_eq!(report.duration_ms, 0);
        assert_eq!(report.cells_recomputed, 0);
        assert_eq!(report.max_depth, 0);
        assert!(!report.had_cycles);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_recalc_report_summary() {
        let report = RecalcReport {
            duration_ms: 42,
            cells_recomputed: 100,
            max_depth: 5,
            ..Default::default()
        };
        assert_eq!(report.summary(), "100 cells in 42ms, depth=5, cycles=false, errors=0");
    }

    #[test]
    fn test_recalc_report_log_line() {
        let report = RecalcReport {
            duration_ms: 14,
            cells_recomputed: 628,
            max_depth: 7,
            ..Default::default()
        };
        assert_eq!(
            report.log_line(),
            "[recalc]   14ms  628 cells  depth=7  cycles=0  errors=0"
        );
    }

    #[test]
    fn test_recalc_report_log_line_with_cycles() {
        let report = RecalcReport {
            duration_ms: 5,
            cells_recomputed: 10,
            max_depth: 2,
            had_cycles: true,
            cycle_cells: 2,
            errors: vec![RecalcError::new(id(1), "test error")],
            ..Default::default()
        };
        assert_eq!(
            report.log_line(),
            "[recalc]    5ms  10 cells  depth=2  cycles=2  errors=1"
        );
    }

    #[test]
    fn test_error_list_is_capped() {
        let mut report = RecalcReport::new();
        for n in 0..(MAX_REPORTED_ERRORS as u64 + 20) {
            report.push_error(RecalcError::new(id(n), "boom"));
        }
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_cells_by_eval_order() {
        let mut report = RecalcReport::new();
        report.cell_info.insert(id(9), CellRecalcInfo { depth: 2, eval_order: 1 });
        report.cell_info.insert(id(4), CellRecalcInfo { depth: 1, eval_order: 0 });
        let order: Vec<_> = report.cells_by_eval_order().into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec![id(4), id(9)]);
    }

    #[test]
    fn test_cycle_report_self_reference() {
        let report = CycleReport::self_reference(id(1));
        assert_eq!(report.cells.len(), 1);
        assert_eq!(report.message, "Cell #1 references itself");
    }

    #[test]
    fn test_cycle_report_small_cycle() {
        let report = CycleReport::cycle(vec![id(1), id(2), id(3)]);
        assert_eq!(report.message, "Circular definition: #1 → #2 → #3");
    }

    #[test]
    fn test_cycle_report_large_cycle() {
        let cells: Vec<EquationId> = (0..10).map(id).collect();
        let report = CycleReport::cycle(cells);
        assert!(report.message.contains("..."));
        assert!(report.message.contains("10 cells"));
    }

    #[test]
    fn test_cycle_report_display() {
        let report = CycleReport::new(vec![id(1)], "Test error");
        assert_eq!(format!("{}", report), "Test error");
    }
}
