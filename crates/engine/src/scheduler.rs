// Change scheduler - coalesces rapid edits into one recomputation per burst
//
// Poll-driven: the host calls `poll` from its event loop. Every edit restarts
// the cell's deadline, so only the last text of a burst is ever applied.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::cell_id::EquationId;
use crate::engine::{Engine, DEFAULT_QUIESCENCE};
use crate::recalc::RecalcReport;

#[derive(Debug, Clone)]
struct PendingEdit {
    text: String,
    deadline: Instant,
}

/// Debounces raw-text edits per cell.
#[derive(Debug, Clone)]
pub struct ChangeScheduler {
    quiescence: Duration,
    pending: BTreeMap<EquationId, PendingEdit>,
}

impl Default for ChangeScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIESCENCE)
    }
}

impl ChangeScheduler {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            quiescence,
            pending: BTreeMap::new(),
        }
    }

    /// Scheduler using the engine's configured quiescence interval.
    pub fn for_engine(engine: &Engine) -> Self {
        Self::new(engine.config().quiescence)
    }

    pub fn quiescence(&self) -> Duration {
        self.quiescence
    }

    /// Record an edit made now.
    pub fn text_edited(&mut self, id: EquationId, text: impl Into<String>) {
        self.text_edited_at(id, text, Instant::now());
    }

    /// Record an edit made at `now`. Replaces any pending text for the cell
    /// and restarts its deadline.
    pub fn text_edited_at(&mut self, id: EquationId, text: impl Into<String>, now: Instant) {
        let deadline = now + self.quiescence;
        let superseded = self
            .pending
            .insert(
                id,
                PendingEdit {
                    text: text.into(),
                    deadline,
                },
            )
            .is_some();
        if superseded {
            trace!("edit to {} superseded a pending edit", id);
        }
    }

    /// Drop a pending edit. Returns true if one existed.
    pub fn cancel(&mut self, id: EquationId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: EquationId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest deadline among pending edits; the host can sleep until then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Apply due edits and recompute, if any edit is due.
    pub fn poll(&mut self, engine: &mut Engine) -> Option<RecalcReport> {
        self.poll_at(engine, Instant::now())
    }

    /// Apply every edit whose deadline is at or before `now`, then run one
    /// recompute pass. Edits to cells removed since they were queued are
    /// dropped. Returns `None` when nothing was applied.
    pub fn poll_at(&mut self, engine: &mut Engine, now: Instant) -> Option<RecalcReport> {
        let due: Vec<EquationId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        if due.is_empty() {
            return None;
        }

        // Take edits out first so later edits queue behind this pass
        let edits: Vec<(EquationId, PendingEdit)> = due
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|p| (id, p)))
            .collect();

        let applied = apply_edits(engine, edits);
        if applied == 0 {
            return None;
        }
        debug!("applied {} debounced edit(s)", applied);
        Some(engine.recompute_all())
    }

    /// Apply every pending edit immediately and recompute every cell.
    pub fn recompute_all_now(&mut self, engine: &mut Engine) -> RecalcReport {
        let edits = std::mem::take(&mut self.pending);
        apply_edits(engine, edits);
        engine.force_recompute_all()
    }
}

fn apply_edits<I>(engine: &mut Engine, edits: I) -> usize
where
    I: IntoIterator<Item = (EquationId, PendingEdit)>,
{
    let mut applied = 0;
    for (id, edit) in edits {
        if !engine.contains(id) {
            debug!("dropping edit to removed equation {}", id);
            continue;
        }
        engine.add_or_update_equation(id, &edit.text);
        applied += 1;
    }
    applied
}
