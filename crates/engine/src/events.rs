//! Engine change notifications.
//!
//! The presentation layer subscribes with `Engine::set_event_callback` and
//! updates only what an event names, instead of re-reading every cell.

use crate::cell_id::EquationId;
use crate::equation::VisType;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A cell's result text changed after evaluation.
    ResultChanged { id: EquationId, result_text: String },

    /// The user changed a cell's visualization mode.
    VisTypeChanged { id: EquationId, vis_type: VisType },

    /// A cell entered or left a circular definition.
    ErrorStateChanged {
        id: EquationId,
        has_cyclic_dependency: bool,
    },

    /// A cell was removed.
    EquationRemoved { id: EquationId },
}

impl EngineEvent {
    pub fn id(&self) -> EquationId {
        match self {
            EngineEvent::ResultChanged { id, .. }
            | EngineEvent::VisTypeChanged { id, .. }
            | EngineEvent::ErrorStateChanged { id, .. }
            | EngineEvent::EquationRemoved { id } => *id,
        }
    }
}

/// Callback type for receiving engine events.
pub type EventCallback = Box<dyn FnMut(EngineEvent) + Send>;

/// Simple event collector for testing.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<EngineEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Result changes as `(id, result_text)` pairs.
    pub fn results_changed(&self) -> Vec<(EquationId, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::ResultChanged { id, result_text } => Some((*id, result_text.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn vis_types_changed(&self) -> Vec<(EquationId, VisType)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::VisTypeChanged { id, vis_type } => Some((*id, *vis_type)),
                _ => None,
            })
            .collect()
    }

    pub fn error_states_changed(&self) -> Vec<(EquationId, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::ErrorStateChanged { id, has_cyclic_dependency } => {
                    Some((*id, *has_cyclic_dependency))
                }
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<EquationId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::EquationRemoved { id } => Some(*id),
                _ => None,
            })
            .collect()
    }
}
