pub mod cell_id;
pub mod classify;
pub mod dep_graph;
pub mod engine;
pub mod equation;
pub mod error;
pub mod events;
pub mod formula;
pub mod recalc;
pub mod record;
pub mod scheduler;
pub mod symbols;

pub use cell_id::EquationId;
pub use engine::{Engine, EngineConfig, DEFAULT_QUIESCENCE};
pub use equation::{Equation, EvalType, Position, VisType};
pub use error::{CellError, CellErrorKind, EngineError, EvaluationError};
pub use events::{EngineEvent, EventCallback, EventCollector};
pub use formula::{Bindings, BuiltinSet, Evaluator, NumericEvaluator, PlotDomain, PlotSampler, SampleSet};
pub use recalc::{CellRecalcInfo, CycleReport, RecalcError, RecalcReport};
pub use record::CellRecord;
pub use scheduler::ChangeScheduler;
pub use symbols::{Binding, SymbolTable};
