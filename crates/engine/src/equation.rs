use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cell_id::EquationId;
use crate::classify::Classification;
use crate::error::CellErrorKind;
use crate::formula::PlotDomain;

/// How a cell's text is processed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EvalType {
    /// Compute the expression.
    Eval,
    /// `lhs = rhs`: reserved, reports NotSupportedError.
    Solve,
    /// `name := expr`: compute and bind the result to `name`.
    Assign,
    /// Empty cell.
    #[default]
    NoEval,
}

/// Presentation hint chosen by the user. The engine stores it and reports
/// changes; it never affects evaluation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VisType {
    #[default]
    Text,
    Symbolic,
    Plot,
}

impl VisType {
    pub fn as_str(self) -> &'static str {
        match self {
            VisType::Text => "text",
            VisType::Symbolic => "symbolic",
            VisType::Plot => "plot",
        }
    }
}

impl std::str::FromStr for VisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(VisType::Text),
            "symbolic" | "latex" => Ok(VisType::Symbolic),
            "plot" => Ok(VisType::Plot),
            other => Err(format!("unknown visualization type: {}", other)),
        }
    }
}

/// Canvas position supplied by the presentation layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One expression cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub(crate) id: EquationId,
    pub(crate) raw_text: String,
    pub(crate) eval_type: EvalType,
    pub(crate) vis_type: VisType,
    pub(crate) defined_var_name: Option<String>,
    pub(crate) body: String,
    pub(crate) depends_on: BTreeSet<String>,
    pub(crate) description: Option<String>,
    pub(crate) plot_domain: Option<PlotDomain>,
    /// Classification problem, reported if the degraded evaluation fails.
    pub(crate) parse_error: Option<String>,
    pub(crate) result_text: String,
    pub(crate) error: Option<CellErrorKind>,
    pub(crate) is_changed: bool,
    pub(crate) recalculation_required: bool,
    pub(crate) has_cyclic_dependency: bool,
    pub(crate) position: Position,
}

impl Equation {
    pub(crate) fn new(id: EquationId, position: Position) -> Self {
        Self {
            id,
            raw_text: String::new(),
            eval_type: EvalType::NoEval,
            vis_type: VisType::Text,
            defined_var_name: None,
            body: String::new(),
            depends_on: BTreeSet::new(),
            description: None,
            plot_domain: None,
            parse_error: None,
            result_text: String::new(),
            error: None,
            is_changed: false,
            recalculation_required: false,
            has_cyclic_dependency: false,
            position,
        }
    }

    /// Replace the raw text and everything derived from it.
    pub(crate) fn apply_text(&mut self, raw_text: &str, classification: Classification) {
        self.raw_text = raw_text.to_string();
        self.eval_type = classification.eval_type;
        self.defined_var_name = classification.defined_var_name;
        self.body = classification.body;
        self.depends_on = classification.depends_on;
        self.description = classification.description;
        self.plot_domain = classification.plot_domain;
        self.parse_error = classification.parse_error;
        self.is_changed = true;
        self.recalculation_required = true;
        if self.eval_type == EvalType::NoEval {
            self.result_text.clear();
            self.error = None;
        }
    }

    pub fn id(&self) -> EquationId {
        self.id
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn eval_type(&self) -> EvalType {
        self.eval_type
    }

    pub fn vis_type(&self) -> VisType {
        self.vis_type
    }

    pub fn defined_var_name(&self) -> Option<&str> {
        self.defined_var_name.as_deref()
    }

    /// The expression handed to the evaluator.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn plot_domain(&self) -> Option<PlotDomain> {
        self.plot_domain
    }

    pub fn result_text(&self) -> &str {
        &self.result_text
    }

    pub fn error(&self) -> Option<CellErrorKind> {
        self.error
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_changed(&self) -> bool {
        self.is_changed
    }

    pub fn recalculation_required(&self) -> bool {
        self.recalculation_required
    }

    pub fn has_cyclic_dependency(&self) -> bool {
        self.has_cyclic_dependency
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// True if `name` is referenced by this cell's body.
    pub fn references(&self, name: &str) -> bool {
        self.depends_on.contains(name)
    }
}
