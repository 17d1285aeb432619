//! Serializable snapshot of one cell.

use serde::{Deserialize, Serialize};

use crate::cell_id::EquationId;
use crate::equation::{Equation, VisType};

/// What gets written to disk for a cell. Only `raw_text` is authoritative on
/// reload; `result_text`, `defined_var_name` and `description` are derived
/// and kept for readers of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    pub id: EquationId,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    pub raw_text: String,
    #[serde(default)]
    pub result_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defined_var_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub vis_type: VisType,
}

impl CellRecord {
    pub fn from_equation(eq: &Equation) -> Self {
        let position = eq.position();
        Self {
            id: eq.id(),
            position_x: position.x,
            position_y: position.y,
            raw_text: eq.raw_text().to_string(),
            result_text: eq.result_text().to_string(),
            defined_var_name: eq.defined_var_name().map(str::to_string),
            description: eq.description().map(str::to_string),
            vis_type: eq.vis_type(),
        }
    }
}
