// Plot sampling - evaluate an expression over a grid of its free variables

use serde::{Deserialize, Serialize};

use super::eval::{eval_expr, Bindings, NumericEvaluator, Scope};
use super::functions::constant;
use super::parser::parse;
use super::quantity::{unit, Quantity};
use crate::error::EvaluationError;

pub const DEFAULT_DOMAIN_START: f64 = -100.0;
pub const DEFAULT_DOMAIN_END: f64 = 100.0;
pub const DEFAULT_SAMPLES: usize = 10;

/// Sampling interval for every free variable of a plotted expression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotDomain {
    pub start: f64,
    pub end: f64,
    pub samples: usize,
}

impl Default for PlotDomain {
    fn default() -> Self {
        Self {
            start: DEFAULT_DOMAIN_START,
            end: DEFAULT_DOMAIN_END,
            samples: DEFAULT_SAMPLES,
        }
    }
}

impl PlotDomain {
    pub fn new(start: f64, end: f64, samples: usize) -> Self {
        Self { start, end, samples }
    }

    /// Evenly spaced sample points, both ends included.
    pub fn points(&self) -> Vec<f64> {
        match self.samples {
            0 => Vec::new(),
            1 => vec![self.start],
            n => {
                let step = (self.end - self.start) / (n - 1) as f64;
                (0..n)
                    .map(|i| if i == n - 1 { self.end } else { self.start + step * i as f64 })
                    .collect()
            }
        }
    }
}

/// Sampled plot data. Points where evaluation fails are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleSet {
    /// One free variable (or none: a constant curve).
    Curve {
        variable: Option<String>,
        xs: Vec<f64>,
        ys: Vec<f64>,
    },
    /// Two free variables; `zs[i][j]` is the value at `(xs[j], ys[i])`.
    Surface {
        variables: [String; 2],
        xs: Vec<f64>,
        ys: Vec<f64>,
        zs: Vec<Vec<f64>>,
    },
}

/// Computes plot samples for an expression body.
pub trait PlotSampler {
    fn sample(
        &self,
        body: &str,
        bindings: &Bindings,
        domain: &PlotDomain,
    ) -> Result<SampleSet, EvaluationError>;
}

impl PlotSampler for NumericEvaluator {
    fn sample(
        &self,
        body: &str,
        bindings: &Bindings,
        domain: &PlotDomain,
    ) -> Result<SampleSet, EvaluationError> {
        if domain.samples == 0 {
            return Err(EvaluationError::new("plot domain needs at least one sample"));
        }
        let expr = parse(body).map_err(EvaluationError::new)?;
        let mut scope = Scope::from_bindings(&expr, bindings)?;

        let free: Vec<String> = expr
            .identifiers()
            .into_iter()
            .filter(|name| !scope.contains(name) && constant(name).is_none() && unit(name).is_none())
            .collect();

        let points = domain.points();
        let value_at = |scope: &Scope| match eval_expr(&expr, scope) {
            Ok(q) if q.value.is_finite() => q.value,
            _ => f64::NAN,
        };

        match free.as_slice() {
            [] => {
                let y = value_at(&scope);
                Ok(SampleSet::Curve {
                    variable: None,
                    ys: vec![y; points.len()],
                    xs: points,
                })
            }
            [x] => {
                let ys = points
                    .iter()
                    .map(|&v| {
                        scope.set(x, Quantity::scalar(v));
                        value_at(&scope)
                    })
                    .collect();
                Ok(SampleSet::Curve {
                    variable: Some(x.clone()),
                    xs: points,
                    ys,
                })
            }
            [x, y] => {
                let mut zs = Vec::with_capacity(points.len());
                for &yv in &points {
                    scope.set(y, Quantity::scalar(yv));
                    let row = points
                        .iter()
                        .map(|&xv| {
                            scope.set(x, Quantity::scalar(xv));
                            value_at(&scope)
                        })
                        .collect();
                    zs.push(row);
                }
                Ok(SampleSet::Surface {
                    variables: [x.clone(), y.clone()],
                    xs: points.clone(),
                    ys: points,
                    zs,
                })
            }
            _ => Err(EvaluationError::new(format!(
                "cannot plot more than two free variables ({})",
                free.join(", ")
            ))),
        }
    }
}
