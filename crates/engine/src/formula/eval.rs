// Expression evaluator - numeric evaluation over SI quantities

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::functions::{constant, is_known_function};
use super::parser::{parse, Expr, Op};
use super::quantity::{unit, Quantity};
use crate::error::EvaluationError;

/// Variable bindings handed to an evaluator: name -> result text of the
/// defining cell.
pub type Bindings = BTreeMap<String, String>;

/// Default number of significant digits in result text.
pub const DEFAULT_SIGNIFICANT_DIGITS: usize = 12;

/// Evaluates an expression body against a set of bindings.
///
/// The engine treats implementations as opaque: any failure is reported in
/// the cell's result text, never propagated.
pub trait Evaluator {
    fn evaluate(&self, body: &str, bindings: &Bindings) -> Result<String, EvaluationError>;
}

/// The bundled evaluator: real arithmetic with SI dimensions.
#[derive(Debug, Clone, Copy)]
pub struct NumericEvaluator {
    significant_digits: usize,
}

impl Default for NumericEvaluator {
    fn default() -> Self {
        Self {
            significant_digits: DEFAULT_SIGNIFICANT_DIGITS,
        }
    }
}

impl NumericEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_significant_digits(significant_digits: usize) -> Self {
        Self {
            significant_digits: significant_digits.max(1),
        }
    }

    pub fn significant_digits(&self) -> usize {
        self.significant_digits
    }

    /// Evaluate to a quantity without formatting.
    pub fn evaluate_quantity(&self, body: &str, bindings: &Bindings) -> Result<Quantity, EvaluationError> {
        let expr = parse(body).map_err(EvaluationError::new)?;
        let scope = Scope::from_bindings(&expr, bindings)?;
        let q = eval_expr(&expr, &scope).map_err(EvaluationError::new)?;
        if !q.value.is_finite() {
            return Err(EvaluationError::new("result is not a finite number"));
        }
        Ok(q)
    }
}

impl Evaluator for NumericEvaluator {
    fn evaluate(&self, body: &str, bindings: &Bindings) -> Result<String, EvaluationError> {
        let q = self.evaluate_quantity(body, bindings)?;
        Ok(q.format(self.significant_digits))
    }
}

/// Resolved variable values for one evaluation.
#[derive(Debug, Default, Clone)]
pub(crate) struct Scope {
    values: FxHashMap<String, Quantity>,
}

impl Scope {
    /// Resolve the bindings an expression actually references. A binding's
    /// text must itself evaluate using only numbers, constants and units.
    pub(crate) fn from_bindings(expr: &Expr, bindings: &Bindings) -> Result<Self, EvaluationError> {
        let mut values = FxHashMap::default();
        let empty = Scope::default();
        for name in expr.identifiers() {
            let Some(text) = bindings.get(&name) else {
                continue;
            };
            let value = parse(text)
                .and_then(|e| eval_expr(&e, &empty))
                .map_err(|_| {
                    EvaluationError::new(format!("value of {} is not numeric: {}", name, text))
                })?;
            values.insert(name, value);
        }
        Ok(Self { values })
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub(crate) fn set(&mut self, name: &str, value: Quantity) {
        self.values.insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Result<Quantity, String> {
        if let Some(q) = self.values.get(name) {
            return Ok(*q);
        }
        if let Some(v) = constant(name) {
            return Ok(Quantity::scalar(v));
        }
        if let Some(dims) = unit(name) {
            return Ok(Quantity::with_dims(1.0, dims));
        }
        Err(format!("unknown identifier {}", name))
    }
}

pub(crate) fn eval_expr(expr: &Expr, scope: &Scope) -> Result<Quantity, String> {
    match expr {
        Expr::Number(n) => Ok(Quantity::scalar(*n)),
        Expr::Ident(name) => scope.lookup(name),
        Expr::Neg(inner) => Ok(eval_expr(inner, scope)?.neg()),
        Expr::BinaryOp { op, left, right } => {
            let l = eval_expr(left, scope)?;
            let r = eval_expr(right, scope)?;
            match op {
                Op::Add => l.add(r),
                Op::Sub => l.sub(r),
                Op::Mul => l.mul(r),
                Op::Div => l.div(r),
                Op::Pow => l.pow(r),
            }
        }
        Expr::Function { name, args } => {
            let values = args
                .iter()
                .map(|a| eval_expr(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            evaluate_function(name, &values)
        }
    }
}

fn evaluate_function(name: &str, args: &[Quantity]) -> Result<Quantity, String> {
    if !is_known_function(name) {
        return Err(format!("unknown function {}", name));
    }

    match name {
        "min" | "max" => {
            let (first, rest) = args
                .split_first()
                .ok_or_else(|| format!("{} requires at least one argument", name))?;
            let mut best = *first;
            for q in rest {
                if q.dims != best.dims {
                    return Err(format!("{} arguments must have the same units", name));
                }
                let better = if name == "min" { q.value < best.value } else { q.value > best.value };
                if better {
                    best = *q;
                }
            }
            Ok(best)
        }
        "log" => match args {
            [x] => Ok(Quantity::scalar(dimensionless(name, x)?.ln())),
            [x, base] => {
                let x = dimensionless(name, x)?;
                let base = dimensionless(name, base)?;
                Ok(Quantity::scalar(x.ln() / base.ln()))
            }
            _ => Err(format!("log takes 1 or 2 arguments, got {}", args.len())),
        },
        _ => {
            let [x] = args else {
                return Err(format!("{} takes 1 argument, got {}", name, args.len()));
            };
            match name {
                "sqrt" => x.sqrt(),
                "abs" => Ok(Quantity::with_dims(x.value.abs(), x.dims)),
                "floor" => Ok(Quantity::with_dims(x.value.floor(), x.dims)),
                "ceil" => Ok(Quantity::with_dims(x.value.ceil(), x.dims)),
                "round" => Ok(Quantity::with_dims(x.value.round(), x.dims)),
                _ => {
                    let v = dimensionless(name, x)?;
                    let out = match name {
                        "sin" => v.sin(),
                        "cos" => v.cos(),
                        "tan" => v.tan(),
                        "asin" => v.asin(),
                        "acos" => v.acos(),
                        "atan" => v.atan(),
                        "sinh" => v.sinh(),
                        "cosh" => v.cosh(),
                        "tanh" => v.tanh(),
                        "asinh" => v.asinh(),
                        "acosh" => v.acosh(),
                        "atanh" => v.atanh(),
                        "exp" => v.exp(),
                        "ln" => v.ln(),
                        "log10" => v.log10(),
                        _ => return Err(format!("unknown function {}", name)),
                    };
                    Ok(Quantity::scalar(out))
                }
            }
        }
    }
}

fn dimensionless(function: &str, q: &Quantity) -> Result<f64, String> {
    if !q.is_dimensionless() {
        return Err(format!(
            "{} expects a dimensionless argument, got {}",
            function,
            q.dims.unit_text()
        ));
    }
    Ok(q.value)
}
