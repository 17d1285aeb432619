//! Classification of raw cell text.
//!
//! Recognized shapes, after stripping a trailing `# description` and then a
//! trailing `| start, end, samples` plot domain:
//!
//! | text            | type     | defines | body     |
//! |-----------------|----------|---------|----------|
//! | *(empty)*       | `NoEval` | -       | -        |
//! | `name := expr`  | `Assign` | `name`  | `expr`   |
//! | `lhs = rhs`     | `Solve`  | -       | `lhs = rhs` |
//! | anything else   | `Eval`   | -       | the text |
//!
//! Malformed input never fails here: it degrades to `Eval` with a
//! `parse_error` that the engine reports if evaluation fails.

use std::collections::BTreeSet;

use crate::equation::EvalType;
use crate::formula::lexer::identifiers;
use crate::formula::{BuiltinSet, PlotDomain};

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub eval_type: EvalType,
    pub defined_var_name: Option<String>,
    pub body: String,
    pub depends_on: BTreeSet<String>,
    pub description: Option<String>,
    pub plot_domain: Option<PlotDomain>,
    pub parse_error: Option<String>,
}

impl Classification {
    fn empty() -> Self {
        Self {
            eval_type: EvalType::NoEval,
            defined_var_name: None,
            body: String::new(),
            depends_on: BTreeSet::new(),
            description: None,
            plot_domain: None,
            parse_error: None,
        }
    }
}

/// Classify raw cell text.
pub fn classify(raw: &str, builtins: &BuiltinSet) -> Classification {
    let mut out = Classification::empty();

    let (text, description) = split_description(raw);
    out.description = description;

    if text.trim().is_empty() {
        return out;
    }

    let text = match split_plot_domain(text) {
        Ok((expr, domain)) => {
            out.plot_domain = domain;
            expr
        }
        Err(e) => return degrade(out, text, e, builtins),
    };

    if let Some((lhs, rhs)) = text.split_once(":=") {
        let name = lhs.trim();
        if let Err(e) = is_valid_name(name, builtins) {
            return degrade(out, text, e, builtins);
        }
        out.eval_type = EvalType::Assign;
        out.defined_var_name = Some(name.to_string());
        out.body = rhs.trim().to_string();
        out.depends_on = free_identifiers(&out.body, builtins);
        return out;
    }

    if has_bare_equals(text) {
        // Solve cells take no part in the dependency graph
        out.eval_type = EvalType::Solve;
        out.body = text.trim().to_string();
        return out;
    }

    out.eval_type = EvalType::Eval;
    out.body = text.trim().to_string();
    out.depends_on = free_identifiers(&out.body, builtins);
    out
}

fn degrade(mut out: Classification, text: &str, error: String, builtins: &BuiltinSet) -> Classification {
    log::debug!("classification degraded to Eval: {}", error);
    out.eval_type = EvalType::Eval;
    out.defined_var_name = None;
    out.plot_domain = None;
    out.body = text.trim().to_string();
    out.depends_on = free_identifiers(&out.body, builtins);
    out.parse_error = Some(error);
    out
}

/// Identifiers in `body` that are not builtin names.
pub fn free_identifiers(body: &str, builtins: &BuiltinSet) -> BTreeSet<String> {
    identifiers(body)
        .into_iter()
        .filter(|name| !builtins.contains(name))
        .collect()
}

/// Validate a variable name: ASCII letter or underscore, then letters,
/// digits and underscores. Builtin names are reserved.
pub fn is_valid_name(name: &str, builtins: &BuiltinSet) -> Result<(), String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err("Name cannot be empty".into());
    };

    if first.is_ascii_digit() {
        return Err(format!("Name must start with a letter or underscore, not a digit: {}", name));
    }
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(format!("Name must start with a letter or underscore: {}", name));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("Name can only contain letters, numbers and underscores: {}", name));
    }
    if builtins.contains(name) {
        return Err(format!("`{}` is a reserved name", name));
    }

    Ok(())
}

fn split_description(raw: &str) -> (&str, Option<String>) {
    match raw.split_once('#') {
        Some((text, desc)) => {
            let desc = desc.trim();
            (text, (!desc.is_empty()).then(|| desc.to_string()))
        }
        None => (raw, None),
    }
}

fn split_plot_domain(text: &str) -> Result<(&str, Option<PlotDomain>), String> {
    let Some((expr, params)) = text.split_once('|') else {
        return Ok((text, None));
    };

    let parts: Vec<&str> = params.split(',').map(str::trim).collect();
    let [start, end, samples] = parts.as_slice() else {
        return Err(format!("Plot domain must be `start, end, samples`: {}", params.trim()));
    };

    let start: f64 = start
        .parse()
        .map_err(|_| format!("Invalid plot domain start: {}", start))?;
    let end: f64 = end
        .parse()
        .map_err(|_| format!("Invalid plot domain end: {}", end))?;
    let samples: usize = samples
        .parse()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| format!("Invalid plot sample count: {}", samples))?;

    if !start.is_finite() || !end.is_finite() {
        return Err("Plot domain bounds must be finite".to_string());
    }

    Ok((expr, Some(PlotDomain::new(start, end, samples))))
}

/// True if `text` contains an `=` that is not part of `:=`, `==`, `<=`,
/// `>=` or `!=`.
fn has_bare_equals(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'=' {
            return false;
        }
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        !matches!(prev, b':' | b'=' | b'<' | b'>' | b'!') && next != b'='
    })
}
