// Built-in names: math functions, constants and SI units

use rustc_hash::FxHashSet;

use super::quantity::UNITS;

/// Check if a name is a known built-in function.
/// This is the single source of truth for supported functions.
pub fn is_known_function(name: &str) -> bool {
    matches!(name,
        // Trigonometric
        "sin" | "cos" | "tan" | "asin" | "acos" | "atan" |
        // Hyperbolic
        "sinh" | "cosh" | "tanh" | "asinh" | "acosh" | "atanh" |
        // Powers and logarithms
        "sqrt" | "exp" | "ln" | "log" | "log10" |
        // Rounding and magnitude
        "abs" | "floor" | "ceil" | "round" |
        // Aggregates
        "min" | "max"
    )
}

/// Named constants understood by the evaluator.
pub const CONSTANTS: &[(&str, f64)] = &[("pi", std::f64::consts::PI), ("e", std::f64::consts::E)];

pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// True for any name that never denotes a user variable.
pub fn is_builtin(name: &str) -> bool {
    is_known_function(name)
        || constant(name).is_some()
        || UNITS.iter().any(|(unit, _)| *unit == name)
}

/// All built-in names, sorted.
pub fn builtin_names() -> Vec<&'static str> {
    const FUNCTIONS: &[&str] = &[
        "sin", "cos", "tan", "asin", "acos", "atan",
        "sinh", "cosh", "tanh", "asinh", "acosh", "atanh",
        "sqrt", "exp", "ln", "log", "log10",
        "abs", "floor", "ceil", "round",
        "min", "max",
    ];
    debug_assert!(FUNCTIONS.iter().all(|f| is_known_function(f)));

    let mut names: Vec<&'static str> = FUNCTIONS
        .iter()
        .copied()
        .chain(CONSTANTS.iter().map(|(n, _)| *n))
        .chain(UNITS.iter().map(|(n, _)| *n))
        .collect();
    names.sort_unstable();
    names
}

/// The allow-list used when extracting free identifiers: the fixed builtins
/// plus any extra names configured by the user.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSet {
    extra: FxHashSet<String>,
}

impl BuiltinSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extra: extra.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        is_builtin(name) || self.extra.contains(name)
    }

    /// Every name in the set, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_names().into_iter().map(String::from).collect();
        names.extend(self.extra.iter().filter(|n| !is_builtin(n)).cloned());
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_functions() {
        assert!(is_known_function("sin"));
        assert!(is_known_function("log10"));
        assert!(!is_known_function("SIN"));
        assert!(!is_known_function("x"));
    }

    #[test]
    fn test_builtins_cover_constants_and_units() {
        assert!(is_builtin("pi"));
        assert!(is_builtin("e"));
        assert!(is_builtin("kg"));
        assert!(is_builtin("Pa"));
        assert!(!is_builtin("x"));
        assert!(!is_builtin("mass"));
    }

    #[test]
    fn test_builtin_names_sorted_and_unique() {
        let names = builtin_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
        assert!(names.contains(&"sqrt"));
        assert!(names.contains(&"mol"));
    }

    #[test]
    fn test_builtin_set_extra() {
        let set = BuiltinSet::with_extra(["gamma", "sin"]);
        assert!(set.contains("gamma"));
        assert!(set.contains("sin"));
        assert!(!set.contains("x"));

        let names = set.names();
        assert_eq!(names.iter().filter(|n| *n == "sin").count(), 1);
        assert!(names.iter().any(|n| n == "gamma"));
    }
}
