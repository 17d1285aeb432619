// Quantities: f64 magnitude plus SI base-dimension exponents

/// Exponents of the seven SI base dimensions, in `BASE_UNITS` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dims(pub [i8; 7]);

pub const BASE_UNITS: [&str; 7] = ["m", "kg", "s", "A", "K", "mol", "cd"];

/// Unit symbols understood by the evaluator. Base units first, then derived
/// units, which are also used to collapse result text where they match exactly.
pub const UNITS: &[(&str, Dims)] = &[
    ("m", Dims([1, 0, 0, 0, 0, 0, 0])),
    ("kg", Dims([0, 1, 0, 0, 0, 0, 0])),
    ("s", Dims([0, 0, 1, 0, 0, 0, 0])),
    ("A", Dims([0, 0, 0, 1, 0, 0, 0])),
    ("K", Dims([0, 0, 0, 0, 1, 0, 0])),
    ("mol", Dims([0, 0, 0, 0, 0, 1, 0])),
    ("cd", Dims([0, 0, 0, 0, 0, 0, 1])),
    ("N", Dims([1, 1, -2, 0, 0, 0, 0])),
    ("Pa", Dims([-1, 1, -2, 0, 0, 0, 0])),
    ("J", Dims([2, 1, -2, 0, 0, 0, 0])),
    ("W", Dims([2, 1, -3, 0, 0, 0, 0])),
    ("Hz", Dims([0, 0, -1, 0, 0, 0, 0])),
];

const DERIVED_START: usize = BASE_UNITS.len();

impl Dims {
    pub const NONE: Dims = Dims([0; 7]);

    pub fn is_none(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    fn combine(self, other: Dims, sign: i8) -> Result<Dims, String> {
        let mut out = [0i8; 7];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = other.0[i]
                .checked_mul(sign)
                .and_then(|o| self.0[i].checked_add(o))
                .ok_or_else(|| "unit exponent out of range".to_string())?;
        }
        Ok(Dims(out))
    }

    fn scale(self, factor: i64) -> Result<Dims, String> {
        let mut out = [0i8; 7];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = i8::try_from(self.0[i] as i64 * factor)
                .map_err(|_| "unit exponent out of range".to_string())?;
        }
        Ok(Dims(out))
    }

    /// Unit text such as `m/s^2`, `kg*m^2`, `N`. Empty when dimensionless.
    pub fn unit_text(&self) -> String {
        if self.is_none() {
            return String::new();
        }
        if let Some((name, _)) = UNITS[DERIVED_START..].iter().find(|(_, d)| d == self) {
            return (*name).to_string();
        }

        let factor = |name: &str, exp: i8| {
            if exp == 1 {
                name.to_string()
            } else {
                format!("{}^{}", name, exp)
            }
        };

        let positive: Vec<String> = BASE_UNITS
            .iter()
            .zip(self.0)
            .filter(|(_, e)| *e > 0)
            .map(|(n, e)| factor(*n, e))
            .collect();
        let negative: Vec<String> = BASE_UNITS
            .iter()
            .zip(self.0)
            .filter(|(_, e)| *e < 0)
            .map(|(n, e)| (n, -e))
            .map(|(n, e)| factor(*n, e))
            .collect();

        if positive.is_empty() {
            // No numerator: write negative exponents directly (s^-2)
            return BASE_UNITS
                .iter()
                .zip(self.0)
                .filter(|(_, e)| *e < 0)
                .map(|(n, e)| format!("{}^{}", n, e))
                .collect::<Vec<_>>()
                .join("*");
        }

        let mut text = positive.join("*");
        match negative.len() {
            0 => {}
            1 => {
                text.push('/');
                text.push_str(&negative[0]);
            }
            _ => {
                text.push_str("/(");
                text.push_str(&negative.join("*"));
                text.push(')');
            }
        }
        text
    }
}

/// Look up a unit symbol.
pub fn unit(name: &str) -> Option<Dims> {
    UNITS.iter().find(|(n, _)| *n == name).map(|(_, d)| *d)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub dims: Dims,
}

impl Quantity {
    pub fn scalar(value: f64) -> Self {
        Self { value, dims: Dims::NONE }
    }

    pub fn with_dims(value: f64, dims: Dims) -> Self {
        Self { value, dims }
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims.is_none()
    }

    pub fn add(self, rhs: Quantity) -> Result<Quantity, String> {
        self.check_same_dims(&rhs, "add")?;
        Ok(Quantity::with_dims(self.value + rhs.value, self.dims))
    }

    pub fn sub(self, rhs: Quantity) -> Result<Quantity, String> {
        self.check_same_dims(&rhs, "subtract")?;
        Ok(Quantity::with_dims(self.value - rhs.value, self.dims))
    }

    pub fn mul(self, rhs: Quantity) -> Result<Quantity, String> {
        Ok(Quantity::with_dims(self.value * rhs.value, self.dims.combine(rhs.dims, 1)?))
    }

    pub fn div(self, rhs: Quantity) -> Result<Quantity, String> {
        if rhs.value == 0.0 {
            return Err("division by zero".to_string());
        }
        Ok(Quantity::with_dims(self.value / rhs.value, self.dims.combine(rhs.dims, -1)?))
    }

    pub fn neg(self) -> Quantity {
        Quantity::with_dims(-self.value, self.dims)
    }

    pub fn pow(self, exponent: Quantity) -> Result<Quantity, String> {
        if !exponent.is_dimensionless() {
            return Err("exponent must be dimensionless".to_string());
        }
        if self.is_dimensionless() {
            return Ok(Quantity::scalar(self.value.powf(exponent.value)));
        }
        let n = exponent.value;
        if n.fract() != 0.0 || n.abs() > i8::MAX as f64 {
            return Err(format!(
                "cannot raise {} to non-integer power {}",
                self.dims.unit_text(),
                n
            ));
        }
        Ok(Quantity::with_dims(self.value.powf(n), self.dims.scale(n as i64)?))
    }

    pub fn sqrt(self) -> Result<Quantity, String> {
        if self.dims.0.iter().any(|e| e % 2 != 0) {
            return Err(format!("cannot take square root of {}", self.dims.unit_text()));
        }
        let mut half = [0i8; 7];
        for (i, slot) in half.iter_mut().enumerate() {
            *slot = self.dims.0[i] / 2;
        }
        Ok(Quantity::with_dims(self.value.sqrt(), Dims(half)))
    }

    fn check_same_dims(&self, rhs: &Quantity, verb: &str) -> Result<(), String> {
        if self.dims != rhs.dims {
            return Err(format!(
                "cannot {} {} and {}",
                verb,
                dims_label(&self.dims),
                dims_label(&rhs.dims)
            ));
        }
        Ok(())
    }

    /// Render as result text: number, then a space and the unit text if any.
    pub fn format(&self, significant_digits: usize) -> String {
        let number = format_number(self.value, significant_digits);
        if self.is_dimensionless() {
            number
        } else {
            format!("{} {}", number, self.dims.unit_text())
        }
    }
}

fn dims_label(dims: &Dims) -> String {
    if dims.is_none() {
        "a dimensionless value".to_string()
    } else {
        dims.unit_text()
    }
}

/// Format a number with at most `significant_digits` significant digits.
/// Integers print without a decimal point; very large or very small
/// magnitudes switch to scientific notation (`1.5e-7`).
pub fn format_number(n: f64, significant_digits: usize) -> String {
    let sig = significant_digits.clamp(1, 17);
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }

    let exp = n.abs().log10().floor() as i32;
    if !(-5..15).contains(&exp) {
        let s = format!("{:.*e}", sig - 1, n);
        return match s.split_once('e') {
            Some((mantissa, exponent)) => {
                format!("{}e{}", trim_fraction(mantissa), exponent)
            }
            None => s,
        };
    }

    let decimals = (sig as i32 - 1 - exp).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, n)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
