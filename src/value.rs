//! Scalar values and table columns.
//!
//! Both types are closed sums over the three CIF value kinds. Lenient
//! projections (`as_*`, `strings`, `ints`, `floats`) return a default rather
//! than failing when the variant does not match; the strict `get_*` /
//! `as_strs`-style accessors return `None` instead.

/// The literal text of an omitted value.
pub const OMITTED: &str = ".";
/// The literal text of a missing value.
pub const MISSING: &str = "?";

/// A single CIF data value.
///
/// Omitted (`.`) and missing (`?`) values are stored as `Str` holding the
/// literal marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// The string content, or `""` for numeric values.
    pub fn as_str(&self) -> &str {
        match self {
            Value::Str(s) => s,
            _ => "",
        }
    }

    /// The integer content. Floats are truncated; strings yield `0`.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Float(f) => *f as i64,
            Value::Str(_) => 0,
        }
    }

    /// The float content. Integers are converted; strings yield `0.0`.
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(f) => *f,
            Value::Str(_) => 0.0,
        }
    }

    pub fn get_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns `true` for the omitted marker `.`.
    pub fn is_omitted(&self) -> bool {
        matches!(self, Value::Str(s) if s == OMITTED)
    }

    /// Returns `true` for the missing marker `?`.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Str(s) if s == MISSING)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// One column of a table. Always homogeneous.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Strs(Vec<String>),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Strs(v) => v.len(),
            Column::Ints(v) => v.len(),
            Column::Floats(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cell at `row` as a scalar value.
    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            Column::Strs(v) => v.get(row).map(|s| Value::Str(s.clone())),
            Column::Ints(v) => v.get(row).map(|&n| Value::Int(n)),
            Column::Floats(v) => v.get(row).map(|&f| Value::Float(f)),
        }
    }

    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            Column::Strs(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Column::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Column::Floats(v) => Some(v),
            _ => None,
        }
    }

    /// Every cell as text. Numeric cells are formatted the way the writer
    /// formats them.
    pub fn strings(&self) -> Vec<String> {
        match self {
            Column::Strs(v) => v.clone(),
            Column::Ints(v) => v.iter().map(|n| n.to_string()).collect(),
            Column::Floats(v) => v.iter().map(|&f| format_float(f)).collect(),
        }
    }

    /// Every cell as an integer.
    ///
    /// Empty for string columns, and for float columns holding any value
    /// with a fractional part.
    pub fn ints(&self) -> Vec<i64> {
        match self {
            Column::Strs(_) => Vec::new(),
            Column::Ints(v) => v.clone(),
            Column::Floats(v) => {
                if v.iter().all(|f| f.fract() == 0.0) {
                    v.iter().map(|&f| f as i64).collect()
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Every cell as a float. Empty for string columns.
    pub fn floats(&self) -> Vec<f64> {
        match self {
            Column::Strs(_) => Vec::new(),
            Column::Ints(v) => v.iter().map(|&n| n as f64).collect(),
            Column::Floats(v) => v.clone(),
        }
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Column::Strs(v)
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Strs(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Ints(v)
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Floats(v)
    }
}

/// Fixed-point text for a float that re-reads as a float.
///
/// `Display` for `f64` never switches to exponent notation and prints the
/// shortest digits that round-trip; integral values get a trailing `.0`.
pub(crate) fn format_float(f: f64) -> String {
    let mut s = f.to_string();
    if f.is_finite() && !s.contains('.') {
        s.push_str(".0");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_projections_default_on_mismatch() {
        let s = Value::from("ALA");
        assert_eq!(s.as_str(), "ALA");
        assert_eq!(s.as_int(), 0);
        assert_eq!(s.as_float(), 0.0);

        let n = Value::from(42i64);
        assert_eq!(n.as_str(), "");
        assert_eq!(n.as_int(), 42);
        assert_eq!(n.as_float(), 42.0);

        let f = Value::from(2.75);
        assert_eq!(f.as_str(), "");
        assert_eq!(f.as_int(), 2);
        assert_eq!(f.as_float(), 2.75);
    }

    #[test]
    fn strict_projections() {
        assert_eq!(Value::from("x").get_str(), Some("x"));
        assert_eq!(Value::from("x").get_int(), None);
        assert_eq!(Value::from(3).get_int(), Some(3));
        assert_eq!(Value::from(3).get_float(), None);
        assert_eq!(Value::from(0.5).get_float(), Some(0.5));
        assert_eq!(Value::from(0.5).get_str(), None);
    }

    #[test]
    fn null_markers() {
        assert!(Value::from(".").is_omitted());
        assert!(Value::from("?").is_missing());
        assert!(!Value::from("?").is_omitted());
        assert!(!Value::from(0).is_missing());
    }

    #[test]
    fn string_column_has_no_numeric_projection() {
        let col = Column::from(vec!["a", "b"]);
        assert!(col.ints().is_empty());
        assert!(col.floats().is_empty());
        assert_eq!(col.strings(), vec!["a", "b"]);
        assert_eq!(col.as_strs().map(<[String]>::len), Some(2));
    }

    #[test]
    fn numeric_columns_project() {
        let ints = Column::from(vec![1i64, -2, 3]);
        assert_eq!(ints.strings(), vec!["1", "-2", "3"]);
        assert_eq!(ints.floats(), vec![1.0, -2.0, 3.0]);
        assert_eq!(ints.as_ints(), Some(&[1i64, -2, 3][..]));
        assert!(ints.as_floats().is_none());

        let floats = Column::from(vec![1.0, 2.5]);
        assert_eq!(floats.strings(), vec!["1.0", "2.5"]);
        assert!(floats.ints().is_empty());
        assert_eq!(Column::from(vec![1.0, -4.0]).ints(), vec![1, -4]);
    }

    #[test]
    fn column_cells() {
        let col = Column::from(vec![7i64, 8]);
        assert_eq!(col.len(), 2);
        assert_eq!(col.get(1), Some(Value::Int(8)));
        assert_eq!(col.get(2), None);
    }

    #[test]
    fn float_formatting_stays_fixed_point() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1e-7), "0.0000001");
        assert_eq!(format_float(1e21), "1000000000000000000000.0");
        assert_eq!(format_float(0.1).parse::<f64>().ok(), Some(0.1));
    }
}
