use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The atomic unit of data flowing through the graph.
///
/// Vectors and tables sit behind `Arc` so that carrying a result forward into a
/// new snapshot, or handing it to a dependent strategy, never copies the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Series(Arc<Vec<f64>>),
    /// Column-major table. Column 0 is the index column (usually frequency).
    Table(Arc<Vec<Vec<f64>>>),
    Text(Arc<str>),
}

impl Value {
    pub fn series(values: Vec<f64>) -> Self { Value::Series(Arc::new(values)) }
    pub fn table(columns: Vec<Vec<f64>>) -> Self { Value::Table(Arc::new(columns)) }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Series(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Value::Series(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&[Vec<f64>]> {
        match self {
            Value::Table(t) => Some(t.as_slice()),
            _ => None,
        }
    }

    /// Bitwise equality, used to diff parameter stores. Unlike `==`, a NaN
    /// equals an identical NaN, so reinstalling an unchanged store is a no-op.
    pub fn same_as(&self, other: &Value) -> bool {
        fn same_bits(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a.to_bits() == b.to_bits(),
            (Value::Series(a), Value::Series(b)) => same_bits(a, b),
            (Value::Table(a), Value::Table(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| same_bits(x, y))
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }

    /// Number of labelled columns a result of this shape carries.
    /// Tables exclude their index column.
    pub fn labelled_columns(&self) -> usize {
        match self {
            Value::Scalar(_) | Value::Series(_) | Value::Text(_) => 1,
            Value::Table(t) => t.len().saturating_sub(1),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Scalar(v) }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self { Value::series(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Text(Arc::from(v)) }
}

/// What every node evaluation produces: the data plus parallel column
/// descriptions consumed by the plotting and export layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub data: Value,
    pub labels: Vec<String>,
    pub units: Vec<String>,
}

impl ResultEnvelope {
    pub fn new(data: Value, labels: Vec<String>, units: Vec<String>) -> Self {
        Self { data, labels, units }
    }

    pub fn scalar(value: f64, label: &str, unit: &str) -> Self {
        Self::new(Value::Scalar(value), vec![label.to_string()], vec![unit.to_string()])
    }

    pub fn series(values: Vec<f64>, label: &str, unit: &str) -> Self {
        Self::new(Value::series(values), vec![label.to_string()], vec![unit.to_string()])
    }

    pub fn table(columns: Vec<Vec<f64>>, labels: Vec<String>, units: Vec<String>) -> Self {
        Self::new(Value::table(columns), labels, units)
    }

    /// The trivial envelope produced by a leaf read: the raw parameter,
    /// labelled with its own name and no unit.
    pub fn from_parameter(name: &str, value: Value) -> Self {
        Self::new(value, vec![name.to_string()], vec![String::new()])
    }

    pub fn as_scalar(&self) -> Option<f64> { self.data.as_scalar() }
    pub fn as_series(&self) -> Option<&[f64]> { self.data.as_series() }

    /// Returns a description of the defect if `labels` and `units` are not
    /// parallel, or if a table carries more descriptions than data columns.
    pub fn shape_error(&self) -> Option<String> {
        if self.labels.len() != self.units.len() {
            return Some(format!(
                "{} labels but {} units",
                self.labels.len(),
                self.units.len()
            ));
        }
        if let Value::Table(_) = self.data {
            let columns = self.data.labelled_columns();
            if self.labels.len() > columns {
                return Some(format!(
                    "{} labels for a table with {} data columns",
                    self.labels.len(),
                    columns
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Scalar(1.0), 1)]
    #[case(Value::series(vec![1.0, 2.0, 3.0]), 1)]
    #[case(Value::table(vec![vec![1.0], vec![2.0], vec![3.0]]), 2)]
    #[case(Value::table(vec![]), 0)]
    fn test_labelled_columns(#[case] value: Value, #[case] expected: usize) {
        assert_eq!(value.labelled_columns(), expected);
    }

    #[test]
    fn test_same_as_compares_bits() {
        assert!(Value::Scalar(f64::NAN).same_as(&Value::Scalar(f64::NAN)));
        assert!(Value::series(vec![1.0, f64::NAN]).same_as(&Value::series(vec![1.0, f64::NAN])));
        assert!(Value::table(vec![vec![1.0], vec![f64::NAN]]).same_as(&Value::table(vec![vec![1.0], vec![f64::NAN]])));
        assert!(!Value::Scalar(1.0).same_as(&Value::series(vec![1.0])));
        assert!(!Value::series(vec![1.0, 2.0]).same_as(&Value::series(vec![1.0])));
        assert!(!Value::Scalar(1.0).same_as(&Value::Scalar(1.5)));
    }

    #[test]
    fn test_single_element_series_reads_as_scalar() {
        assert_eq!(Value::series(vec![4.5]).as_scalar(), Some(4.5));
        assert_eq!(Value::series(vec![4.5, 1.0]).as_scalar(), None);
    }

    #[test]
    fn test_shape_error_on_unparallel_descriptions() {
        let env = ResultEnvelope::new(Value::Scalar(1.0), vec!["R".into()], vec![]);
        assert!(env.shape_error().unwrap().contains("1 labels but 0 units"));

        let table = ResultEnvelope::table(
            vec![vec![1.0, 10.0], vec![3.0, 4.0]],
            vec!["|Z|".into(), "extra".into()],
            vec!["Ohm".into(), "".into()],
        );
        assert!(table.shape_error().is_some());

        assert!(ResultEnvelope::scalar(2.0, "R", "Ohm").shape_error().is_none());
    }

    #[test]
    fn test_parameters_deserialize_untagged() {
        let v: Value = serde_json::from_str("12.5").unwrap();
        assert_eq!(v, Value::Scalar(12.5));
        let v: Value = serde_json::from_str("[1.0, 2.0]").unwrap();
        assert_eq!(v, Value::series(vec![1.0, 2.0]));
        let v: Value = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(v, Value::from("linear"));
    }
}
