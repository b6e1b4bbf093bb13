//! WHERE clause fragment.

use std::fmt;

use pgops_core::{Value, column_ident};

/// A WHERE condition with `%s` markers and one value per marker.
///
/// The condition is written without the `where` keyword:
///
/// ```
/// use pgops_core::Value;
/// use pgops_query::WhereClause;
///
/// let wc = WhereClause::new(
///     "depth > %s and description like %s",
///     vec![Value::Double(10.0), Value::from("water%")],
/// );
/// assert_eq!(wc.values.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub condition: String,
    pub values: Vec<Value>,
}

impl WhereClause {
    pub fn new(condition: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            condition: condition.into(),
            values,
        }
    }

    /// `column = %s` with a single value.
    pub fn column_equals(column: &str, value: impl Into<Value>) -> Self {
        Self {
            condition: format!("{} = %s", column_ident(column)),
            values: vec![value.into()],
        }
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "where {} values [", self.condition)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_equals_builds_condition() {
        let wc = WhereClause::column_equals("counter_name", "visits");
        assert_eq!(wc.condition, "counter_name = %s");
        assert_eq!(wc.values, vec![Value::from("visits")]);

        let quoted = WhereClause::column_equals("25_utm", 3_i32);
        assert_eq!(quoted.condition, "\"25_utm\" = %s");
    }

    #[test]
    fn display_lists_values() {
        let wc = WhereClause::new("gid = %s or gid = %s", vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(wc.to_string(), "where gid = %s or gid = %s values [1, 2]");
    }
}
