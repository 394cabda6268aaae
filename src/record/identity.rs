//! Record identities: which columns identify a row and their values.

use indexmap::IndexMap;

use crate::db::Value;

/// The key column(s) of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    Single(String),
    Composite(Vec<String>),
}

impl Default for KeySpec {
    fn default() -> Self {
        KeySpec::Single("id".to_string())
    }
}

impl From<&str> for KeySpec {
    fn from(field: &str) -> Self {
        KeySpec::Single(field.to_string())
    }
}

impl From<&[&str]> for KeySpec {
    fn from(fields: &[&str]) -> Self {
        KeySpec::Composite(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl KeySpec {
    pub fn composite(fields: &[&str]) -> Self {
        KeySpec::from(fields)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, KeySpec::Composite(_))
    }

    pub fn fields(&self) -> Vec<&str> {
        match self {
            KeySpec::Single(f) => vec![f.as_str()],
            KeySpec::Composite(fs) => fs.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        match self {
            KeySpec::Single(f) => f == field,
            KeySpec::Composite(fs) => fs.iter().any(|f| f == field),
        }
    }

    /// Key fields joined for messages, e.g. `user_id + tag`.
    pub fn describe(&self) -> String {
        self.fields().join(" + ")
    }
}

/// Value(s) identifying one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Scalar(Value),
    Composite(IndexMap<String, Value>),
}

impl Identity {
    /// An unset identity shaped after `key`.
    pub fn empty_for(key: &KeySpec) -> Self {
        match key {
            KeySpec::Single(_) => Identity::Scalar(Value::Null),
            KeySpec::Composite(fields) => {
                Identity::Composite(fields.iter().map(|f| (f.clone(), Value::Null)).collect())
            }
        }
    }

    /// Build a composite identity from `(field, value)` pairs.
    pub fn composite<V: Into<Value> + Clone>(pairs: &[(&str, V)]) -> Self {
        Identity::Composite(
            pairs
                .iter()
                .map(|(f, v)| (f.to_string(), v.clone().into()))
                .collect(),
        )
    }

    /// Map positional values onto the fields of `key`.
    ///
    /// Returns `None` when the number of values does not match.
    pub fn positional(key: &KeySpec, values: Vec<Value>) -> Option<Self> {
        match key {
            KeySpec::Single(_) if values.len() == 1 => values.into_iter().next().map(Identity::Scalar),
            KeySpec::Composite(fields) if fields.len() == values.len() => Some(Identity::Composite(
                fields.iter().cloned().zip(values).collect(),
            )),
            _ => None,
        }
    }

    /// Null, `""`, or a composite whose every component is null or `""`.
    pub fn is_empty(&self) -> bool {
        match self {
            Identity::Scalar(v) => v.is_empty_key(),
            Identity::Composite(map) => map.values().all(Value::is_empty_key),
        }
    }

    /// Whether this identity has the shape `key` expects.
    pub fn matches(&self, key: &KeySpec) -> bool {
        match (self, key) {
            (Identity::Scalar(_), KeySpec::Single(_)) => true,
            (Identity::Composite(map), KeySpec::Composite(fields)) => {
                fields.iter().all(|f| map.contains_key(f))
            }
            _ => false,
        }
    }

    /// Reorder a composite identity into key order, dropping unknown fields.
    pub(crate) fn normalized(self, key: &KeySpec) -> Self {
        match (self, key) {
            (Identity::Composite(mut map), KeySpec::Composite(fields)) => Identity::Composite(
                fields
                    .iter()
                    .map(|f| (f.clone(), map.shift_remove(f).unwrap_or_default()))
                    .collect(),
            ),
            (other, _) => other,
        }
    }

    /// `(column, value)` pairs for a WHERE clause on `key`.
    pub fn pairs<'a>(&'a self, key: &'a KeySpec) -> Vec<(&'a str, &'a Value)> {
        match (self, key) {
            (Identity::Scalar(v), KeySpec::Single(f)) => vec![(f.as_str(), v)],
            (Identity::Composite(map), _) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            (Identity::Scalar(v), KeySpec::Composite(fields)) => {
                fields.first().map(|f| vec![(f.as_str(), v)]).unwrap_or_default()
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Identity::Scalar(v) => Some(v),
            Identity::Composite(map) => map.get(field),
        }
    }

    /// Set one component; a scalar identity is replaced whatever `field` is.
    pub fn set(&mut self, field: &str, value: Value) {
        match self {
            Identity::Scalar(v) => *v = value,
            Identity::Composite(map) => {
                map.insert(field.to_string(), value);
            }
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Identity::Scalar(v) => Some(v),
            Identity::Composite(_) => None,
        }
    }

    /// Values joined for messages, e.g. `5 + A`.
    pub fn describe(&self) -> String {
        match self {
            Identity::Scalar(v) => v.to_string(),
            Identity::Composite(map) => map
                .values()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" + "),
        }
    }
}

impl From<Value> for Identity {
    fn from(value: Value) -> Self {
        Identity::Scalar(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Scalar(value.into())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Scalar(value.into())
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Scalar(value.into())
    }
}

impl From<i32> for Identity {
    fn from(value: i32) -> Self {
        Identity::Scalar(value.into())
    }
}

impl From<IndexMap<String, Value>> for Identity {
    fn from(map: IndexMap<String, Value>) -> Self {
        Identity::Composite(map)
    }
}
