//! The record type that flows between graph stages.
//!
//! A [`Record`] is an insertion-ordered mapping from field names to
//! [`Value`]s. There is no schema: stages validate the fields they need at the
//! point of use through the typed accessors ([`Record::str_field`],
//! [`Record::f64_field`], ...), which return descriptive errors naming the
//! missing or mistyped field.
//!
//! Equality between records ignores field order.
//!
//! ```
//! use compgraph::{Value, record};
//!
//! let r = record! { "doc_id" => 1, "text" => "hello" };
//! assert_eq!(r.str_field("text").unwrap(), "hello");
//! assert_eq!(r.get("doc_id"), Some(&Value::Int(1)));
//! ```

use crate::value::Value;
use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use indexmap::map::Iter;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Build a [`Record`] from `field => value` pairs.
///
/// Values go through `Into<Value>`, so literals of the supported scalar types
/// (and `Vec`s of them) can be used directly.
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($field, $value); )+
        record
    }};
}

/// A mapping of named fields to values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Insert or overwrite a field. Overwriting keeps the field's position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Remove a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fetch a field that must be present.
    ///
    /// # Errors
    /// Fails if the field is absent.
    pub fn require(&self, field: &str) -> Result<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| {
                anyhow!(
                    "record has no field `{field}` (fields: {})",
                    self.describe_fields()
                )
            })
    }

    /// # Errors
    /// Fails if the field is absent or not a string.
    pub fn str_field(&self, field: &str) -> Result<&str> {
        let value = self.require(field)?;
        value
            .as_str()
            .ok_or_else(|| type_error(field, "string", value))
    }

    /// # Errors
    /// Fails if the field is absent or not an integer.
    pub fn i64_field(&self, field: &str) -> Result<i64> {
        let value = self.require(field)?;
        value
            .as_i64()
            .ok_or_else(|| type_error(field, "int", value))
    }

    /// Numeric field; integers are widened to `f64`.
    ///
    /// # Errors
    /// Fails if the field is absent or not numeric.
    pub fn f64_field(&self, field: &str) -> Result<f64> {
        let value = self.require(field)?;
        value
            .as_f64()
            .ok_or_else(|| type_error(field, "number", value))
    }

    /// # Errors
    /// Fails if the field is absent or not a list.
    pub fn list_field(&self, field: &str) -> Result<&[Value]> {
        let value = self.require(field)?;
        value
            .as_list()
            .ok_or_else(|| type_error(field, "list", value))
    }

    /// A `[x, y]` coordinate pair stored as a list of two numbers.
    ///
    /// # Errors
    /// Fails if the field is absent or not a list of exactly two numbers.
    pub fn point_field(&self, field: &str) -> Result<(f64, f64)> {
        match self.list_field(field)? {
            [x, y] => {
                let x = x
                    .as_f64()
                    .with_context(|| format!("field `{field}`: non-numeric coordinate"))?;
                let y = y
                    .as_f64()
                    .with_context(|| format!("field `{field}`: non-numeric coordinate"))?;
                Ok((x, y))
            }
            other => bail!("field `{field}`: expected 2 coordinates, got {}", other.len()),
        }
    }

    /// New record with only the listed fields, in the listed order.
    ///
    /// # Errors
    /// Fails if any listed field is absent.
    pub fn project<S: AsRef<str>>(&self, fields: &[S]) -> Result<Self> {
        let mut out = Self::new();
        for field in fields {
            let field = field.as_ref();
            out.insert(field, self.require(field)?.clone());
        }
        Ok(out)
    }

    /// The tuple of values for `keys`, or the first missing key name.
    pub fn key<S: AsRef<str>>(&self, keys: &[S]) -> std::result::Result<Vec<Value>, String> {
        keys.iter()
            .map(|k| {
                let k = k.as_ref();
                self.fields.get(k).cloned().ok_or_else(|| k.to_string())
            })
            .collect()
    }

    /// Parse a JSON object into a record.
    ///
    /// # Errors
    /// Fails if the text is not a JSON object or a field holds a nested object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(json)
    }

    /// # Errors
    /// Fails if `json` is not an object or a field holds a nested object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = json else {
            bail!("expected a JSON object, got {json}");
        };
        let mut out = Self::new();
        for (field, value) in map {
            let value = Value::from_json(value).with_context(|| format!("field `{field}`"))?;
            out.insert(field, value);
        }
        Ok(out)
    }

    /// JSON object with fields in insertion order.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    fn describe_fields(&self) -> String {
        self.field_names().collect::<Vec<_>>().join(", ")
    }
}

fn type_error(field: &str, expected: &str, got: &Value) -> anyhow::Error {
    anyhow!("field `{field}`: expected {expected}, got {} ({got})", got.type_name())
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str("{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k:?}: {v}")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
