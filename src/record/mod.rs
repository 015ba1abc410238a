//! Tagged records
//!
//! A record is a tree keyed by [`Tag`]s. Leaves are scalars or ordered scalar lists,
//! inner nodes are a singleton sub-record or an ordered list of sub-records. Keys are
//! kept sorted, so iteration order never depends on insertion order.
//!
//! A record is *valid* when it holds no empty list, empty sub-record or empty
//! sub-record list; [`Fields`] refuses to store those, and builder output is always
//! valid.

use std::collections::{BTreeMap, btree_map};

use serde::Serialize;

use crate::tag::{ScalarType, Tag};

mod builder;

pub use builder::{RecordBuilder, RelatedRows};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(chrono::NaiveDate),
}

impl Scalar {
    /// Parse the canonical text form of a value of type `ty`. Floats must be finite,
    /// since `NaN` never compares equal to itself.
    pub fn parse(ty: ScalarType, text: &str) -> Option<Self> {
        Some(match ty {
            ScalarType::String => Scalar::String(text.to_owned()),
            ScalarType::Integer => Scalar::Integer(text.parse().ok()?),
            ScalarType::Float => Scalar::Float(text.parse::<f64>().ok().filter(|v| v.is_finite())?),
            ScalarType::Boolean => Scalar::Boolean(text.parse().ok()?),
            ScalarType::Date => Scalar::Date(text.parse().ok()?),
        })
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<chrono::NaiveDate> for Scalar {
    fn from(value: chrono::NaiveDate) -> Self {
        Scalar::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Record(Fields),
    Records(Vec<Fields>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(_) => false,
            Value::List(items) => items.is_empty(),
            Value::Record(fields) => fields.is_empty(),
            Value::Records(records) => records.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<Tag, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `tag`, replacing any previous value. Empty values are not stored.
    pub fn insert(&mut self, tag: Tag, value: Value) {
        if value.is_empty() {
            return;
        }
        self.0.insert(tag, value);
    }

    pub fn set(&mut self, tag: Tag, scalar: impl Into<Scalar>) {
        self.insert(tag, Value::Scalar(scalar.into()));
    }

    /// Append one sub-record to the repeating structure under `tag`.
    /// Empty sub-records are dropped.
    pub fn push_record(&mut self, tag: Tag, record: Fields) {
        if record.is_empty() {
            return;
        }
        match self.0.entry(tag) {
            btree_map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::Records(records) => records.push(record),
                other => *other = Value::Records(vec![record]),
            },
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Value::Records(vec![record]));
            }
        }
    }

    /// Append one item to the scalar list under `tag`.
    pub fn push_item(&mut self, tag: Tag, item: Scalar) {
        match self.0.entry(tag) {
            btree_map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::List(items) => items.push(item),
                other => *other = Value::List(vec![item]),
            },
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Value::List(vec![item]));
            }
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.0.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Entries in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Value)> {
        self.0.iter().map(|(tag, value)| (*tag, value))
    }
}

/// A built record with its identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedRecord {
    pub id: String,
    pub kind: String,
    pub fields: Fields,
}

impl TaggedRecord {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            fields: Fields::new(),
        }
    }
}
