//! Ontology tags
//!
//! A [`TagPath`] is the readable, namespaced name of a property; a [`Tag`] is the
//! compact code the dictionary assigns to it. Records only ever carry tags.

use serde::{Deserialize, Serialize};

mod dictionary;
mod resolver;

pub use dictionary::TagDictionary;
pub use resolver::TagResolver;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagPath(String);

impl TagPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value stored for an enumeration field: `path:code`.
    pub fn enumerate(&self, code: &str) -> String {
        format!("{}:{code}", self.0)
    }
}

impl std::fmt::Display for TagPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagPath {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(u32);

impl Tag {
    /// Returned by a non-strict resolution that found nothing.
    pub const UNKNOWN: Tag = Tag(0);

    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn code(self) -> u32 {
        self.0
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
        }
    }
}

/// Node kind a tag is declared with in the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Scalar(ScalarType),
    List(ScalarType),
    Record,
    Records,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown tag kind: {0}")]
pub struct UnknownTagKind(String);

impl std::str::FromStr for TagKind {
    type Err = UnknownTagKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scalar = |name: &str| match name {
            "string" => Some(ScalarType::String),
            "integer" => Some(ScalarType::Integer),
            "float" => Some(ScalarType::Float),
            "boolean" => Some(ScalarType::Boolean),
            "date" => Some(ScalarType::Date),
            _ => None,
        };
        match s {
            "record" => Ok(TagKind::Record),
            "record_list" => Ok(TagKind::Records),
            _ => {
                if let Some(item) = s.strip_suffix("_list") {
                    scalar(item).map(TagKind::List)
                } else {
                    scalar(s).map(TagKind::Scalar)
                }
                .ok_or_else(|| UnknownTagKind(s.to_owned()))
            }
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagKind::Scalar(ty) => f.write_str(ty.name()),
            TagKind::List(ty) => write!(f, "{}_list", ty.name()),
            TagKind::Record => f.write_str("record"),
            TagKind::Records => f.write_str("record_list"),
        }
    }
}

/// One dictionary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub path: TagPath,
    pub tag: Tag,
    pub kind: TagKind,
}
