//! Canonical payload encoding
//!
//! Records serialize to a small XML dialect:
//!
//! ```text
//! <record id="A-1" type="accession">
//!   <f t="3">Zea mays</f>            scalar, or one element per list item
//!   <g t="9"><f t="10">Ana</f></g>   sub-record, one element per repetition
//! </record>
//! ```
//!
//! (shown indented; the real payload has no whitespace between elements). Children
//! are written in ascending tag order, so equal records always produce identical
//! bytes. Element text carries no type information: the declared [`TagKind`] of each
//! tag decides how it is read back.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::{
    ErrorDetail,
    tag::{Tag, TagDictionary, TagKind, TagResolver},
};

mod deserialize;
mod serialize;

pub use deserialize::deserialize;
pub use serialize::serialize;

const BASE64_ENCODING: &str = "base64";

/// Serialized record bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Declared kind of a tag, as needed to decode a payload. `Ok(None)` means the tag
/// is not known at all.
pub trait TagKinds {
    fn kind_of(&self, tag: Tag) -> impl Future<Output = Result<Option<TagKind>, ErrorDetail>>;
}

impl<D: TagDictionary> TagKinds for TagResolver<D> {
    async fn kind_of(&self, tag: Tag) -> Result<Option<TagKind>, ErrorDetail> {
        Ok(self.entry_for_tag(tag).await?.map(|entry| entry.kind))
    }
}

impl TagKinds for HashMap<Tag, TagKind> {
    async fn kind_of(&self, tag: Tag) -> Result<Option<TagKind>, ErrorDetail> {
        Ok(self.get(&tag).copied())
    }
}

/// Record kinds a decoder accepts.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry(IndexSet<String>);

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>) {
        self.0.insert(kind.into());
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains(kind)
    }
}

impl<S: Into<String>> FromIterator<S> for TypeRegistry {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Characters XML 1.0 cannot carry verbatim in element text. Carriage returns are
/// included because parsers fold them into line feeds.
fn needs_base64(text: &str) -> bool {
    text.chars().any(|c| {
        c == '\r' || (c < ' ' && c != '\t' && c != '\n') || c == '\u{FFFE}' || c == '\u{FFFF}'
    })
}
