use std::collections::HashMap;

use base64::Engine;
use itertools::Itertools;

use crate::{
    ErrorDetail,
    record::{Fields, Scalar, TaggedRecord, Value},
    tag::{ScalarType, Tag, TagKind},
};

use super::{BASE64_ENCODING, TagKinds, TypeRegistry};

macro_rules! malformed {
    ($($arg:tt)*) => {
        return Err(ErrorDetail::MalformedPayload(format!($($arg)*)))
    };
}

/// Decode a payload produced by [`super::serialize`].
pub async fn deserialize(
    payload: &[u8],
    kinds: &impl TagKinds,
    registry: &TypeRegistry,
) -> Result<TaggedRecord, ErrorDetail> {
    let text = std::str::from_utf8(payload).map_err(ErrorDetail::Utf8)?;
    let document = roxmltree::Document::parse(text).map_err(ErrorDetail::Xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "record" {
        malformed!("unexpected root element <{}>", root.tag_name().name());
    }
    let Some(id) = root.attribute("id") else {
        malformed!("record has no id");
    };
    let Some(kind) = root.attribute("type") else {
        malformed!("record {id} has no type");
    };
    if !registry.contains(kind) {
        return Err(ErrorDetail::UnknownType(kind.to_owned()));
    }
    let declared = declared_kinds(root, kinds).await?;
    Ok(TaggedRecord {
        id: id.to_owned(),
        kind: kind.to_owned(),
        fields: read_fields(root, &declared)?,
    })
}

fn tag_of(node: roxmltree::Node) -> Option<Tag> {
    node.attribute("t")
        .and_then(|code| code.parse::<u32>().ok())
        .map(Tag::new)
}

/// Look up every distinct tag the payload mentions, once.
async fn declared_kinds(
    root: roxmltree::Node<'_, '_>,
    kinds: &impl TagKinds,
) -> Result<HashMap<Tag, TagKind>, ErrorDetail> {
    let mut declared = HashMap::new();
    let tags = root
        .descendants()
        .filter(|node| node.is_element())
        .filter_map(tag_of)
        .unique();
    for tag in tags {
        if let Some(kind) = kinds.kind_of(tag).await? {
            declared.insert(tag, kind);
        }
    }
    Ok(declared)
}

fn read_fields(
    node: roxmltree::Node,
    declared: &HashMap<Tag, TagKind>,
) -> Result<Fields, ErrorDetail> {
    let mut fields = Fields::new();
    for child in node.children() {
        if child.is_text() {
            if child.text().is_some_and(|text| !text.trim().is_empty()) {
                malformed!("stray text inside <{}>", node.tag_name().name());
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let element = child.tag_name().name();
        let Some(tag) = tag_of(child) else {
            malformed!("<{element}> without a valid tag code");
        };
        let Some(&kind) = declared.get(&tag) else {
            return Err(ErrorDetail::UnresolvedTag(format!("#{tag}")));
        };
        match (element, kind) {
            ("f", TagKind::Scalar(ty)) => {
                if fields.contains(tag) {
                    malformed!("scalar tag {tag} repeated");
                }
                fields.set(tag, read_scalar(child, tag, ty)?);
            }
            ("f", TagKind::List(ty)) => fields.push_item(tag, read_scalar(child, tag, ty)?),
            ("g", TagKind::Record) => {
                if fields.contains(tag) {
                    malformed!("singleton tag {tag} repeated");
                }
                fields.insert(tag, Value::Record(read_fields(child, declared)?));
            }
            ("g", TagKind::Records) => fields.push_record(tag, read_fields(child, declared)?),
            _ => malformed!("<{element}> does not fit tag {tag} declared as {kind}"),
        }
    }
    Ok(fields)
}

fn read_scalar(node: roxmltree::Node, tag: Tag, ty: ScalarType) -> Result<Scalar, ErrorDetail> {
    let raw = node.text().unwrap_or_default();
    let decoded;
    let text = match node.attribute("enc") {
        None => raw,
        Some(BASE64_ENCODING) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw)
                .map_err(ErrorDetail::Base64)?;
            decoded = String::from_utf8(bytes).map_err(|e| ErrorDetail::Utf8(e.utf8_error()))?;
            decoded.as_str()
        }
        Some(other) => malformed!("unsupported encoding {other}"),
    };
    Scalar::parse(ty, text).ok_or_else(|| ErrorDetail::InvalidValue {
        tag: format!("#{tag}"),
        value: text.to_owned(),
        expected: ty.name(),
    })
}
