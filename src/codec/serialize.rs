use std::fmt::Write as _;

use base64::Engine;

use crate::{
    ErrorDetail,
    record::{Fields, Scalar, TaggedRecord, Value},
};

use super::{BASE64_ENCODING, Payload, needs_base64};

/// Encode a record. Fails only when an identity attribute holds a character XML
/// cannot represent.
pub fn serialize(record: &TaggedRecord) -> Result<Payload, ErrorDetail> {
    let mut out = String::new();
    out.push_str("<record id=\"");
    write_attribute(&mut out, "id", &record.id)?;
    out.push_str("\" type=\"");
    write_attribute(&mut out, "type", &record.kind)?;
    out.push_str("\">");
    write_fields(&mut out, &record.fields);
    out.push_str("</record>");
    Ok(Payload(out.into_bytes()))
}

fn write_fields(out: &mut String, fields: &Fields) {
    for (tag, value) in fields.iter() {
        match value {
            Value::Scalar(scalar) => write_scalar(out, tag.code(), scalar),
            Value::List(items) => {
                for item in items {
                    write_scalar(out, tag.code(), item);
                }
            }
            Value::Record(record) => write_record(out, tag.code(), record),
            Value::Records(records) => {
                for record in records {
                    write_record(out, tag.code(), record);
                }
            }
        }
    }
}

fn write_record(out: &mut String, code: u32, fields: &Fields) {
    write!(out, "<g t=\"{code}\">").unwrap();
    write_fields(out, fields);
    out.push_str("</g>");
}

fn write_scalar(out: &mut String, code: u32, scalar: &Scalar) {
    let text = match scalar {
        Scalar::String(s) => std::borrow::Cow::Borrowed(s.as_str()),
        Scalar::Integer(n) => n.to_string().into(),
        Scalar::Float(x) => x.to_string().into(),
        Scalar::Boolean(b) => b.to_string().into(),
        Scalar::Date(date) => date.to_string().into(),
    };
    if needs_base64(&text) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
        write!(out, "<f t=\"{code}\" enc=\"{BASE64_ENCODING}\">{encoded}</f>").unwrap();
    } else {
        write!(out, "<f t=\"{code}\">").unwrap();
        html_escape::encode_text_to_string(&text, out);
        out.push_str("</f>");
    }
}

fn write_attribute(out: &mut String, name: &str, value: &str) -> Result<(), ErrorDetail> {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c if c < ' ' || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                return Err(ErrorDetail::InvalidValue {
                    tag: name.to_owned(),
                    value: value.to_owned(),
                    expected: "XML-safe text",
                });
            }
            c => out.push(c),
        }
    }
    Ok(())
}
