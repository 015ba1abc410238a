//! Flat rows to tagged records
//!
//! The builder walks a [`DatasetSchema`] and writes one tag/value pair per present
//! source column. Every key goes through the [`TagResolver`]; the tag's declared kind
//! decides how the raw text is parsed.

use chrono::NaiveDate;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use crate::{
    ErrorDetail,
    config::Cardinality,
    lookup::{CrossReference, MissingPolicy},
    normalize::NormalizedFields,
    schema::{DatasetSchema, FieldRule, RelationSchema},
    tag::{ScalarType, Tag, TagDictionary, TagKind, TagPath, TagResolver},
    warning::{self, Warning},
};

use super::{Fields, Scalar, TaggedRecord, Value};

/// Normalized child rows, keyed by relation name.
pub type RelatedRows = IndexMap<String, Vec<NormalizedFields>>;

pub struct RecordBuilder<'a, D, L> {
    schema: &'a DatasetSchema,
    resolver: &'a TagResolver<D>,
    references: &'a L,
}

/// Split a delimiter-joined value into trimmed, distinct, non-empty items.
pub(crate) fn split_list<'s>(raw: &'s str, delimiter: &str) -> Vec<&'s str> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .unique()
        .collect()
}

/// Parse source text into a scalar of type `ty`. More forgiving than the canonical
/// payload form: booleans accept yes/no and 1/0, dates accept `YYYYMMDD`.
pub(crate) fn parse_source(ty: ScalarType, raw: &str) -> Option<Scalar> {
    match ty {
        ScalarType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(Scalar::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" => Some(Scalar::Boolean(false)),
            _ => None,
        },
        ScalarType::Date => raw
            .parse::<NaiveDate>()
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
            .ok()
            .map(Scalar::Date),
        ty => Scalar::parse(ty, raw),
    }
}

fn mismatch(path: &TagPath, declared: TagKind, mapped: &'static str) -> ErrorDetail {
    ErrorDetail::KindMismatch {
        tag: path.to_string(),
        declared,
        mapped,
    }
}

fn parse_value(path: &TagPath, ty: ScalarType, raw: &str) -> Result<Scalar, ErrorDetail> {
    parse_source(ty, raw).ok_or_else(|| ErrorDetail::InvalidValue {
        tag: path.to_string(),
        value: raw.to_owned(),
        expected: ty.name(),
    })
}

impl<'a, D: TagDictionary, L: CrossReference> RecordBuilder<'a, D, L> {
    pub fn new(schema: &'a DatasetSchema, resolver: &'a TagResolver<D>, references: &'a L) -> Self {
        Self {
            schema,
            resolver,
            references,
        }
    }

    pub async fn build(
        &self,
        main: &NormalizedFields,
        related: &RelatedRows,
    ) -> Result<TaggedRecord, ErrorDetail> {
        let schema = self.schema;
        let id = main
            .get(&schema.id_column)
            .ok_or_else(|| ErrorDetail::MissingField(schema.id_column.clone()))?;
        let mut record = TaggedRecord::new(id, schema.kind.as_str());
        self.write_fields(&mut record.fields, &schema.identity, main, true)
            .await?;
        self.write_fields(&mut record.fields, &schema.fields, main, schema.strict_tags)
            .await?;
        for relation in &schema.relations {
            let Some(rows) = related.get(&relation.name) else {
                continue;
            };
            self.write_relation(&mut record.fields, relation, rows)
                .await?;
        }
        debug!(id, fields = record.fields.len(), "built record");
        Ok(record)
    }

    async fn tag(&self, path: &TagPath, strict: bool) -> Result<Option<(Tag, TagKind)>, ErrorDetail> {
        let Some(entry) = self.resolver.resolve_entry(path, strict).await? else {
            warning::emit(Warning::UnknownTag(path.clone()));
            return Ok(None);
        };
        Ok(Some((entry.tag, entry.kind)))
    }

    async fn write_relation(
        &self,
        out: &mut Fields,
        relation: &RelationSchema,
        rows: &[NormalizedFields],
    ) -> Result<(), ErrorDetail> {
        let strict = self.schema.strict_tags;
        let mut built = Vec::with_capacity(rows.len());
        for row in rows.iter().filter(|row| !row.is_empty()) {
            let mut sub = Fields::new();
            self.write_fields(&mut sub, &relation.fields, row, strict)
                .await?;
            if !sub.is_empty() {
                built.push(sub);
            }
        }
        if built.is_empty() {
            return Ok(());
        }
        let Some((tag, kind)) = self.tag(&relation.tag, strict).await? else {
            return Ok(());
        };
        match (relation.cardinality, kind) {
            (Cardinality::Many, TagKind::Records) => {
                for sub in built {
                    out.push_record(tag, sub);
                }
            }
            (Cardinality::One, TagKind::Record) => {
                if built.len() > 1 {
                    warning::emit(Warning::SurplusRelationRows {
                        relation: relation.name.clone(),
                        rows: built.len(),
                    });
                }
                if let Some(first) = built.into_iter().next() {
                    out.insert(tag, Value::Record(first));
                }
            }
            (_, kind) => return Err(mismatch(&relation.tag, kind, "relation")),
        }
        Ok(())
    }

    async fn write_fields(
        &self,
        out: &mut Fields,
        rules: &[FieldRule],
        row: &NormalizedFields,
        strict: bool,
    ) -> Result<(), ErrorDetail> {
        for rule in rules {
            match rule {
                FieldRule::Value { column, tag: path } => {
                    let Some(raw) = row.get(column) else { continue };
                    let Some((tag, kind)) = self.tag(path, strict).await? else {
                        continue;
                    };
                    let TagKind::Scalar(ty) = kind else {
                        return Err(mismatch(path, kind, "value"));
                    };
                    out.set(tag, parse_value(path, ty, raw)?);
                }
                FieldRule::List {
                    column,
                    tag: path,
                    delimiter,
                } => {
                    let Some(raw) = row.get(column) else { continue };
                    let items = split_list(raw, delimiter);
                    if items.is_empty() {
                        continue;
                    }
                    let Some((tag, kind)) = self.tag(path, strict).await? else {
                        continue;
                    };
                    let TagKind::List(ty) = kind else {
                        return Err(mismatch(path, kind, "list"));
                    };
                    let items = items
                        .into_iter()
                        .map(|item| parse_value(path, ty, item))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.insert(tag, Value::List(items));
                }
                FieldRule::Enum { column, tag: path } => {
                    let Some(raw) = row.get(column) else { continue };
                    let Some((tag, kind)) = self.tag(path, strict).await? else {
                        continue;
                    };
                    if kind != TagKind::Scalar(ScalarType::String) {
                        return Err(mismatch(path, kind, "enum"));
                    }
                    out.set(tag, path.enumerate(raw));
                }
                FieldRule::Reference {
                    column,
                    tag: path,
                    reference,
                    policy,
                } => {
                    let Some(raw) = row.get(column) else { continue };
                    let Some((tag, kind)) = self.tag(path, strict).await? else {
                        continue;
                    };
                    let TagKind::Scalar(ty) = kind else {
                        return Err(mismatch(path, kind, "reference"));
                    };
                    let resolved = self
                        .references
                        .resolve(*reference, raw)
                        .await
                        .map_err(|e| ErrorDetail::Lookup(Box::new(e)))?;
                    match (resolved, policy) {
                        (Some(canonical), _) => out.set(tag, parse_value(path, ty, &canonical)?),
                        (None, MissingPolicy::Fail) => {
                            return Err(ErrorDetail::UnresolvedReference {
                                kind: *reference,
                                code: raw.to_owned(),
                            });
                        }
                        (None, MissingPolicy::Skip) => {
                            warning::emit(Warning::UnknownReference {
                                kind: *reference,
                                code: raw.to_owned(),
                                column: column.clone(),
                            });
                        }
                    }
                }
                FieldRule::Group { tag: path, fields } => {
                    let mut sub = Fields::new();
                    Box::pin(self.write_fields(&mut sub, fields, row, strict)).await?;
                    if sub.is_empty() {
                        continue;
                    }
                    let Some((tag, kind)) = self.tag(path, strict).await? else {
                        continue;
                    };
                    if kind != TagKind::Record {
                        return Err(mismatch(path, kind, "group"));
                    }
                    out.insert(tag, Value::Record(sub));
                }
            }
        }
        Ok(())
    }
}
