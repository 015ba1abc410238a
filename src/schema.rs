use std::collections::HashSet;

use crate::{
    config::{self, Cardinality},
    job::sql::{Identifier, InvalidIdentifier},
    lookup::{MissingPolicy, ReferenceKind},
    tag::TagPath,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Identifier(#[from] InvalidIdentifier),
    #[error("Record kind is empty")]
    EmptyKind,
    #[error("Page size must be positive")]
    ZeroPageSize,
    #[error("Empty delimiter for column {0}")]
    EmptyDelimiter(String),
    #[error("Group {0} has no fields")]
    EmptyGroup(String),
    #[error("Relation {0} is defined twice")]
    DuplicateRelation(String),
}

#[derive(Debug, Clone)]
pub enum FieldRule {
    Value {
        column: String,
        tag: TagPath,
    },
    List {
        column: String,
        tag: TagPath,
        delimiter: String,
    },
    Enum {
        column: String,
        tag: TagPath,
    },
    Reference {
        column: String,
        tag: TagPath,
        reference: ReferenceKind,
        policy: MissingPolicy,
    },
    Group {
        tag: TagPath,
        fields: Vec<FieldRule>,
    },
}

#[derive(Debug, Clone)]
pub struct RelationSchema {
    pub name: String,
    pub tag: TagPath,
    pub table: Identifier,
    pub foreign_key: Identifier,
    pub parent_key: String,
    pub order_by: Identifier,
    pub cardinality: Cardinality,
    pub fields: Vec<FieldRule>,
}

#[derive(Debug, Clone)]
pub struct DatasetSchema {
    pub kind: String,
    pub table: Identifier,
    pub id_column: String,
    pub order_by: Identifier,
    pub page_size: u64,
    pub strict_tags: bool,
    pub identity: Vec<FieldRule>,
    pub fields: Vec<FieldRule>,
    pub relations: Vec<RelationSchema>,
}

fn compile_fields(
    fields: &[config::Field],
    default_delimiter: &str,
) -> Result<Vec<FieldRule>, Error> {
    fields
        .iter()
        .map(|field| {
            Ok(match field {
                config::Field::Value { column, tag } => FieldRule::Value {
                    column: column.clone(),
                    tag: TagPath::new(tag.as_str()),
                },
                config::Field::List {
                    column,
                    tag,
                    delimiter,
                } => {
                    let delimiter = delimiter.as_deref().unwrap_or(default_delimiter);
                    if delimiter.is_empty() {
                        return Err(Error::EmptyDelimiter(column.clone()));
                    }
                    FieldRule::List {
                        column: column.clone(),
                        tag: TagPath::new(tag.as_str()),
                        delimiter: delimiter.to_owned(),
                    }
                }
                config::Field::Enum { column, tag } => FieldRule::Enum {
                    column: column.clone(),
                    tag: TagPath::new(tag.as_str()),
                },
                config::Field::Reference {
                    column,
                    tag,
                    reference,
                    on_missing,
                } => FieldRule::Reference {
                    column: column.clone(),
                    tag: TagPath::new(tag.as_str()),
                    reference: *reference,
                    policy: on_missing.unwrap_or_else(|| reference.default_policy()),
                },
                config::Field::Group { tag, fields } => {
                    if fields.is_empty() {
                        return Err(Error::EmptyGroup(tag.clone()));
                    }
                    FieldRule::Group {
                        tag: TagPath::new(tag.as_str()),
                        fields: compile_fields(fields, default_delimiter)?,
                    }
                }
            })
        })
        .collect()
}

impl DatasetSchema {
    pub fn compile(config: &config::Dataset) -> Result<Self, Error> {
        if config.kind.trim().is_empty() {
            return Err(Error::EmptyKind);
        }
        if config.page_size == 0 {
            return Err(Error::ZeroPageSize);
        }
        let mut names = HashSet::new();
        let relations = config
            .relations
            .iter()
            .map(|relation| {
                if !names.insert(relation.name.as_str()) {
                    return Err(Error::DuplicateRelation(relation.name.clone()));
                }
                Ok(RelationSchema {
                    name: relation.name.clone(),
                    tag: TagPath::new(relation.tag.as_str()),
                    table: Identifier::new(&relation.table)?,
                    foreign_key: Identifier::new(&relation.foreign_key)?,
                    parent_key: relation
                        .parent_key
                        .clone()
                        .unwrap_or_else(|| config.id_column.clone()),
                    order_by: Identifier::new(relation.order_by.as_deref().unwrap_or("rowid"))?,
                    cardinality: relation.cardinality,
                    fields: compile_fields(&relation.fields, &config.delimiter)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self {
            kind: config.kind.clone(),
            table: Identifier::new(&config.table)?,
            id_column: config.id_column.clone(),
            order_by: Identifier::new(config.order_by.as_deref().unwrap_or(&config.id_column))?,
            page_size: config.page_size,
            strict_tags: config.strict_tags,
            identity: compile_fields(&config.identity, &config.delimiter)?,
            fields: compile_fields(&config.fields, &config.delimiter)?,
            relations,
        })
    }
}
