use std::path::Path;

use serde::Deserialize;

use crate::lookup::{MissingPolicy, ReferenceKind};

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Field {
    Value {
        column: String,
        tag: String,
    },
    List {
        column: String,
        tag: String,
        delimiter: Option<String>,
    },
    Enum {
        column: String,
        tag: String,
    },
    Reference {
        column: String,
        tag: String,
        reference: ReferenceKind,
        on_missing: Option<MissingPolicy>,
    },
    Group {
        tag: String,
        fields: Vec<Field>,
    },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Many,
    One,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub tag: String,
    pub table: String,
    pub foreign_key: String,
    pub parent_key: Option<String>,
    pub order_by: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    pub fields: Vec<Field>,
}

fn default_page_size() -> u64 {
    500
}

fn default_delimiter() -> String {
    ";".to_owned()
}

fn default_strict_tags() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct Dataset {
    pub kind: String,
    pub table: String,
    pub id_column: String,
    pub order_by: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_strict_tags")]
    pub strict_tags: bool,
    #[serde(default)]
    pub identity: Vec<Field>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read mapping: {0}")]
    Read(std::io::Error),
    #[error("Failed to parse TOML mapping: {0}")]
    Toml(toml::de::Error),
    #[error("Failed to parse YAML mapping: {0}")]
    Yaml(serde_yaml::Error),
}

impl Dataset {
    /// Parse a mapping document; `.toml` files are TOML, everything else YAML.
    pub fn parse(document: &str, path: &Path) -> Result<Self, LoadError> {
        if path.extension().is_some_and(|ext| ext == "toml") {
            toml::de::from_str(document).map_err(LoadError::Toml)
        } else {
            serde_yaml::from_str(document).map_err(LoadError::Yaml)
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let document = tokio::fs::read_to_string(path)
            .await
            .map_err(LoadError::Read)?;
        Self::parse(&document, path)
    }
}
