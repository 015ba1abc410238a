//! Raw row cleanup
//!
//! Source rows arrive as column name -> text. Normalization trims every value and
//! drops the ones that end up empty, so "absent" and "blank" look the same to the
//! record builder.

use indexmap::IndexMap;

/// One source record as read, in column order.
pub type RawRow = IndexMap<String, String>;

/// Trimmed, non-empty column values of one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields(IndexMap<String, String>);

impl NormalizedFields {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for NormalizedFields {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        normalize(iter)
    }
}

/// Trim every value and keep only non-empty ones.
pub fn normalize(row: impl IntoIterator<Item = (String, String)>) -> NormalizedFields {
    NormalizedFields(
        row.into_iter()
            .filter_map(|(column, value)| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == value.len() {
                    Some((column, value))
                } else {
                    Some((column, trimmed.to_owned()))
                }
            })
            .collect(),
    )
}

/// Normalize, returning `None` for rows with nothing left in them.
pub fn normalize_row(row: RawRow) -> Option<NormalizedFields> {
    let fields = normalize(row);
    if fields.is_empty() { None } else { Some(fields) }
}
