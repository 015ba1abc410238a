//! Identifier validation and quoting.

use std::fmt::Write;

const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, thiserror::Error)]
pub enum InvalidIdentifier {
    #[error("identifier must not be empty")]
    Empty,
    #[error("identifier '{0}' exceeds {MAX_IDENTIFIER_LEN} bytes")]
    TooLong(String),
    #[error("identifier '{0}' must start with a letter or underscore")]
    BadStart(String),
    #[error("identifier '{name}' contains invalid character '{ch}'")]
    BadCharacter { name: String, ch: char },
}

/// A table or column name known to be `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: &str) -> Result<Self, InvalidIdentifier> {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return Err(InvalidIdentifier::Empty);
        };
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(InvalidIdentifier::TooLong(name.to_owned()));
        }
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(InvalidIdentifier::BadStart(name.to_owned()));
        }
        if let Some(ch) = chars.find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_') {
            return Err(InvalidIdentifier::BadCharacter {
                name: name.to_owned(),
                ch,
            });
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    /// Quoted form, ready to splice into SQL.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('"')?;
        f.write_str(&self.0)?;
        f.write_char('"')
    }
}
