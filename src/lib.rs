pub mod codec;
pub mod config;
pub mod deploy;
pub mod job;
pub mod lookup;
pub mod normalize;
pub mod progress;
pub mod record;
pub mod schema;
pub mod tag;
pub mod warning;

#[cfg(test)]
mod tests;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

impl Error {
    pub fn is_record_level(&self) -> bool {
        self.detail.is_record_level()
    }
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dictionary,
    Fetch,
    Build,
    Serialize,
    Archive,
    Rehydrate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Dictionary => "dictionary",
            Stage::Fetch => "fetch",
            Stage::Build => "build",
            Stage::Serialize => "serialize",
            Stage::Archive => "archive",
            Stage::Rehydrate => "rehydrate",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub stage: Stage,
    pub id: Option<String>,
}

impl ErrorContext {
    pub(crate) fn new(stage: Stage) -> Self {
        Self { stage, id: None }
    }

    pub(crate) fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            stage: self.stage,
            id: Some(id.into()),
        }
    }

    pub(crate) fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}({id})", self.stage),
            None => write!(f, "{}", self.stage),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Unresolved tag: {0}")]
    UnresolvedTag(String),
    #[error("Unresolved {kind} reference: {code}")]
    UnresolvedReference {
        kind: lookup::ReferenceKind,
        code: String,
    },
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Invalid value for {tag}: expected {expected}, got {value:?}")]
    InvalidValue {
        tag: String,
        value: String,
        expected: &'static str,
    },
    #[error("Tag {tag} is declared as {declared} but mapped as {mapped}")]
    KindMismatch {
        tag: String,
        declared: tag::TagKind,
        mapped: &'static str,
    },
    #[error("Unknown record type: {0}")]
    UnknownType(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Invalid base64: {0}")]
    Base64(base64::DecodeError),
    #[error("Invalid UTF-8: {0}")]
    Utf8(std::str::Utf8Error),
    #[error("Failed to parse payload: {0}")]
    Xml(roxmltree::Error),
    #[error("Page size must be at least 1")]
    ZeroPageSize,
    #[error("Entry already archived: {0}")]
    DuplicateEntry(String),
    #[error("Source error: {0}")]
    Source(BoxError),
    #[error("Archive error: {0}")]
    Archive(BoxError),
    #[error("Dictionary error: {0}")]
    Dictionary(BoxError),
    #[error("Lookup error: {0}")]
    Lookup(BoxError),
    #[error("Sink error: {0}")]
    Sink(BoxError),
}

impl ErrorDetail {
    /// Defects confined to a single record; everything else ends the run.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            ErrorDetail::UnresolvedReference { .. }
                | ErrorDetail::MissingField(_)
                | ErrorDetail::InvalidValue { .. }
        )
    }
}
