//! Archive entries and the write path
//!
//! The record class and payload are stored as standard base64 text, so the archive
//! table never sees raw payload bytes.

use base64::Engine;
use tracing::trace;

use crate::{ErrorDetail, codec::Payload, normalize::RawRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Plain insert into a cleared destination; an existing id is an error.
    Insert,
    /// Upsert keyed on id.
    Replace,
}

impl std::fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ArchiveMode::Insert => "insert",
            ArchiveMode::Replace => "replace",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub id: String,
    pub kind: String,
    pub payload: Payload,
}

/// An [`ArchiveEntry`] as stored: `(id, class, payload)` with base64 class and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEntry {
    pub id: String,
    pub class: String,
    pub payload: String,
}

impl ArchiveEntry {
    pub fn encode(&self) -> EncodedEntry {
        let engine = base64::engine::general_purpose::STANDARD;
        EncodedEntry {
            id: self.id.clone(),
            class: engine.encode(self.kind.as_bytes()),
            payload: engine.encode(self.payload.as_bytes()),
        }
    }

    /// Read an entry back from an archive table row.
    pub fn decode(row: &RawRow) -> Result<Self, ErrorDetail> {
        let column = |name: &str| {
            row.get(name)
                .ok_or_else(|| ErrorDetail::MissingField(name.to_owned()))
        };
        let engine = base64::engine::general_purpose::STANDARD;
        let kind = engine
            .decode(column("class")?)
            .map_err(ErrorDetail::Base64)?;
        let kind = String::from_utf8(kind).map_err(|e| ErrorDetail::Utf8(e.utf8_error()))?;
        let payload = engine
            .decode(column("payload")?)
            .map_err(ErrorDetail::Base64)?;
        Ok(Self {
            id: column("id")?.clone(),
            kind,
            payload: payload.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Insert mode found the id already present; nothing was written.
    Duplicate,
}

pub trait ArchiveStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create the destination table if missing, emptying it when `clear` is set.
    fn prepare(&self, clear: bool) -> impl Future<Output = Result<(), Self::Error>>;

    fn write(
        &self,
        entry: &EncodedEntry,
        mode: ArchiveMode,
    ) -> impl Future<Output = Result<WriteOutcome, Self::Error>>;
}

/// Encode and store one entry.
pub async fn archive<A: ArchiveStore>(
    store: &A,
    entry: &ArchiveEntry,
    mode: ArchiveMode,
) -> Result<(), ErrorDetail> {
    let encoded = entry.encode();
    let outcome = store
        .write(&encoded, mode)
        .await
        .map_err(|e| ErrorDetail::Archive(Box::new(e)))?;
    match outcome {
        WriteOutcome::Written => {
            trace!(id = entry.id, %mode, "archived entry");
            Ok(())
        }
        WriteOutcome::Duplicate => Err(ErrorDetail::DuplicateEntry(entry.id.clone())),
    }
}
