//! Archive back to records
//!
//! Archived entries are independent, so a bad entry is reported and skipped while
//! transport failures end the stream.

use std::path::PathBuf;

use futures::{Stream, StreamExt as _};
use tracing::{debug, warn};

use crate::{
    Error, ErrorContext, ErrorDetail, Stage,
    codec::{self, TagKinds, TypeRegistry},
    normalize::RawRow,
    progress::{EntryStatus, ProgressReporter, RunPhase},
    record::TaggedRecord,
};

use super::{
    Scoped,
    archive::ArchiveEntry,
    paginate::{Paginator, PaginatorState, Window, WindowSource},
    sql::Identifier,
};

#[derive(Debug, thiserror::Error)]
pub enum RehydrateError {
    #[error("entry {id}: {detail}")]
    Entry { id: String, detail: ErrorDetail },
    #[error(transparent)]
    Fatal(Error),
}

/// Where rehydrated records end up.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn persist(&mut self, record: TaggedRecord) -> impl Future<Output = Result<(), Self::Error>>;
}

impl RecordSink for Vec<TaggedRecord> {
    type Error = std::convert::Infallible;

    async fn persist(&mut self, record: TaggedRecord) -> Result<(), Self::Error> {
        self.push(record);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Buffers records as JSON lines and writes the file on [`JsonLinesSink::flush`].
pub struct JsonLinesSink {
    path: PathBuf,
    buffer: Vec<u8>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buffer: Vec::new(),
        }
    }

    pub async fn flush(self) -> Result<(), SinkError> {
        tokio::fs::write(&self.path, &self.buffer)
            .await
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

impl RecordSink for JsonLinesSink {
    type Error = SinkError;

    async fn persist(&mut self, record: TaggedRecord) -> Result<(), Self::Error> {
        serde_json::to_writer(&mut self.buffer, &record)?;
        self.buffer.push(b'\n');
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrateSummary {
    pub pages: usize,
    pub restored: usize,
    pub failed: usize,
}

async fn decode_entry(
    row: &RawRow,
    kinds: &impl TagKinds,
    registry: &TypeRegistry,
) -> Result<TaggedRecord, RehydrateError> {
    let id = row.get("id").cloned().unwrap_or_default();
    let entry_error = |detail: ErrorDetail| match detail {
        // Dictionary transport failures end the stream.
        ErrorDetail::Dictionary(_) => {
            RehydrateError::Fatal(ErrorContext::new(Stage::Dictionary).with_id(&id).error(detail))
        }
        detail => RehydrateError::Entry {
            id: id.clone(),
            detail,
        },
    };
    let entry = ArchiveEntry::decode(row).map_err(entry_error)?;
    let record = codec::deserialize(entry.payload.as_bytes(), kinds, registry)
        .await
        .map_err(entry_error)?;
    if record.id != entry.id || record.kind != entry.kind {
        return Err(entry_error(ErrorDetail::MalformedPayload(format!(
            "payload describes {}/{}, archived as {}/{}",
            record.kind, record.id, entry.kind, entry.id
        ))));
    }
    Ok(record)
}

/// One decoded entry, plus the page number when it was the last row of its page.
struct Step {
    result: Result<TaggedRecord, RehydrateError>,
    page_done: Option<usize>,
}

pub struct Rehydrator<'a, S, K> {
    pub source: S,
    pub table: Identifier,
    pub page_size: u64,
    pub kinds: &'a K,
    pub registry: &'a TypeRegistry,
    pub reporter: &'a dyn ProgressReporter,
}

impl<'a, S, K> Rehydrator<'a, S, K>
where
    S: WindowSource + Scoped,
    K: TagKinds,
{
    fn paginator(&self) -> Result<Paginator<'_, S>, Error> {
        let context = ErrorContext::new(Stage::Rehydrate);
        if self.page_size == 0 {
            return Err(context.error(ErrorDetail::ZeroPageSize));
        }
        let order_by =
            Identifier::new("id").map_err(|e| context.error(ErrorDetail::Source(Box::new(e))))?;
        let window = Window {
            table: self.table.clone(),
            order_by,
            page_size: self.page_size,
        };
        Ok(Paginator::new(&self.source, window, None))
    }

    fn steps(&self) -> impl Stream<Item = Step> + '_ {
        let kinds = self.kinds;
        let registry = self.registry;
        let start = self.paginator().map_err(RehydrateError::Fatal);
        futures::stream::unfold(Some(start), move |state| async move {
            let mut paginator = match state? {
                Ok(paginator) => paginator,
                Err(e) => {
                    let step = Step {
                        result: Err(e),
                        page_done: None,
                    };
                    return Some((step, None));
                }
            };
            let row = match paginator.next_row().await {
                Ok(None) => return None,
                Ok(Some(row)) => row,
                Err(e) => {
                    let error = ErrorContext::new(Stage::Fetch).error(ErrorDetail::Source(Box::new(e)));
                    let step = Step {
                        result: Err(RehydrateError::Fatal(error)),
                        page_done: None,
                    };
                    return Some((step, None));
                }
            };
            let page_done =
                (paginator.state() == PaginatorState::Fetching).then(|| paginator.pages());
            let result = decode_entry(&row, kinds, registry).await;
            let next = match result {
                Err(RehydrateError::Fatal(_)) => None,
                _ => Some(Ok(paginator)),
            };
            Some((Step { result, page_done }, next))
        })
    }

    /// Entries in id order. Per-entry failures are yielded as [`RehydrateError::Entry`]
    /// and the stream goes on; a fatal failure is yielded once and ends it.
    pub fn records(&self) -> impl Stream<Item = Result<TaggedRecord, RehydrateError>> + '_ {
        self.steps().map(|step| step.result)
    }

    /// Drain [`Self::records`] into `sink`, then release the source.
    pub async fn run<R: RecordSink>(self, sink: &mut R) -> Result<RehydrateSummary, Error> {
        self.reporter.set_phase(RunPhase::Rehydrating);
        let outcome = self.drain(sink).await;
        let reporter = self.reporter;
        self.source.release().await;
        match &outcome {
            Ok(summary) => {
                debug!(
                    restored = summary.restored,
                    failed = summary.failed,
                    "rehydration finished"
                );
                reporter.log_info(&format!(
                    "{} records restored, {} entries skipped",
                    summary.restored, summary.failed
                ));
                reporter.set_phase(RunPhase::Completed);
            }
            Err(e) => reporter.set_phase(RunPhase::Failed(e.to_string())),
        }
        reporter.finish();
        outcome
    }

    async fn drain<R: RecordSink>(&self, sink: &mut R) -> Result<RehydrateSummary, Error> {
        let mut summary = RehydrateSummary::default();
        let mut page_rows = 0;
        let steps = self.steps();
        futures::pin_mut!(steps);
        while let Some(Step { result, page_done }) = steps.next().await {
            page_rows += 1;
            match result {
                Ok(record) => {
                    let id = record.id.clone();
                    sink.persist(record).await.map_err(|e| {
                        ErrorContext::new(Stage::Rehydrate)
                            .with_id(&id)
                            .error(ErrorDetail::Sink(Box::new(e)))
                    })?;
                    summary.restored += 1;
                    self.reporter.update_entry(&id, EntryStatus::Done);
                }
                Err(RehydrateError::Entry { id, detail }) => {
                    warn!(id, error = %detail, "skipping archived entry");
                    summary.failed += 1;
                    self.reporter
                        .update_entry(&id, EntryStatus::Failed(detail.to_string()));
                }
                Err(RehydrateError::Fatal(e)) => return Err(e),
            }
            if let Some(page) = page_done {
                summary.pages = page;
                self.reporter.page_done(page, page_rows);
                page_rows = 0;
            }
        }
        Ok(summary)
    }
}
