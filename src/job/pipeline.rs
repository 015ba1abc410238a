//! The archival run
//!
//! `paginate -> normalize -> build -> serialize -> archive -> advance watermark`, one
//! row at a time. The source and archive sessions are released on every exit path
//! before the outcome is returned.

use tracing::{debug, info, warn};

use crate::{
    Error, ErrorContext, ErrorDetail, Stage,
    codec,
    lookup::CrossReference,
    normalize::{NormalizedFields, normalize_row},
    progress::{EntryStatus, ProgressReporter, RunPhase},
    record::{RecordBuilder, RelatedRows},
    schema::DatasetSchema,
    tag::{TagDictionary, TagResolver},
    warning::collect_warnings,
};

use super::{
    Scoped,
    archive::{self, ArchiveEntry, ArchiveMode, ArchiveStore},
    paginate::{Paginator, PaginatorState, RelatedQuery, RelatedSource, Window},
};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Resume after this `order_by` value. `None` starts a fresh run.
    pub watermark: Option<String>,
    /// Overrides the default mode: Insert when fresh, Replace when resumed.
    pub mode: Option<ArchiveMode>,
    /// When false, record-level defects are counted and the run goes on.
    pub abort_on_record_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            watermark: None,
            mode: None,
            abort_on_record_error: true,
        }
    }
}

impl RunOptions {
    pub fn mode(&self) -> ArchiveMode {
        self.mode.unwrap_or(match self.watermark {
            Some(_) => ArchiveMode::Replace,
            None => ArchiveMode::Insert,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub fetched: usize,
    pub archived: usize,
    pub blank: usize,
    pub failed: usize,
    /// `order_by` value of the last archived row; persist it to resume later.
    pub watermark: Option<String>,
    pub mode: ArchiveMode,
}

pub struct Pipeline<'a, S, A, D, L> {
    pub schema: &'a DatasetSchema,
    pub resolver: &'a TagResolver<D>,
    pub references: &'a L,
    pub source: S,
    pub archive: A,
    pub reporter: &'a dyn ProgressReporter,
}

impl<S, A, D, L> Pipeline<'_, S, A, D, L>
where
    S: RelatedSource + Scoped,
    A: ArchiveStore + Scoped,
    D: TagDictionary,
    L: CrossReference,
{
    pub async fn run(self, options: RunOptions) -> Result<RunSummary, Error> {
        let outcome = self.drive(&options).await;
        let Self {
            source,
            archive,
            reporter,
            ..
        } = self;
        source.release().await;
        archive.release().await;
        match &outcome {
            Ok(summary) => {
                info!(
                    archived = summary.archived,
                    blank = summary.blank,
                    failed = summary.failed,
                    watermark = summary.watermark.as_deref(),
                    "archive run finished"
                );
                reporter.log_info(&format!(
                    "{} records archived, {} blank rows, {} failed",
                    summary.archived, summary.blank, summary.failed
                ));
                reporter.set_phase(RunPhase::Completed);
            }
            Err(e) => reporter.set_phase(RunPhase::Failed(e.to_string())),
        }
        reporter.finish();
        outcome
    }

    async fn drive(&self, options: &RunOptions) -> Result<RunSummary, Error> {
        let schema = self.schema;
        let mode = options.mode();
        let clear = options.watermark.is_none() && mode == ArchiveMode::Insert;

        self.reporter.set_phase(RunPhase::PreparingArchive);
        self.archive
            .prepare(clear)
            .await
            .map_err(|e| ErrorContext::new(Stage::Archive).error(ErrorDetail::Archive(Box::new(e))))?;
        debug!(%mode, clear, watermark = options.watermark.as_deref(), "archive prepared");

        self.reporter.set_phase(RunPhase::Archiving);
        let builder = RecordBuilder::new(schema, self.resolver, self.references);
        let window = Window {
            table: schema.table.clone(),
            order_by: schema.order_by.clone(),
            page_size: schema.page_size,
        };
        let mut paginator = Paginator::new(&self.source, window, options.watermark.clone());
        let mut summary = RunSummary {
            pages: 0,
            fetched: 0,
            archived: 0,
            blank: 0,
            failed: 0,
            watermark: options.watermark.clone(),
            mode,
        };
        let mut page_rows = 0;

        loop {
            let row = match paginator.next_row().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    paginator.close();
                    return Err(ErrorContext::new(Stage::Fetch).error(ErrorDetail::Source(Box::new(e))));
                }
            };
            summary.fetched += 1;
            page_rows += 1;
            let order_key = row
                .get(schema.order_by.as_str())
                .map(|key| key.trim().to_owned())
                .filter(|key| !key.is_empty());

            match normalize_row(row) {
                None => summary.blank += 1,
                Some(fields) => {
                    let id = fields.get(&schema.id_column).unwrap_or_default().to_owned();
                    self.reporter.update_entry(&id, EntryStatus::Processing);
                    match self.process(&builder, &fields, &id, mode).await {
                        Ok(()) => {
                            summary.archived += 1;
                            if order_key.is_some() {
                                summary.watermark = order_key;
                            }
                            self.reporter.update_entry(&id, EntryStatus::Done);
                        }
                        Err(e) if e.is_record_level() && !options.abort_on_record_error => {
                            warn!(id, error = %e, "record skipped");
                            summary.failed += 1;
                            self.reporter
                                .update_entry(&id, EntryStatus::Failed(e.detail.to_string()));
                        }
                        Err(e) => {
                            paginator.close();
                            return Err(e);
                        }
                    }
                }
            }

            if paginator.state() == PaginatorState::Fetching {
                self.reporter.page_done(paginator.pages(), page_rows);
                page_rows = 0;
            }
        }

        summary.pages = paginator.pages();
        Ok(summary)
    }

    async fn process(
        &self,
        builder: &RecordBuilder<'_, D, L>,
        fields: &NormalizedFields,
        id: &str,
        mode: ArchiveMode,
    ) -> Result<(), Error> {
        let related = self
            .fetch_related(fields)
            .await
            .map_err(|detail| ErrorContext::new(Stage::Fetch).with_id(id).error(detail))?;

        let (built, warnings) = collect_warnings(builder.build(fields, &related)).await;
        for warning in warnings {
            self.reporter.log_warn(&format!("{id}: {warning}"));
        }
        let record =
            built.map_err(|detail| ErrorContext::new(Stage::Build).with_id(id).error(detail))?;

        let payload = codec::serialize(&record)
            .map_err(|detail| ErrorContext::new(Stage::Serialize).with_id(id).error(detail))?;

        let entry = ArchiveEntry {
            id: record.id,
            kind: record.kind,
            payload,
        };
        archive::archive(&self.archive, &entry, mode)
            .await
            .map_err(|detail| ErrorContext::new(Stage::Archive).with_id(id).error(detail))
    }

    async fn fetch_related(&self, fields: &NormalizedFields) -> Result<RelatedRows, ErrorDetail> {
        let mut related = RelatedRows::new();
        for relation in &self.schema.relations {
            let Some(key) = fields.get(&relation.parent_key) else {
                continue;
            };
            let query = RelatedQuery {
                table: &relation.table,
                foreign_key: &relation.foreign_key,
                order_by: &relation.order_by,
                key,
            };
            let rows = self
                .source
                .fetch_related(&query)
                .await
                .map_err(|e| ErrorDetail::Source(Box::new(e)))?;
            related.insert(
                relation.name.clone(),
                rows.into_iter().filter_map(normalize_row).collect(),
            );
        }
        Ok(related)
    }
}
