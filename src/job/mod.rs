//! Job execution module
//!
//! This module drives records from a windowed source into an archive table and back out
//! again. Storage is reached only through the traits defined here, so the SQLite adapters
//! in [`crate::deploy`] and in-memory test doubles are interchangeable.

pub mod archive;
pub mod paginate;
pub mod pipeline;
pub mod rehydrate;
pub mod sql;

pub use archive::{ArchiveEntry, ArchiveMode, ArchiveStore, EncodedEntry, WriteOutcome};
pub use paginate::{
    Paginator, PaginatorState, RelatedQuery, RelatedSource, Window, WindowQuery, WindowSource,
};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
pub use rehydrate::{JsonLinesSink, RecordSink, RehydrateError, RehydrateSummary, Rehydrator};

/// A session holding an exclusive resource (a checked-out connection) for the length of
/// a run. Drivers call [`Scoped::release`] on every exit path.
pub trait Scoped {
    fn release(self) -> impl Future<Output = ()>;
}
