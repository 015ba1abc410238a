use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use sqlx::prelude::FromRow;

use crate::{
    config,
    deploy::local::{LocalDatabase, LocalDictionary},
    job::{
        ArchiveMode, ArchiveStore, EncodedEntry, RelatedQuery, RelatedSource, Scoped, WindowQuery,
        WindowSource, WriteOutcome, sql::Identifier,
    },
    normalize::RawRow,
    schema::DatasetSchema,
    tag::TagResolver,
};

mod archive;
mod builder;

pub(crate) async fn load_schema(path: &str) -> DatasetSchema {
    let dataset = config::Dataset::load(path).await.unwrap();
    DatasetSchema::compile(&dataset).unwrap()
}

pub(crate) fn parse_schema(yaml: &str) -> DatasetSchema {
    let dataset = config::Dataset::parse(yaml, std::path::Path::new("inline.yaml")).unwrap();
    DatasetSchema::compile(&dataset).unwrap()
}

pub(crate) async fn seeded(script: &str) -> LocalDatabase {
    let db = LocalDatabase::open("sqlite::memory:").await.unwrap();
    let script = tokio::fs::read_to_string(script).await.unwrap();
    sqlx::raw_sql(&script).execute(db.pool()).await.unwrap();
    db
}

/// Source, destination and dictionary databases of the accession scenario.
pub(crate) struct Fixture {
    pub source: LocalDatabase,
    pub destination: LocalDatabase,
    pub graph: LocalDatabase,
    pub resolver: TagResolver<LocalDictionary>,
    pub schema: DatasetSchema,
}

pub(crate) async fn fixture() -> Fixture {
    let source = seeded("src/tests/accession/source.sql").await;
    let graph = seeded("src/tests/accession/dictionary.sql").await;
    let destination = LocalDatabase::open("sqlite::memory:").await.unwrap();
    let resolver = TagResolver::new(graph.dictionary());
    Fixture {
        source,
        destination,
        resolver,
        graph,
        schema: load_schema("src/tests/accession/mapping.yaml").await,
    }
}

#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchiveRow {
    pub id: String,
    pub class: String,
    pub payload: String,
}

pub(crate) async fn archive_rows(db: &LocalDatabase, table: &str) -> Vec<ArchiveRow> {
    sqlx::query_as::<_, ArchiveRow>(&format!("SELECT * FROM {table} ORDER BY id ASC"))
        .fetch_all(db.pool())
        .await
        .unwrap()
}

pub(crate) fn table(name: &str) -> Identifier {
    Identifier::new(name).unwrap()
}

#[derive(Debug, thiserror::Error)]
#[error("connection reset")]
pub(crate) struct ConnectionReset;

/// In-memory source that fails once `fail_after` windows have been served.
pub(crate) struct MemorySource {
    pub rows: Vec<RawRow>,
    pub fail_after: Option<usize>,
    pub served: std::sync::atomic::AtomicUsize,
    pub released: AtomicBool,
}

impl MemorySource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            fail_after: None,
            served: Default::default(),
            released: AtomicBool::new(false),
        }
    }
}

impl WindowSource for &MemorySource {
    type Error = ConnectionReset;

    async fn fetch_window(&self, query: &WindowQuery<'_>) -> Result<Vec<RawRow>, Self::Error> {
        let served = self.served.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| served >= limit) {
            return Err(ConnectionReset);
        }
        Ok(self
            .rows
            .iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }
}

impl RelatedSource for &MemorySource {
    async fn fetch_related(&self, _query: &RelatedQuery<'_>) -> Result<Vec<RawRow>, Self::Error> {
        Ok(Vec::new())
    }
}

impl Scoped for &MemorySource {
    async fn release(self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// In-memory archive keyed by id.
#[derive(Default)]
pub(crate) struct MemoryArchive {
    pub entries: std::sync::Mutex<IndexMap<String, EncodedEntry>>,
    pub released: AtomicBool,
}

impl ArchiveStore for &MemoryArchive {
    type Error = ConnectionReset;

    async fn prepare(&self, clear: bool) -> Result<(), Self::Error> {
        if clear {
            self.entries.lock().unwrap().clear();
        }
        Ok(())
    }

    async fn write(&self, entry: &EncodedEntry, mode: ArchiveMode) -> Result<WriteOutcome, Self::Error> {
        let mut entries = self.entries.lock().unwrap();
        if mode == ArchiveMode::Insert && entries.contains_key(&entry.id) {
            return Ok(WriteOutcome::Duplicate);
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(WriteOutcome::Written)
    }
}

impl Scoped for &MemoryArchive {
    async fn release(self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
