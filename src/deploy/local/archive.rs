use futures::lock::Mutex;
use sqlx::{Sqlite, pool::PoolConnection};
use tracing::debug;

use crate::{
    job::{
        ArchiveMode, ArchiveStore, EncodedEntry, Scoped, WindowQuery, WindowSource, WriteOutcome,
        sql::{self, Identifier},
    },
    normalize::RawRow,
};

use super::{Error, fetch_window};

/// The `(id, class, payload)` archive table, over one checked-out connection.
pub struct LocalArchive {
    conn: Mutex<PoolConnection<Sqlite>>,
    table: Identifier,
}

impl LocalArchive {
    pub(super) fn new(conn: PoolConnection<Sqlite>, table: Identifier) -> Self {
        Self {
            conn: Mutex::new(conn),
            table,
        }
    }

    pub fn table(&self) -> &Identifier {
        &self.table
    }
}

impl ArchiveStore for LocalArchive {
    type Error = Error;

    async fn prepare(&self, clear: bool) -> Result<(), Self::Error> {
        let mut conn = self.conn.lock().await;
        sqlx::query(&sql::archive_ddl(&self.table))
            .execute(&mut **conn)
            .await
            .map_err(Error::Sqlite)?;
        if clear {
            let cleared = sqlx::query(&sql::archive_clear(&self.table))
                .execute(&mut **conn)
                .await
                .map_err(Error::Sqlite)?;
            debug!(
                table = self.table.as_str(),
                rows = cleared.rows_affected(),
                "cleared archive"
            );
        }
        Ok(())
    }

    async fn write(&self, entry: &EncodedEntry, mode: ArchiveMode) -> Result<WriteOutcome, Self::Error> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query(&sql::archive_write(&self.table, mode))
            .bind(&entry.id)
            .bind(&entry.class)
            .bind(&entry.payload)
            .execute(&mut **conn)
            .await;
        match result {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(WriteOutcome::Duplicate),
            Err(e) => Err(Error::Sqlite(e)),
        }
    }
}

/// Archived entries are read back through the same windowed query as source rows.
impl WindowSource for LocalArchive {
    type Error = Error;

    async fn fetch_window(&self, query: &WindowQuery<'_>) -> Result<Vec<RawRow>, Self::Error> {
        let mut conn = self.conn.lock().await;
        fetch_window(&mut conn, query).await
    }
}

impl Scoped for LocalArchive {
    async fn release(self) {
        drop(self.conn.into_inner());
        debug!(table = self.table.as_str(), "archive connection released");
    }
}
