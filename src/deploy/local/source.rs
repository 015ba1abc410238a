use futures::lock::Mutex;
use sqlx::{Sqlite, pool::PoolConnection};
use tracing::debug;

use crate::{
    job::{RelatedQuery, RelatedSource, Scoped, WindowQuery, WindowSource, sql},
    normalize::RawRow,
};

use super::{Error, fetch_window, raw_row};

/// Source rows read over one checked-out connection.
pub struct LocalSource {
    conn: Mutex<PoolConnection<Sqlite>>,
}

impl LocalSource {
    pub(super) fn new(conn: PoolConnection<Sqlite>) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl WindowSource for LocalSource {
    type Error = Error;

    async fn fetch_window(&self, query: &WindowQuery<'_>) -> Result<Vec<RawRow>, Self::Error> {
        let mut conn = self.conn.lock().await;
        fetch_window(&mut conn, query).await
    }
}

impl RelatedSource for LocalSource {
    async fn fetch_related(&self, query: &RelatedQuery<'_>) -> Result<Vec<RawRow>, Self::Error> {
        let statement = sql::related(query.table, query.foreign_key, query.order_by);
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(&statement)
            .bind(query.key)
            .fetch_all(&mut **conn)
            .await
            .map_err(Error::Sqlite)?;
        rows.iter()
            .map(raw_row)
            .collect::<Result<_, _>>()
            .map_err(Error::Sqlite)
    }
}

impl Scoped for LocalSource {
    async fn release(self) {
        drop(self.conn.into_inner());
        debug!("source connection released");
    }
}
