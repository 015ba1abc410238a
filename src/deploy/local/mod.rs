//! SQLite adapters for every storage collaborator of a run.

use sqlx::{Column as _, Row as _, ValueRef as _};

use crate::{
    job::{
        WindowQuery,
        sql,
    },
    normalize::RawRow,
};

mod archive;
mod db;
mod dictionary;
mod references;
mod source;

pub use archive::LocalArchive;
pub use db::{Error, LocalDatabase};
pub use dictionary::LocalDictionary;
pub use references::LocalReferences;
pub use source::LocalSource;

/// Read every column as text. SQL `NULL` becomes an empty string.
fn raw_row(row: &sqlx::sqlite::SqliteRow) -> Result<RawRow, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| {
            let value = row.try_get_raw(column.ordinal())?;
            let text = if value.is_null() {
                String::new()
            } else {
                <String as sqlx::Decode<'_, sqlx::Sqlite>>::decode(value).map_err(sqlx::Error::Decode)?
            };
            Ok((column.name().to_owned(), text))
        })
        .collect()
}

fn bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

async fn fetch_window(
    conn: &mut sqlx::SqliteConnection,
    query: &WindowQuery<'_>,
) -> Result<Vec<RawRow>, Error> {
    let statement = sql::window(query.table, query.order_by, query.after.is_some());
    let mut prepared = sqlx::query(&statement);
    if let Some(after) = query.after {
        prepared = prepared.bind(after);
    }
    let rows = prepared
        .bind(bound(query.limit))
        .bind(bound(query.offset))
        .fetch_all(conn)
        .await
        .map_err(Error::Sqlite)?;
    rows.iter()
        .map(raw_row)
        .collect::<Result<_, _>>()
        .map_err(Error::Sqlite)
}
