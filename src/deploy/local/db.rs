use std::str::FromStr;

use crate::job::sql::Identifier;

use super::{LocalArchive, LocalDictionary, LocalReferences, LocalSource};

pub struct LocalDatabase {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(sqlx::Error),
    #[error("corrupt dictionary entry {path}: {reason}")]
    CorruptEntry { path: String, reason: String },
}

impl LocalDatabase {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)?;
        let pool = sqlx::sqlite::SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Check out a dedicated connection for reading source rows.
    pub async fn source(&self) -> Result<LocalSource, Error> {
        let conn = self.pool.acquire().await.map_err(Error::Sqlite)?;
        Ok(LocalSource::new(conn))
    }

    /// Check out a dedicated connection for the archive table `table`.
    pub async fn archive(&self, table: Identifier) -> Result<LocalArchive, Error> {
        let conn = self.pool.acquire().await.map_err(Error::Sqlite)?;
        Ok(LocalArchive::new(conn, table))
    }

    pub fn dictionary(&self) -> LocalDictionary {
        LocalDictionary::new(self.pool.clone())
    }

    pub fn references(&self) -> LocalReferences {
        LocalReferences::new(self.pool.clone())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Close every database a command opened. Callers run this on success and
    /// failure alike.
    pub async fn close_all(databases: impl IntoIterator<Item = Self>) {
        for database in databases {
            database.close().await;
        }
    }
}
