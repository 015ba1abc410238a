use crate::lookup::{CrossReference, ReferenceKind};

use super::Error;

/// `countries`, `institutes` and `terms` tables, each `(code, name)`.
#[derive(Clone)]
pub struct LocalReferences {
    pool: sqlx::SqlitePool,
}

impl LocalReferences {
    pub(super) fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

fn statement(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Country => "SELECT name FROM countries WHERE code = ?",
        ReferenceKind::Institute => "SELECT name FROM institutes WHERE code = ?",
        ReferenceKind::Term => "SELECT name FROM terms WHERE code = ?",
    }
}

impl CrossReference for LocalReferences {
    type Error = Error;

    async fn resolve(&self, kind: ReferenceKind, code: &str) -> Result<Option<String>, Self::Error> {
        let name: Option<(String,)> = sqlx::query_as(statement(kind))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Sqlite)?;
        Ok(name.map(|(name,)| name))
    }
}
