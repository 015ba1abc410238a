use crate::tag::{Tag, TagDictionary, TagEntry, TagKind, TagPath};

use super::Error;

const SELECT_ENTRY: &str = "SELECT path, code, kind FROM tag_dictionary";

/// `tag_dictionary(path, code, kind)` table.
#[derive(Clone)]
pub struct LocalDictionary {
    pool: sqlx::SqlitePool,
}

impl LocalDictionary {
    pub(super) fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

fn entry((path, code, kind): (String, i64, String)) -> Result<TagEntry, Error> {
    let corrupt = |reason: String| Error::CorruptEntry {
        path: path.clone(),
        reason,
    };
    let code = u32::try_from(code)
        .ok()
        .filter(|code| *code != Tag::UNKNOWN.code())
        .ok_or_else(|| corrupt(format!("code {code} out of range")))?;
    let kind = kind
        .parse::<TagKind>()
        .map_err(|e| corrupt(e.to_string()))?;
    Ok(TagEntry {
        path: TagPath::new(path),
        tag: Tag::new(code),
        kind,
    })
}

impl TagDictionary for LocalDictionary {
    type Error = Error;

    async fn lookup(&self, path: &TagPath) -> Result<Option<TagEntry>, Self::Error> {
        let row: Option<(String, i64, String)> =
            sqlx::query_as(&format!("{SELECT_ENTRY} WHERE path = ?"))
                .bind(path.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlite)?;
        row.map(entry).transpose()
    }

    async fn lookup_tag(&self, tag: Tag) -> Result<Option<TagEntry>, Self::Error> {
        let row: Option<(String, i64, String)> =
            sqlx::query_as(&format!("{SELECT_ENTRY} WHERE code = ?"))
                .bind(i64::from(tag.code()))
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlite)?;
        row.map(entry).transpose()
    }

    async fn entries(&self) -> Result<Vec<TagEntry>, Self::Error> {
        let rows: Vec<(String, i64, String)> = sqlx::query_as(&format!("{SELECT_ENTRY} ORDER BY code"))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Sqlite)?;
        rows.into_iter().map(entry).collect()
    }
}
