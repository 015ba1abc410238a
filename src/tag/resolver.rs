use std::{collections::HashMap, sync::RwLock};

use tracing::{debug, trace};

use crate::ErrorDetail;

use super::{Tag, TagDictionary, TagEntry, TagPath};

#[derive(Default)]
struct Cache {
    // `None` remembers a miss so unknown paths cost one round trip per run.
    by_path: HashMap<TagPath, Option<TagEntry>>,
    by_tag: HashMap<Tag, TagEntry>,
}

impl Cache {
    fn insert(&mut self, entry: TagEntry) {
        self.by_tag.insert(entry.tag, entry.clone());
        self.by_path.insert(entry.path.clone(), Some(entry));
    }
}

/// Resolves tag paths through a dictionary, caching every answer for the life of
/// the resolver. The cache is never invalidated.
pub struct TagResolver<D> {
    dictionary: D,
    cache: RwLock<Cache>,
}

impl<D: TagDictionary> TagResolver<D> {
    pub fn new(dictionary: D) -> Self {
        Self {
            dictionary,
            cache: RwLock::new(Cache::default()),
        }
    }

    pub fn dictionary(&self) -> &D {
        &self.dictionary
    }

    /// Load the whole dictionary into the cache.
    pub async fn prime(&self) -> Result<usize, ErrorDetail> {
        let entries = self
            .dictionary
            .entries()
            .await
            .map_err(|e| ErrorDetail::Dictionary(Box::new(e)))?;
        let count = entries.len();
        let mut cache = self.cache.write().unwrap();
        for entry in entries {
            cache.insert(entry);
        }
        debug!(count, "primed tag dictionary");
        Ok(count)
    }

    /// Resolve a path to its dictionary entry. A miss is `Ok(None)` unless `strict`.
    pub async fn resolve_entry(
        &self,
        path: &TagPath,
        strict: bool,
    ) -> Result<Option<TagEntry>, ErrorDetail> {
        let cached = self.cache.read().unwrap().by_path.get(path).cloned();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                trace!(%path, "tag cache miss");
                let entry = self
                    .dictionary
                    .lookup(path)
                    .await
                    .map_err(|e| ErrorDetail::Dictionary(Box::new(e)))?;
                let mut cache = self.cache.write().unwrap();
                match &entry {
                    Some(entry) => cache.insert(entry.clone()),
                    None => {
                        cache.by_path.insert(path.clone(), None);
                    }
                }
                entry
            }
        };
        match entry {
            None if strict => Err(ErrorDetail::UnresolvedTag(path.to_string())),
            entry => Ok(entry),
        }
    }

    /// Resolve a path to its tag; a non-strict miss yields [`Tag::UNKNOWN`].
    pub async fn resolve(&self, path: &TagPath, strict: bool) -> Result<Tag, ErrorDetail> {
        Ok(self
            .resolve_entry(path, strict)
            .await?
            .map(|entry| entry.tag)
            .unwrap_or(Tag::UNKNOWN))
    }

    /// Reverse lookup, falling back to the dictionary on a cache miss.
    pub async fn entry_for_tag(&self, tag: Tag) -> Result<Option<TagEntry>, ErrorDetail> {
        if let Some(entry) = self.cache.read().unwrap().by_tag.get(&tag) {
            return Ok(Some(entry.clone()));
        }
        let entry = self
            .dictionary
            .lookup_tag(tag)
            .await
            .map_err(|e| ErrorDetail::Dictionary(Box::new(e)))?;
        if let Some(entry) = &entry {
            self.cache.write().unwrap().insert(entry.clone());
        }
        Ok(entry)
    }
}
