use super::{Tag, TagEntry, TagPath};

/// Backing store of the tag dictionary.
pub trait TagDictionary {
    type Error: std::error::Error + Send + Sync + 'static;

    fn lookup(
        &self,
        path: &TagPath,
    ) -> impl Future<Output = Result<Option<TagEntry>, Self::Error>>;

    fn lookup_tag(&self, tag: Tag) -> impl Future<Output = Result<Option<TagEntry>, Self::Error>>;

    /// Every entry, used to prime the resolver cache once per process.
    fn entries(&self) -> impl Future<Output = Result<Vec<TagEntry>, Self::Error>>;
}
