//! Cross-reference lookups (country, institute, term).
//!
//! Lookups are injected collaborators. A miss is `Ok(None)`; what a miss means for the
//! record is decided per field by [`MissingPolicy`].

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Country,
    Institute,
    Term,
}

impl ReferenceKind {
    /// Unknown countries fail the record; unknown institutes and terms are skipped.
    pub fn default_policy(self) -> MissingPolicy {
        match self {
            ReferenceKind::Country => MissingPolicy::Fail,
            ReferenceKind::Institute | ReferenceKind::Term => MissingPolicy::Skip,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReferenceKind::Country => "country",
            ReferenceKind::Institute => "institute",
            ReferenceKind::Term => "term",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    Fail,
    Skip,
}

pub trait CrossReference {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Canonical code or name for `code`, `None` when unknown.
    fn resolve(
        &self,
        kind: ReferenceKind,
        code: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>>;
}
