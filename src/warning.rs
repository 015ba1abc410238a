//! Per-record warnings
//!
//! Soft failures while building a record are not errors, but the operator should
//! still hear about them. The builder raises them with [`emit`]; the pipeline wraps
//! each build in [`collect_warnings`] and forwards what it gathered to the progress
//! reporter, prefixed with the record id.

use std::cell::RefCell;

use crate::{lookup::ReferenceKind, tag::TagPath};

/// Something dropped or ignored while building one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A lenient mapping named a tag the dictionary does not know.
    UnknownTag(TagPath),
    /// A `skip` reference field held a code with no canonical name.
    UnknownReference {
        kind: ReferenceKind,
        code: String,
        column: String,
    },
    /// A one-to-one relation matched more than one child row.
    SurplusRelationRows { relation: String, rows: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownTag(path) => write!(f, "unknown tag {path}, value omitted"),
            Warning::UnknownReference { kind, code, column } => {
                write!(f, "unknown {kind} {code:?} in {column}, value omitted")
            }
            Warning::SurplusRelationRows { relation, rows } => {
                write!(f, "relation {relation} has {rows} rows, keeping the first")
            }
        }
    }
}

tokio::task_local! {
    static RECORD_WARNINGS: RefCell<Vec<Warning>>;
}

/// Raise a warning for the record being built. Outside of [`collect_warnings`]
/// it is only traced.
pub fn emit(warning: Warning) {
    tracing::debug!(%warning, "record warning");
    let _ = RECORD_WARNINGS.try_with(|warnings| warnings.borrow_mut().push(warning));
}

/// Await `build`, returning its output and the warnings it raised, in order.
pub async fn collect_warnings<T>(build: impl Future<Output = T>) -> (T, Vec<Warning>) {
    RECORD_WARNINGS
        .scope(RefCell::new(Vec::new()), async {
            let output = build.await;
            let warnings = RECORD_WARNINGS.with(|warnings| warnings.take());
            (output, warnings)
        })
        .await
}
