//! SQL text for the SQLite adapters.
//!
//! Every table and column name reaching these generators is an [`Identifier`], so
//! it can be quoted and spliced into statement text.

use crate::job::archive::ArchiveMode;

mod builder;
mod cleanup;
mod ddl;
mod upsert;
mod window;

pub use builder::{Identifier, InvalidIdentifier};

pub fn window(table: &Identifier, order_by: &Identifier, after_watermark: bool) -> String {
    let mut out = String::new();
    window::generate(&mut out, table, order_by, after_watermark).unwrap();
    out
}

pub fn related(table: &Identifier, foreign_key: &Identifier, order_by: &Identifier) -> String {
    let mut out = String::new();
    window::generate_related(&mut out, table, foreign_key, order_by).unwrap();
    out
}

pub fn archive_ddl(table: &Identifier) -> String {
    let mut out = String::new();
    ddl::generate(&mut out, table).unwrap();
    out
}

pub fn archive_write(table: &Identifier, mode: ArchiveMode) -> String {
    let mut out = String::new();
    upsert::generate(&mut out, table, mode).unwrap();
    out
}

pub fn archive_clear(table: &Identifier) -> String {
    let mut out = String::new();
    cleanup::generate(&mut out, table).unwrap();
    out
}
