use std::fmt::Write;

use super::Identifier;

pub fn generate(out: &mut String, table: &Identifier) -> std::fmt::Result {
    writeln!(out, "DELETE FROM {table};")?;
    Ok(())
}
