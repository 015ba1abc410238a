use std::fmt::Write as _;

use super::Identifier;

pub fn generate(out: &mut String, table: &Identifier) -> std::fmt::Result {
    writeln!(out, "CREATE TABLE IF NOT EXISTS {table} (")?;
    writeln!(out, "  id TEXT NOT NULL PRIMARY KEY,")?;
    writeln!(out, "  class TEXT NOT NULL,")?;
    writeln!(out, "  payload TEXT NOT NULL")?;
    writeln!(out, ");")?;
    Ok(())
}
