use std::fmt::Write as _;

use crate::job::archive::ArchiveMode;

use super::Identifier;

pub fn generate(out: &mut String, table: &Identifier, mode: ArchiveMode) -> std::fmt::Result {
    writeln!(out, "INSERT INTO {table}(id, class, payload)")?;
    writeln!(out, "VALUES (?, ?, ?)")?;
    match mode {
        ArchiveMode::Insert => {
            out.pop();
            writeln!(out, ";")?;
        }
        ArchiveMode::Replace => {
            writeln!(out, "ON CONFLICT (id)")?;
            writeln!(out, "DO UPDATE SET")?;
            writeln!(out, "  class = EXCLUDED.class,")?;
            writeln!(out, "  payload = EXCLUDED.payload;")?;
        }
    }
    Ok(())
}
