use std::fmt::Write;

use super::Identifier;

/// `{column} {op} ?1`, with the text parameter cast to the storage class of each row.
/// Untyped columns apply no affinity, so an integer value never equals or exceeds
/// plain text.
fn compare_text(out: &mut String, column: &Identifier, op: &str) -> std::fmt::Result {
    writeln!(out, "WHERE {column} {op} CASE typeof({column})")?;
    writeln!(out, "  WHEN 'integer' THEN CAST(?1 AS INTEGER)")?;
    writeln!(out, "  WHEN 'real' THEN CAST(?1 AS REAL)")?;
    writeln!(out, "  ELSE ?1 END")
}

pub fn generate(
    out: &mut String,
    table: &Identifier,
    order_by: &Identifier,
    after_watermark: bool,
) -> std::fmt::Result {
    writeln!(out, "SELECT * FROM {table}")?;
    if after_watermark {
        compare_text(out, order_by, ">")?;
        writeln!(out, "ORDER BY {order_by} ASC")?;
        writeln!(out, "LIMIT ?2 OFFSET ?3;")?;
    } else {
        writeln!(out, "ORDER BY {order_by} ASC")?;
        writeln!(out, "LIMIT ?1 OFFSET ?2;")?;
    }
    Ok(())
}

pub fn generate_related(
    out: &mut String,
    table: &Identifier,
    foreign_key: &Identifier,
    order_by: &Identifier,
) -> std::fmt::Result {
    writeln!(out, "SELECT * FROM {table}")?;
    compare_text(out, foreign_key, "=")?;
    writeln!(out, "ORDER BY {order_by} ASC;")?;
    Ok(())
}
