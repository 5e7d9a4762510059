//! Delimited-file exports for reporting and modeling tools

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::schema::{get_table, ColumnType};

/// Write a whole table to `dir/<table>.csv`, header first. Returns the
/// number of data rows.
pub fn export_table(conn: &Connection, table: &str, dir: &Path, delimiter: u8) -> Result<u64> {
    let schema = get_table(table).with_context(|| format!("Unknown table: {}", table))?;
    let path = export_path(dir, table)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    let columns = schema.column_names();
    writer.write_record(&columns)?;

    let sql = format!("SELECT {} FROM {} ORDER BY rowid", columns.join(", "), table);
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to read table: {}", table))?;
    let mut rows = stmt.query([])?;

    let mut count: u64 = 0;
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(columns.len());
        for (idx, column) in schema.columns.iter().enumerate() {
            record.push(render_cell(row.get_ref(idx)?, column.col_type));
        }
        writer.write_record(&record)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Whether `table` was written to the database
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to look up table: {}", table))?;
    Ok(count > 0)
}

/// Serialize records to `dir/<name>.csv`
pub fn export_records<T: Serialize>(
    records: impl IntoIterator<Item = T>,
    dir: &Path,
    name: &str,
    delimiter: u8,
) -> Result<u64> {
    let path = export_path(dir, name)?;
    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    write_records(records, file, delimiter)
}

/// Serialize records as delimited text with a header row
pub fn write_records<T: Serialize, W: Write>(
    records: impl IntoIterator<Item = T>,
    out: W,
    delimiter: u8,
) -> Result<u64> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(out);

    let mut count: u64 = 0;
    for record in records {
        writer.serialize(record)?;
        count += 1;
    }
    writer.flush()?;

    Ok(count)
}

fn export_path(dir: &Path, name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {:?}", dir))?;
    Ok(dir.join(format!("{}.csv", name)))
}

/// Money columns come back from NUMERIC storage as integers or reals
fn render_cell(value: ValueRef<'_>, col_type: ColumnType) -> String {
    match (value, col_type) {
        (ValueRef::Null, _) => String::new(),
        (ValueRef::Integer(i), ColumnType::Decimal) => format!("{}.00", i),
        (ValueRef::Real(f), ColumnType::Decimal) => format!("{:.2}", f),
        (ValueRef::Integer(i), _) => i.to_string(),
        (ValueRef::Real(f), _) => f.to_string(),
        (ValueRef::Text(t), _) | (ValueRef::Blob(t), _) => String::from_utf8_lossy(t).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_money_cells() {
        assert_eq!(render_cell(ValueRef::Integer(3), ColumnType::Decimal), "3.00");
        assert_eq!(render_cell(ValueRef::Real(2.5), ColumnType::Decimal), "2.50");
        assert_eq!(render_cell(ValueRef::Real(-0.1), ColumnType::Decimal), "-0.10");
        assert_eq!(render_cell(ValueRef::Integer(3), ColumnType::Integer), "3");
        assert_eq!(render_cell(ValueRef::Real(16.3), ColumnType::Real), "16.3");
        assert_eq!(render_cell(ValueRef::Null, ColumnType::Text), "");
    }

    #[test]
    fn test_write_records_has_header() {
        #[derive(Serialize)]
        struct Rec {
            quantity: i64,
            unit_price: String,
        }

        let mut out = Vec::new();
        let count = write_records(
            vec![Rec { quantity: 2, unit_price: "1.50".to_string() }],
            &mut out,
            b';',
        )
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "quantity;unit_price\n2;1.50\n");
    }

    #[test]
    fn test_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&crate::writer::schema_gen::generate_create_table(
            &crate::schema::tables::PRODUCTS,
        ))
        .unwrap();

        assert!(table_exists(&conn, "products").unwrap());
        assert!(!table_exists(&conn, "sales_analysis").unwrap());
    }

    #[test]
    fn test_export_table_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&crate::writer::schema_gen::generate_create_table(
            &crate::schema::tables::PRODUCTS,
        ))
        .unwrap();
        conn.execute(
            "INSERT INTO products VALUES ('A', 'Canada', 'MUG', '2.50', 3, '7.50')",
            [],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let count = export_table(&conn, "products", dir.path(), b',').unwrap();
        let text = std::fs::read_to_string(dir.path().join("products.csv")).unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            text,
            "stock_code,country,description,unit_price,total_quantity_sold,total_revenue\n\
             A,Canada,MUG,2.50,3,7.50\n"
        );
    }
}
