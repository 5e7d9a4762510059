use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use super::schema_gen::{generate_create_table, generate_indexes};
use crate::parser::ToRow;
use crate::schema::TableSchema;
use crate::ui::Ui;

const BATCH_SIZE: usize = 1000;

pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    /// Start a fresh database; an existing file at `db_path` is replaced
    pub fn new(db_path: &Path) -> Result<Self> {
        if db_path.exists() {
            std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        }

        let conn = Connection::open(db_path).context("Failed to create database")?;
        Self::with_connection(conn)
    }

    /// Wrap an open connection (used for in-memory databases)
    pub fn with_connection(conn: Connection) -> Result<Self> {
        // Enable foreign keys and optimize for bulk insert
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create all tables for the given schemas
    pub fn create_tables(&self, schemas: &[&TableSchema], ui: &mut impl Ui) -> Result<()> {
        ui.log(format!("Creating {} tables...", schemas.len()));

        for schema in schemas {
            let sql = generate_create_table(schema);
            self.conn
                .execute(&sql, [])
                .with_context(|| format!("Failed to create table: {}", schema.name))?;

            for index_sql in generate_indexes(schema) {
                self.conn
                    .execute(&index_sql, [])
                    .with_context(|| format!("Failed to create index for: {}", schema.name))?;
            }
        }

        Ok(())
    }

    /// Insert every record into one table inside a single transaction.
    /// Nothing is kept from a table whose insert fails.
    pub fn insert_rows<T: ToRow>(
        &mut self,
        schema: &TableSchema,
        records: &[T],
        ui: &mut impl Ui,
    ) -> Result<u64> {
        let columns = schema.column_names();
        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.name,
            columns.join(", "),
            placeholders.join(", ")
        );

        let total = records.len() as u64;
        let tx = self.conn.transaction()?;
        let mut count: u64 = 0;

        for batch in records.chunks(BATCH_SIZE) {
            insert_batch(&tx, &insert_sql, &columns, batch)
                .with_context(|| format!("Failed to insert into {}", schema.name))?;
            count += batch.len() as u64;
            ui.set_progress(count, total, schema.name);
        }

        tx.commit()
            .with_context(|| format!("Failed to commit {}", schema.name))?;
        ui.clear_progress();
        ui.table_written(schema.name, count);

        Ok(count)
    }

    /// Finalize the database
    pub fn finalize(self, ui: &mut impl Ui) -> Result<Connection> {
        ui.log("Finalizing database...");
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(self.conn)
    }
}

/// Insert a batch of rows into the database
fn insert_batch<T: ToRow>(
    tx: &rusqlite::Transaction,
    sql: &str,
    columns: &[&str],
    batch: &[T],
) -> Result<()> {
    let mut stmt = tx.prepare_cached(sql)?;

    for record in batch {
        let row = record.to_row();
        for (idx, col_name) in columns.iter().enumerate() {
            row.get(col_name).bind_to(idx + 1, &mut stmt)?;
        }
        stmt.raw_execute()?;
    }

    Ok(())
}
