pub mod export;
pub mod schema_gen;
pub mod sqlite;

pub use export::{export_records, export_table, table_exists, write_records};
pub use sqlite::SqliteWriter;
