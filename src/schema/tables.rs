//! Table schema definitions for every relation the pipeline persists

use super::types::*;

// =============================================================================
// Source Tables (verbatim input rows)
// =============================================================================

pub static RAW_TRANSACTIONS: TableSchema = TableSchema {
    name: "raw_transactions",
    description: "Transaction rows as read from the input file",
    stage: Stage::Raw,
    columns: &[
        Column::key("source_row", ColumnType::Integer),
        Column::new("invoice_no", ColumnType::Text),
        Column::new("stock_code", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::new("quantity", ColumnType::Text),
        Column::new("invoice_date", ColumnType::Text),
        Column::new("unit_price", ColumnType::Text),
        Column::new("customer_id", ColumnType::Text),
        Column::new("country", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[],
    derived_from: &[],
};

pub static RAW_CENSUS: TableSchema = TableSchema {
    name: "raw_census",
    description: "Census rows as read from the input file",
    stage: Stage::Raw,
    columns: &[
        Column::key("source_row", ColumnType::Integer),
        Column::new("topic", ColumnType::Text),
        Column::new("characteristic", ColumnType::Text),
        Column::new("total", ColumnType::Text),
        Column::new("flag_total", ColumnType::Text),
        Column::new("men", ColumnType::Text),
        Column::new("flag_men", ColumnType::Text),
        Column::new("women", ColumnType::Text),
        Column::new("flag_women", ColumnType::Text),
        Column::new("total_rate", ColumnType::Text),
        Column::new("flag_total_rate", ColumnType::Text),
        Column::new("men_rate", ColumnType::Text),
        Column::new("flag_men_rate", ColumnType::Text),
        Column::new("women_rate", ColumnType::Text),
        Column::new("flag_women_rate", ColumnType::Text),
        Column::new("notes", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[],
    derived_from: &[],
};

// =============================================================================
// Cleaned Tables
// =============================================================================

pub static TRANSACTIONS_CLEANED: TableSchema = TableSchema {
    name: "transactions_cleaned",
    description: "Deduplicated, typed transactions with defaults filled",
    stage: Stage::Cleaned,
    columns: &[
        Column::key("source_row", ColumnType::Integer),
        Column::new("invoice_no", ColumnType::Text),
        Column::new("stock_code", ColumnType::Text),
        Column::required("description", ColumnType::Text),
        Column::required("quantity", ColumnType::Integer),
        Column::new("invoice_date", ColumnType::Timestamp),
        Column::required("unit_price", ColumnType::Decimal),
        Column::required("customer_id", ColumnType::Text),
        Column::new("country", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[Index::on(&["country", "customer_id"])],
    derived_from: &["raw_transactions"],
};

pub static CENSUS_CLEANED: TableSchema = TableSchema {
    name: "census_cleaned",
    description: "Census measurements with flags and notes dropped",
    stage: Stage::Cleaned,
    columns: &[
        Column::key("source_row", ColumnType::Integer),
        Column::new("topic", ColumnType::Text),
        Column::new("characteristic", ColumnType::Text),
        Column::required("total", ColumnType::Real),
        Column::required("men", ColumnType::Real),
        Column::required("women", ColumnType::Real),
        Column::required("total_rate", ColumnType::Real),
        Column::required("men_rate", ColumnType::Real),
        Column::required("women_rate", ColumnType::Real),
        Column::required("country", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[Index::on(&["topic"])],
    derived_from: &["raw_census"],
};

// =============================================================================
// Dimensional Tables (scoped to one country)
// =============================================================================

pub static CUSTOMERS: TableSchema = TableSchema {
    name: "customers",
    description: "One row per customer with purchase aggregates",
    stage: Stage::Dimension,
    columns: &[
        Column::key("customer_id", ColumnType::Text),
        Column::required("country", ColumnType::Text),
        Column::required("first_purchase", ColumnType::Timestamp),
        Column::required("last_purchase", ColumnType::Timestamp),
        Column::required("total_purchases", ColumnType::Integer),
        Column::required("total_spent", ColumnType::Decimal),
    ],
    foreign_keys: &[],
    indexes: &[],
    derived_from: &["transactions_cleaned"],
};

pub static PRODUCTS: TableSchema = TableSchema {
    name: "products",
    description: "One row per stock code with a representative description and price",
    stage: Stage::Dimension,
    columns: &[
        Column::key("stock_code", ColumnType::Text),
        Column::required("country", ColumnType::Text),
        Column::required("description", ColumnType::Text),
        Column::required("unit_price", ColumnType::Decimal),
        Column::required("total_quantity_sold", ColumnType::Integer),
        Column::required("total_revenue", ColumnType::Decimal),
    ],
    foreign_keys: &[],
    indexes: &[],
    derived_from: &["transactions_cleaned"],
};

pub static INVOICES: TableSchema = TableSchema {
    name: "invoices",
    description: "One row per (invoice number, customer) pair",
    stage: Stage::Dimension,
    columns: &[
        Column::key("invoice_key", ColumnType::Text),
        Column::required("invoice_no", ColumnType::Text),
        Column::required("customer_id", ColumnType::Text),
        Column::required("country", ColumnType::Text),
        Column::required("invoice_date", ColumnType::Timestamp),
        Column::required("total_quantity", ColumnType::Integer),
        Column::required("total_amount", ColumnType::Decimal),
    ],
    foreign_keys: &[ForeignKey::new("customer_id", "customers")],
    indexes: &[Index::unique(&["invoice_no", "customer_id"])],
    derived_from: &["transactions_cleaned"],
};

pub static INVOICE_DETAILS: TableSchema = TableSchema {
    name: "invoice_details",
    description: "One row per retained invoice line",
    stage: Stage::Dimension,
    columns: &[
        Column::key("line_key", ColumnType::Text),
        Column::required("invoice_key", ColumnType::Text),
        Column::required("stock_code", ColumnType::Text),
        Column::required("quantity", ColumnType::Integer),
        Column::required("unit_price", ColumnType::Decimal),
        Column::required("total_amount", ColumnType::Decimal),
    ],
    foreign_keys: &[
        ForeignKey::new("invoice_key", "invoices"),
        ForeignKey::new("stock_code", "products"),
    ],
    indexes: &[],
    derived_from: &["transactions_cleaned"],
};

// =============================================================================
// Analysis Tables
// =============================================================================

pub static SALES_ANALYSIS: TableSchema = TableSchema {
    name: "sales_analysis",
    description: "Customers, invoices, lines and products joined at line grain",
    stage: Stage::Analysis,
    columns: &[
        Column::key("line_key", ColumnType::Text),
        Column::required("customer_id", ColumnType::Text),
        Column::required("country", ColumnType::Text),
        Column::required("customer_first_purchase", ColumnType::Timestamp),
        Column::required("customer_last_purchase", ColumnType::Timestamp),
        Column::required("customer_total_purchases", ColumnType::Integer),
        Column::required("customer_total_spent", ColumnType::Decimal),
        Column::required("invoice_key", ColumnType::Text),
        Column::required("invoice_no", ColumnType::Text),
        Column::required("invoice_date", ColumnType::Timestamp),
        Column::required("invoice_total_quantity", ColumnType::Integer),
        Column::required("invoice_total_amount", ColumnType::Decimal),
        Column::required("stock_code", ColumnType::Text),
        Column::required("product_description", ColumnType::Text),
        Column::required("product_unit_price", ColumnType::Decimal),
        Column::required("product_total_quantity_sold", ColumnType::Integer),
        Column::required("product_total_revenue", ColumnType::Decimal),
        Column::required("quantity", ColumnType::Integer),
        Column::required("unit_price", ColumnType::Decimal),
        Column::required("total_amount", ColumnType::Decimal),
    ],
    foreign_keys: &[ForeignKey::new("line_key", "invoice_details")],
    indexes: &[Index::on(&["customer_id"]), Index::on(&["stock_code"])],
    derived_from: &["customers", "invoices", "products"],
};

/// All tables in dependency order (parents before children)
pub static ALL_TABLES: &[&TableSchema] = &[
    &RAW_TRANSACTIONS,
    &RAW_CENSUS,
    &TRANSACTIONS_CLEANED,
    &CENSUS_CLEANED,
    &CUSTOMERS,
    &PRODUCTS,
    &INVOICES,
    &INVOICE_DETAILS,
    &SALES_ANALYSIS,
];

/// Look up a table by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_parents_come_first() {
        for (pos, table) in ALL_TABLES.iter().enumerate() {
            for dep in table.dependencies() {
                let dep_pos = ALL_TABLES
                    .iter()
                    .position(|t| t.name == dep)
                    .unwrap_or_else(|| panic!("{} depends on unknown table {}", table.name, dep));
                assert!(dep_pos < pos, "{} listed before its parent {}", table.name, dep);
            }
        }
    }

    #[test]
    fn test_foreign_keys_reference_primary_keys() {
        for table in ALL_TABLES {
            for fk in table.foreign_keys {
                let parent = get_table(fk.references_table).unwrap();
                let column = parent.column(fk.references_column).unwrap();
                assert!(column.primary_key, "{}.{}", parent.name, column.name);
                assert!(table.column(fk.column).is_some());
            }
        }
    }

    #[test]
    fn test_every_table_has_one_primary_key() {
        for table in ALL_TABLES {
            let keys = table.columns.iter().filter(|c| c.primary_key).count();
            assert_eq!(keys, 1, "{}", table.name);
        }
    }
}
