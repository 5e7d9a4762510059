//! The batch pipeline: load, clean, build, join, export.
//!
//! Every stage recomputes its relations from scratch and each table commits
//! on its own, so a failure leaves the tables written before it in place.

pub mod census;
pub mod dimensions;
pub mod join;
pub mod keys;
pub mod tie_break;
pub mod transactions;
pub mod values;

pub use census::{clean_census, melt, CensusObservation, CleanedCensusRecord, Measure, Metric};
pub use dimensions::{build_dimensions, Customer, Dimensions, Invoice, InvoiceLineItem, Product};
pub use join::{materialize, SalesRow};
pub use tie_break::TieBreak;
pub use transactions::{clean_transactions, dedup, CleanedTransaction, CleanedTransactions};

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::parser::{read_census, read_transactions};
use crate::schema::{tables, TableSchema};
use crate::ui::{Phase, Ui};
use crate::writer::{export_records, export_table, SqliteWriter};

/// What a run produced
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Tables in write order with their row counts
    pub tables: Vec<(&'static str, u64)>,
    pub duplicates_removed: usize,
    pub exported: Vec<PathBuf>,
}

impl RunSummary {
    pub fn rows(&self, table: &str) -> Option<u64> {
        self.tables.iter().find(|(n, _)| *n == table).map(|(_, c)| *c)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|(_, c)| c).sum()
    }
}

/// Run every stage against `config`, writing only the selected tables
pub fn run_pipeline(
    config: &PipelineConfig,
    selected: &[&'static TableSchema],
    ui: &mut impl Ui,
) -> Result<RunSummary> {
    config.validate()?;
    let delimiter = config.delimiter_byte()?;
    let wants = |table: &TableSchema| selected.iter().any(|t| t.name == table.name);
    let mut summary = RunSummary::default();

    ui.set_info(format!(
        "{} → {:?} (country: {}, tie-break: {})",
        config.transactions.display(),
        config.output_db,
        config.country,
        config.tie_break
    ));

    // Loading
    ui.set_phase(Phase::Loading);
    let raw_transactions = read_transactions(&config.transactions, delimiter)?;
    ui.log(format!("Read {} transaction rows", raw_transactions.len()));
    let raw_census = read_census(&config.census, delimiter)?;
    ui.log(format!("Read {} census rows", raw_census.len()));

    let mut writer = SqliteWriter::new(&config.output_db)?;
    writer.create_tables(selected, ui)?;

    if wants(&tables::RAW_TRANSACTIONS) {
        let n = writer.insert_rows(&tables::RAW_TRANSACTIONS, &raw_transactions, ui)?;
        summary.tables.push((tables::RAW_TRANSACTIONS.name, n));
    }
    if wants(&tables::RAW_CENSUS) {
        let n = writer.insert_rows(&tables::RAW_CENSUS, &raw_census, ui)?;
        summary.tables.push((tables::RAW_CENSUS.name, n));
    }
    check_abort(ui)?;

    // Cleaning
    ui.set_phase(Phase::Cleaning);
    let cleaned = clean_transactions(&raw_transactions)?;
    summary.duplicates_removed = cleaned.duplicates_removed;
    ui.log(format!(
        "Removed {} duplicate transaction rows",
        cleaned.duplicates_removed
    ));
    let census = clean_census(&raw_census, &config.country)?;

    if wants(&tables::TRANSACTIONS_CLEANED) {
        let n = writer.insert_rows(&tables::TRANSACTIONS_CLEANED, &cleaned.rows, ui)?;
        summary.tables.push((tables::TRANSACTIONS_CLEANED.name, n));
    }
    if wants(&tables::CENSUS_CLEANED) {
        let n = writer.insert_rows(&tables::CENSUS_CLEANED, &census, ui)?;
        summary.tables.push((tables::CENSUS_CLEANED.name, n));
    }
    check_abort(ui)?;

    // Building
    ui.set_phase(Phase::Building);
    let dims = build_dimensions(&cleaned.rows, &config.country, config.tie_break)?;
    ui.log(format!(
        "{}: {} customers, {} products, {} invoices, {} lines",
        dims.country,
        dims.customers.len(),
        dims.products.len(),
        dims.invoices.len(),
        dims.line_items.len()
    ));

    if wants(&tables::CUSTOMERS) {
        let n = writer.insert_rows(&tables::CUSTOMERS, &dims.customers, ui)?;
        summary.tables.push((tables::CUSTOMERS.name, n));
    }
    if wants(&tables::PRODUCTS) {
        let n = writer.insert_rows(&tables::PRODUCTS, &dims.products, ui)?;
        summary.tables.push((tables::PRODUCTS.name, n));
    }
    if wants(&tables::INVOICES) {
        let n = writer.insert_rows(&tables::INVOICES, &dims.invoices, ui)?;
        summary.tables.push((tables::INVOICES.name, n));
    }
    if wants(&tables::INVOICE_DETAILS) {
        let n = writer.insert_rows(&tables::INVOICE_DETAILS, &dims.line_items, ui)?;
        summary.tables.push((tables::INVOICE_DETAILS.name, n));
    }
    check_abort(ui)?;

    // Materializing
    ui.set_phase(Phase::Materializing);
    let sales_built = wants(&tables::SALES_ANALYSIS);
    if sales_built {
        let sales = materialize(&dims);
        let n = writer.insert_rows(&tables::SALES_ANALYSIS, &sales, ui)?;
        summary.tables.push((tables::SALES_ANALYSIS.name, n));
    }
    let conn = writer.finalize(ui)?;
    check_abort(ui)?;

    // Exporting
    if let Some(dir) = &config.export_dir {
        ui.set_phase(Phase::Exporting);

        if sales_built {
            let n = export_table(&conn, tables::SALES_ANALYSIS.name, dir, delimiter)?;
            ui.log(format!("Exported {} sales rows", n));
            summary.exported.push(dir.join("sales_analysis.csv"));
        }
        if wants(&tables::CENSUS_CLEANED) {
            let n = export_table(&conn, tables::CENSUS_CLEANED.name, dir, delimiter)?;
            ui.log(format!("Exported {} census rows", n));
            summary.exported.push(dir.join("census_cleaned.csv"));
        }
        let n = export_records(melt(&census), dir, "census_long", delimiter)?;
        ui.log(format!("Exported {} census observations", n));
        summary.exported.push(dir.join("census_long.csv"));
    }

    Ok(summary)
}

fn check_abort(ui: &mut impl Ui) -> Result<()> {
    if ui.should_abort() {
        bail!("Aborted by user; tables written so far are kept");
    }
    Ok(())
}
