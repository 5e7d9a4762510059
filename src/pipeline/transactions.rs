//! Transaction cleaning: default filling, typing and business-key dedup.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::values::{parse_money, parse_quantity, parse_timestamp};
use crate::parser::{RawTransaction, Row, ToRow};

/// Customer id used when the source has none
pub const UNKNOWN_CUSTOMER: &str = "Unknown";

/// Description used when the source has none
pub const NO_DESCRIPTION: &str = "No Description";

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTransaction {
    pub source_row: u64,
    pub invoice_no: Option<String>,
    pub stock_code: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: Decimal,
    pub customer_id: String,
    pub country: Option<String>,
}

/// Natural attributes identifying one purchased line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusinessKey<'a> {
    pub invoice_no: Option<&'a str>,
    pub stock_code: Option<&'a str>,
    pub quantity: i64,
    pub invoice_date: Option<NaiveDateTime>,
    pub unit_price: Decimal,
    pub customer_id: &'a str,
}

impl CleanedTransaction {
    pub fn business_key(&self) -> BusinessKey<'_> {
        BusinessKey {
            invoice_no: self.invoice_no.as_deref(),
            stock_code: self.stock_code.as_deref(),
            quantity: self.quantity,
            invoice_date: self.invoice_date,
            unit_price: self.unit_price,
            customer_id: &self.customer_id,
        }
    }

    /// Coerce one raw row, filling the defaulted columns
    pub fn from_raw(raw: &RawTransaction) -> Result<Self> {
        let quantity = match raw.quantity.as_deref() {
            Some(q) => parse_quantity(q).context("column quantity")?,
            None => 0,
        };
        let unit_price = match raw.unit_price.as_deref() {
            Some(p) => parse_money(p).context("column unit_price")?,
            None => Decimal::new(0, 2),
        };
        let invoice_date = raw
            .invoice_date
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .context("column invoice_date")?;

        Ok(Self {
            source_row: raw.source_row,
            invoice_no: trimmed(raw.invoice_no.as_deref()),
            stock_code: trimmed(raw.stock_code.as_deref()),
            description: trimmed(raw.description.as_deref())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            quantity,
            invoice_date,
            unit_price,
            customer_id: raw
                .customer_id
                .as_deref()
                .map(normalize_customer_id)
                .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
            country: trimmed(raw.country.as_deref()),
        })
    }

    pub fn is_unknown_customer(&self) -> bool {
        self.customer_id == UNKNOWN_CUSTOMER
    }
}

impl ToRow for CleanedTransaction {
    fn to_row(&self) -> Row {
        Row::new()
            .with("source_row", self.source_row)
            .with("invoice_no", self.invoice_no.as_ref())
            .with("stock_code", self.stock_code.as_ref())
            .with("description", &self.description)
            .with("quantity", self.quantity)
            .with("invoice_date", self.invoice_date)
            .with("unit_price", self.unit_price)
            .with("customer_id", &self.customer_id)
            .with("country", self.country.as_ref())
    }
}

/// Result of cleaning the transaction relation
#[derive(Debug)]
pub struct CleanedTransactions {
    pub rows: Vec<CleanedTransaction>,
    pub duplicates_removed: usize,
}

/// Fill, type and deduplicate raw transactions. Any cell that cannot be
/// coerced fails the whole step.
pub fn clean_transactions(raw: &[RawTransaction]) -> Result<CleanedTransactions> {
    let typed = raw
        .iter()
        .map(|r| {
            CleanedTransaction::from_raw(r)
                .with_context(|| format!("Invalid transaction at data row {}", r.source_row))
        })
        .collect::<Result<Vec<_>>>()?;

    let total = typed.len();
    let rows = dedup(typed);

    Ok(CleanedTransactions {
        duplicates_removed: total - rows.len(),
        rows,
    })
}

/// Keep one row per business key.
///
/// Rows sharing a key share their timestamp as well, so "earliest timestamp
/// wins" leaves only exact-key ties; those go to the first row in input order.
pub fn dedup(rows: Vec<CleanedTransaction>) -> Vec<CleanedTransaction> {
    let mut seen: HashSet<BusinessKey<'_>> = HashSet::with_capacity(rows.len());
    let keep: Vec<bool> = rows.iter().map(|r| seen.insert(r.business_key())).collect();
    drop(seen);

    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

/// Spreadsheet exports write ids as floats (`17850.0`)
fn normalize_customer_id(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.chars().all(|c| c.is_ascii_digit()) => {
            int.to_string()
        }
        _ => raw.to_string(),
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
