//! Readers for the two delimited source files.
//!
//! Every field is read as optional text; typing happens in the cleaners so
//! the raw tables keep exactly what the file contained. Empty and
//! whitespace-only cells are nulls.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use super::record::{Row, ToRow};

/// One purchased line item as it appears in the transactions file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawTransaction {
    /// 1-based position among the data rows of the file
    #[serde(skip)]
    pub source_row: u64,
    #[serde(rename = "InvoiceNo", alias = "invoice_no", default)]
    pub invoice_no: Option<String>,
    #[serde(rename = "StockCode", alias = "stock_code", default)]
    pub stock_code: Option<String>,
    #[serde(rename = "Description", alias = "description", default)]
    pub description: Option<String>,
    #[serde(rename = "Quantity", alias = "quantity", default)]
    pub quantity: Option<String>,
    #[serde(rename = "InvoiceDate", alias = "invoice_date", default)]
    pub invoice_date: Option<String>,
    #[serde(rename = "UnitPrice", alias = "unit_price", default)]
    pub unit_price: Option<String>,
    #[serde(rename = "CustomerID", alias = "customer_id", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "Country", alias = "country", default)]
    pub country: Option<String>,
}

impl ToRow for RawTransaction {
    fn to_row(&self) -> Row {
        Row::new()
            .with("source_row", self.source_row)
            .with("invoice_no", self.invoice_no.as_deref())
            .with("stock_code", self.stock_code.as_deref())
            .with("description", self.description.as_deref())
            .with("quantity", self.quantity.as_deref())
            .with("invoice_date", self.invoice_date.as_deref())
            .with("unit_price", self.unit_price.as_deref())
            .with("customer_id", self.customer_id.as_deref())
            .with("country", self.country.as_deref())
    }
}

/// One (topic, characteristic) census measurement row
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawCensusRecord {
    #[serde(skip)]
    pub source_row: u64,
    #[serde(rename = "Topic", alias = "topic", default)]
    pub topic: Option<String>,
    #[serde(rename = "Characteristic", alias = "characteristic", default)]
    pub characteristic: Option<String>,
    #[serde(rename = "Total", alias = "total", default)]
    pub total: Option<String>,
    #[serde(rename = "Flag_Total", alias = "flag_total", default)]
    pub flag_total: Option<String>,
    #[serde(rename = "Men", alias = "Men+", alias = "men", default)]
    pub men: Option<String>,
    #[serde(rename = "Flag_Men", alias = "Flag_Men+", alias = "flag_men", default)]
    pub flag_men: Option<String>,
    #[serde(rename = "Women", alias = "Women+", alias = "women", default)]
    pub women: Option<String>,
    #[serde(rename = "Flag_Women", alias = "Flag_Women+", alias = "flag_women", default)]
    pub flag_women: Option<String>,
    #[serde(rename = "Total_Rate", alias = "total_rate", default)]
    pub total_rate: Option<String>,
    #[serde(rename = "Flag_Total_Rate", alias = "flag_total_rate", default)]
    pub flag_total_rate: Option<String>,
    #[serde(rename = "Men_Rate", alias = "Men+_Rate", alias = "men_rate", default)]
    pub men_rate: Option<String>,
    #[serde(rename = "Flag_Men_Rate", alias = "Flag_Men+_Rate", alias = "flag_men_rate", default)]
    pub flag_men_rate: Option<String>,
    #[serde(rename = "Women_Rate", alias = "Women+_Rate", alias = "women_rate", default)]
    pub women_rate: Option<String>,
    #[serde(
        rename = "Flag_Women_Rate",
        alias = "Flag_Women+_Rate",
        alias = "flag_women_rate",
        default
    )]
    pub flag_women_rate: Option<String>,
    #[serde(rename = "Notes", alias = "notes", default)]
    pub notes: Option<String>,
}

impl ToRow for RawCensusRecord {
    fn to_row(&self) -> Row {
        Row::new()
            .with("source_row", self.source_row)
            .with("topic", self.topic.as_deref())
            .with("characteristic", self.characteristic.as_deref())
            .with("total", self.total.as_deref())
            .with("flag_total", self.flag_total.as_deref())
            .with("men", self.men.as_deref())
            .with("flag_men", self.flag_men.as_deref())
            .with("women", self.women.as_deref())
            .with("flag_women", self.flag_women.as_deref())
            .with("total_rate", self.total_rate.as_deref())
            .with("flag_total_rate", self.flag_total_rate.as_deref())
            .with("men_rate", self.men_rate.as_deref())
            .with("flag_men_rate", self.flag_men_rate.as_deref())
            .with("women_rate", self.women_rate.as_deref())
            .with("flag_women_rate", self.flag_women_rate.as_deref())
            .with("notes", self.notes.as_deref())
    }
}

/// Rows of a source file: numbered by position, blanks read as nulls
pub trait SourceRecord {
    fn set_source_row(&mut self, row: u64);
    fn fields_mut(&mut self) -> Vec<&mut Option<String>>;

    fn prepare(&mut self, source_row: u64) {
        self.set_source_row(source_row);
        for field in self.fields_mut() {
            null_if_blank(field);
        }
    }
}

impl SourceRecord for RawTransaction {
    fn set_source_row(&mut self, row: u64) {
        self.source_row = row;
    }

    fn fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![
            &mut self.invoice_no,
            &mut self.stock_code,
            &mut self.description,
            &mut self.quantity,
            &mut self.invoice_date,
            &mut self.unit_price,
            &mut self.customer_id,
            &mut self.country,
        ]
    }
}

impl SourceRecord for RawCensusRecord {
    fn set_source_row(&mut self, row: u64) {
        self.source_row = row;
    }

    fn fields_mut(&mut self) -> Vec<&mut Option<String>> {
        vec![
            &mut self.topic,
            &mut self.characteristic,
            &mut self.total,
            &mut self.flag_total,
            &mut self.men,
            &mut self.flag_men,
            &mut self.women,
            &mut self.flag_women,
            &mut self.total_rate,
            &mut self.flag_total_rate,
            &mut self.men_rate,
            &mut self.flag_men_rate,
            &mut self.women_rate,
            &mut self.flag_women_rate,
            &mut self.notes,
        ]
    }
}

fn null_if_blank(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
        *field = None;
    }
}

/// Read the transactions file
pub fn read_transactions(path: &Path, delimiter: u8) -> Result<Vec<RawTransaction>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open transactions file: {:?}", path))?;
    read_records(file, delimiter)
        .with_context(|| format!("Failed to read transactions from {:?}", path))
}

/// Read the census file
pub fn read_census(path: &Path, delimiter: u8) -> Result<Vec<RawCensusRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open census file: {:?}", path))?;
    read_records(file, delimiter).with_context(|| format!("Failed to read census from {:?}", path))
}

/// Deserialize every data row of a headed delimited stream
pub fn read_records<T, R>(input: R, delimiter: u8) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de> + SourceRecord,
    R: Read,
{
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(::csv::Trim::Headers)
        .flexible(true)
        .from_reader(input);

    let mut records = Vec::new();
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        let mut record = result.with_context(|| format!("Malformed data row {}", idx + 1))?;
        record.prepare(idx as u64 + 1);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_transactions_with_blanks() {
        let data = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country
536365,85123A,WHITE HANGING HEART,6,12/1/2010 8:26,2.55,17850.0,Canada
536366,22633,  ,2,12/1/2010 8:28,1.85,,Canada
";
        let rows: Vec<RawTransaction> = read_records(data.as_bytes(), b',').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_row, 1);
        assert_eq!(rows[0].stock_code.as_deref(), Some("85123A"));
        assert_eq!(rows[1].source_row, 2);
        assert_eq!(rows[1].description, None);
        assert_eq!(rows[1].customer_id, None);
    }

    #[test]
    fn test_read_transactions_snake_case_headers() {
        let data = "invoice_no;stock_code;quantity;country\nA1;X;3;Canada\n";
        let rows: Vec<RawTransaction> = read_records(data.as_bytes(), b';').unwrap();

        assert_eq!(rows[0].invoice_no.as_deref(), Some("A1"));
        assert_eq!(rows[0].quantity.as_deref(), Some("3"));
        assert_eq!(rows[0].unit_price, None);
    }

    #[test]
    fn test_read_census_plus_headers() {
        let data = "\
Topic,Characteristic,Total,Flag_Total,Men+,Flag_Men+,Women+,Flag_Women+,Notes
Population,Total - Age,100,A,49,,51,,note
";
        let rows: Vec<RawCensusRecord> = read_records(data.as_bytes(), b',').unwrap();

        assert_eq!(rows[0].men.as_deref(), Some("49"));
        assert_eq!(rows[0].flag_total.as_deref(), Some("A"));
        assert_eq!(rows[0].flag_men, None);
        assert_eq!(rows[0].total_rate, None);
    }
}
