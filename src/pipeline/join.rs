//! Denormalized line-grain join of the dimensional tables.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::dimensions::{Customer, Dimensions, Invoice, Product};
use crate::parser::{Row, ToRow};

/// One line item with its customer, invoice and product attributes
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRow {
    pub line_key: String,
    pub customer_id: String,
    pub country: String,
    pub customer_first_purchase: NaiveDateTime,
    pub customer_last_purchase: NaiveDateTime,
    pub customer_total_purchases: i64,
    pub customer_total_spent: Decimal,
    pub invoice_key: String,
    pub invoice_no: String,
    pub invoice_date: NaiveDateTime,
    pub invoice_total_quantity: i64,
    pub invoice_total_amount: Decimal,
    pub stock_code: String,
    pub product_description: String,
    pub product_unit_price: Decimal,
    pub product_total_quantity_sold: i64,
    pub product_total_revenue: Decimal,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
}

/// Inner join customers ⋈ invoices ⋈ line items ⋈ products.
/// Lines with a missing parent are dropped without notice.
pub fn materialize(dims: &Dimensions) -> Vec<SalesRow> {
    let customers: HashMap<&str, &Customer> = dims
        .customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c))
        .collect();
    let invoices: HashMap<&str, &Invoice> = dims
        .invoices
        .iter()
        .map(|i| (i.invoice_key.as_str(), i))
        .collect();
    let products: HashMap<&str, &Product> = dims
        .products
        .iter()
        .map(|p| (p.stock_code.as_str(), p))
        .collect();

    dims.line_items
        .iter()
        .filter_map(|line| {
            let invoice = invoices.get(line.invoice_key.as_str())?;
            let customer = customers.get(invoice.customer_id.as_str())?;
            let product = products.get(line.stock_code.as_str())?;

            Some(SalesRow {
                line_key: line.line_key.clone(),
                customer_id: customer.customer_id.clone(),
                country: customer.country.clone(),
                customer_first_purchase: customer.first_purchase,
                customer_last_purchase: customer.last_purchase,
                customer_total_purchases: customer.total_purchases,
                customer_total_spent: customer.total_spent,
                invoice_key: invoice.invoice_key.clone(),
                invoice_no: invoice.invoice_no.clone(),
                invoice_date: invoice.invoice_date,
                invoice_total_quantity: invoice.total_quantity,
                invoice_total_amount: invoice.total_amount,
                stock_code: product.stock_code.clone(),
                product_description: product.description.clone(),
                product_unit_price: product.unit_price,
                product_total_quantity_sold: product.total_quantity_sold,
                product_total_revenue: product.total_revenue,
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_amount: line.total_amount,
            })
        })
        .collect()
}

impl ToRow for SalesRow {
    fn to_row(&self) -> Row {
        Row::new()
            .with("line_key", &self.line_key)
            .with("customer_id", &self.customer_id)
            .with("country", &self.country)
            .with("customer_first_purchase", self.customer_first_purchase)
            .with("customer_last_purchase", self.customer_last_purchase)
            .with("customer_total_purchases", self.customer_total_purchases)
            .with("customer_total_spent", self.customer_total_spent)
            .with("invoice_key", &self.invoice_key)
            .with("invoice_no", &self.invoice_no)
            .with("invoice_date", self.invoice_date)
            .with("invoice_total_quantity", self.invoice_total_quantity)
            .with("invoice_total_amount", self.invoice_total_amount)
            .with("stock_code", &self.stock_code)
            .with("product_description", &self.product_description)
            .with("product_unit_price", self.product_unit_price)
            .with("product_total_quantity_sold", self.product_total_quantity_sold)
            .with("product_total_revenue", self.product_total_revenue)
            .with("quantity", self.quantity)
            .with("unit_price", self.unit_price)
            .with("total_amount", self.total_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dimensions::build_dimensions;
    use crate::pipeline::tie_break::TieBreak;
    use crate::pipeline::transactions::CleanedTransaction;
    use crate::pipeline::values::parse_timestamp;
    use std::str::FromStr;

    fn tx(
        row: u64,
        invoice: &str,
        code: &str,
        customer: &str,
        qty: i64,
        price: &str,
    ) -> CleanedTransaction {
        CleanedTransaction {
            source_row: row,
            invoice_no: Some(invoice.to_string()),
            stock_code: Some(code.to_string()),
            description: format!("desc {}", code),
            quantity: qty,
            invoice_date: Some(parse_timestamp("2011-06-01 10:00").unwrap()),
            unit_price: Decimal::from_str(price).unwrap(),
            customer_id: customer.to_string(),
            country: Some("Canada".to_string()),
        }
    }

    fn dims() -> Dimensions {
        let rows = vec![
            tx(1, "1", "A", "C1", 2, "1.00"),
            tx(2, "1", "B", "C1", 1, "3.00"),
            tx(3, "2", "A", "C2", 5, "0.90"),
            tx(4, "2", "A", "C2", 5, "0.90"),
        ];
        build_dimensions(&rows, "Canada", TieBreak::MostFrequent).unwrap()
    }

    #[test]
    fn test_row_count_matches_line_items() {
        let dims = dims();
        let joined = materialize(&dims);
        assert_eq!(joined.len(), dims.line_items.len());
        assert_eq!(joined.len(), 4);
    }

    #[test]
    fn test_grains_are_kept_apart() {
        let joined = materialize(&dims());
        let row = joined.iter().find(|r| r.customer_id == "C1" && r.stock_code == "A").unwrap();

        assert_eq!(row.unit_price, Decimal::from_str("1.00").unwrap());
        assert_eq!(row.product_unit_price, Decimal::from_str("0.90").unwrap());
        assert_eq!(row.total_amount, Decimal::from_str("2.00").unwrap());
        assert_eq!(row.invoice_total_amount, Decimal::from_str("5.00").unwrap());
        assert_eq!(row.product_total_quantity_sold, 12);
        assert_eq!(row.customer_total_purchases, 1);
    }

    #[test]
    fn test_orphan_lines_are_dropped() {
        let mut dims = dims();
        dims.products.retain(|p| p.stock_code != "B");
        let invoice = dims.invoices.iter().find(|i| i.customer_id == "C2").unwrap().clone();
        dims.customers.retain(|c| c.customer_id != invoice.customer_id);

        let joined = materialize(&dims);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].stock_code, "A");
        assert_eq!(joined[0].customer_id, "C1");
    }
}
