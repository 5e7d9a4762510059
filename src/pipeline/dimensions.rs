//! Country-scoped dimensional tables derived from cleaned transactions.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::keys::{invoice_key, line_key, KeyRegistry};
use super::tie_break::{Candidate, TieBreak};
use super::transactions::CleanedTransaction;
use super::values::{add_money, add_quantity, line_total, to_money};
use crate::parser::{Row, ToRow};

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub customer_id: String,
    pub country: String,
    pub first_purchase: NaiveDateTime,
    pub last_purchase: NaiveDateTime,
    /// Distinct invoice numbers
    pub total_purchases: i64,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub stock_code: String,
    pub country: String,
    pub description: String,
    pub unit_price: Decimal,
    pub total_quantity_sold: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub invoice_key: String,
    pub invoice_no: String,
    pub customer_id: String,
    pub country: String,
    pub invoice_date: NaiveDateTime,
    pub total_quantity: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLineItem {
    pub line_key: String,
    pub invoice_key: String,
    pub stock_code: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
}

/// The four dimensional tables for one country
#[derive(Debug, Default)]
pub struct Dimensions {
    pub country: String,
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub invoices: Vec<Invoice>,
    pub line_items: Vec<InvoiceLineItem>,
}

/// A cleaned transaction that passed the scope filter
#[derive(Debug, Clone, Copy)]
struct ScopedLine<'a> {
    invoice_no: &'a str,
    stock_code: &'a str,
    customer_id: &'a str,
    description: &'a str,
    invoice_date: NaiveDateTime,
    quantity: i64,
    unit_price: Decimal,
}

impl ScopedLine<'_> {
    fn total(&self) -> Result<Decimal> {
        line_total(self.quantity, self.unit_price)
            .with_context(|| format!("invoice {} line {}", self.invoice_no, self.stock_code))
    }
}

/// Rows in `country` with a known customer, invoice number, stock code and timestamp
fn scope<'a>(rows: &'a [CleanedTransaction], country: &str) -> Vec<ScopedLine<'a>> {
    let country = country.trim();
    rows.iter()
        .filter(|r| r.country.as_deref() == Some(country))
        .filter(|r| !r.is_unknown_customer())
        .filter_map(|r| {
            Some(ScopedLine {
                invoice_no: r.invoice_no.as_deref()?,
                stock_code: r.stock_code.as_deref()?,
                customer_id: &r.customer_id,
                description: &r.description,
                invoice_date: r.invoice_date?,
                quantity: r.quantity,
                unit_price: r.unit_price,
            })
        })
        .collect()
}

/// Build customers, products, invoices and line items for one country
pub fn build_dimensions(
    rows: &[CleanedTransaction],
    country: &str,
    policy: TieBreak,
) -> Result<Dimensions> {
    let lines = scope(rows, country);
    let country = country.trim().to_string();

    let customers = build_customers(&lines, &country)?;
    let products = build_products(&lines, &country, policy)?;
    let invoices = build_invoices(&lines, &country)?;
    let line_items = build_line_items(&lines, &products)?;

    Ok(Dimensions {
        country,
        customers,
        products,
        invoices,
        line_items,
    })
}

fn build_customers(lines: &[ScopedLine], country: &str) -> Result<Vec<Customer>> {
    struct Acc<'a> {
        first: NaiveDateTime,
        last: NaiveDateTime,
        invoices: BTreeSet<&'a str>,
        spent: Decimal,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for line in lines {
        let acc = groups.entry(line.customer_id).or_insert_with(|| Acc {
            first: line.invoice_date,
            last: line.invoice_date,
            invoices: BTreeSet::new(),
            spent: Decimal::ZERO,
        });
        acc.first = acc.first.min(line.invoice_date);
        acc.last = acc.last.max(line.invoice_date);
        acc.invoices.insert(line.invoice_no);
        acc.spent = add_money(acc.spent, line.total()?)
            .with_context(|| format!("total spent of customer {}", line.customer_id))?;
    }

    Ok(groups
        .into_iter()
        .map(|(customer_id, acc)| Customer {
            customer_id: customer_id.to_string(),
            country: country.to_string(),
            first_purchase: acc.first,
            last_purchase: acc.last,
            total_purchases: acc.invoices.len() as i64,
            total_spent: to_money(acc.spent),
        })
        .collect())
}

fn build_products(lines: &[ScopedLine], country: &str, policy: TieBreak) -> Result<Vec<Product>> {
    let mut groups: BTreeMap<&str, Vec<&ScopedLine>> = BTreeMap::new();
    for line in lines {
        groups.entry(line.stock_code).or_default().push(line);
    }

    let mut products = Vec::with_capacity(groups.len());
    for (stock_code, group) in groups {
        let candidates: Vec<Candidate> = group
            .iter()
            .map(|l| Candidate {
                description: l.description,
                unit_price: l.unit_price,
                invoice_date: l.invoice_date,
            })
            .collect();
        let Some((description, unit_price)) = policy.pick(&candidates) else {
            continue;
        };

        let mut sold: i64 = 0;
        let mut revenue = Decimal::ZERO;
        for line in &group {
            sold = add_quantity(sold, line.quantity)
                .with_context(|| format!("quantity sold of product {}", stock_code))?;
            revenue = add_money(revenue, line.total()?)
                .with_context(|| format!("revenue of product {}", stock_code))?;
        }

        products.push(Product {
            stock_code: stock_code.to_string(),
            country: country.to_string(),
            description: description.to_string(),
            unit_price,
            total_quantity_sold: sold,
            total_revenue: to_money(revenue),
        });
    }

    Ok(products)
}

fn build_invoices(lines: &[ScopedLine], country: &str) -> Result<Vec<Invoice>> {
    struct Acc {
        date: NaiveDateTime,
        quantity: i64,
        amount: Decimal,
    }

    let mut groups: BTreeMap<(&str, &str), Acc> = BTreeMap::new();
    for line in lines {
        let acc = groups
            .entry((line.invoice_no, line.customer_id))
            .or_insert_with(|| Acc {
                date: line.invoice_date,
                quantity: 0,
                amount: Decimal::ZERO,
            });
        acc.date = acc.date.min(line.invoice_date);
        acc.quantity = add_quantity(acc.quantity, line.quantity)
            .with_context(|| format!("total quantity of invoice {}", line.invoice_no))?;
        acc.amount = add_money(acc.amount, line.total()?)
            .with_context(|| format!("total amount of invoice {}", line.invoice_no))?;
    }

    let mut registry = KeyRegistry::new();
    groups
        .into_iter()
        .map(|((invoice_no, customer_id), acc)| {
            let key = invoice_key(invoice_no, customer_id);
            registry.register(&key, format!("{}/{}", invoice_no, customer_id))?;

            Ok(Invoice {
                invoice_key: key,
                invoice_no: invoice_no.to_string(),
                customer_id: customer_id.to_string(),
                country: country.to_string(),
                invoice_date: acc.date,
                total_quantity: acc.quantity,
                total_amount: to_money(acc.amount),
            })
        })
        .collect()
}

/// One line per scoped row in input order. Rows whose stock code has no
/// product are left out.
fn build_line_items(lines: &[ScopedLine], products: &[Product]) -> Result<Vec<InvoiceLineItem>> {
    let known: BTreeSet<&str> = products.iter().map(|p| p.stock_code.as_str()).collect();
    let mut ordinals: HashMap<(String, &str), u32> = HashMap::new();
    let mut registry = KeyRegistry::new();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        if !known.contains(line.stock_code) {
            continue;
        }

        let inv_key = invoice_key(line.invoice_no, line.customer_id);
        let ordinal = ordinals
            .entry((inv_key.clone(), line.stock_code))
            .or_insert(0);
        let key = line_key(&inv_key, line.stock_code, *ordinal);
        registry.register(&key, format!("{}/{}/{}", inv_key, line.stock_code, ordinal))?;
        *ordinal += 1;

        items.push(InvoiceLineItem {
            line_key: key,
            invoice_key: inv_key,
            stock_code: line.stock_code.to_string(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_amount: line.total()?,
        });
    }

    Ok(items)
}

impl ToRow for Customer {
    fn to_row(&self) -> Row {
        Row::new()
            .with("customer_id", &self.customer_id)
            .with("country", &self.country)
            .with("first_purchase", self.first_purchase)
            .with("last_purchase", self.last_purchase)
            .with("total_purchases", self.total_purchases)
            .with("total_spent", self.total_spent)
    }
}

impl ToRow for Product {
    fn to_row(&self) -> Row {
        Row::new()
            .with("stock_code", &self.stock_code)
            .with("country", &self.country)
            .with("description", &self.description)
            .with("unit_price", self.unit_price)
            .with("total_quantity_sold", self.total_quantity_sold)
            .with("total_revenue", self.total_revenue)
    }
}

impl ToRow for Invoice {
    fn to_row(&self) -> Row {
        Row::new()
            .with("invoice_key", &self.invoice_key)
            .with("invoice_no", &self.invoice_no)
            .with("customer_id", &self.customer_id)
            .with("country", &self.country)
            .with("invoice_date", self.invoice_date)
            .with("total_quantity", self.total_quantity)
            .with("total_amount", self.total_amount)
    }
}

impl ToRow for InvoiceLineItem {
    fn to_row(&self) -> Row {
        Row::new()
            .with("line_key", &self.line_key)
            .with("invoice_key", &self.invoice_key)
            .with("stock_code", &self.stock_code)
            .with("quantity", self.quantity)
            .with("unit_price", self.unit_price)
            .with("total_amount", self.total_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::transactions::UNKNOWN_CUSTOMER;
    use crate::pipeline::values::parse_timestamp;
    use std::str::FromStr;

    fn money(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn tx(
        row: u64,
        invoice: &str,
        code: &str,
        customer: &str,
        qty: i64,
        price: &str,
        date: &str,
        country: &str,
    ) -> CleanedTransaction {
        CleanedTransaction {
            source_row: row,
            invoice_no: Some(invoice.to_string()),
            stock_code: Some(code.to_string()),
            description: format!("desc {}", code),
            quantity: qty,
            invoice_date: Some(parse_timestamp(date).unwrap()),
            unit_price: money(price),
            customer_id: customer.to_string(),
            country: Some(country.to_string()),
        }
    }

    fn sample() -> Vec<CleanedTransaction> {
        vec![
            tx(1, "1001", "A", "C1", 2, "1.50", "2011-01-05 10:00", "Canada"),
            tx(2, "1001", "B", "C1", 1, "4.25", "2011-01-05 10:00", "Canada"),
            tx(3, "1002", "A", "C1", 4, "1.50", "2011-02-01 09:30", "Canada"),
            tx(4, "1003", "A", "C2", 1, "1.40", "2011-01-20 12:00", "Canada"),
            tx(5, "1003", "A", "C2", 1, "1.40", "2011-01-20 11:00", "Canada"),
            tx(6, "2001", "Z", "C9", 9, "9.99", "2011-01-01 08:00", "France"),
            tx(7, "1004", "B", UNKNOWN_CUSTOMER, 3, "4.25", "2011-03-01 08:00", "Canada"),
        ]
    }

    #[test]
    fn test_customers_aggregate_spend_and_distinct_invoices() {
        let dims = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();

        assert_eq!(dims.customers.len(), 2);
        let c1 = &dims.customers[0];
        assert_eq!(c1.customer_id, "C1");
        assert_eq!(c1.total_purchases, 2);
        // 2 x 1.50 + 1 x 4.25 + 4 x 1.50
        assert_eq!(c1.total_spent, money("13.25"));
        assert_eq!(c1.first_purchase, parse_timestamp("2011-01-05 10:00").unwrap());
        assert_eq!(c1.last_purchase, parse_timestamp("2011-02-01 09:30").unwrap());

        let c2 = &dims.customers[1];
        assert_eq!(c2.total_purchases, 1);
        assert_eq!(c2.total_spent, money("2.80"));
    }

    #[test]
    fn test_unknown_customer_and_other_countries_are_out_of_scope() {
        let dims = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();

        assert!(dims.customers.iter().all(|c| c.customer_id != UNKNOWN_CUSTOMER));
        assert!(dims.invoices.iter().all(|i| i.invoice_no != "1004"));
        assert!(dims.products.iter().all(|p| p.stock_code != "Z"));
        assert_eq!(dims.line_items.len(), 5);
    }

    #[test]
    fn test_country_is_a_parameter() {
        let dims = build_dimensions(&sample(), "France", TieBreak::MostFrequent).unwrap();

        assert_eq!(dims.country, "France");
        assert_eq!(dims.customers.len(), 1);
        assert_eq!(dims.customers[0].customer_id, "C9");
        assert_eq!(dims.line_items.len(), 1);
    }

    #[test]
    fn test_products_use_policy_and_totals() {
        let dims = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();
        let a = dims.products.iter().find(|p| p.stock_code == "A").unwrap();

        assert_eq!(a.total_quantity_sold, 8);
        assert_eq!(a.unit_price, money("1.40"));
        assert_eq!(a.total_revenue, money("11.80"));

        let latest = build_dimensions(&sample(), "Canada", TieBreak::Latest).unwrap();
        let a = latest.products.iter().find(|p| p.stock_code == "A").unwrap();
        assert_eq!(a.unit_price, money("1.50"));
    }

    #[test]
    fn test_invoice_takes_earliest_timestamp() {
        let dims = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();
        let inv = dims.invoices.iter().find(|i| i.invoice_no == "1003").unwrap();

        assert_eq!(inv.invoice_date, parse_timestamp("2011-01-20 11:00").unwrap());
        assert_eq!(inv.total_quantity, 2);
        assert_eq!(inv.total_amount, money("2.80"));
        assert_eq!(inv.invoice_key, invoice_key("1003", "C2"));
    }

    #[test]
    fn test_line_items_reference_invoices_and_products() {
        let dims = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();

        for item in &dims.line_items {
            assert!(dims.invoices.iter().any(|i| i.invoice_key == item.invoice_key));
            assert!(dims.products.iter().any(|p| p.stock_code == item.stock_code));
            assert_eq!(item.total_amount, line_total(item.quantity, item.unit_price).unwrap());
        }

        // Repeated (invoice, stock code) lines get distinct keys
        let repeated: Vec<_> = dims
            .line_items
            .iter()
            .filter(|l| l.invoice_key == invoice_key("1003", "C2"))
            .collect();
        assert_eq!(repeated.len(), 2);
        assert_ne!(repeated[0].line_key, repeated[1].line_key);
    }

    #[test]
    fn test_keys_are_stable_across_builds() {
        let first = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();
        let second = build_dimensions(&sample(), "Canada", TieBreak::MostFrequent).unwrap();

        assert_eq!(first.invoices, second.invoices);
        assert_eq!(first.line_items, second.line_items);
    }

    #[test]
    fn test_overflowing_line_total_is_an_error() {
        let rows = vec![tx(
            1,
            "1001",
            "A",
            "C1",
            9_000_000_000_000_000_000,
            "100000000000.00",
            "2011-01-05 10:00",
            "Canada",
        )];

        let err = build_dimensions(&rows, "Canada", TieBreak::MostFrequent).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("invoice 1001 line A"), "{}", message);
        assert!(message.contains("overflows"), "{}", message);
    }

    #[test]
    fn test_overflowing_quantity_sum_is_an_error() {
        let big = 9_000_000_000_000_000_000;
        let rows = vec![
            tx(1, "1001", "A", "C1", big, "0.00", "2011-01-05 10:00", "Canada"),
            tx(2, "1002", "A", "C1", big, "0.00", "2011-01-06 10:00", "Canada"),
        ];

        let err = build_dimensions(&rows, "Canada", TieBreak::MostFrequent).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("quantity sold of product A"), "{}", message);
    }

    #[test]
    fn test_rows_missing_invoice_or_timestamp_are_skipped() {
        let mut rows = sample();
        rows[0].invoice_no = None;
        rows[1].invoice_date = None;

        let dims = build_dimensions(&rows, "Canada", TieBreak::MostFrequent).unwrap();
        assert_eq!(dims.line_items.len(), 3);
    }
}
