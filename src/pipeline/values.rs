//! Coercion of raw text cells into typed values

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Storage format for timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted input layouts, tried in order
const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Decimal places kept on money values
pub const MONEY_SCALE: u32 = 2;

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    for format in TIMESTAMP_INPUT_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }

    bail!("not a timestamp: {:?}", raw)
}

/// Integer quantity; integral decimals such as `6.0` are accepted
pub fn parse_quantity(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(q) = raw.parse::<i64>() {
        return Ok(q);
    }

    let value = parse_decimal(raw).map_err(|_| anyhow!("not an integer: {:?}", raw))?;
    if !value.fract().is_zero() {
        bail!("not an integer: {:?}", raw);
    }
    value
        .to_i64()
        .ok_or_else(|| anyhow!("integer out of range: {:?}", raw))
}

/// Money rounded half away from zero to two decimals
pub fn parse_money(raw: &str) -> Result<Decimal> {
    let value = parse_decimal(raw.trim()).map_err(|_| anyhow!("not a decimal: {:?}", raw))?;
    Ok(to_money(value))
}

pub fn to_money(value: Decimal) -> Decimal {
    let mut value =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(MONEY_SCALE);
    value
}

/// quantity × unit price, exact at the money scale
pub fn line_total(quantity: i64, unit_price: Decimal) -> Result<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .map(to_money)
        .ok_or_else(|| anyhow!("line total overflows: {} x {}", quantity, unit_price))
}

pub fn add_money(total: Decimal, amount: Decimal) -> Result<Decimal> {
    total
        .checked_add(amount)
        .ok_or_else(|| anyhow!("amount overflows: {} + {}", total, amount))
}

pub fn add_quantity(total: i64, quantity: i64) -> Result<i64> {
    total
        .checked_add(quantity)
        .ok_or_else(|| anyhow!("quantity overflows: {} + {}", total, quantity))
}

pub fn parse_measurement(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| anyhow!("not a number: {:?}", raw))
}

fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2010, 12, 1)
            .unwrap()
            .and_hms_opt(8, 26, 0)
            .unwrap();

        assert_eq!(parse_timestamp("12/1/2010 8:26").unwrap(), expected);
        assert_eq!(parse_timestamp("2010-12-01 08:26:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2010-12-01 08:26").unwrap(), expected);
        assert_eq!(parse_timestamp("2010-12-01T08:26:00Z").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        let ts = parse_timestamp("12/1/2010 8:26").unwrap();
        assert_eq!(format_timestamp(&ts), "2010-12-01 08:26:00");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("6").unwrap(), 6);
        assert_eq!(parse_quantity(" -12 ").unwrap(), -12);
        assert_eq!(parse_quantity("6.0").unwrap(), 6);
        assert!(parse_quantity("6.5").is_err());
        assert!(parse_quantity("six").is_err());
    }

    #[test]
    fn test_parse_money_rounds_to_two_places() {
        assert_eq!(parse_money("2.55").unwrap().to_string(), "2.55");
        assert_eq!(parse_money("2.5").unwrap().to_string(), "2.50");
        assert_eq!(parse_money("0.125").unwrap().to_string(), "0.13");
        assert_eq!(parse_money("-0.125").unwrap().to_string(), "-0.13");
        assert_eq!(parse_money("1e1").unwrap().to_string(), "10.00");
        assert!(parse_money("abc").is_err());
    }

    #[test]
    fn test_line_total_is_exact() {
        assert_eq!(line_total(3, money("0.10")).unwrap(), money("0.30"));
        assert_eq!(line_total(3, money("0.10")).unwrap().to_string(), "0.30");
        assert_eq!(line_total(-2, money("1.25")).unwrap(), money("-2.50"));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let price = money("100000000000.00");
        assert!(line_total(9_000_000_000_000_000_000, price).is_err());
        assert!(line_total(i64::MIN, money("-1.00")).is_ok());

        assert!(add_quantity(i64::MAX, 1).is_err());
        assert_eq!(add_quantity(-3, 5).unwrap(), 2);
        assert!(add_money(Decimal::MAX, money("1.00")).is_err());
        assert_eq!(add_money(money("1.25"), money("2.50")).unwrap(), money("3.75"));
    }

    #[test]
    fn test_parse_measurement() {
        assert_eq!(parse_measurement("12.5").unwrap(), 12.5);
        assert!(parse_measurement("..").is_err());
        assert!(parse_measurement("NaN").is_err());
    }
}
