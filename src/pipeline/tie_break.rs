//! Policies choosing one representative description and price for a
//! product whose source rows disagree.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One source row's view of a product
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub description: &'a str,
    pub unit_price: Decimal,
    pub invoice_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Most common description and most common price, each on its own;
    /// equal counts go to the smaller value
    #[default]
    MostFrequent,
    /// Smallest description and smallest price, each on its own
    Minimum,
    /// Description and price of the latest row; equal timestamps go to the
    /// earlier row in input order
    Latest,
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TieBreak::MostFrequent => write!(f, "most-frequent"),
            TieBreak::Minimum => write!(f, "minimum"),
            TieBreak::Latest => write!(f, "latest"),
        }
    }
}

impl TieBreak {
    /// Pick the representative (description, unit price); `None` for no candidates
    pub fn pick<'a>(&self, candidates: &[Candidate<'a>]) -> Option<(&'a str, Decimal)> {
        match self {
            TieBreak::MostFrequent => Some((
                most_frequent(candidates.iter().map(|c| c.description))?,
                most_frequent(candidates.iter().map(|c| c.unit_price))?,
            )),
            TieBreak::Minimum => Some((
                candidates.iter().map(|c| c.description).min()?,
                candidates.iter().map(|c| c.unit_price).min()?,
            )),
            TieBreak::Latest => latest(candidates).map(|c| (c.description, c.unit_price)),
        }
    }
}

/// Value with the highest count; the smallest value among equal counts
pub fn most_frequent<T: Ord>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// Candidate with the latest timestamp; the first of equal timestamps
pub fn latest<'c, 'a>(candidates: &'c [Candidate<'a>]) -> Option<&'c Candidate<'a>> {
    candidates.iter().fold(None, |best: Option<&'c Candidate<'a>>, c| match best {
        Some(b) if b.invoice_date >= c.invoice_date => Some(b),
        _ => Some(c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn price(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn candidates() -> Vec<Candidate<'static>> {
        vec![
            Candidate { description: "RED MUG", unit_price: price("2.10"), invoice_date: at(9) },
            Candidate { description: "MUG, RED", unit_price: price("1.95"), invoice_date: at(12) },
            Candidate { description: "RED MUG", unit_price: price("2.10"), invoice_date: at(10) },
            Candidate { description: "ZZ MUG", unit_price: price("1.95"), invoice_date: at(12) },
        ]
    }

    #[test]
    fn test_most_frequent() {
        let (description, unit_price) = TieBreak::MostFrequent.pick(&candidates()).unwrap();
        assert_eq!(description, "RED MUG");
        // 1.95 and 2.10 both appear twice
        assert_eq!(unit_price, price("1.95"));
    }

    #[test]
    fn test_minimum() {
        let (description, unit_price) = TieBreak::Minimum.pick(&candidates()).unwrap();
        assert_eq!(description, "MUG, RED");
        assert_eq!(unit_price, price("1.95"));
    }

    #[test]
    fn test_latest_prefers_first_of_equal_timestamps() {
        let (description, unit_price) = TieBreak::Latest.pick(&candidates()).unwrap();
        assert_eq!(description, "MUG, RED");
        assert_eq!(unit_price, price("1.95"));
    }

    #[test]
    fn test_no_candidates() {
        assert!(TieBreak::MostFrequent.pick(&[]).is_none());
        assert!(TieBreak::Minimum.pick(&[]).is_none());
        assert!(TieBreak::Latest.pick(&[]).is_none());
    }

    #[test]
    fn test_policy_names_round_trip_through_serde() {
        let policy: TieBreak = serde_json::from_str("\"most-frequent\"").unwrap();
        assert_eq!(policy, TieBreak::MostFrequent);
        assert_eq!(serde_json::to_string(&TieBreak::Latest).unwrap(), "\"latest\"");
    }
}
