//! Census cleaning and the long-form (one row per metric) projection.

use anyhow::{Context, Result};
use serde::Serialize;

use super::values::parse_measurement;
use crate::parser::{RawCensusRecord, Row, ToRow};

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedCensusRecord {
    pub source_row: u64,
    pub topic: Option<String>,
    pub characteristic: Option<String>,
    pub total: f64,
    pub men: f64,
    pub women: f64,
    pub total_rate: f64,
    pub men_rate: f64,
    pub women_rate: f64,
    pub country: String,
}

/// Which triple a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Measure {
    Count,
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    Total,
    Men,
    Women,
}

/// Projection order of the long form
static MEASUREMENTS: [(Measure, Metric); 6] = [
    (Measure::Count, Metric::Total),
    (Measure::Count, Metric::Men),
    (Measure::Count, Metric::Women),
    (Measure::Rate, Metric::Total),
    (Measure::Rate, Metric::Men),
    (Measure::Rate, Metric::Women),
];

impl CleanedCensusRecord {
    pub fn from_raw(raw: &RawCensusRecord, country: &str) -> Result<Self> {
        Ok(Self {
            source_row: raw.source_row,
            topic: raw.topic.as_deref().map(|s| s.trim().to_string()),
            characteristic: raw.characteristic.as_deref().map(|s| s.trim().to_string()),
            total: measurement(raw.total.as_deref(), "total")?,
            men: measurement(raw.men.as_deref(), "men")?,
            women: measurement(raw.women.as_deref(), "women")?,
            total_rate: measurement(raw.total_rate.as_deref(), "total_rate")?,
            men_rate: measurement(raw.men_rate.as_deref(), "men_rate")?,
            women_rate: measurement(raw.women_rate.as_deref(), "women_rate")?,
            country: country.trim().to_string(),
        })
    }

    pub fn measurement(&self, measure: Measure, metric: Metric) -> f64 {
        match (measure, metric) {
            (Measure::Count, Metric::Total) => self.total,
            (Measure::Count, Metric::Men) => self.men,
            (Measure::Count, Metric::Women) => self.women,
            (Measure::Rate, Metric::Total) => self.total_rate,
            (Measure::Rate, Metric::Men) => self.men_rate,
            (Measure::Rate, Metric::Women) => self.women_rate,
        }
    }
}

/// Missing cells count as zero
fn measurement(raw: Option<&str>, column: &str) -> Result<f64> {
    raw.map(parse_measurement)
        .transpose()
        .with_context(|| format!("column {}", column))
        .map(|v| v.unwrap_or(0.0))
}

impl ToRow for CleanedCensusRecord {
    fn to_row(&self) -> Row {
        Row::new()
            .with("source_row", self.source_row)
            .with("topic", self.topic.as_ref())
            .with("characteristic", self.characteristic.as_ref())
            .with("total", self.total)
            .with("men", self.men)
            .with("women", self.women)
            .with("total_rate", self.total_rate)
            .with("men_rate", self.men_rate)
            .with("women_rate", self.women_rate)
            .with("country", &self.country)
    }
}

/// Fill, type and label census rows; flag and notes columns are not carried over
pub fn clean_census(raw: &[RawCensusRecord], country: &str) -> Result<Vec<CleanedCensusRecord>> {
    raw.iter()
        .map(|r| {
            CleanedCensusRecord::from_raw(r, country)
                .with_context(|| format!("Invalid census value at data row {}", r.source_row))
        })
        .collect()
}

/// One metric of one census row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusObservation<'a> {
    pub topic: Option<&'a str>,
    pub characteristic: Option<&'a str>,
    pub measure: Measure,
    pub metric: Metric,
    pub value: f64,
}

/// Long-form view: six observations per row, computed on the fly
pub fn melt<'a>(
    records: &'a [CleanedCensusRecord],
) -> impl Iterator<Item = CensusObservation<'a>> + 'a {
    records.iter().flat_map(|record| {
        MEASUREMENTS
            .iter()
            .map(move |&(measure, metric)| CensusObservation {
                topic: record.topic.as_deref(),
                characteristic: record.characteristic.as_deref(),
                measure,
                metric,
                value: record.measurement(measure, metric),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_row() -> RawCensusRecord {
        RawCensusRecord {
            source_row: 3,
            topic: Some("Age characteristics".to_string()),
            characteristic: Some("0 to 14 years".to_string()),
            total: Some("6000".to_string()),
            flag_total: Some("A".to_string()),
            men: Some("3100".to_string()),
            women: Some("2900".to_string()),
            total_rate: Some("16.3".to_string()),
            men_rate: Some("17.1".to_string()),
            women_rate: Some("15.6".to_string()),
            notes: Some("rounded".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_null_measurements_become_zero() {
        let raw = RawCensusRecord {
            source_row: 1,
            topic: Some("Income".to_string()),
            flag_total: Some("F".to_string()),
            notes: Some("suppressed".to_string()),
            ..Default::default()
        };
        let cleaned = clean_census(&[raw], "Canada").unwrap();
        let row = &cleaned[0];

        assert_eq!(row.country, "Canada");
        for &(measure, metric) in &MEASUREMENTS {
            assert_eq!(row.measurement(measure, metric), 0.0);
        }

        let stored = row.to_row();
        assert!(!stored.values.contains_key("flag_total"));
        assert!(!stored.values.contains_key("notes"));
    }

    #[test]
    fn test_values_are_parsed() {
        let cleaned = CleanedCensusRecord::from_raw(&raw_row(), "Canada").unwrap();
        assert_eq!(cleaned.total, 6000.0);
        assert_eq!(cleaned.women_rate, 15.6);
    }

    #[test]
    fn test_bad_measurement_fails() {
        let mut raw = raw_row();
        raw.men = Some("x".to_string());
        let err = clean_census(&[raw], "Canada").unwrap_err();
        let message = format!("{:#}", err);

        assert!(message.contains("data row 3"), "{}", message);
        assert!(message.contains("column men"), "{}", message);
    }

    #[test]
    fn test_melt_yields_six_observations_per_row() {
        let cleaned = clean_census(&[raw_row(), raw_row()], "Canada").unwrap();
        let long: Vec<_> = melt(&cleaned).collect();

        assert_eq!(long.len(), 12);
        assert_eq!(long[0].metric, Metric::Total);
        assert_eq!(long[0].measure, Measure::Count);
        assert_eq!(long[0].value, 6000.0);
        assert_eq!(long[1].metric, Metric::Men);
        assert_eq!(long[1].value, 3100.0);
        assert_eq!(long[5].measure, Measure::Rate);
        assert_eq!(long[5].metric, Metric::Women);
        assert_eq!(long[5].value, 15.6);
        assert_eq!(long[5].characteristic, Some("0 to 14 years"));
    }
}
