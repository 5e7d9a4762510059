use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::TieBreak;

pub const DEFAULT_COUNTRY: &str = "Canada";

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub transactions: PathBuf,
    pub census: PathBuf,
    pub output_db: PathBuf,
    /// Country the dimensional tables are scoped to; also labels census rows
    pub country: String,
    pub tie_break: TieBreak,
    /// Where CSV exports go; no exports when unset
    pub export_dir: Option<PathBuf>,
    /// Field delimiter for both input and exported files
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transactions: PathBuf::new(),
            census: PathBuf::new(),
            output_db: PathBuf::new(),
            country: DEFAULT_COUNTRY.to_string(),
            tie_break: TieBreak::default(),
            export_dir: None,
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    /// Load settings from a JSON file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        delimiter_byte(self.delimiter)
    }

    pub fn validate(&self) -> Result<()> {
        if self.country.trim().is_empty() {
            bail!("Country must not be empty");
        }
        for (name, path) in [
            ("transactions", &self.transactions),
            ("census", &self.census),
            ("output database", &self.output_db),
        ] {
            if path.as_os_str().is_empty() {
                bail!("No {} path given", name);
            }
        }
        self.delimiter_byte()?;
        Ok(())
    }
}

/// CSV delimiters must be a single ASCII character
pub fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' {
        bail!("Unsupported delimiter: {:?}", delimiter);
    }
    Ok(delimiter as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.country, "Canada");
        assert_eq!(config.tie_break, TieBreak::MostFrequent);
        assert_eq!(config.delimiter_byte().unwrap(), b',');
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"country": "France", "tie_break": "latest", "delimiter": ";"}}"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.country, "France");
        assert_eq!(config.tie_break, TieBreak::Latest);
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.export_dir, None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"countries": ["Canada"]}}"#).unwrap();
        assert!(PipelineConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_delimiter_validation() {
        assert_eq!(delimiter_byte('\t').unwrap(), b'\t');
        assert!(delimiter_byte('é').is_err());
        assert!(delimiter_byte('"').is_err());
    }
}
