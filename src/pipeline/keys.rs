//! Surrogate keys derived from natural keys, so re-running on unchanged
//! input reproduces the same identifiers.

use anyhow::{bail, Result};
use std::collections::HashMap;
use xxhash_rust::xxh3::Xxh3Default;

/// xxh3 over each part as a little-endian u64 length followed by its bytes.
/// Fixed byte layout, so keys do not depend on the platform or toolchain.
fn stable_hash(parts: &[&[u8]]) -> u64 {
    let mut hasher = Xxh3Default::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.digest()
}

/// Key of the invoice identified by (invoice number, customer id)
pub fn invoice_key(invoice_no: &str, customer_id: &str) -> String {
    format!(
        "inv-{:016x}",
        stable_hash(&[invoice_no.as_bytes(), customer_id.as_bytes()])
    )
}

/// Key of the `ordinal`-th line for a stock code within an invoice
pub fn line_key(invoice_key: &str, stock_code: &str, ordinal: u32) -> String {
    format!(
        "line-{:016x}",
        stable_hash(&[
            invoice_key.as_bytes(),
            stock_code.as_bytes(),
            &ordinal.to_le_bytes(),
        ])
    )
}

/// Tracks issued keys and rejects two natural keys hashing alike
#[derive(Debug, Default)]
pub struct KeyRegistry {
    issued: HashMap<String, String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` for `natural`; re-registering the same pair is fine
    pub fn register(&mut self, key: &str, natural: impl Into<String>) -> Result<()> {
        let natural = natural.into();
        match self.issued.get(key) {
            Some(existing) if *existing != natural => {
                bail!(
                    "Surrogate key collision on {}: {:?} and {:?}",
                    key,
                    existing,
                    natural
                )
            }
            Some(_) => Ok(()),
            None => {
                self.issued.insert(key.to_string(), natural);
                Ok(())
            }
        }
    }
}
