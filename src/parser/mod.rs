pub mod record;
pub mod source;

pub use record::{Row, SqlValue, ToRow};
pub use source::{read_census, read_records, read_transactions, RawCensusRecord, RawTransaction};
