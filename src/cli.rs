use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::TieBreak;

#[derive(Parser, Debug)]
#[command(name = "retail-etl")]
#[command(version, about = "Clean retail transactions and census data into a SQLite reporting schema")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline into a fresh database
    Run {
        /// Transactions CSV file
        transactions: PathBuf,

        /// Census CSV file
        census: PathBuf,

        /// Output SQLite database path (replaced if it exists)
        output_db: PathBuf,

        /// JSON config file; flags given here override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Country the dimensional tables are built for [default: Canada]
        #[arg(long)]
        country: Option<String>,

        /// How products pick one description and price [default: most-frequent]
        #[arg(long, value_enum)]
        tie_break: Option<TieBreak>,

        /// Write CSV exports into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Field delimiter for input and exported files [default: ,]
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Only build these derived tables (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these derived tables (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Print plain log lines instead of the terminal UI
        #[arg(short, long)]
        plain: bool,
    },

    /// Export the analysis and census tables of an existing database
    Export {
        /// SQLite database written by `run`
        db: PathBuf,

        /// Output directory
        output_dir: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },

    /// Print the long-form census projection as CSV
    CensusLong {
        /// Census CSV file
        census: PathBuf,

        /// Country label for the rows
        #[arg(long, default_value = crate::config::DEFAULT_COUNTRY)]
        country: String,

        /// Field delimiter for input and output
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },

    /// List all table names
    ListTables,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
