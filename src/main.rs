use anyhow::{Context, Result};
use retail_etl::{
    cli::{Cli, Commands},
    config::{delimiter_byte, PipelineConfig},
    filter::resolve_tables,
    parser::read_census,
    pipeline::{clean_census, melt, run_pipeline, RunSummary},
    schema::ALL_TABLES,
    ui::{ConsoleUi, Ui, UiApp},
    writer::{export_table, table_exists, write_records},
};
use rusqlite::{Connection, OpenFlags};
use std::io::IsTerminal;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Run {
            transactions,
            census,
            output_db,
            config,
            country,
            tie_break,
            export_dir,
            delimiter,
            include,
            exclude,
            plain,
        } => {
            let start = Instant::now();

            let mut settings = match &config {
                Some(path) => PipelineConfig::load(path)?,
                None => PipelineConfig::default(),
            };
            settings.transactions = transactions;
            settings.census = census;
            settings.output_db = output_db;
            if let Some(country) = country {
                settings.country = country;
            }
            if let Some(tie_break) = tie_break {
                settings.tie_break = tie_break;
            }
            if export_dir.is_some() {
                settings.export_dir = export_dir;
            }
            if let Some(delimiter) = delimiter {
                settings.delimiter = delimiter;
            }

            let tables = resolve_tables(include, exclude)?;

            if plain || !std::io::stdout().is_terminal() {
                let mut ui = ConsoleUi::new();
                let summary = run_pipeline(&settings, &tables, &mut ui)?;
                ui.log(describe(&settings, &summary, start));
            } else {
                let mut ui = UiApp::new()?;
                match run_pipeline(&settings, &tables, &mut ui) {
                    Ok(summary) => ui.finish(&describe(&settings, &summary, start))?,
                    Err(e) => {
                        ui.restore()?;
                        return Err(e);
                    }
                }
            }
        }

        Commands::Export {
            db,
            output_dir,
            delimiter,
        } => {
            let delimiter = delimiter_byte(delimiter)?;
            let conn = Connection::open_with_flags(&db, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .with_context(|| format!("Failed to open database: {:?}", db))?;

            for table in ["sales_analysis", "census_cleaned"] {
                if !table_exists(&conn, table)? {
                    println!("Skipped {} (not in {:?})", table, db);
                    continue;
                }
                let count = export_table(&conn, table, &output_dir, delimiter)?;
                println!("Exported {} ({} rows)", table, count);
            }
        }

        Commands::CensusLong {
            census,
            country,
            delimiter,
        } => {
            let delimiter = delimiter_byte(delimiter)?;
            let cleaned = clean_census(&read_census(&census, delimiter)?, &country)?;
            write_records(melt(&cleaned), std::io::stdout().lock(), delimiter)?;
        }

        Commands::ListTables => {
            println!("Available tables:\n");
            for table in ALL_TABLES {
                println!("  {:22} {}", table.name, table.description);
            }
        }
    }

    Ok(())
}

fn describe(settings: &PipelineConfig, summary: &RunSummary, start: Instant) -> String {
    format!(
        "Created {:?} ({} records, {} duplicates removed) for {} in {:.1}s",
        settings.output_db,
        summary.total_rows(),
        summary.duplicates_removed,
        settings.country,
        start.elapsed().as_secs_f64()
    )
}
