use crate::schema::{get_table, DependencyResolver, TableSchema};
use anyhow::{anyhow, bail, Result};

/// Resolves which tables to write based on include/exclude filters.
/// Raw and cleaned tables are always written; filters apply to the
/// dimensional and analysis tables.
pub fn resolve_tables(
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<&'static TableSchema>> {
    let resolver = DependencyResolver::new();

    let tables = match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            let refs = derived_names(&include_list)?;
            resolver.resolve_includes(&refs).map_err(|e| anyhow!(e))?
        }
        (None, Some(exclude_list)) => {
            let refs = derived_names(&exclude_list)?;
            resolver.resolve_excludes(&refs).map_err(|e| anyhow!(e))?
        }
        (None, None) => resolver.all_tables_ordered(),
    };

    Ok(with_base_tables(tables))
}

/// Validate filter names: known tables that are not always written
fn derived_names(names: &[String]) -> Result<Vec<&str>> {
    names
        .iter()
        .map(|name| {
            let name = name.trim();
            match get_table(name) {
                None => bail!("Unknown table: {}", name),
                Some(t) if t.stage.is_base() => {
                    bail!("Table {} is always written and cannot be filtered", name)
                }
                Some(_) => Ok(name),
            }
        })
        .collect()
}

/// Add every base table missing from `tables`, keeping dependency order
fn with_base_tables(tables: Vec<&'static TableSchema>) -> Vec<&'static TableSchema> {
    let mut result: Vec<&'static TableSchema> = crate::schema::ALL_TABLES
        .iter()
        .copied()
        .filter(|t| t.stage.is_base())
        .collect();
    result.extend(tables.into_iter().filter(|t| !t.stage.is_base()));
    result
}
