use super::tables::{get_table, ALL_TABLES};
use super::types::TableSchema;
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolves table dependencies for filtering
pub struct DependencyResolver {
    /// Map of table name -> tables it depends on
    deps: HashMap<&'static str, HashSet<&'static str>>,
    /// Map of table name -> tables that depend on it
    reverse_deps: HashMap<&'static str, HashSet<&'static str>>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        let mut deps: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
        let mut reverse_deps: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();

        for table in ALL_TABLES {
            let table_deps = table.dependencies();
            deps.insert(table.name, table_deps.clone());

            for dep in table_deps {
                reverse_deps.entry(dep).or_default().insert(table.name);
            }
        }

        Self { deps, reverse_deps }
    }

    /// Given a set of requested tables, resolve all required dependencies
    /// Returns tables in dependency order (parents before children)
    pub fn resolve_includes(
        &self,
        requested: &[&str],
    ) -> Result<Vec<&'static TableSchema>, String> {
        let mut included: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = requested.iter().copied().collect();

        while let Some(table_name) = queue.pop_front() {
            if included.contains(table_name) {
                continue;
            }

            if get_table(table_name).is_none() {
                return Err(format!("Unknown table: {}", table_name));
            }

            included.insert(table_name);

            if let Some(table_deps) = self.deps.get(table_name) {
                for dep in table_deps {
                    if !included.contains(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        self.topological_sort(&included)
    }

    /// Given a set of tables to exclude, return remaining tables in order.
    /// Anything built from an excluded table is excluded with it.
    pub fn resolve_excludes(&self, excluded: &[&str]) -> Result<Vec<&'static TableSchema>, String> {
        for name in excluded {
            if get_table(name).is_none() {
                return Err(format!("Unknown table: {}", name));
            }
        }

        let mut dropped: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = excluded.iter().copied().collect();

        while let Some(table_name) = queue.pop_front() {
            if !dropped.insert(table_name) {
                continue;
            }
            if let Some(children) = self.reverse_deps.get(table_name) {
                queue.extend(children.iter().copied());
            }
        }

        let included: HashSet<&str> = ALL_TABLES
            .iter()
            .map(|t| t.name)
            .filter(|name| !dropped.contains(name))
            .collect();

        self.topological_sort(&included)
    }

    /// Return all tables in dependency order
    pub fn all_tables_ordered(&self) -> Vec<&'static TableSchema> {
        ALL_TABLES.to_vec()
    }

    /// Topological sort of tables by dependencies
    fn topological_sort(
        &self,
        included: &HashSet<&str>,
    ) -> Result<Vec<&'static TableSchema>, String> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut temp_visited: HashSet<&str> = HashSet::new();

        // Walk in declaration order so the output is stable between runs
        for table in ALL_TABLES {
            if included.contains(table.name) && !visited.contains(table.name) {
                self.visit(
                    table.name,
                    included,
                    &mut visited,
                    &mut temp_visited,
                    &mut result,
                )?;
            }
        }

        Ok(result)
    }

    fn visit<'a>(
        &self,
        name: &'a str,
        included: &HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
        temp_visited: &mut HashSet<&'a str>,
        result: &mut Vec<&'static TableSchema>,
    ) -> Result<(), String> {
        if temp_visited.contains(name) {
            return Err(format!("Circular dependency detected at: {}", name));
        }
        if visited.contains(name) {
            return Ok(());
        }

        temp_visited.insert(name);

        if let Some(deps) = self.deps.get(name) {
            for dep in deps {
                if *dep != name && included.contains(dep) {
                    self.visit(dep, included, visited, temp_visited, result)?;
                }
            }
        }

        temp_visited.remove(name);
        visited.insert(name);

        if let Some(table) = get_table(name) {
            result.push(table);
        }

        Ok(())
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tables: &[&TableSchema]) -> Vec<&'static str> {
        tables.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_resolve_invoice_details_includes_parents() {
        let resolver = DependencyResolver::new();
        let tables = resolver.resolve_includes(&["invoice_details"]).unwrap();
        let names = names(&tables);

        assert!(names.contains(&"invoice_details"));
        assert!(names.contains(&"invoices"));
        assert!(names.contains(&"customers"));
        assert!(names.contains(&"products"));
        assert!(!names.contains(&"sales_analysis"));

        let pos = |n: &str| names.iter().position(|&x| x == n).unwrap();
        assert!(pos("customers") < pos("invoices"));
        assert!(pos("invoices") < pos("invoice_details"));
        assert!(pos("products") < pos("invoice_details"));
    }

    #[test]
    fn test_exclude_drops_dependants() {
        let resolver = DependencyResolver::new();
        let tables = resolver.resolve_excludes(&["products"]).unwrap();
        let names = names(&tables);

        assert!(!names.contains(&"products"));
        assert!(!names.contains(&"invoice_details"));
        assert!(!names.contains(&"sales_analysis"));
        assert!(names.contains(&"customers"));
        assert!(names.contains(&"invoices"));
    }

    #[test]
    fn test_unknown_table_error() {
        let resolver = DependencyResolver::new();
        assert!(resolver.resolve_includes(&["nonexistent"]).is_err());
        assert!(resolver.resolve_excludes(&["nonexistent"]).is_err());
    }
}
