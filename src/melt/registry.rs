use crate::melt::config::MeltConfig;
use crate::melt::promote::PromotedValues;
use crate::melt::types::{Row, Table};
use std::collections::{HashMap, HashSet};

const LOG_TARGET: &str = "gedmelt::registry";

/// All tables built during one conversion run, in order of creation
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Vec<Table>,
    index: HashMap<String, usize>,
    sequences: HashMap<String, usize>,
    generated: HashSet<String>,
}

impl TableRegistry {
    pub fn new() -> Self {
        TableRegistry::default()
    }

    /// Create `name` with `initial_columns` unless it already exists.
    /// An existing table keeps its columns untouched.
    pub fn ensure_table(&mut self, name: &str, initial_columns: &[&str]) -> &mut Table {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                log::debug!(target: LOG_TARGET, "Creating table '{}'", name);
                let mut table = Table::new(name);
                for column in initial_columns {
                    table.add_column(column);
                }
                self.tables.push(table);
                self.index.insert(name.to_string(), self.tables.len() - 1);
                self.tables.len() - 1
            }
        };
        &mut self.tables[idx]
    }

    /// Append `row` to `table`, creating the table on first use
    pub fn add_row(&mut self, table: &str, row: Row) {
        self.ensure_table(table, &[]).push_row(row);
    }

    /// Next value of the running id counter for `table`, starting at 0
    pub fn next_sequence(&mut self, table: &str) -> usize {
        let counter = self.sequences.entry(table.to_string()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }

    /// Reserve a synthesized id for the whole run. Returns false if it is taken.
    pub fn claim_id(&mut self, id: &str) -> bool {
        self.generated.insert(id.to_string())
    }

    /// Next unclaimed synthesized id for a record of `table`
    pub fn next_generated_id(&mut self, config: &MeltConfig, table: &str) -> String {
        loop {
            let sequence = self.next_sequence(table);
            let id = config.generated_id(table, sequence);
            if self.claim_id(&id) {
                return id;
            }
            log::debug!(target: LOG_TARGET, "Skipping {}: already issued", id);
        }
    }

    /// Merge a table built elsewhere: union into an existing table of the
    /// same name, or adopt it as a new table
    pub fn merge_table(&mut self, table: Table) {
        match self.index.get(&table.name) {
            Some(&idx) => {
                log::debug!(target: LOG_TARGET, "Merging {} rows into existing table '{}'", table.row_count(), table.name);
                self.tables[idx].absorb(table);
            }
            None => {
                self.index.insert(table.name.clone(), self.tables.len());
                self.tables.push(table);
            }
        }
    }

    /// Fold every promoted-value table into the registry
    pub fn integrate(&mut self, promoted: PromotedValues) {
        for table in promoted.into_tables() {
            self.merge_table(table);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.index.get(name).map(|&idx| &self.tables[idx])
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
