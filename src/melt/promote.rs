//! Promotion decisions for child nodes
//!
//! Each child of a record is handled by exactly one [`Rule`]. The rules are
//! tried in a fixed priority order and the first match wins, so the order of
//! the checks in [`classify`] is part of the output format.

use crate::gedcom::Node;
use crate::melt::config::MeltConfig;
use crate::melt::registry::TableRegistry;
use crate::melt::types::{Row, Table, ID_COLUMN};
use std::collections::{HashMap, HashSet};

/// How a child node ends up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule<'a> {
    /// Configured cross-reference; junction row into `target`
    Link { target: &'a str },
    /// Tag names another top-level record type; junction row into that table
    SiblingTable,
    /// Value deduplicated into a promoted-value table; junction row to it
    PromotedValue,
    /// Internal node flattened into its own table; junction row to it
    PromotedRecord,
    /// Leaf without a value; dropped
    NullValue,
    /// Formatted value stored in a column named after the tag
    PlainColumn,
}

/// Pick the rule for `child` of a record in `table`
pub fn classify<'a>(
    config: &'a MeltConfig,
    namespace: &HashSet<String>,
    table: &str,
    child: &Node,
) -> Rule<'a> {
    if let Some(target) = config.link_target(&child.tag) {
        Rule::Link { target }
    } else if namespace.contains(&child.tag) {
        Rule::SiblingTable
    } else if config.promotes_value(table, &child.tag) {
        Rule::PromotedValue
    } else if !child.is_leaf() {
        Rule::PromotedRecord
    } else if child.value.is_none() {
        Rule::NullValue
    } else {
        Rule::PlainColumn
    }
}

/// A table keyed by value: identical values share one row
#[derive(Debug)]
struct PromotedValueTable {
    table: Table,
    ids: HashMap<String, String>,
}

/// Promoted-value tables accumulated during a run, merged into the registry at the end
#[derive(Debug, Default)]
pub struct PromotedValues {
    tables: Vec<PromotedValueTable>,
    index: HashMap<String, usize>,
}

impl PromotedValues {
    pub fn new() -> Self {
        PromotedValues::default()
    }

    /// Id of the row holding `raw` in table `name`, adding the row on first sight.
    ///
    /// `stored` is what goes into the value column of a new row; `None` leaves
    /// the column out. A new id starts from the promoted table's row count and
    /// moves past any id `registry` has already handed out.
    pub fn resolve(
        &mut self,
        config: &MeltConfig,
        registry: &mut TableRegistry,
        name: &str,
        raw: &str,
        stored: Option<String>,
    ) -> String {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.tables.push(PromotedValueTable {
                    table: Table::new(name),
                    ids: HashMap::new(),
                });
                self.index.insert(name.to_string(), self.tables.len() - 1);
                self.tables.len() - 1
            }
        };
        let promoted = &mut self.tables[idx];

        if let Some(id) = promoted.ids.get(raw) {
            return id.clone();
        }

        let mut sequence = promoted.table.row_count();
        let id = loop {
            let candidate = config.generated_id(name, sequence);
            if registry.claim_id(&candidate) {
                break candidate;
            }
            sequence += 1;
        };
        let mut row = Row::with_id(id.clone());
        if let Some(value) = stored {
            row.set(name, value);
        }
        promoted.table.push_row(row);
        promoted.ids.insert(raw.to_string(), id.clone());
        id
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.index.get(name).map(|&idx| &self.tables[idx].table)
    }

    pub fn into_tables(self) -> impl Iterator<Item = Table> {
        self.tables.into_iter().map(|p| p.table)
    }
}

/// Build a junction row from `source_table`/`source_id` to `target_table`/`target_id`.
/// Columns are `<table><separator>id`, matching the junction table's own name.
pub fn junction_row(
    separator: &str,
    source_table: &str,
    source_id: &str,
    target_table: &str,
    target_id: Option<&str>,
) -> Row {
    let mut row = Row::new();
    row.set(format!("{}{}{}", source_table, separator, ID_COLUMN), source_id);
    if let Some(target_id) = target_id {
        row.set_unique(&format!("{}{}{}", target_table, separator, ID_COLUMN), target_id);
    }
    row
}
