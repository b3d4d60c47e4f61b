use std::collections::HashSet;

/// Column holding a row's identity in every non-junction table
pub const ID_COLUMN: &str = "id";

/// Column holding a record's own value (lowercase, so it never collides with a tag)
pub const VALUE_COLUMN: &str = "value";

/// One row of a table: column name -> value, in the order columns were set.
/// Unknown columns are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<(String, String)>);

impl Row {
    pub fn new() -> Self {
        Row(Vec::new())
    }

    /// Start a row with its `id` column set
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut row = Row::new();
        row.set(ID_COLUMN, id);
        row
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|(k, _)| k == column)
    }

    /// Set a column, replacing any previous value
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.0.push((column, value)),
        }
    }

    /// Set `column`, or the first free `column2`, `column3`, ... when the name
    /// is already taken on this row. Returns the column actually written.
    pub fn set_unique(&mut self, column: &str, value: impl Into<String>) -> String {
        let name = self.free_column_name(column);
        self.0.push((name.clone(), value.into()));
        name
    }

    fn free_column_name(&self, column: &str) -> String {
        if !self.contains(column) {
            return column.to_string();
        }
        (2usize..)
            .map(|n| format!("{}{}", column, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| column.to_string())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

/// A relational table under construction
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Table name, e.g. "INDI", "FAM_INDI"
    pub name: String,

    rows: Vec<Row>,

    /// Column names in order of first appearance
    columns: Vec<String>,

    column_set: HashSet<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a column if the table does not have it yet
    pub fn add_column(&mut self, column: &str) {
        if self.column_set.insert(column.to_string()) {
            self.columns.push(column.to_string());
        }
    }

    /// Append a row, unioning its keys into the column set first
    pub fn push_row(&mut self, row: Row) {
        // Keep the id column leading even when a row introduces it late
        if row.contains(ID_COLUMN) {
            self.add_column(ID_COLUMN);
        }
        for column in row.columns() {
            if !self.column_set.contains(column) {
                self.column_set.insert(column.to_string());
                self.columns.push(column.to_string());
            }
        }
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_set.contains(column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Union another table's columns into this one and append its rows
    pub fn absorb(&mut self, other: Table) {
        for column in &other.columns {
            self.add_column(column);
        }
        for row in other.rows {
            self.push_row(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_unique_suffixes_from_two() {
        let mut row = Row::new();
        assert_eq!(row.set_unique("X", "a"), "X");
        assert_eq!(row.set_unique("X", "b"), "X2");
        assert_eq!(row.set_unique("X", "c"), "X3");

        assert_eq!(row.get("X"), Some("a"));
        assert_eq!(row.get("X2"), Some("b"));
        assert_eq!(row.get("X3"), Some("c"));
    }

    #[test]
    fn test_set_unique_skips_taken_suffix() {
        let mut row = Row::new();
        row.set("X", "a");
        row.set("X2", "b");
        assert_eq!(row.set_unique("X", "c"), "X3");
    }

    #[test]
    fn test_push_row_unions_columns_in_order() {
        let mut table = Table::new("INDI");
        table.add_column("id");
        table.push_row(Row::from_iter([("id", "@I1@"), ("SEX", "M")]));
        table.push_row(Row::from_iter([("id", "@I2@"), ("NAME", "Ann")]));

        assert_eq!(table.columns(), &["id", "SEX", "NAME"]);
        assert_eq!(table.row_count(), 2);
        assert!(table.rows().iter().all(|r| r.columns().all(|c| table.has_column(c))));
    }

    #[test]
    fn test_absorb_keeps_existing_columns() {
        let mut table = Table::new("OCCU");
        table.push_row(Row::from_iter([("id", "@O1@"), ("NOTE", "x")]));

        let mut promoted = Table::new("OCCU");
        promoted.push_row(Row::from_iter([("id", "@GENOCCU0@"), ("OCCU", "Farmer")]));

        table.absorb(promoted);
        assert_eq!(table.columns(), &["id", "NOTE", "OCCU"]);
        assert_eq!(table.row_count(), 2);
    }
}
