use crate::gedcom::Node;
use crate::melt::types::Row;

/// A post-hoc table generator.
///
/// Called once per top-level record after that record's row and every row its
/// children produced are final. Returned rows are appended to [`table_name`].
///
/// [`table_name`]: TablePlugin::table_name
pub trait TablePlugin: std::fmt::Debug {
    /// Table the produced rows are appended to
    fn table_name(&self) -> &str;

    fn produce_rows(&self, row: &Row, tag: &str, id: &str, children: &[Node]) -> Vec<Row>;
}

/// Child -> parent edges derived from family records.
///
/// Reads the spouse columns already resolved on the family row (`HUSB`,
/// `WIFE` and their suffixed duplicates) and pairs each with every `CHIL`.
#[derive(Debug, Clone)]
pub struct ParentsTable {
    family_tag: String,
    child_tag: String,
    spouse_tags: Vec<String>,
}

impl Default for ParentsTable {
    fn default() -> Self {
        ParentsTable {
            family_tag: String::from("FAM"),
            child_tag: String::from("CHIL"),
            spouse_tags: vec![String::from("HUSB"), String::from("WIFE")],
        }
    }
}

impl ParentsTable {
    pub const TABLE_NAME: &'static str = "PARENTS";

    fn is_spouse_column(&self, column: &str) -> bool {
        self.spouse_tags.iter().any(|tag| {
            column
                .strip_prefix(tag.as_str())
                .is_some_and(|suffix| suffix.chars().all(|c| c.is_ascii_digit()))
        })
    }
}

impl TablePlugin for ParentsTable {
    fn table_name(&self) -> &str {
        Self::TABLE_NAME
    }

    fn produce_rows(&self, row: &Row, tag: &str, id: &str, children: &[Node]) -> Vec<Row> {
        if tag != self.family_tag {
            return Vec::new();
        }

        let spouses: Vec<(&str, &str)> = row
            .iter()
            .filter(|(column, _)| self.is_spouse_column(column))
            .collect();
        let parents = &spouses;

        children
            .iter()
            .filter(|c| c.tag == self.child_tag)
            .filter_map(|c| c.value.as_deref())
            .flat_map(move |child| {
                parents.iter().map(move |(role, parent)| {
                    Row::from_iter([
                        ("child", child),
                        ("parent", *parent),
                        ("role", role.trim_end_matches(|c: char| c.is_ascii_digit())),
                        ("family", id),
                    ])
                })
            })
            .collect()
    }
}
