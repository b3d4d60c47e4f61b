use crate::gedcom::{top_level_tags, Node};
use crate::melt::config::MeltConfig;
use crate::melt::format::ValueFormatter;
use crate::melt::plugins::{ParentsTable, TablePlugin};
use crate::melt::promote::{classify, junction_row, PromotedValues, Rule};
use crate::melt::registry::TableRegistry;
use crate::melt::types::{Row, ID_COLUMN, VALUE_COLUMN};
use anyhow::Result;
use std::collections::HashSet;

const LOG_TARGET: &str = "gedmelt::melt";

/// Tables under construction during one run
#[derive(Debug, Default)]
struct MeltState {
    registry: TableRegistry,
    promoted: PromotedValues,
}

/// The core melter that flattens GEDCOM records into relational tables
#[derive(Debug)]
pub struct GedcomMelter {
    config: MeltConfig,
    formatter: ValueFormatter,
    plugins: Vec<Box<dyn TablePlugin>>,
}

impl GedcomMelter {
    /// Validate `config` and build a melter with the plugins it enables
    pub fn new(config: MeltConfig) -> Result<Self> {
        config.validate()?;
        let formatter = ValueFormatter::new(&config)?;

        let mut plugins: Vec<Box<dyn TablePlugin>> = Vec::new();
        if config.generate_parents_table {
            plugins.push(Box::new(ParentsTable::default()));
        }

        Ok(GedcomMelter {
            config,
            formatter,
            plugins,
        })
    }

    /// Register an additional table plugin
    pub fn with_plugin(mut self, plugin: Box<dyn TablePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Melt parsed records into a registry of tables
    pub fn melt(&self, records: &[Node]) -> TableRegistry {
        let namespace_order: Vec<String> = top_level_tags(records)
            .into_iter()
            .filter(|tag| !self.config.ignored_record_tags.contains(tag))
            .collect();
        let namespace: HashSet<String> = namespace_order.iter().cloned().collect();

        let mut state = MeltState::default();
        for tag in &namespace_order {
            state.registry.ensure_table(tag, &[ID_COLUMN]);
        }

        for record in records {
            if !namespace.contains(&record.tag) {
                continue;
            }

            let (id, row) = self.flatten_record(record, &namespace, &mut state);

            let extra: Vec<(&str, Vec<Row>)> = self
                .plugins
                .iter()
                .map(|plugin| {
                    (
                        plugin.table_name(),
                        plugin.produce_rows(&row, &record.tag, &id, &record.children),
                    )
                })
                .collect();

            state.registry.add_row(&record.tag, row);
            for (table, rows) in extra {
                for row in rows {
                    state.registry.add_row(table, row);
                }
            }
        }

        let MeltState {
            mut registry,
            promoted,
        } = state;
        registry.integrate(promoted);

        log::info!(
            target: LOG_TARGET,
            "Melted {} records into {} tables",
            records.len(),
            registry.len()
        );
        registry
    }

    /// Flatten one record into its row, emitting every row its children produce.
    ///
    /// The record's own row is returned rather than appended so the caller can
    /// hand it to plugins first.
    fn flatten_record(
        &self,
        node: &Node,
        namespace: &HashSet<String>,
        state: &mut MeltState,
    ) -> (String, Row) {
        let table = node.tag.as_str();
        let id = match &node.pointer {
            Some(pointer) => pointer.clone(),
            None => state.registry.next_generated_id(&self.config, table),
        };

        let mut row = Row::with_id(id.clone());
        if let Some(value) = &node.value {
            row.set(VALUE_COLUMN, value.clone());
        }

        let copied_name = self.copy_individual_name(node, namespace, &mut row);

        for (idx, child) in node.children.iter().enumerate() {
            if copied_name == Some(idx) {
                continue;
            }
            self.apply_rule(table, &id, child, &mut row, namespace, state);
        }

        (id, row)
    }

    /// Put the first NAME of an individual on its row. Returns the index of a
    /// leaf NAME child that is fully covered by the copy.
    fn copy_individual_name(
        &self,
        node: &Node,
        namespace: &HashSet<String>,
        row: &mut Row,
    ) -> Option<usize> {
        if !self.config.copy_individual_name || node.tag != self.config.individual_table {
            return None;
        }

        let (idx, name) = node
            .children
            .iter()
            .enumerate()
            .find(|(_, c)| c.tag == "NAME" && c.value.is_some())?;
        row.set("NAME", name.value.clone().unwrap_or_default());

        let plain = classify(&self.config, namespace, &node.tag, name) == Rule::PlainColumn;
        plain.then_some(idx)
    }

    fn apply_rule(
        &self,
        table: &str,
        id: &str,
        child: &Node,
        row: &mut Row,
        namespace: &HashSet<String>,
        state: &mut MeltState,
    ) {
        let value = child.value.as_deref();

        match classify(&self.config, namespace, table, child) {
            Rule::Link { target } => {
                let junction = self.config.junction_name(table, target);
                state
                    .registry
                    .add_row(&junction, junction_row(&self.config.separator, table, id, target, value));
            }
            Rule::SiblingTable => {
                let junction = self.config.junction_name(table, &child.tag);
                state
                    .registry
                    .add_row(&junction, junction_row(&self.config.separator, table, id, &child.tag, value));
            }
            Rule::PromotedValue => {
                let raw = value.unwrap_or_default();
                let stored = value.and_then(|v| self.formatter.format(&child.tag, v));
                let target_id = state.promoted.resolve(
                    &self.config,
                    &mut state.registry,
                    &child.tag,
                    raw,
                    stored,
                );
                let junction = self.config.junction_name(table, &child.tag);
                state.registry.add_row(
                    &junction,
                    junction_row(&self.config.separator, table, id, &child.tag, Some(&target_id)),
                );
            }
            Rule::PromotedRecord => {
                let (child_id, child_row) = self.flatten_record(child, namespace, state);
                state.registry.add_row(&child.tag, child_row);
                let junction = self.config.junction_name(table, &child.tag);
                state.registry.add_row(
                    &junction,
                    junction_row(&self.config.separator, table, id, &child.tag, Some(&child_id)),
                );
            }
            Rule::NullValue => {
                log::debug!(target: LOG_TARGET, "Skipping {} under {} {}: no value", child.tag, table, id);
            }
            Rule::PlainColumn => {
                let raw = value.unwrap_or_default();
                match self.formatter.format(&child.tag, raw) {
                    Some(formatted) => {
                        row.set_unique(&child.tag, formatted);
                    }
                    None => {
                        log::debug!(target: LOG_TARGET, "Omitting {} of {} {}: {:?} did not format", child.tag, table, id, raw);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::parse_str;

    fn melt(input: &str, config: MeltConfig) -> TableRegistry {
        let records = parse_str(input);
        GedcomMelter::new(config).unwrap().melt(&records)
    }

    fn pairs(registry: &TableRegistry, table: &str) -> Vec<(String, String)> {
        let table = registry.get(table).unwrap();
        let (source, target) = (&table.columns()[0], &table.columns()[1]);
        table
            .rows()
            .iter()
            .map(|r| {
                (
                    r.get(source).unwrap_or_default().to_string(),
                    r.get(target).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_family_with_two_children() {
        let input = "\
0 HEAD
1 CHAR UTF-8
0 @I1@ INDI
1 NAME Ann /Doe/
1 FAMC @F1@
0 @I2@ INDI
1 NAME Bob /Doe/
1 FAMC @F1@
0 @F1@ FAM
1 CHIL @I1@
1 CHIL @I2@
0 TRLR
";
        let registry = melt(input, MeltConfig::default());

        assert_eq!(registry.get("FAM").unwrap().row_count(), 1);
        assert_eq!(registry.get("INDI").unwrap().row_count(), 2);
        assert_eq!(
            pairs(&registry, "FAM_INDI"),
            vec![
                ("@F1@".to_string(), "@I1@".to_string()),
                ("@F1@".to_string(), "@I2@".to_string())
            ]
        );
        assert_eq!(registry.get("INDI_FAM").unwrap().row_count(), 2);
        assert!(registry.get("TRLR").is_none());
        assert!(!registry.get("FAM").unwrap().has_column("CHIL"));
    }

    #[test]
    fn test_duplicate_tags_get_suffixes() {
        let registry = melt("0 @I1@ INDI\n1 X a\n1 X b\n1 X c\n", MeltConfig::default());
        let row = &registry.get("INDI").unwrap().rows()[0];

        assert_eq!(row.get("X"), Some("a"));
        assert_eq!(row.get("X2"), Some("b"));
        assert_eq!(row.get("X3"), Some("c"));
    }

    #[test]
    fn test_promoted_record() {
        let input = "0 @I1@ INDI\n1 RESI\n2 ADDR 1 Main St\n2 DATE 4 JUL 1776\n1 SEX F\n";
        let registry = melt(input, MeltConfig::default());

        let indi = registry.get("INDI").unwrap();
        assert!(!indi.has_column("RESI"));
        assert_eq!(indi.rows()[0].get("SEX"), Some("F"));

        let resi = registry.get("RESI").unwrap();
        assert_eq!(resi.row_count(), 1);
        assert_eq!(resi.rows()[0].get("id"), Some("@GENRESI0@"));
        assert_eq!(resi.rows()[0].get("ADDR"), Some("1 Main St"));
        assert_eq!(resi.rows()[0].get("DATE"), Some("1776-07-04"));

        assert_eq!(
            pairs(&registry, "INDI_RESI"),
            vec![("@I1@".to_string(), "@GENRESI0@".to_string())]
        );
    }

    #[test]
    fn test_nested_promoted_records_get_distinct_ids() {
        let input = "0 @I1@ INDI\n1 EVEN Outer\n2 EVEN Inner\n3 DATE 1900\n";
        let registry = melt(input, MeltConfig::default());

        let even = registry.get("EVEN").unwrap();
        assert_eq!(even.row_count(), 2);
        let ids: HashSet<&str> = even.rows().iter().filter_map(|r| r.get("id")).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(registry.get("EVEN_EVEN").unwrap().row_count(), 1);
        assert_eq!(registry.get("INDI_EVEN").unwrap().row_count(), 1);
    }

    #[test]
    fn test_promoted_values_are_shared() {
        let input = "0 @I1@ INDI\n1 OCCU Farmer\n0 @I2@ INDI\n1 OCCU Farmer\n0 @I3@ INDI\n1 OCCU Smith\n";
        let registry = melt(input, MeltConfig::default());

        let occu = registry.get("OCCU").unwrap();
        assert_eq!(occu.row_count(), 2);
        assert!(!registry.get("INDI").unwrap().has_column("OCCU"));

        let links = pairs(&registry, "INDI_OCCU");
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].1, links[1].1);
        assert_ne!(links[0].1, links[2].1);
        assert_eq!(links[0].1, "@GENOCCU0@");
    }

    #[test]
    fn test_promoted_value_table_merges_with_record_table() {
        let mut config = MeltConfig::default();
        config
            .promoted_value_tags
            .insert("FAM".to_string(), ["EVEN".to_string()].into_iter().collect());

        let input = "0 @F1@ FAM\n1 EVEN Wedding\n0 @I1@ INDI\n1 EVEN Census\n2 DATE 1900\n";
        let registry = melt(input, config);

        // EVEN is not a top-level record type, so the promoted values land in the
        // table the INDI's promoted record created
        let even = registry.get("EVEN").unwrap();
        assert_eq!(even.row_count(), 2);
        assert!(even.has_column("EVEN"));
        assert!(even.has_column("DATE"));

        // the promoted record is appended first, the promoted value at integration
        let ids: Vec<&str> = even.rows().iter().filter_map(|r| r.get("id")).collect();
        assert_eq!(ids, vec!["@GENEVEN1@", "@GENEVEN0@"]);

        // each junction row reaches exactly one EVEN row
        let wedding = pairs(&registry, "FAM_EVEN");
        let census = pairs(&registry, "INDI_EVEN");
        assert_eq!(wedding, vec![("@F1@".to_string(), "@GENEVEN0@".to_string())]);
        assert_eq!(census, vec![("@I1@".to_string(), "@GENEVEN1@".to_string())]);
        assert_eq!(even.rows()[0].get("DATE"), Some("1900-01-01"));
        assert_eq!(even.rows()[1].get("EVEN"), Some("Wedding"));
    }

    #[test]
    fn test_custom_separator_names_junction_columns() {
        let config = MeltConfig {
            separator: "-".to_string(),
            ..MeltConfig::default()
        };
        let registry = melt("0 @I1@ INDI
0 @F1@ FAM
1 CHIL @I1@
", config);

        let junction = registry.get("FAM-INDI").unwrap();
        assert_eq!(junction.columns(), &["FAM-id", "INDI-id"]);
        assert!(registry.get("FAM_INDI").is_none());
    }

    #[test]
    fn test_sibling_table_wins_over_promotion() {
        let mut config = MeltConfig::default();
        config
            .promoted_value_tags
            .insert("INDI".to_string(), ["SOUR".to_string()].into_iter().collect());

        let input = "0 @S1@ SOUR\n1 TITL Census\n0 @I1@ INDI\n1 SOUR @S1@\n2 PAGE 12\n";
        let registry = melt(input, config);

        assert_eq!(
            pairs(&registry, "INDI_SOUR"),
            vec![("@I1@".to_string(), "@S1@".to_string())]
        );
        assert_eq!(registry.get("SOUR").unwrap().row_count(), 1);
        assert!(registry.get("PAGE").is_none());
    }

    #[test]
    fn test_null_leaf_is_skipped() {
        let registry = melt("0 @I1@ INDI\n1 DEAT\n1 SEX M\n", MeltConfig::default());
        let indi = registry.get("INDI").unwrap();

        assert!(!indi.has_column("DEAT"));
        assert!(registry.get("DEAT").is_none());
        assert!(registry.get("INDI_DEAT").is_none());
    }

    #[test]
    fn test_every_child_handled_once() {
        let input = "\
0 @S1@ SOUR
0 @I1@ INDI
1 NAME Ann
1 FAMS @F1@
1 SOUR @S1@
1 OCCU Weaver
1 BIRT
2 DATE 1801
1 DEAT
1 SEX F
0 @F1@ FAM
";
        let registry = melt(input, MeltConfig::default());
        let indi = &registry.get("INDI").unwrap().rows()[0];

        // id + two plain columns
        assert_eq!(indi.len(), 3);
        assert_eq!(registry.get("INDI_FAM").unwrap().row_count(), 1);
        assert_eq!(registry.get("INDI_SOUR").unwrap().row_count(), 1);
        assert_eq!(registry.get("INDI_OCCU").unwrap().row_count(), 1);
        assert_eq!(registry.get("INDI_BIRT").unwrap().row_count(), 1);
        assert_eq!(registry.get("BIRT").unwrap().row_count(), 1);
    }

    #[test]
    fn test_generated_ids_for_records_without_pointer() {
        let registry = melt("0 HEAD\n1 SOUR App\n0 HEAD\n", MeltConfig::default());
        let head = registry.get("HEAD").unwrap();

        assert_eq!(head.rows()[0].get("id"), Some("@GENHEAD0@"));
        assert_eq!(head.rows()[1].get("id"), Some("@GENHEAD1@"));
    }

    #[test]
    fn test_record_value_column() {
        let registry = melt("0 @N1@ NOTE Some text\n1 CONT more\n", MeltConfig::default());
        let note = &registry.get("NOTE").unwrap().rows()[0];
        assert_eq!(note.get("value"), Some("Some text\nmore"));
    }

    #[test]
    fn test_copy_individual_name() {
        let config = MeltConfig {
            copy_individual_name: true,
            ..MeltConfig::default()
        };
        let input = "\
0 @I1@ INDI
1 NAME Ann /Doe/
2 GIVN Ann
1 NAME Annie
0 @I2@ INDI
1 NAME Bob /Roe/
0 @F1@ FAM
1 NAME Not copied
";
        let registry = melt(input, config);
        let indi = registry.get("INDI").unwrap();

        assert_eq!(indi.rows()[0].get("NAME"), Some("Ann /Doe/"));
        assert_eq!(indi.rows()[0].get("NAME2"), Some("Annie"));
        assert_eq!(registry.get("NAME").unwrap().row_count(), 1);

        assert_eq!(indi.rows()[1].get("NAME"), Some("Bob /Roe/"));
        assert!(!indi.rows()[1].contains("NAME2"));

        assert_eq!(registry.get("FAM").unwrap().rows()[0].get("NAME"), Some("Not copied"));
    }

    #[test]
    fn test_date_fallback_omits_unrecoverable_dates() {
        let config = MeltConfig {
            force_date_delimiters: Some(vec!["abt.".to_string(), "-".to_string()]),
            ..MeltConfig::default()
        };
        let input = "0 @I1@ INDI\n1 BIRT\n2 DATE Abt. 1780 - 1790\n0 @I2@ INDI\n1 BIRT\n2 DATE unknown\n";
        let registry = melt(input, config);
        let birt = registry.get("BIRT").unwrap();

        assert_eq!(birt.rows()[0].get("DATE"), Some("1784-12-31"));
        assert!(!birt.rows()[1].contains("DATE"));
    }

    #[test]
    fn test_parents_plugin() {
        let config = MeltConfig {
            generate_parents_table: true,
            ..MeltConfig::default()
        };
        let input = "\
0 @I1@ INDI
0 @I2@ INDI
0 @I3@ INDI
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
";
        let registry = melt(input, config);
        let parents = registry.get(ParentsTable::TABLE_NAME).unwrap();

        assert_eq!(parents.row_count(), 2);
        assert!(parents.rows().iter().all(|r| r.get("child") == Some("@I3@")));
        assert_eq!(parents.rows()[0].get("parent"), Some("@I1@"));
        assert_eq!(parents.rows()[1].get("parent"), Some("@I2@"));
    }

    #[derive(Debug)]
    struct NameIndex;

    impl TablePlugin for NameIndex {
        fn table_name(&self) -> &str {
            "NAME_INDEX"
        }

        fn produce_rows(&self, row: &Row, tag: &str, id: &str, _children: &[Node]) -> Vec<Row> {
            match row.get("NAME") {
                Some(name) if tag == "INDI" => vec![Row::from_iter([("name", name), ("INDI_id", id)])],
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn test_custom_plugin_sees_finished_rows() {
        let records = parse_str("0 @I1@ INDI\n1 NAME Ann\n1 RESI\n2 NAME Not a person\n0 @F1@ FAM\n");
        let registry = GedcomMelter::new(MeltConfig::default())
            .unwrap()
            .with_plugin(Box::new(NameIndex))
            .melt(&records);

        let index = registry.get("NAME_INDEX").unwrap();
        assert_eq!(index.row_count(), 1);
        assert_eq!(index.rows()[0].get("name"), Some("Ann"));
        assert_eq!(index.rows()[0].get("INDI_id"), Some("@I1@"));
    }

    #[test]
    fn test_columns_cover_every_row() {
        let input = "0 @I1@ INDI\n1 SEX M\n0 @I2@ INDI\n1 NAME Eve\n1 OCCU Poet\n";
        let registry = melt(input, MeltConfig::default());

        for table in registry.tables() {
            for row in table.rows() {
                assert!(row.columns().all(|c| table.has_column(c)), "{}", table.name);
            }
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MeltConfig {
            separator: String::new(),
            ..MeltConfig::default()
        };
        assert!(GedcomMelter::new(config).is_err());
    }
}
