use crate::error::MeltError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Configuration for the melting process
///
/// Every field has a default, so a JSON config file only needs to name the
/// knobs it changes:
///
/// ```json
/// { "force_date_delimiters": ["abt.", "-"], "generate_parents_table": true }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeltConfig {
    /// Delimiters that enable the averaged-date fallback when a date does not parse
    pub force_date_delimiters: Option<Vec<String>>,

    /// Emit the derived child -> parent table
    pub generate_parents_table: bool,

    /// Copy the first NAME of each individual into a NAME column on its row
    pub copy_individual_name: bool,

    /// Cross-reference tag -> table it points into
    pub link_attributes: BTreeMap<String, String>,

    /// Table -> child tags whose values are deduplicated into their own table
    pub promoted_value_tags: BTreeMap<String, BTreeSet<String>>,

    /// Separator between source and target in junction table names
    pub separator: String,

    /// Marker placed inside synthesized ids, e.g. `@GENINDI0@`
    pub generated_id_prefix: String,

    /// Tags whose values are dates
    pub date_tags: BTreeSet<String>,

    /// Table holding individuals, used by `copy_individual_name`
    pub individual_table: String,

    /// Top-level tags that carry no data and never become tables
    pub ignored_record_tags: BTreeSet<String>,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            force_date_delimiters: None,
            generate_parents_table: false,
            copy_individual_name: false,
            link_attributes: [("CHIL", "INDI"), ("FAMC", "FAM"), ("FAMS", "FAM")]
                .into_iter()
                .map(|(tag, table)| (tag.to_string(), table.to_string()))
                .collect(),
            promoted_value_tags: BTreeMap::from([(
                String::from("INDI"),
                BTreeSet::from([String::from("OCCU")]),
            )]),
            separator: String::from("_"),
            generated_id_prefix: String::from("GEN"),
            date_tags: BTreeSet::from([String::from("DATE")]),
            individual_table: String::from("INDI"),
            ignored_record_tags: BTreeSet::from([String::from("TRLR")]),
        }
    }
}

impl MeltConfig {
    /// Load a config file, filling unspecified fields with defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: MeltConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Reject configurations the melter cannot honor
    pub fn validate(&self) -> Result<(), MeltError> {
        if self.separator.is_empty() {
            return Err(invalid("separator must not be empty"));
        }
        if self.generated_id_prefix.contains('@') {
            return Err(invalid("generated_id_prefix must not contain '@'"));
        }
        if let Some(delimiters) = &self.force_date_delimiters {
            if delimiters.is_empty() {
                return Err(invalid("force_date_delimiters must list at least one delimiter"));
            }
            if delimiters.iter().any(|d| d.trim().is_empty()) {
                return Err(invalid("force_date_delimiters must not contain blank delimiters"));
            }
        }
        for (tag, target) in &self.link_attributes {
            check_tag("link_attributes", tag)?;
            check_tag("link_attributes target", target)?;
        }
        for (table, tags) in &self.promoted_value_tags {
            check_tag("promoted_value_tags", table)?;
            for tag in tags {
                check_tag("promoted_value_tags", tag)?;
            }
        }
        for tag in self.date_tags.iter().chain(&self.ignored_record_tags) {
            check_tag("tag list", tag)?;
        }
        check_tag("individual_table", &self.individual_table)?;
        Ok(())
    }

    pub fn link_target(&self, tag: &str) -> Option<&str> {
        self.link_attributes.get(tag).map(String::as_str)
    }

    /// Whether `tag` children of `table` are deduplicated into a promoted-value table
    pub fn promotes_value(&self, table: &str, tag: &str) -> bool {
        self.promoted_value_tags
            .get(table)
            .is_some_and(|tags| tags.contains(tag))
    }

    /// Junction table name for an edge from `source` to `target`
    pub fn junction_name(&self, source: &str, target: &str) -> String {
        format!("{}{}{}", source, self.separator, target)
    }

    /// Synthesized id for the `sequence`-th generated row of `table`
    pub fn generated_id(&self, table: &str, sequence: usize) -> String {
        format!("@{}{}{}@", self.generated_id_prefix, table, sequence)
    }
}

fn invalid(message: &str) -> MeltError {
    MeltError::InvalidConfig(message.to_string())
}

fn check_tag(field: &str, tag: &str) -> Result<(), MeltError> {
    if tag.is_empty() || tag.chars().any(char::is_whitespace) {
        return Err(MeltError::InvalidConfig(format!(
            "{}: {:?} is not a valid tag",
            field, tag
        )));
    }
    Ok(())
}
