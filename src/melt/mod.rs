//! GEDCOM melting - flatten tagged record trees into relational tables
//!
//! Each top-level record becomes a row of the table named after its tag.
//! Children become columns, links into other tables, deduplicated value rows,
//! or promoted sub-records with their own table, depending on the first
//! [`Rule`] that matches. Junction tables carry the foreign keys.

pub mod config;
pub mod extractor;
pub mod format;
pub mod plugins;
pub mod promote;
pub mod registry;
pub mod types;
pub mod writer;

pub use config::MeltConfig;
pub use extractor::GedcomMelter;
pub use format::ValueFormatter;
pub use plugins::{ParentsTable, TablePlugin};
pub use promote::{PromotedValues, Rule};
pub use registry::TableRegistry;
pub use types::{Row, Table};
pub use writer::{CsvTableWriter, WriteReport};
