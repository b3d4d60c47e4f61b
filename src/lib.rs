//! # gedmelt - GEDCOM to relational tables
//!
//! Flattens a genealogical record file into a set of relational tables, one
//! CSV file per table, discovering tables and columns as it goes.
//!
//! ## Modules
//!
//! - **gedcom**: parse GEDCOM lines into a tree of nodes
//! - **melt**: flatten the tree into tables with junction tables for links
//!
//! ## Quick Start
//!
//! ```rust
//! use gedmelt::gedcom::parse_str;
//! use gedmelt::melt::{GedcomMelter, MeltConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = parse_str("\
//! 0 @I1@ INDI
//! 1 NAME Ann /Doe/
//! 1 FAMC @F1@
//! 0 @F1@ FAM
//! 1 CHIL @I1@
//! ");
//!
//! let melter = GedcomMelter::new(MeltConfig::default())?;
//! let tables = melter.melt(&records);
//!
//! // INDI, FAM, plus the INDI_FAM and FAM_INDI junction tables
//! assert_eq!(tables.get("FAM_INDI").map(|t| t.row_count()), Some(1));
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::path::Path;

pub mod error;
pub mod gedcom;
pub mod melt;

// Re-export commonly used types for convenience
pub use error::MeltError;
pub use gedcom::Node;
pub use melt::{
    CsvTableWriter, GedcomMelter, MeltConfig, Row, Table, TableRegistry, WriteReport,
};

/// Main entry point: read a GEDCOM file and melt it into tables
pub fn melt_file<P: AsRef<Path>>(input: P, config: MeltConfig) -> Result<TableRegistry> {
    let input = input.as_ref();
    if !input.is_file() {
        return Err(MeltError::InputNotFound(input.to_path_buf()).into());
    }

    let melter = GedcomMelter::new(config)?;
    let records = gedcom::parse_file(input)?;
    Ok(melter.melt(&records))
}
