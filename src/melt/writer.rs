use crate::error::MeltError;
use crate::melt::registry::TableRegistry;
use crate::melt::types::Table;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "gedmelt::writer";

/// Outcome of writing a registry, one entry per table
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Tables written: (table name, file, row count)
    pub written: Vec<(String, PathBuf, usize)>,

    /// Tables that failed, with the cause
    pub failed: Vec<MeltError>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes every table to `<TableName>.csv` inside one directory
#[derive(Debug)]
pub struct CsvTableWriter {
    output_dir: PathBuf,
}

impl CsvTableWriter {
    /// Create a writer for `output_dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        Ok(CsvTableWriter { output_dir })
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", table))
    }

    /// Write every table. A failing table does not stop the others.
    pub fn write_registry(&self, registry: &TableRegistry) -> WriteReport {
        let mut report = WriteReport::default();

        for table in registry.tables() {
            let path = self.path_for(&table.name);
            let result = std::fs::File::create(&path)
                .map_err(csv::Error::from)
                .and_then(|file| write_table(file, table));

            match result {
                Ok(()) => {
                    log::info!(target: LOG_TARGET, "Wrote {} rows to {}", table.row_count(), path.display());
                    report.written.push((table.name.clone(), path, table.row_count()));
                }
                Err(source) => {
                    log::warn!(target: LOG_TARGET, "Failed to write table '{}': {}", table.name, source);
                    report.failed.push(MeltError::TableWrite {
                        table: table.name.clone(),
                        path,
                        source,
                    });
                }
            }
        }

        report
    }
}

/// Write one table as CSV: a header of its columns, then one record per row
/// with empty fields for the columns a row lacks
pub fn write_table<W: Write>(writer: W, table: &Table) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.columns())?;

    for row in table.rows() {
        let record = table
            .columns()
            .iter()
            .map(|column| row.get(column).unwrap_or_default());
        csv_writer.write_record(record)?;
    }

    csv_writer.flush()?;
    Ok(())
}
