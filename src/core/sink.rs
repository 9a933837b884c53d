use crate::domain::model::{ResultRecord, RESULT_COLUMNS};
use crate::utils::error::{EtlError, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only CSV output with a fixed column order. The header is written at
/// open; each `flush` leaves a complete, readable prefix on disk.
pub struct CsvCheckpointSink<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
    rows_written: usize,
    path: Option<PathBuf>,
}

impl CsvCheckpointSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let mut sink = Self::new(file)?;
        sink.path = Some(path.to_path_buf());
        Ok(sink)
    }
}

impl<W: Write> CsvCheckpointSink<W> {
    pub fn new(inner: W) -> Result<Self> {
        Self::with_columns(inner, RESULT_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    pub fn with_columns(inner: W, columns: Vec<String>) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(&columns)?;
        writer.flush()?;
        Ok(Self {
            writer,
            columns,
            rows_written: 0,
            path: None,
        })
    }

    /// Writes the known columns; fields outside the schema are ignored.
    pub fn write_record(&mut self, record: &ResultRecord) -> Result<()> {
        self.writer.write_record(
            self.columns
                .iter()
                .map(|column| record.get(column).unwrap_or_default()),
        )?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_page(&mut self, records: &[ResultRecord]) -> Result<usize> {
        for record in records {
            self.write_record(record)?;
        }
        self.flush()?;
        Ok(records.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }
}
