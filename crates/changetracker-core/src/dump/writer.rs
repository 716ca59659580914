use crate::{Result, Row, View};
use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub struct DumpWriter;

impl DumpWriter {
    /// Write rows as a pretty JSON array of flattened records
    pub fn to_file(rows: &[Row], path: &Path) -> Result<()> {
        tracing::debug!("Writing dump to: {}", path.display());

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, rows)?;

        tracing::info!("Saved {} rows to {}", rows.len(), path.display());

        Ok(())
    }

    /// Render rows as a pretty JSON array of flattened records
    pub fn to_string(rows: &[Row]) -> Result<String> {
        Ok(serde_json::to_string_pretty(rows)?)
    }
}

/// Timestamp fragment used in dump file names, e.g. `2025-03-04T09-15-00`
pub fn file_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Path of the dump for a view: `{dir}/{stem}-{timestamp}.json`
pub fn dump_path(dir: &Path, view: View, timestamp: &str) -> PathBuf {
    dir.join(format!("{}-{}.json", view.file_stem(), timestamp))
}
