use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::types::BatchReport;

/// Write `{"results": {match: {entity: [rows]}}, "failures": [...]}` as pretty JSON.
pub fn write_json(path: &Path, report: &BatchReport) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!(
        "[EXPORT] wrote {} matches ({} skipped) to {}",
        report.results.len(),
        report.failures.len(),
        path.display()
    );
    Ok(())
}
