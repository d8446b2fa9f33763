//! CSV export of projections for external charting tools.

use crate::{ProjectionPoint, Result};
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    time: String,
    cob: f64,
    iob: f64,
}

impl From<&ProjectionPoint> for CsvRow {
    fn from(point: &ProjectionPoint) -> Self {
        CsvRow {
            time: point.time.to_rfc3339(),
            cob: point.cob,
            iob: point.iob,
        }
    }
}

/// Write projection points as `time,cob,iob` rows with a header
pub fn write_projection<W: Write>(writer: W, points: &[ProjectionPoint]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);

    for point in points {
        writer.serialize(CsvRow::from(point))?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a projection to a CSV file, replacing any existing file
pub fn write_projection_csv(path: &Path, points: &[ProjectionPoint]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    write_projection(&file, points)?;
    file.sync_all()?;

    tracing::info!("Wrote {} projection points to {:?}", points.len(), path);
    Ok(())
}
