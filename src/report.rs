//! Run reports.
//!
//! Each pipeline run can leave one JSON file per draw date behind. The
//! report is what operators look at after a silent night: which sources
//! succeeded, why the others failed, and which groups actually got their
//! messages.

use std::path::Path;

use tracing::info;

use crate::errors::StoreError;
use crate::models::PipelineReport;

/// Write `report` as pretty JSON to `dir/{date}.json`, creating the
/// directory if needed. Returns the written path.
pub async fn write_report(dir: &str, report: &PipelineReport) -> Result<String, StoreError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = Path::new(dir).join(format!("{}.json", report.date));
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&path, json).await?;
    info!(path = %path.display(), "run report written");
    Ok(path.display().to_string())
}
