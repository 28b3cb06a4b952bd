use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

/// Writes a generated specification to `srs_<session>_<timestamp>.txt` under
/// `dir`, creating the directory if needed. Returns the written path.
pub fn write_specification(
    dir: &Path,
    session_id: Uuid,
    document: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("srs_{session_id}_{timestamp}.txt"));
    std::fs::write(&path, document)?;
    Ok(path)
}
