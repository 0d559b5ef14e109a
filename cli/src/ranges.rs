use std::path::Path;

use longshot_stitch::Resolution;

#[derive(Debug, thiserror::Error)]
pub enum RangesFileError {
    #[error("failed to access ranges file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("malformed ranges file {0}: {1}")]
    Json(String, serde_json::Error),
}

/// Read a resolution written by [`write_resolution`], possibly edited by hand.
pub fn read_resolution(path: &Path) -> Result<Resolution, RangesFileError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| RangesFileError::Io(path.display().to_string(), e))?;
    serde_json::from_str(&content).map_err(|e| RangesFileError::Json(path.display().to_string(), e))
}

pub fn write_resolution(path: &Path, resolution: &Resolution) -> Result<(), RangesFileError> {
    let json = serde_json::to_string_pretty(resolution)
        .map_err(|e| RangesFileError::Json(path.display().to_string(), e))?;
    std::fs::write(path, json).map_err(|e| RangesFileError::Io(path.display().to_string(), e))
}
