//! Correction settings files.

use std::path::Path;

use eva_core::CorrectionSettings;

use crate::Result;

/// Reads correction settings from a JSON file.
///
/// Fields missing from the file take their default values.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn load_settings(path: &Path) -> Result<CorrectionSettings> {
    let text = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&text)?;
    log::debug!("Loaded correction settings from {}", path.display());
    Ok(settings)
}
