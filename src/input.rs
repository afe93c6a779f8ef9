//! Common routines for handling input files.
use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// The extension of model files
pub const MODEL_FILE_EXTENSION: &str = "osm";

/// The extension of component files
pub const COMPONENT_FILE_EXTENSION: &str = "osc";

/// Check that `file_path` has the extension `extension` (case-insensitive)
pub fn check_file_extension(file_path: &Path, extension: &str) -> Result<()> {
    let matches = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    ensure!(
        matches,
        "Cannot load {}: extension must be '{extension}'",
        file_path.display()
    );

    Ok(())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}
