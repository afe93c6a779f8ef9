//! Translation of OpenStudio model and component files from older schema versions to the current
//! one.
//!
//! Files saved by OpenStudio 2.6.0 or later can be translated to 3.2.0, the current version. Older
//! files are rejected with an error. A file with no version object is assumed to be 2.6.0.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod handle;
pub mod idf;
pub mod input;
pub mod log;
pub mod model;
pub mod report;
pub mod schema;
pub mod settings;
pub mod translator;
pub mod version;

#[cfg(test)]
mod fixture;

/// Get config dir for program.
///
/// This is a subdirectory of the OS-specific config dir (e.g. `~/.config/osversion` on Linux).
pub fn get_osversion_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        panic!("Could not determine config directory")
    };
    config_dir.push("osversion");
    config_dir
}
