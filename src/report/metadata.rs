//! Code for writing translation metadata to file
use crate::version::VersionString;
use anyhow::Result;
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
pub const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build via `built` crate
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Get information about program version from git
fn get_git_hash() -> String {
    let Some(hash) = built_info::GIT_COMMIT_HASH_SHORT else {
        return "unknown".into();
    };

    if built_info::GIT_DIRTY == Some(true) {
        format!("{hash}-dirty")
    } else {
        hash.into()
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    translation: TranslationMetadata<'a>,
    program: ProgramMetadata<'a>,
    platform: PlatformMetadata,
}

/// Information about the translation
#[derive(Serialize)]
struct TranslationMetadata<'a> {
    /// Path to the file which was translated
    input_path: &'a Path,
    /// The date and time at which the report was written
    datetime: String,
    /// The version recorded in the input file
    original_version: VersionString,
    /// The version of the translated model, if translation succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    final_version: Option<VersionString>,
}

impl<'a> TranslationMetadata<'a> {
    fn new(
        input_path: &'a Path,
        original_version: VersionString,
        final_version: Option<VersionString>,
    ) -> Self {
        Self {
            input_path,
            datetime: Local::now().to_rfc2822(),
            original_version,
            final_version,
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata<'a> {
    /// The program name
    name: &'a str,
    /// The program version as specified in Cargo.toml
    version: &'a str,
    /// The target architecture for the build (e.g. x86_64-unknown-linux-gnu)
    target: &'a str,
    /// Whether it is a debug build
    is_debug: bool,
    /// The version of rustc used to compile the program
    rustc_version: &'a str,
    /// When the program was built
    build_time_utc: &'a str,
    /// The git commit hash for the version of the program (if known)
    git_commit_hash: String,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash: get_git_hash(),
        }
    }
}

/// Information about the platform on which the program is running.
///
/// The fields correspond to different data available from the [`PlatformInfo`] struct.
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl Default for PlatformMetadata {
    fn default() -> Self {
        let info = PlatformInfo::new().expect("Unable to determine platform info");
        Self {
            sysname: info.sysname().to_string_lossy().into(),
            nodename: info.nodename().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        }
    }
}

/// Write metadata about a translation to the report folder in TOML format
pub fn write_metadata(
    report_dir: &Path,
    input_path: &Path,
    original_version: VersionString,
    final_version: Option<VersionString>,
) -> Result<()> {
    let metadata = Metadata {
        translation: TranslationMetadata::new(input_path, original_version, final_version),
        program: ProgramMetadata::default(),
        platform: PlatformMetadata::default(),
    };
    let file_path = report_dir.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::v;
    use tempfile::tempdir;

    #[test]
    fn test_write_metadata() {
        let dir = tempdir().unwrap();
        write_metadata(
            dir.path(),
            Path::new("model.osm"),
            v("2.9.0"),
            Some(v("3.2.0")),
        )
        .unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let table: toml::Table = toml::from_str(&contents).unwrap();
        let translation = table["translation"].as_table().unwrap();
        assert_eq!(translation["input_path"].as_str(), Some("model.osm"));
        assert_eq!(translation["original_version"].as_str(), Some("2.9.0"));
        assert_eq!(translation["final_version"].as_str(), Some("3.2.0"));
        assert_eq!(table["program"]["name"].as_str(), Some("osversion"));
        assert!(table.contains_key("platform"));
    }

    #[test]
    fn test_write_metadata_failed_translation() {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), Path::new("model.osm"), v("2.9.0"), None).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let table: toml::Table = toml::from_str(&contents).unwrap();
        assert!(!table["translation"].as_table().unwrap().contains_key("final_version"));
    }
}
