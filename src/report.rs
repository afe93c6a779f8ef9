//! Writing translation reports to disk.
//!
//! A report is a folder describing one translation: metadata about the run, the objects the
//! translator changed and the messages it raised.
use crate::idf::IdfObject;
use crate::translator::{LogMessage, VersionTranslator};
use crate::version::VersionString;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

pub mod metadata;
use metadata::write_metadata;

/// The output file name for changed objects
pub const CHANGES_FILE_NAME: &str = "changes.csv";

/// The output file name for warnings and errors
pub const MESSAGES_FILE_NAME: &str = "messages.csv";

/// The suffix added to an output file's stem to give its default report folder
const REPORT_DIR_SUFFIX: &str = "_report";

/// The kind of change made to an object
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    IntoStaticStr,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    /// An object created by the translator
    #[string = "new"]
    New,
    /// An object rewritten by the translator
    #[string = "refactored"]
    Refactored,
    /// An object removed because its type no longer exists
    #[string = "deprecated"]
    Deprecated,
    /// An object dropped because it could not be translated
    #[string = "untranslated"]
    Untranslated,
}

impl ChangeKind {
    /// The number of objects with this kind of change in the translator's last load
    fn count(self, translator: &VersionTranslator) -> usize {
        match self {
            Self::New => translator.new_objects().len(),
            Self::Refactored => translator.refactored_objects().len(),
            Self::Deprecated => translator.deprecated_objects().len(),
            Self::Untranslated => translator.untranslated_objects().len(),
        }
    }
}

/// The number of changed objects of each kind in the translator's last load
pub fn summarise_changes(translator: &VersionTranslator) -> IndexMap<ChangeKind, usize> {
    ChangeKind::iter()
        .map(|kind| (kind, kind.count(translator)))
        .collect()
}

/// Represents a row in the changes CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ChangeRow {
    kind: ChangeKind,
    object_type: String,
    handle: String,
    name: String,
}

impl ChangeRow {
    fn new(kind: ChangeKind, object: &IdfObject) -> Self {
        Self {
            kind,
            object_type: object.type_name().to_string(),
            handle: object.handle().map(|h| h.to_string()).unwrap_or_default(),
            name: object.name().unwrap_or_default().to_string(),
        }
    }
}

/// Represents a row in the messages CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MessageRow {
    level: String,
    message: String,
}

impl From<&LogMessage> for MessageRow {
    fn from(msg: &LogMessage) -> Self {
        Self {
            level: msg.level.as_str().to_lowercase(),
            message: msg.message.clone(),
        }
    }
}

/// The default report folder for a translated file: `<stem>_report` next to it
pub fn get_report_dir(output_path: &Path) -> Result<PathBuf> {
    let stem = output_path
        .file_stem()
        .context("Output path has no file name")?
        .to_str()
        .context("Invalid chars in output file name")?;

    Ok(output_path.with_file_name(format!("{stem}{REPORT_DIR_SUFFIX}")))
}

/// Create the report folder, including any parent folders
pub fn create_report_directory(report_dir: &Path) -> Result<()> {
    if report_dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(report_dir)
        .with_context(|| format!("Failed to create report folder {}", report_dir.display()))
}

/// An object for writing the CSV files of a report
struct ReportWriter {
    changes_writer: csv::Writer<File>,
    messages_writer: csv::Writer<File>,
}

impl ReportWriter {
    /// Open CSV files to write the report to
    ///
    /// # Arguments
    ///
    /// * `report_dir` - Folder where files will be saved
    fn create(report_dir: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = report_dir.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            changes_writer: new_writer(CHANGES_FILE_NAME)?,
            messages_writer: new_writer(MESSAGES_FILE_NAME)?,
        })
    }

    /// Write every object the translator changed
    fn write_changes(&mut self, translator: &VersionTranslator) -> Result<()> {
        let new = translator
            .new_objects()
            .iter()
            .map(|object| ChangeRow::new(ChangeKind::New, object));
        let refactored = translator
            .refactored_objects()
            .iter()
            .map(|data| ChangeRow::new(ChangeKind::Refactored, &data.new_object));
        let deprecated = translator
            .deprecated_objects()
            .iter()
            .map(|object| ChangeRow::new(ChangeKind::Deprecated, object));
        let untranslated = translator
            .untranslated_objects()
            .iter()
            .map(|object| ChangeRow::new(ChangeKind::Untranslated, object));

        for row in new.chain(refactored).chain(deprecated).chain(untranslated) {
            self.changes_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write warnings and errors
    fn write_messages(&mut self, messages: &[LogMessage]) -> Result<()> {
        for msg in messages {
            self.messages_writer.serialize(MessageRow::from(msg))?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.changes_writer.flush()?;
        self.messages_writer.flush()?;

        Ok(())
    }
}

/// Write a report of the translator's last load.
///
/// # Arguments
///
/// * `report_dir` - Folder to write the report to (created if missing)
/// * `input_path` - The file which was translated
/// * `translator` - The translator which loaded `input_path`
/// * `final_version` - The version of the resulting model, or `None` if translation failed
pub fn write_report(
    report_dir: &Path,
    input_path: &Path,
    translator: &VersionTranslator,
    final_version: Option<VersionString>,
) -> Result<()> {
    create_report_directory(report_dir)?;
    write_metadata(
        report_dir,
        input_path,
        translator.original_version(),
        final_version,
    )
    .context("Failed to write metadata")?;

    let mut writer = ReportWriter::create(report_dir)?;
    writer.write_changes(translator)?;
    writer.write_messages(translator.messages())?;
    writer.flush()?;

    Ok(())
}
