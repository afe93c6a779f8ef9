//! The version translator, which migrates model files from older schema versions to the current
//! one.
//!
//! Translation happens in steps. Each registered update step rewrites a file at one version into
//! a file at a later version, copying objects which did not change and rewriting the rest. Steps
//! are chained until the current version is reached, after which the result is checked and turned
//! into a [`Model`].
use crate::idf::{IdfFile, IdfObject};
use crate::input::{COMPONENT_FILE_EXTENSION, MODEL_FILE_EXTENSION, check_file_extension};
use crate::model::{Component, Model};
use crate::schema::Schema;
use crate::version::{CURRENT_VERSION, DEFAULT_FILE_VERSION, OLDEST_VERSION, VersionString};
use anyhow::{Context, Result, bail, ensure};
use log::{Level, debug, info, log};
use std::fmt;
use std::fs;
use std::path::Path;

pub mod context;
pub mod remap;
pub mod updates;
pub use context::UpdateContext;
use updates::{START_VERSIONS, UpdateStep};

/// A callback for reporting progress: the version being translated to, the number of the current
/// step and the total number of steps.
pub type ProgressCallback = Box<dyn FnMut(&VersionString, usize, usize)>;

/// A warning or error raised while translating a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    /// The severity of the message
    pub level: Level,
    /// The message text
    pub message: String,
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// An object which was rewritten by an update step, along with its replacement
#[derive(Debug, Clone, PartialEq)]
pub struct RefactoredObjectData {
    /// The object before the update
    pub old_object: IdfObject,
    /// The object after the update
    pub new_object: IdfObject,
}

/// Diagnostics and changed objects collected over one translation
#[derive(Debug, Default)]
pub struct TranslationLog {
    messages: Vec<LogMessage>,
    new: Vec<IdfObject>,
    refactored: Vec<RefactoredObjectData>,
    deprecated: Vec<IdfObject>,
    untranslated: Vec<IdfObject>,
}

impl TranslationLog {
    /// Record a message without forwarding it to the program logger
    fn record(&mut self, level: Level, message: String) {
        self.messages.push(LogMessage { level, message });
    }

    /// Record a message and forward it to the program logger
    pub fn log(&mut self, level: Level, message: impl Into<String>) {
        let message = message.into();
        log!(level, "{message}");
        self.record(level, message);
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(Level::Warn, message);
    }

    /// Record an error
    pub fn error(&mut self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    pub(crate) fn push_new(&mut self, object: IdfObject) {
        self.new.push(object);
    }

    pub(crate) fn push_refactored(&mut self, old_object: IdfObject, new_object: IdfObject) {
        self.refactored.push(RefactoredObjectData {
            old_object,
            new_object,
        });
    }

    pub(crate) fn push_deprecated(&mut self, object: IdfObject) {
        self.deprecated.push(object);
    }

    pub(crate) fn push_untranslated(&mut self, object: IdfObject) {
        self.untranslated.push(object);
    }

    /// All messages, in the order they were raised
    pub fn messages(&self) -> &[LogMessage] {
        &self.messages
    }
}

/// Translates model and component files from older versions to [`CURRENT_VERSION`].
///
/// All state from a previous load is discarded at the start of the next one.
pub struct VersionTranslator {
    allow_newer_versions: bool,
    original_version: VersionString,
    log: TranslationLog,
    progress: Option<ProgressCallback>,
}

impl Default for VersionTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionTranslator {
    /// Create a new translator, which accepts files one version ahead of the current one
    pub fn new() -> Self {
        Self {
            allow_newer_versions: true,
            original_version: VersionString::default(),
            log: TranslationLog::default(),
            progress: None,
        }
    }

    /// Whether files one increment ahead of the current version are accepted
    pub fn allow_newer_versions(&self) -> bool {
        self.allow_newer_versions
    }

    /// Set whether files one increment ahead of the current version are accepted
    pub fn set_allow_newer_versions(&mut self, allow: bool) {
        self.allow_newer_versions = allow;
    }

    /// Set a callback to be invoked before each update step is applied
    pub fn set_progress_callback(
        &mut self,
        callback: impl FnMut(&VersionString, usize, usize) + 'static,
    ) {
        self.progress = Some(Box::new(callback));
    }

    /// Load a model (`.osm`) file, translating it to the current version
    pub fn load_model(&mut self, path: &Path) -> Result<Model> {
        self.reset(false);
        let result = check_file_extension(path, MODEL_FILE_EXTENSION)
            .and_then(|()| read_file(path))
            .and_then(|text| self.translate(&text, false));
        self.finish(result)
    }

    /// Translate a model from the contents of a model file
    pub fn load_model_from_str(&mut self, text: &str) -> Result<Model> {
        self.reset(false);
        let result = self.translate(text, false);
        self.finish(result)
    }

    /// Load a component (`.osc`) file, translating it to the current version
    pub fn load_component(&mut self, path: &Path) -> Result<Component> {
        self.reset(true);
        let result = check_file_extension(path, COMPONENT_FILE_EXTENSION)
            .and_then(|()| read_file(path))
            .and_then(|text| self.translate(&text, true))
            .and_then(Component::from_model);
        self.finish(result)
    }

    /// Translate a component from the contents of a component file
    pub fn load_component_from_str(&mut self, text: &str) -> Result<Component> {
        self.reset(true);
        let result = self
            .translate(text, true)
            .and_then(Component::from_model);
        self.finish(result)
    }

    /// The version of the last file loaded (0.0.0 if nothing has been loaded)
    pub fn original_version(&self) -> VersionString {
        self.original_version
    }

    /// All messages raised during the last load
    pub fn messages(&self) -> &[LogMessage] {
        self.log.messages()
    }

    /// Warnings raised during the last load
    pub fn warnings(&self) -> Vec<LogMessage> {
        self.log
            .messages
            .iter()
            .filter(|msg| msg.level == Level::Warn)
            .cloned()
            .collect()
    }

    /// Errors raised during the last load
    pub fn errors(&self) -> Vec<LogMessage> {
        self.log
            .messages
            .iter()
            .filter(|msg| msg.level < Level::Warn)
            .cloned()
            .collect()
    }

    /// Objects removed because their type no longer exists.
    ///
    /// No object type has been removed since 2.6.0, so none of the current update steps record
    /// deprecated objects and this is always empty.
    pub fn deprecated_objects(&self) -> &[IdfObject] {
        &self.log.deprecated
    }

    /// Objects which could not be translated and were dropped
    pub fn untranslated_objects(&self) -> &[IdfObject] {
        &self.log.untranslated
    }

    /// Objects created by update steps
    pub fn new_objects(&self) -> &[IdfObject] {
        &self.log.new
    }

    /// Objects rewritten by update steps
    pub fn refactored_objects(&self) -> &[RefactoredObjectData] {
        &self.log.refactored
    }

    /// Clear all state from the previous load
    fn reset(&mut self, is_component: bool) {
        self.original_version = VersionString::default();
        self.log = TranslationLog::default();
        debug!(
            "Preparing to translate a {}",
            if is_component { "component" } else { "model" }
        );
    }

    /// Record the error of a failed load in the translator's messages
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.log.record(Level::Error, format!("{err:#}"));
        }

        result
    }

    /// Work out the version to start translating from, checking that it is supported
    fn start_version(&mut self, text: &str) -> Result<VersionString> {
        let version = IdfFile::load_version_only(text).unwrap_or(DEFAULT_FILE_VERSION);
        self.original_version = version;
        debug!("Starting translation from version {version}");

        ensure!(
            version >= OLDEST_VERSION,
            "Version translation is not provided for models created prior to version \
            {OLDEST_VERSION}"
        );

        if version > CURRENT_VERSION {
            ensure!(
                self.allow_newer_versions,
                "Version extracted from file '{version}' is newer than the current version \
                {CURRENT_VERSION}"
            );
            ensure!(
                CURRENT_VERSION.is_next_version(&version),
                "Version extracted from file '{version}' is not supported by version \
                {CURRENT_VERSION}"
            );
            self.log.warn(format!(
                "Version extracted from file '{version}' is one increment ahead of version \
                {CURRENT_VERSION}. Proceeding as if these versions are the same. Use with caution."
            ));
            return Ok(CURRENT_VERSION);
        }

        ensure!(
            version == CURRENT_VERSION || START_VERSIONS.contains(&version),
            "Unknown version '{version}': no translation is available from this version"
        );

        Ok(version)
    }

    /// Translate the contents of a file to the current version and build a model from it
    fn translate(&mut self, text: &str, is_component: bool) -> Result<Model> {
        let mut version = self.start_version(text)?;
        let mut idf = IdfFile::parse(text)
            .with_context(|| format!("Unable to load model with version {version}"))?;
        let num_objects_start = idf.num_objects();
        debug!("Initial model has {num_objects_start} objects");

        let steps = updates::steps_from(&version);
        let num_steps = steps.len();
        for (index, step) in steps.into_iter().enumerate() {
            if let Some(progress) = self.progress.as_mut() {
                progress(&step.target, index + 1, num_steps);
            }

            idf = self.apply_step(step, &idf, &version, is_component)?;
            version = step.target;
            debug!(
                "Translation to {version} model has {} objects",
                idf.num_objects()
            );
        }

        self.check_object_count(num_objects_start, idf.num_objects())?;

        let log = &mut self.log;
        let model = Model::build(idf, &mut |msg| log.warn(msg))?;
        if num_objects_start > 0 && model.num_objects() == 0 {
            bail!(
                "Original model contained {num_objects_start} objects, but final translated \
                model is empty"
            );
        }
        info!(
            "Translated {} from version {} to {CURRENT_VERSION}",
            if is_component { "component" } else { "model" },
            self.original_version
        );

        Ok(model)
    }

    /// Apply a single update step to `idf`
    fn apply_step(
        &mut self,
        step: &UpdateStep,
        idf: &IdfFile,
        version: &VersionString,
        is_component: bool,
    ) -> Result<IdfFile> {
        let mut context = UpdateContext::new(
            idf,
            *version,
            step.target,
            Schema::embedded(),
            is_component,
            &mut self.log,
        );
        (step.apply)(&mut context).with_context(|| {
            format!(
                "Unable to complete translation from {version} to {}",
                step.target
            )
        })?;

        Ok(context.finish())
    }

    /// Check that the final number of objects matches the changes the update steps recorded
    fn check_object_count(
        &mut self,
        num_objects_start: usize,
        num_objects_final: usize,
    ) -> Result<()> {
        let expected = (num_objects_start + self.log.new.len())
            .saturating_sub(self.log.deprecated.len() + self.log.untranslated.len());
        if num_objects_final == expected {
            return Ok(());
        }

        self.log.warn(format!(
            "Expected final translated model to have {expected} objects, but it actually has \
            {num_objects_final} objects"
        ));
        ensure!(
            num_objects_start == 0 || num_objects_final > 0,
            "Original model contained {num_objects_start} objects, but final translated model is \
            empty"
        );

        Ok(())
    }
}

/// Read a model file into a string
fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model_text};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[test]
    fn test_new_translator() {
        let translator = VersionTranslator::new();
        assert!(translator.allow_newer_versions());
        assert_eq!(translator.original_version(), VersionString::default());
        assert!(translator.warnings().is_empty());
    }

    #[test]
    fn test_current_version_unchanged() {
        let mut translator = VersionTranslator::new();
        let text = model_text("3.2.0", "");
        let model = translator.load_model_from_str(&text).unwrap();
        assert_eq!(translator.original_version(), CURRENT_VERSION);
        assert_eq!(model.version(), Some(CURRENT_VERSION));
        assert_eq!(model.num_objects(), 0);
        assert!(translator.refactored_objects().is_empty());
        assert!(translator.errors().is_empty());
    }

    #[test]
    fn test_translate_from_oldest_version() {
        let mut translator = VersionTranslator::new();
        let model = translator
            .load_model_from_str(&model_text("2.6.0", ""))
            .unwrap();
        assert_eq!(translator.original_version(), OLDEST_VERSION);
        assert_eq!(model.version(), Some(CURRENT_VERSION));
        assert!(translator.deprecated_objects().is_empty());

        // The version object keeps its handle
        let original = IdfFile::parse(&model_text("2.6.0", "")).unwrap();
        assert_eq!(
            model.idf_file().version_object().unwrap().handle(),
            original.version_object().unwrap().handle()
        );
    }

    #[test]
    fn test_missing_version_uses_default() {
        let mut translator = VersionTranslator::new();
        let text = "OS:Node,\n  {11111111-bdda-4e2a-829b-e4fff92527d0},\n  Node 1;\n";
        let model = translator.load_model_from_str(text).unwrap();
        assert_eq!(translator.original_version(), DEFAULT_FILE_VERSION);
        assert_eq!(model.version(), Some(CURRENT_VERSION));

        // The node, plus the schedule and limits added in 2.9.1
        assert_eq!(model.num_objects(), 3);
        assert_eq!(translator.new_objects().len(), 2);
    }

    #[test]
    fn test_too_old() {
        let mut translator = VersionTranslator::new();
        assert_error!(
            translator.load_model_from_str(&model_text("2.5.2", "")),
            "Version translation is not provided for models created prior to version 2.6.0"
        );
        assert_eq!(translator.errors().len(), 1);
    }

    #[test]
    fn test_next_version_allowed() {
        let mut translator = VersionTranslator::new();
        let model = translator
            .load_model_from_str(&model_text("3.2.1", ""))
            .unwrap();
        assert_eq!(translator.warnings().len(), 1);
        assert_eq!(translator.original_version(), VersionString::new(3, 2, 1));

        // No step runs, so the file keeps its version
        assert_eq!(model.version(), Some(VersionString::new(3, 2, 1)));
    }

    #[test]
    fn test_next_version_disallowed() {
        let mut translator = VersionTranslator::new();
        translator.set_allow_newer_versions(false);
        assert_error!(
            translator.load_model_from_str(&model_text("3.2.1", "")),
            "Version extracted from file '3.2.1' is newer than the current version 3.2.0"
        );
    }

    #[test]
    fn test_far_future_version() {
        let mut translator = VersionTranslator::new();
        assert_error!(
            translator.load_model_from_str(&model_text("3.4.0", "")),
            "Version extracted from file '3.4.0' is not supported by version 3.2.0"
        );
    }

    #[test]
    fn test_unknown_version() {
        let mut translator = VersionTranslator::new();
        assert_error!(
            translator.load_model_from_str(&model_text("2.8.7", "")),
            "Unknown version '2.8.7': no translation is available from this version"
        );
    }

    #[test]
    fn test_state_reset_between_loads() {
        let mut translator = VersionTranslator::new();
        assert!(
            translator
                .load_model_from_str(&model_text("1.0.0", ""))
                .is_err()
        );
        assert_eq!(translator.errors().len(), 1);

        translator
            .load_model_from_str(&model_text("3.2.0", ""))
            .unwrap();
        assert!(translator.errors().is_empty());
        assert_eq!(translator.original_version(), CURRENT_VERSION);
    }

    #[test]
    fn test_progress_callback() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut translator = VersionTranslator::new();
        let calls_clone = Rc::clone(&calls);
        translator.set_progress_callback(move |version, step, total| {
            calls_clone.borrow_mut().push((*version, step, total));
        });
        translator
            .load_model_from_str(&model_text("3.0.1", ""))
            .unwrap();
        assert_eq!(
            *calls.borrow(),
            [
                (VersionString::new(3, 1, 0), 1, 2),
                (VersionString::new(3, 2, 0), 2, 2)
            ]
        );
    }

    #[test]
    fn test_load_model_wrong_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.osc");
        fs::write(&path, model_text("3.2.0", "")).unwrap();
        let mut translator = VersionTranslator::new();
        assert_error!(
            translator.load_model(&path),
            format!("Cannot load {}: extension must be 'osm'", path.display())
        );
    }

    #[test]
    fn test_load_model_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.osm");
        fs::write(&path, model_text("3.1.0", "")).unwrap();
        let mut translator = VersionTranslator::new();
        let model = translator.load_model(&path).unwrap();
        assert_eq!(model.version(), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_load_component_without_component_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("component.osc");
        fs::write(&path, model_text("3.1.0", "")).unwrap();
        let mut translator = VersionTranslator::new();
        assert_error!(
            translator.load_component(&path),
            "Component has no OS:ComponentData object"
        );
    }
}
