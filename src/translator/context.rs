//! The state available to an update step while it rewrites a file.
use super::TranslationLog;
use crate::handle::Handle;
use crate::idf::file::VERSION_OBJECT_TYPE;
use crate::idf::{IdfFile, IdfObject};
use crate::schema::{ObjectLayout, Schema};
use crate::version::VersionString;

/// Collects the output of one update step.
///
/// The output starts with the source file's header and a version object for the target version
/// (keeping the handle of the source's version object). The step then writes every object, either
/// copied verbatim or rewritten, registering rewritten and created objects as it goes.
pub struct UpdateContext<'a> {
    source: &'a IdfFile,
    source_version: VersionString,
    target_version: VersionString,
    schema: &'a Schema,
    is_component: bool,
    output: IdfFile,
    log: &'a mut TranslationLog,
}

impl<'a> UpdateContext<'a> {
    /// Start a new update step from `source` to `target_version`
    pub fn new(
        source: &'a IdfFile,
        source_version: VersionString,
        target_version: VersionString,
        schema: &'a Schema,
        is_component: bool,
        log: &'a mut TranslationLog,
    ) -> Self {
        let mut version_object = source.version_object().cloned().unwrap_or_else(|| {
            IdfObject::with_fields(VERSION_OBJECT_TYPE, [Handle::new().to_string()])
        });
        version_object.set(1, target_version.to_string());
        if let Some(layout) = schema.layout(VERSION_OBJECT_TYPE, &target_version) {
            version_object.apply_layout_comments(layout);
        }

        let mut output = IdfFile::new();
        output.set_header(source.header());
        output.set_version_object(version_object);

        Self {
            source,
            source_version,
            target_version,
            schema,
            is_component,
            output,
            log,
        }
    }

    /// The file being updated
    pub fn source(&self) -> &'a IdfFile {
        self.source
    }

    /// The version of the file being updated
    pub fn source_version(&self) -> VersionString {
        self.source_version
    }

    /// The version being updated to
    pub fn target_version(&self) -> VersionString {
        self.target_version
    }

    /// Whether a component rather than a model is being translated
    pub fn is_component(&self) -> bool {
        self.is_component
    }

    /// The layout of `object_type` in the source file
    pub fn source_layout(&self, object_type: &str) -> ObjectLayout {
        self.schema
            .layout_or_default(object_type, &self.source_version)
    }

    /// The layout of `object_type` at the target version
    pub fn target_layout(&self, object_type: &str) -> ObjectLayout {
        self.schema
            .layout_or_default(object_type, &self.target_version)
    }

    /// Create a handle for a new object
    pub fn new_handle(&self) -> Handle {
        Handle::new()
    }

    /// Write an object unchanged
    pub fn copy(&mut self, object: &IdfObject) {
        self.output.add_object(object.clone());
    }

    /// Write an object created by this step
    pub fn add_new(&mut self, mut object: IdfObject) {
        self.apply_target_comments(&mut object);
        self.log.push_new(object.clone());
        self.output.add_object(object);
    }

    /// Write a rewritten version of `old_object`
    pub fn add_refactored(&mut self, old_object: &IdfObject, mut new_object: IdfObject) {
        self.apply_target_comments(&mut new_object);
        self.log
            .push_refactored(old_object.clone(), new_object.clone());
        self.output.add_object(new_object);
    }

    /// Drop an object whose type no longer exists
    pub fn add_deprecated(&mut self, object: &IdfObject) {
        self.log.push_deprecated(object.clone());
    }

    /// Drop an object which could not be translated
    pub fn add_untranslated(&mut self, object: &IdfObject) {
        self.log.push_untranslated(object.clone());
    }

    /// Raise a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.log.warn(message);
    }

    /// Raise an error
    pub fn error(&mut self, message: impl Into<String>) {
        self.log.error(message);
    }

    /// The file written by this step
    pub fn finish(self) -> IdfFile {
        self.output
    }

    /// Fill in missing field comments for objects of types with a known layout
    fn apply_target_comments(&self, object: &mut IdfObject) {
        if let Some(layout) = self.schema.layout(object.type_name(), &self.target_version) {
            object.apply_layout_comments(layout);
        }
    }
}
