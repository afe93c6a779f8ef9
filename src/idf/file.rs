//! Whole model files: a header, a version object and the remaining objects.
use super::{IdfObject, parser};
use crate::handle::Handle;
use crate::version::VersionString;
use anyhow::{Context, Result, ensure};
use std::fmt;
use std::fs;
use std::path::Path;
use unicase::UniCase;

/// The type of the object recording a file's schema version
pub const VERSION_OBJECT_TYPE: &str = "OS:Version";

/// The index of the version identifier within the version object
const VERSION_FIELD: usize = 1;

/// The objects of a model file, in order.
///
/// The version object is stored separately from the other objects and is not counted by
/// [`IdfFile::num_objects`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdfFile {
    header: String,
    version_object: Option<IdfObject>,
    objects: Vec<IdfObject>,
}

impl IdfFile {
    /// Create an empty file
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a file from text.
    ///
    /// The first `OS:Version` object becomes the version object. Any later ones are kept as
    /// ordinary objects.
    pub fn parse(text: &str) -> Result<Self> {
        let parsed = parser::parse(text)?;

        let mut file = IdfFile {
            header: parsed.header.join("\n"),
            ..Default::default()
        };
        for object in parsed.objects {
            file.add_object(object);
        }

        Ok(file)
    }

    /// Read and parse the file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Could not parse {}", path.display()))
    }

    /// Find the version recorded in `text` without parsing the whole file.
    ///
    /// Returns `None` if there is no readable version object before the first malformed object.
    pub fn load_version_only(text: &str) -> Option<VersionString> {
        parser::find_first_object(text, VERSION_OBJECT_TYPE)?
            .get_non_empty(VERSION_FIELD)?
            .parse()
            .ok()
    }

    /// The comment lines at the top of the file
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Replace the header
    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header = header.into();
    }

    /// The version object, if the file has one
    pub fn version_object(&self) -> Option<&IdfObject> {
        self.version_object.as_ref()
    }

    /// Replace the version object
    pub fn set_version_object(&mut self, object: IdfObject) {
        self.version_object = Some(object);
    }

    /// The version recorded in the version object, if any
    pub fn version(&self) -> Option<VersionString> {
        self.version_object
            .as_ref()?
            .get_non_empty(VERSION_FIELD)?
            .parse()
            .ok()
    }

    /// Add an object to the end of the file.
    ///
    /// If the file has no version object yet and `object` is one, it becomes the version object.
    pub fn add_object(&mut self, object: IdfObject) {
        if self.version_object.is_none() && object.is_type(VERSION_OBJECT_TYPE) {
            self.version_object = Some(object);
        } else {
            self.objects.push(object);
        }
    }

    /// All objects other than the version object
    pub fn objects(&self) -> &[IdfObject] {
        &self.objects
    }

    /// Mutable access to all objects other than the version object
    pub fn objects_mut(&mut self) -> &mut [IdfObject] {
        &mut self.objects
    }

    /// The number of objects, excluding the version object
    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// Objects of the given type (case-insensitive)
    pub fn objects_by_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a IdfObject> {
        self.objects
            .iter()
            .filter(move |object| object.is_type(type_name))
    }

    /// The object with the given handle, if any
    pub fn object_by_handle(&self, handle: &Handle) -> Option<&IdfObject> {
        self.objects
            .iter()
            .chain(self.version_object.iter())
            .find(|object| object.handle().as_ref() == Some(handle))
    }

    /// Objects whose name matches `name` (case-insensitive)
    pub fn objects_by_name(&self, name: &str) -> Vec<&IdfObject> {
        let name = UniCase::new(name);
        self.objects
            .iter()
            .filter(|object| object.name().is_some_and(|n| UniCase::new(n) == name))
            .collect()
    }

    /// The file in OSM text format
    pub fn to_idf_string(&self) -> String {
        self.to_string()
    }

    /// Write the file to `path`.
    ///
    /// Fails if the file already exists, unless `overwrite` is set.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        ensure!(
            overwrite || !path.exists(),
            "{} already exists. Use the overwrite option to replace it.",
            path.display()
        );
        fs::write(path, self.to_idf_string())
            .with_context(|| format!("Could not write {}", path.display()))
    }
}

impl fmt::Display for IdfFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.header.is_empty() {
            writeln!(f, "{}", self.header)?;
        }
        writeln!(f)?;

        for object in self.version_object.iter().chain(&self.objects) {
            writeln!(f, "{object}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    const ZONE_HANDLE: &str = "{11111111-bdda-4e2a-829b-e4fff92527d0}";

    #[fixture]
    fn file() -> IdfFile {
        IdfFile::parse(&format!(
            "! Header

OS:Version,
  {{0f93d9e1-bdda-4e2a-829b-e4fff92527d0}}, !- Handle
  3.0.1;                                  !- Version Identifier

OS:ThermalZone,
  {ZONE_HANDLE}, !- Handle
  Zone 1;                                 !- Name

OS:ThermalZone,
  {{22222222-bdda-4e2a-829b-e4fff92527d0}}, !- Handle
  ZONE 1;                                 !- Name

OS:Space,
  {{33333333-bdda-4e2a-829b-e4fff92527d0}}, !- Handle
  Space 1,                                !- Name
  {ZONE_HANDLE};                          !- Thermal Zone
"
        ))
        .unwrap()
    }

    #[rstest]
    fn test_parse_file(file: IdfFile) {
        assert_eq!(file.header(), "! Header");
        assert_eq!(file.version(), Some(VersionString::new(3, 0, 1)));
        assert_eq!(file.num_objects(), 3);
    }

    #[rstest]
    fn test_objects_by_type(file: IdfFile) {
        assert_eq!(file.objects_by_type("os:thermalzone").count(), 2);
        assert_eq!(file.objects_by_type("OS:Space").count(), 1);
        assert_eq!(file.objects_by_type("OS:Surface").count(), 0);
    }

    #[rstest]
    fn test_object_by_handle(file: IdfFile) {
        let handle: Handle = ZONE_HANDLE.parse().unwrap();
        let zone = file.object_by_handle(&handle).unwrap();
        assert_eq!(zone.name(), Some("Zone 1"));
        assert!(file.object_by_handle(&Handle::new()).is_none());
    }

    #[rstest]
    fn test_objects_by_name(file: IdfFile) {
        assert_eq!(file.objects_by_name("zone 1").len(), 2);
        assert_eq!(file.objects_by_name("Space 1").len(), 1);
    }

    #[rstest]
    fn test_print_and_reparse(file: IdfFile) {
        let reparsed = IdfFile::parse(&file.to_idf_string()).unwrap();
        assert_eq!(reparsed, file);
    }

    #[test]
    fn test_file_without_version() {
        let file = IdfFile::parse("OS:Node, {a}, Node 1;").unwrap();
        assert!(file.version_object().is_none());
        assert_eq!(file.version(), None);
        assert_eq!(file.num_objects(), 1);
    }

    #[rstest]
    #[case("OS:Version, {a}, 2.9.1;\nOS:Node, broken", Some(VersionString::new(2, 9, 1)))]
    #[case("OS:Node, {a};\nOS:Version, {b}, 3.0;", Some(VersionString::new(3, 0, 0)))]
    #[case("OS:Node, broken\nOS:Version, {b}, 3.0;", None)]
    #[case("OS:Version, {a}, not-a-version;", None)]
    #[case("", None)]
    fn test_load_version_only(#[case] text: &str, #[case] expected: Option<VersionString>) {
        assert_eq!(IdfFile::load_version_only(text), expected);
    }

    #[rstest]
    fn test_save(file: IdfFile) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.osm");
        file.save(&path, false).unwrap();
        assert_eq!(IdfFile::load(&path).unwrap(), file);

        assert_error!(
            file.save(&path, false),
            format!(
                "{} already exists. Use the overwrite option to replace it.",
                path.display()
            )
        );
        file.save(&path, true).unwrap();
    }
}
