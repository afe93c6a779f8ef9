//! Fixtures for tests

use crate::idf::IdfObject;
use crate::version::VersionString;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// The handle of the version object in [`model_text`]
pub const VERSION_HANDLE: &str = "{0f93d9e1-bdda-4e2a-829b-e4fff92527d0}";

/// Parse a version number
pub fn v(s: &str) -> VersionString {
    s.parse().unwrap()
}

/// A fixed, valid handle which differs for each `n`
pub fn h(n: u32) -> String {
    format!("{{00000000-0000-4000-8000-{n:012}}}")
}

/// An object in OSM text format
pub fn osm_object(type_name: &str, fields: &[&str]) -> String {
    format!("{}\n", IdfObject::with_fields(type_name, fields.iter().copied()))
}

/// The contents of a model file at `version`, containing the objects in `body`
pub fn model_text(version: &str, body: &str) -> String {
    format!(
        "! OpenStudio model file

OS:Version,
  {VERSION_HANDLE}, !- Handle
  {version};                                  !- Version Identifier

{body}"
    )
}

/// A component file at 3.1.0 containing a single constant schedule
#[fixture]
pub fn component_text() -> String {
    let body = [
        osm_object(
            "OS:ComponentData",
            &[&h(100), "Always On", &h(101), &h(102), "0", "0", &h(1)],
        ),
        osm_object("OS:Schedule:Constant", &[&h(1), "Always On", "", "1"]),
    ]
    .concat();
    model_text("3.1.0", &body)
}
