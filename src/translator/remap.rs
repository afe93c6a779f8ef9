//! Helpers for rewriting the fields of objects during an update step.
use crate::idf::IdfObject;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use unicase::UniCase;

/// Output variable names which changed in version 3.1.0, as `old_name,new_name`
const OUTPUT_VARIABLE_RENAMES_CSV: &str = include_str!("../../data/output_variable_renames.csv");

/// Copy `object`, moving the field at each index `i` to `map(i)`.
///
/// Fields for which `map` returns `None` are dropped. Field comments move with their values.
pub fn remap_fields<F>(object: &IdfObject, map: F) -> IdfObject
where
    F: Fn(usize) -> Option<usize>,
{
    let mut new_object = IdfObject::new(object.type_name());
    new_object.set_comment(object.comment());
    for (index, value) in object.fields().iter().enumerate() {
        let Some(new_index) = map(index) else {
            continue;
        };

        new_object.set(new_index, value.as_str());
        if let Some(comment) = object.field_comment(index) {
            new_object.set_field_comment(new_index, comment);
        }
    }

    new_object
}

/// Copy `object`, inserting `values` as new fields starting at `at`
pub fn insert_fields(object: &IdfObject, at: usize, values: &[&str]) -> IdfObject {
    let count = values.len();
    let mut new_object = remap_fields(object, |i| Some(if i < at { i } else { i + count }));
    for (offset, value) in values.iter().enumerate() {
        new_object.set(at + offset, *value);
    }

    new_object
}

/// Copy `object`, dropping `count` fields starting at `at`
pub fn remove_fields(object: &IdfObject, at: usize, count: usize) -> IdfObject {
    remap_fields(object, |i| match i {
        i if i < at => Some(i),
        i if i < at + count => None,
        i => Some(i - count),
    })
}

/// Copy `object` under a different type name
pub fn change_type(object: &IdfObject, type_name: &str) -> IdfObject {
    let mut new_object = IdfObject::with_fields(type_name, object.fields().iter().cloned());
    new_object.set_comment(object.comment());
    for index in 0..object.num_fields() {
        if let Some(comment) = object.field_comment(index) {
            new_object.set_field_comment(index, comment);
        }
    }

    new_object
}

/// A case-insensitive lookup from old string values to their replacements
#[derive(Debug, Default, Clone)]
pub struct RenameMap(HashMap<UniCase<String>, String>);

impl RenameMap {
    /// The replacement for `value`, if it has one
    pub fn get(&self, value: &str) -> Option<&str> {
        self.0
            .get(&UniCase::new(value.to_string()))
            .map(String::as_str)
    }

    /// The number of renames
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no renames
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RenameMap
where
    K: Into<String>,
    V: Into<String>,
{
    /// Build a map from pairs. If an old value appears twice, the first replacement wins.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HashMap::new();
        for (old, new) in iter {
            map.entry(UniCase::new(old.into()))
                .or_insert_with(|| new.into());
        }

        Self(map)
    }
}

#[derive(Debug, Deserialize)]
struct RenameRow {
    old_name: String,
    new_name: String,
}

/// Parse a table of renames from CSV with `old_name` and `new_name` columns
fn read_renames(contents: &str) -> Result<RenameMap, csv::Error> {
    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    reader
        .deserialize()
        .map(|row| row.map(|row: RenameRow| (row.old_name, row.new_name)))
        .collect()
}

/// The output variable renames introduced in version 3.1.0
pub fn output_variable_renames() -> &'static RenameMap {
    static RENAMES: OnceLock<RenameMap> = OnceLock::new();
    RENAMES.get_or_init(|| {
        read_renames(OUTPUT_VARIABLE_RENAMES_CSV).expect("Embedded rename table is invalid")
    })
}

/// Replace runs of two or more spaces with a single space
pub fn collapse_spaces(value: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let spaces = SPACES.get_or_init(|| Regex::new(" {2,}").expect("Invalid regex"));
    spaces.replace_all(value, " ").into_owned()
}
