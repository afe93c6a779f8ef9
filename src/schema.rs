//! Field layouts of the object types the translator needs to know about.
//!
//! Most objects are migrated purely by field index, so the translator does not need a full data
//! dictionary. Objects with extensible groups, or objects created from scratch by an update step,
//! are described here so that groups can be addressed and field comments can be printed.
use crate::version::VersionString;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use unicase::UniCase;

/// The embedded table of object layouts
const LAYOUTS_TOML: &str = include_str!("../data/layouts.toml");

/// The layout of the fields of one object type at one schema version
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectLayout {
    /// The number of fields before the first extensible group
    pub num_fields: usize,
    /// The number of fields in each extensible group (0 if the object is not extensible)
    pub group_size: usize,
    /// Names of the non-extensible fields (may be empty if unknown)
    pub field_names: Vec<String>,
    /// Names of the fields within an extensible group
    pub group_field_names: Vec<String>,
}

impl ObjectLayout {
    /// A layout for an object with `num_fields` fields and extensible groups of `group_size`
    pub fn new(num_fields: usize, group_size: usize) -> Self {
        Self {
            num_fields,
            group_size,
            ..Default::default()
        }
    }

    /// Whether objects with this layout have extensible groups
    pub fn is_extensible(&self) -> bool {
        self.group_size > 0
    }

    /// The comment to print next to the field at `index`, if known.
    ///
    /// Fields within extensible groups are suffixed with the 1-based group number.
    pub fn field_name(&self, index: usize) -> Option<String> {
        if index < self.num_fields {
            return self.field_names.get(index).cloned();
        }

        if !self.is_extensible() {
            return None;
        }

        let offset = index - self.num_fields;
        let name = self.group_field_names.get(offset % self.group_size)?;
        Some(format!("{name} {}", offset / self.group_size + 1))
    }
}

/// An entry of the layouts file
#[derive(Debug, Deserialize)]
struct LayoutEntry {
    object_type: String,
    since: VersionString,
    fields: Option<usize>,
    #[serde(default)]
    group_size: usize,
    #[serde(default)]
    field_names: Vec<String>,
    #[serde(default)]
    group_field_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LayoutsFile {
    layout: Vec<LayoutEntry>,
}

/// Object layouts keyed by (case-insensitive) object type, each sorted by version
#[derive(Debug, Default)]
pub struct Schema {
    layouts: HashMap<UniCase<String>, Vec<(VersionString, ObjectLayout)>>,
}

impl Schema {
    /// Parse a table of layouts from TOML
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: LayoutsFile = toml::from_str(contents).context("Invalid layouts table")?;

        let mut schema = Schema::default();
        for entry in file.layout {
            let num_fields = entry.fields.unwrap_or(entry.field_names.len());
            ensure!(
                entry.field_names.len() <= num_fields,
                "Layout for {} has more field names than fields",
                entry.object_type
            );
            ensure!(
                entry.group_field_names.is_empty()
                    || entry.group_field_names.len() == entry.group_size,
                "Layout for {} has the wrong number of group field names",
                entry.object_type
            );

            let layout = ObjectLayout {
                num_fields,
                group_size: entry.group_size,
                field_names: entry.field_names,
                group_field_names: entry.group_field_names,
            };
            schema
                .layouts
                .entry(UniCase::new(entry.object_type))
                .or_default()
                .push((entry.since, layout));
        }

        for versions in schema.layouts.values_mut() {
            versions.sort_by_key(|(since, _)| *since);
        }

        Ok(schema)
    }

    /// The layouts compiled into the program
    pub fn embedded() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::from_toml(LAYOUTS_TOML).expect("Embedded layouts table is invalid")
        })
    }

    /// The layout of `object_type` at `version`, if known.
    ///
    /// This is the newest entry whose `since` version is not after `version`.
    pub fn layout(&self, object_type: &str, version: &VersionString) -> Option<&ObjectLayout> {
        let versions = self.layouts.get(&UniCase::new(object_type.to_string()))?;
        versions
            .iter()
            .rev()
            .find(|(since, _)| since <= version)
            .map(|(_, layout)| layout)
    }

    /// Like [`Schema::layout`], but treat unknown types as non-extensible objects
    pub fn layout_or_default(&self, object_type: &str, version: &VersionString) -> ObjectLayout {
        self.layout(object_type, version)
            .cloned()
            .unwrap_or_else(|| ObjectLayout::new(usize::MAX, 0))
    }
}
