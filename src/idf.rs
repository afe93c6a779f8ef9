//! Records of the OSM/IDF text format and the files containing them.
//!
//! An object is a type name followed by an ordered list of string fields. Apart from the handle in
//! field 0 of `OS:` objects, the meaning of each field is only known to the code that migrates it.
use crate::handle::Handle;
use crate::schema::ObjectLayout;
use std::fmt;
use unicase::UniCase;

pub mod file;
mod parser;
pub use file::IdfFile;

/// The width of the value column when printing objects
pub const PRINTED_FIELD_SPACE: usize = 38;

/// A single object of a model file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdfObject {
    type_name: String,
    fields: Vec<String>,
    /// Editor comments (the text after `!-`) for each field, may be shorter than `fields`
    field_comments: Vec<String>,
    /// Comment lines preceding the object, including the leading `!`
    comment: String,
}

impl IdfObject {
    /// Create an empty object of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    /// Create an object of the given type with the given field values
    pub fn with_fields<I, S>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: type_name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// The object's type, e.g. `OS:ThermalZone`
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the object is of the given type (case-insensitive)
    pub fn is_type(&self, type_name: &str) -> bool {
        UniCase::new(self.type_name.as_str()) == UniCase::new(type_name)
    }

    /// All field values
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The number of fields
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// The value of the field at `index`, or `None` past the last field
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// The value of the field at `index`, or `None` if it is missing or empty
    pub fn get_non_empty(&self, index: usize) -> Option<&str> {
        self.get(index).filter(|value| !value.is_empty())
    }

    /// The field at `index` as a number, or `None` if missing or not numeric
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        self.get_non_empty(index)?.trim().parse().ok()
    }

    /// The field at `index` as an integer, or `None` if missing or not an integer
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        self.get_non_empty(index)?.trim().parse().ok()
    }

    /// Set the field at `index`, adding empty fields first if the object is too short
    pub fn set(&mut self, index: usize, value: impl Into<String>) {
        if index >= self.fields.len() {
            self.fields.resize(index + 1, String::new());
        }
        self.fields[index] = value.into();
    }

    /// Set the field at `index` to a number
    pub fn set_f64(&mut self, index: usize, value: f64) {
        self.set(index, value.to_string());
    }

    /// Set the field at `index` to an integer
    pub fn set_i64(&mut self, index: usize, value: i64) {
        self.set(index, value.to_string());
    }

    /// Drop all fields from `len` onwards
    pub fn truncate(&mut self, len: usize) {
        self.fields.truncate(len);
        self.field_comments.truncate(len);
    }

    /// The object's handle, if field 0 holds one
    pub fn handle(&self) -> Option<Handle> {
        self.get(0)?.parse().ok()
    }

    /// The object's name (field 1), if present and non-empty
    pub fn name(&self) -> Option<&str> {
        self.get_non_empty(1)
    }

    /// Set the object's name (field 1)
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set(1, name);
    }

    /// The comment lines preceding the object
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the comment lines preceding the object.
    ///
    /// Lines that do not start with `!` are prefixed with one.
    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment
            .lines()
            .map(|line| {
                if line.trim_start().starts_with('!') {
                    line.to_string()
                } else {
                    format!("! {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    /// The editor comment for the field at `index`, if any
    pub fn field_comment(&self, index: usize) -> Option<&str> {
        self.field_comments
            .get(index)
            .map(String::as_str)
            .filter(|comment| !comment.is_empty())
    }

    /// Set the editor comment for the field at `index`
    pub fn set_field_comment(&mut self, index: usize, comment: impl Into<String>) {
        if index >= self.field_comments.len() {
            self.field_comments.resize(index + 1, String::new());
        }
        self.field_comments[index] = comment.into();
    }

    /// Fill in missing field comments from the field names in `layout`
    pub fn apply_layout_comments(&mut self, layout: &ObjectLayout) {
        for index in 0..self.fields.len() {
            if self.field_comment(index).is_none()
                && let Some(name) = layout.field_name(index)
            {
                self.set_field_comment(index, name);
            }
        }
    }

    /// The number of complete or partial extensible groups
    pub fn num_extensible_groups(&self, layout: &ObjectLayout) -> usize {
        if !layout.is_extensible() || self.fields.len() <= layout.num_fields {
            return 0;
        }

        (self.fields.len() - layout.num_fields).div_ceil(layout.group_size)
    }

    /// The extensible groups of the object.
    ///
    /// The last group may be shorter than the group size if trailing fields were omitted.
    pub fn extensible_groups(&self, layout: &ObjectLayout) -> Vec<&[String]> {
        if self.num_extensible_groups(layout) == 0 {
            return Vec::new();
        }

        self.fields[layout.num_fields..]
            .chunks(layout.group_size)
            .collect()
    }

    /// Append an extensible group, padding the non-extensible fields if needed.
    ///
    /// Missing trailing values in `values` are left empty.
    pub fn push_extensible_group<I, S>(&mut self, layout: &ObjectLayout, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = layout
            .num_fields
            .max(layout.num_fields + self.num_extensible_groups(layout) * layout.group_size);
        self.fields.resize(start, String::new());

        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.resize(layout.group_size.max(values.len()), String::new());
        self.fields.extend(values);
    }
}

impl fmt::Display for IdfObject {
    /// Print in the OSM format, e.g.
    ///
    /// ```text
    /// OS:Version,
    ///   {0f93d9e1-bdda-4e2a-829b-e4fff92527d0}, !- Handle
    ///   3.2.0;                                  !- Version Identifier
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.comment.is_empty() {
            writeln!(f, "{}", self.comment)?;
        }

        if self.fields.is_empty() {
            return writeln!(f, "{};", self.type_name);
        }

        writeln!(f, "{},", self.type_name)?;
        let last = self.fields.len() - 1;
        for (index, value) in self.fields.iter().enumerate() {
            let delimiter = if index == last { ';' } else { ',' };
            write!(f, "  {value}{delimiter}")?;
            if let Some(comment) = self.field_comment(index) {
                let padding = PRINTED_FIELD_SPACE.saturating_sub(value.len()) + 1;
                write!(f, "{:padding$}!- {comment}", "")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    const HANDLE: &str = "{0f93d9e1-bdda-4e2a-829b-e4fff92527d0}";

    #[fixture]
    fn meter() -> IdfObject {
        IdfObject::with_fields(
            "OS:Meter:Custom",
            [
                HANDLE,
                "Custom Meter",
                "Electricity",
                "Key 1",
                "Var 1",
                "Key 2",
                "Var 2",
            ],
        )
    }

    #[fixture]
    fn meter_layout() -> ObjectLayout {
        ObjectLayout::new(3, 2)
    }

    #[test]
    fn test_get_and_set() {
        let mut object = IdfObject::new("OS:Schedule:Constant");
        assert_eq!(object.get(0), None);

        object.set(3, "1.5");
        assert_eq!(object.num_fields(), 4);
        assert_eq!(object.get(1), Some(""));
        assert_eq!(object.get_non_empty(1), None);
        assert_approx_eq!(f64, object.get_f64(3).unwrap(), 1.5);
        assert_eq!(object.get_i64(3), None);

        object.set_i64(2, 24);
        assert_eq!(object.get_i64(2), Some(24));
    }

    #[rstest]
    #[case("autosize", None)]
    #[case("", None)]
    #[case(" 100 ", Some(100.0))]
    #[case("-25", Some(-25.0))]
    #[case("1e3", Some(1000.0))]
    fn test_get_f64(#[case] value: &str, #[case] expected: Option<f64>) {
        let object = IdfObject::with_fields("OS:Material", [HANDLE, value]);
        assert_eq!(object.get_f64(1), expected);
    }

    #[test]
    fn test_set_f64_formatting() {
        let mut object = IdfObject::new("OS:Material");
        object.set_f64(0, 1400.0);
        object.set_f64(1, -25.0);
        object.set_f64(2, 48.89);
        assert_eq!(object.fields(), ["1400", "-25", "48.89"]);
    }

    #[test]
    fn test_handle_and_name() {
        let object = IdfObject::with_fields("OS:ThermalZone", [HANDLE, "Zone 1"]);
        assert_eq!(object.handle().unwrap().to_string(), HANDLE);
        assert_eq!(object.name(), Some("Zone 1"));

        let unnamed = IdfObject::with_fields("OS:ThermalZone", ["not a handle"]);
        assert_eq!(unnamed.handle(), None);
        assert_eq!(unnamed.name(), None);
    }

    #[test]
    fn test_is_type() {
        let object = IdfObject::new("OS:ThermalZone");
        assert!(object.is_type("os:thermalzone"));
        assert!(!object.is_type("OS:ThermalZones"));
    }

    #[rstest]
    fn test_extensible_groups(meter: IdfObject, meter_layout: ObjectLayout) {
        assert_eq!(meter.num_extensible_groups(&meter_layout), 2);
        let groups = meter.extensible_groups(&meter_layout);
        assert_eq!(groups[0], ["Key 1", "Var 1"]);
        assert_eq!(groups[1], ["Key 2", "Var 2"]);
    }

    #[rstest]
    fn test_extensible_groups_partial(mut meter: IdfObject, meter_layout: ObjectLayout) {
        meter.truncate(6);
        assert_eq!(meter.num_extensible_groups(&meter_layout), 2);
        assert_eq!(meter.extensible_groups(&meter_layout)[1], ["Key 2"]);
    }

    #[rstest]
    fn test_push_extensible_group(mut meter: IdfObject, meter_layout: ObjectLayout) {
        meter.truncate(6);
        meter.push_extensible_group(&meter_layout, ["Key 3"]);
        assert_eq!(meter.num_fields(), 9);
        assert_eq!(meter.get(6), Some(""));
        assert_eq!(meter.get(7), Some("Key 3"));
        assert_eq!(meter.get(8), Some(""));
    }

    #[rstest]
    fn test_push_extensible_group_short_object(meter_layout: ObjectLayout) {
        let mut object = IdfObject::with_fields("OS:Meter:Custom", [HANDLE]);
        object.push_extensible_group(&meter_layout, ["Key", "Var"]);
        assert_eq!(object.fields(), [HANDLE, "", "", "Key", "Var"]);
    }

    #[test]
    fn test_display() {
        let mut object = IdfObject::with_fields("OS:Version", [HANDLE, "3.2.0"]);
        object.set_field_comment(0, "Handle");
        object.set_field_comment(1, "Version Identifier");
        let expected = format!(
            "OS:Version,\n  {HANDLE}, !- Handle\n  3.2.0;{}!- Version Identifier\n",
            " ".repeat(34)
        );
        assert_eq!(object.to_string(), expected);
    }

    #[test]
    fn test_display_without_comments() {
        let mut object = IdfObject::with_fields("OS:Node", [HANDLE, "Node 1"]);
        object.set_comment("A node");
        assert_eq!(
            object.to_string(),
            format!("! A node\nOS:Node,\n  {HANDLE},\n  Node 1;\n")
        );
    }

    #[test]
    fn test_display_no_fields() {
        assert_eq!(IdfObject::new("OS:Foo").to_string(), "OS:Foo;\n");
    }

    #[test]
    fn test_apply_layout_comments() {
        let layout = ObjectLayout {
            num_fields: 2,
            group_size: 1,
            field_names: vec!["Handle".into(), "Name".into()],
            group_field_names: vec!["Port".into()],
        };
        let mut object = IdfObject::with_fields("OS:PortList", [HANDLE, "List", "{a}"]);
        object.set_field_comment(1, "Custom");
        object.apply_layout_comments(&layout);
        assert_eq!(object.field_comment(0), Some("Handle"));
        assert_eq!(object.field_comment(1), Some("Custom"));
        assert_eq!(object.field_comment(2), Some("Port 1"));
    }
}
