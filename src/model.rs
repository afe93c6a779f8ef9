//! The translated model: the final file, checked for consistency.
use crate::handle::Handle;
use crate::idf::{IdfFile, IdfObject};
use crate::version::VersionString;
use anyhow::{Context, Result, bail};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use unicase::UniCase;

/// The object type which describes a component's contents
pub const COMPONENT_DATA_TYPE: &str = "OS:ComponentData";

/// The first entry of a component's contents, which is its primary object
const COMPONENT_PRIMARY_OBJECT_FIELD: usize = 6;

/// A model at the current version.
///
/// Every object has a unique handle, and names are unique (case-insensitively) within each object
/// type.
#[derive(Debug, Clone)]
pub struct Model {
    idf: IdfFile,
}

impl Model {
    /// Build a model from a file, reporting fixed name conflicts and dangling pointers to `warn`.
    ///
    /// Fails if two objects share a handle.
    pub(crate) fn build(mut idf: IdfFile, warn: &mut dyn FnMut(String)) -> Result<Self> {
        check_unique_handles(&idf)?;
        fix_name_conflicts(&mut idf, warn);
        check_pointers(&idf, warn);

        Ok(Self { idf })
    }

    /// Build a model from a file at the current version, logging any warnings
    pub fn from_idf_file(idf: IdfFile) -> Result<Self> {
        Self::build(idf, &mut |msg| log::warn!("{msg}"))
    }

    /// The version recorded in the model's version object
    pub fn version(&self) -> Option<VersionString> {
        self.idf.version()
    }

    /// The number of objects, excluding the version object
    pub fn num_objects(&self) -> usize {
        self.idf.num_objects()
    }

    /// All objects, excluding the version object
    pub fn objects(&self) -> &[IdfObject] {
        self.idf.objects()
    }

    /// Objects of the given type (case-insensitive)
    pub fn objects_by_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a IdfObject> {
        self.idf.objects_by_type(type_name)
    }

    /// The object with the given handle, if any
    pub fn object_by_handle(&self, handle: &Handle) -> Option<&IdfObject> {
        self.idf.object_by_handle(handle)
    }

    /// Objects whose name matches `name` (case-insensitive)
    pub fn objects_by_name(&self, name: &str) -> Vec<&IdfObject> {
        self.idf.objects_by_name(name)
    }

    /// The underlying file
    pub fn idf_file(&self) -> &IdfFile {
        &self.idf
    }

    /// Convert into the underlying file
    pub fn into_idf_file(self) -> IdfFile {
        self.idf
    }

    /// The model in OSM text format
    pub fn to_idf_string(&self) -> String {
        self.idf.to_idf_string()
    }

    /// Write the model to `path`, failing if it exists unless `overwrite` is set
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        self.idf.save(path, overwrite)
    }
}

/// Check that no two objects share a handle
fn check_unique_handles(idf: &IdfFile) -> Result<()> {
    let mut handles = HashSet::new();
    for object in idf.version_object().into_iter().chain(idf.objects()) {
        let Some(handle) = object.handle() else {
            continue;
        };

        if !handles.insert(handle) {
            bail!(
                "Duplicate handle {handle} found on object of type '{}'",
                object.type_name()
            );
        }
    }

    Ok(())
}

/// Give later objects with a name already used by an object of the same type a numbered suffix.
///
/// Objects named with a handle (e.g. connections) are left alone.
fn fix_name_conflicts(idf: &mut IdfFile, warn: &mut dyn FnMut(String)) {
    let mut used_names: HashMap<UniCase<String>, HashSet<UniCase<String>>> = HashMap::new();
    for object in idf.objects() {
        if let Some(name) = object.name().filter(|name| !Handle::is_handle_like(name)) {
            used_names
                .entry(UniCase::new(object.type_name().to_string()))
                .or_default()
                .insert(UniCase::new(name.to_string()));
        }
    }

    let mut seen: HashMap<UniCase<String>, HashSet<UniCase<String>>> = HashMap::new();
    for object in idf.objects_mut() {
        let Some(name) = object
            .name()
            .filter(|name| !Handle::is_handle_like(name))
            .map(str::to_string)
        else {
            continue;
        };

        let type_name = UniCase::new(object.type_name().to_string());
        let seen = seen.entry(type_name.clone()).or_default();
        if seen.insert(UniCase::new(name.clone())) {
            continue;
        }

        let used = used_names.entry(type_name).or_default();
        let new_name = (1..)
            .map(|i| format!("{name} {i}"))
            .find(|candidate| !used.contains(&UniCase::new(candidate.clone())))
            .expect("Ran out of suffixes");
        used.insert(UniCase::new(new_name.clone()));
        seen.insert(UniCase::new(new_name.clone()));

        warn(format!(
            "Object of type '{}' named '{name}' was renamed to '{new_name}' to resolve a name \
            conflict",
            object.type_name()
        ));
        object.set_name(new_name);
    }
}

/// Report fields holding handles which do not belong to any object.
///
/// The UUID and version UUID of a component's data are identifiers, not pointers.
fn check_pointers(idf: &IdfFile, warn: &mut dyn FnMut(String)) {
    let handles: HashSet<Handle> = idf
        .version_object()
        .into_iter()
        .chain(idf.objects())
        .filter_map(IdfObject::handle)
        .collect();

    for object in idf.objects() {
        let first_pointer = if object.is_type(COMPONENT_DATA_TYPE) {
            COMPONENT_PRIMARY_OBJECT_FIELD
        } else {
            1
        };

        for (index, value) in object.fields().iter().enumerate().skip(first_pointer) {
            if !Handle::is_handle_like(value) {
                continue;
            }

            let resolves = value
                .parse::<Handle>()
                .is_ok_and(|handle| handles.contains(&handle));
            if !resolves {
                warn(format!(
                    "Field {index} of object of type '{}' named '{}' points to missing object \
                    {value}",
                    object.type_name(),
                    object.name().unwrap_or_default()
                ));
            }
        }
    }
}

/// A model loaded from a component file, along with its primary object
#[derive(Debug, Clone)]
pub struct Component {
    model: Model,
    primary: Handle,
}

impl Component {
    /// Build a component from a model containing a component data object.
    ///
    /// The first entry of the component data's contents is the primary object.
    pub fn from_model(model: Model) -> Result<Self> {
        let data = model
            .objects_by_type(COMPONENT_DATA_TYPE)
            .next()
            .with_context(|| format!("Component has no {COMPONENT_DATA_TYPE} object"))?;
        let primary: Handle = data
            .get_non_empty(COMPONENT_PRIMARY_OBJECT_FIELD)
            .context("Component has no contents")?
            .parse()
            .context("Invalid handle for the primary object of component")?;
        if model.object_by_handle(&primary).is_none() {
            bail!("Primary object {primary} of component not found");
        }

        Ok(Self { model, primary })
    }

    /// The component's model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Convert into the component's model
    pub fn into_model(self) -> Model {
        self.model
    }

    /// The object describing the component
    pub fn component_data(&self) -> &IdfObject {
        self.model
            .objects_by_type(COMPONENT_DATA_TYPE)
            .next()
            .expect("Component data checked on creation")
    }

    /// The component's primary object
    pub fn primary_object(&self) -> &IdfObject {
        self.model
            .object_by_handle(&self.primary)
            .expect("Primary object checked on creation")
    }
}
