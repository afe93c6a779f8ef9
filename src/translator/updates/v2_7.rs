//! Updates to 2.7.0, 2.7.1 and 2.7.2.
use crate::handle::Handle;
use crate::idf::IdfObject;
use crate::translator::UpdateContext;
use crate::translator::remap::{change_type, insert_fields};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use unicase::UniCase;

/// The air inlet connection of an uncontrolled air terminal
const TERMINAL_INLET_FIELD: usize = 3;

/// Create a connection from `source` (at `source_port`) to `target` (at `target_port`).
///
/// Like connections created by the model library, the connection is named after its handle.
pub(super) fn new_connection(
    handle: Handle,
    source: &str,
    source_port: i64,
    target: &str,
    target_port: i64,
) -> IdfObject {
    let handle = handle.to_string();
    let mut connection =
        IdfObject::with_fields("OS:Connection", [handle.as_str(), handle.as_str()]);
    connection.set(2, source);
    connection.set_i64(3, source_port);
    connection.set(4, target);
    connection.set_i64(5, target_port);
    connection
}

/// Uncontrolled air terminals are replaced by constant volume terminals without reheat, with a new
/// node between the zone splitter and the terminal
pub fn update_to_2_7_0(context: &mut UpdateContext) -> Result<()> {
    let source = context.source();
    let terminal_inlets: HashSet<&str> = source
        .objects()
        .iter()
        .filter(|object| object.type_name() == "OS:AirTerminal:SingleDuct:Uncontrolled")
        .filter_map(|terminal| terminal.get_non_empty(TERMINAL_INLET_FIELD))
        .collect();

    // Map of terminal inlet connection handles to the node which replaces the terminal as target
    let mut inlet_nodes: HashMap<&str, Handle> = HashMap::new();
    for object in source.objects() {
        match object.type_name() {
            "OS:AirTerminal:SingleDuct:Uncontrolled" => {
                let mut terminal =
                    change_type(object, "OS:AirTerminal:SingleDuct:ConstantVolume:NoReheat");
                if let Some(old_connection) = object.get_non_empty(TERMINAL_INLET_FIELD) {
                    let node_handle = context.new_handle();
                    let connection_handle = context.new_handle();
                    let terminal_handle = object.get(0).unwrap_or_default();

                    let mut node = IdfObject::with_fields("OS:Node", [node_handle.to_string()]);
                    node.set_name(format!("{} Inlet Node", object.name().unwrap_or_default()));
                    node.set(2, old_connection);
                    node.set(3, connection_handle.to_string());

                    let connection = new_connection(
                        connection_handle,
                        &node_handle.to_string(),
                        3,
                        terminal_handle,
                        3,
                    );
                    terminal.set(TERMINAL_INLET_FIELD, connection_handle.to_string());
                    inlet_nodes.insert(old_connection, node_handle);

                    context.add_new(node);
                    context.add_new(connection);
                }
                context.add_refactored(object, terminal);
            }
            "OS:Connection" => {
                // Connections to terminals are written in the second pass
                if !object.get(0).is_some_and(|h| terminal_inlets.contains(h)) {
                    context.copy(object);
                }
            }
            "OS:Building" => {
                // Standards Template
                context.add_refactored(object, insert_fields(object, 10, &[""]));
            }
            "OS:SpaceType" => {
                // Standards Template
                context.add_refactored(object, insert_fields(object, 6, &[""]));
            }
            _ => context.copy(object),
        }
    }

    // Terminals may come after their connections in the file, so these are fixed once all the new
    // nodes exist
    for object in source.objects() {
        if object.type_name() != "OS:Connection" {
            continue;
        }
        let Some(node) = object.get(0).and_then(|handle| inlet_nodes.get(handle)) else {
            continue;
        };

        let mut connection = object.clone();
        connection.set(4, node.to_string());
        connection.set_i64(5, 2);
        context.add_refactored(object, connection);
    }

    Ok(())
}

/// The `Latent` load type of system sizing objects is no longer supported
pub fn update_to_2_7_1(context: &mut UpdateContext) -> Result<()> {
    for object in context.source().objects() {
        let is_latent = object.type_name() == "OS:Sizing:System"
            && object
                .get(2)
                .is_some_and(|load| UniCase::new(load) == UniCase::new("Latent"));
        if !is_latent {
            context.copy(object);
            continue;
        }

        let mut sizing = object.clone();
        sizing.set(2, "Total");
        context.warn(format!(
            "OS:Sizing:System does not support 'Latent' as 'Type of Load To Size On'. It was \
            replaced by 'Total' instead for object with handle '{}'. Please review carefully.",
            object.get(0).unwrap_or_default()
        ));
        context.add_refactored(object, sizing);
    }

    Ok(())
}

/// Remove the `file://` prefix of a URL field, returning the rewritten object if it had one
fn strip_file_url(object: &IdfObject, index: usize) -> Option<IdfObject> {
    let path = object.get(index)?.strip_prefix("file://")?;
    let mut new_object = object.clone();
    new_object.set(index, path);
    Some(new_object)
}

/// File paths are stored as plain paths rather than URLs, and zone equipment lists gain sequential
/// load fractions
pub fn update_to_2_7_2(context: &mut UpdateContext) -> Result<()> {
    let source_layout = context.source_layout("OS:ZoneHVAC:EquipmentList");
    let target_layout = context.target_layout("OS:ZoneHVAC:EquipmentList");

    for object in context.source().objects() {
        let url_field = match object.type_name() {
            "OS:WeatherFile" => Some(10),
            "OS:Construction:WindowDataFile" | "OS:Luminaire:Definition" => Some(2),
            _ => None,
        };
        if let Some(index) = url_field {
            match strip_file_url(object, index) {
                Some(new_object) => context.add_refactored(object, new_object),
                None => context.copy(object),
            }
            continue;
        }

        if object.type_name() == "OS:ZoneHVAC:EquipmentList" {
            // The new group fields have defaults, so are left empty
            let mut list = IdfObject::with_fields(
                object.type_name(),
                object.fields().iter().take(source_layout.num_fields).cloned(),
            );
            list.set_comment(object.comment());
            for group in object.extensible_groups(&source_layout) {
                list.push_extensible_group(&target_layout, group.iter().map(String::as_str));
            }
            context.add_refactored(object, list);
            continue;
        }

        context.copy(object);
    }

    Ok(())
}
