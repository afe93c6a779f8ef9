//! Updates to 2.6.1 and 2.6.2.
use crate::handle::Handle;
use crate::idf::IdfObject;
use crate::translator::UpdateContext;
use crate::translator::remap::insert_fields;
use anyhow::Result;
use std::collections::HashMap;

/// The field of a thermal zone holding its return air connection
const ZONE_RETURN_AIR_FIELD: usize = 12;

/// The port of a port list which connections attach to
const PORT_LIST_PORT: i64 = 3;

/// The return air port of each thermal zone moves to a new port list
pub fn update_to_2_6_1(context: &mut UpdateContext) -> Result<()> {
    let source = context.source();

    // Handles are assigned up front so that connections written before their zone are fixed too
    let zone_port_lists: HashMap<&str, Handle> = source
        .objects_by_type("OS:ThermalZone")
        .filter_map(|zone| zone.get(0))
        .map(|handle| (handle, context.new_handle()))
        .collect();
    let connection_port_lists: HashMap<&str, Handle> = source
        .objects_by_type("OS:ThermalZone")
        .filter_map(|zone| {
            let connection = zone.get_non_empty(ZONE_RETURN_AIR_FIELD)?;
            Some((connection, *zone_port_lists.get(zone.get(0)?)?))
        })
        .collect();

    let port_list_layout = context.target_layout("OS:PortList");
    for object in source.objects() {
        match object.type_name() {
            "OS:ThermalZone" => {
                let Some(handle) = object.get(0).and_then(|h| zone_port_lists.get(h)) else {
                    context.copy(object);
                    continue;
                };

                let mut port_list =
                    IdfObject::with_fields("OS:PortList", [handle.to_string(), String::new()]);
                port_list.set(2, object.get(0).unwrap_or_default());
                if let Some(connection) = object.get_non_empty(ZONE_RETURN_AIR_FIELD) {
                    port_list.push_extensible_group(&port_list_layout, [connection]);
                }

                let mut zone = object.clone();
                zone.set(ZONE_RETURN_AIR_FIELD, handle.to_string());
                context.add_refactored(object, zone);
                context.add_new(port_list);
            }
            "OS:Connection" => {
                let Some(port_list) = object.get(0).and_then(|h| connection_port_lists.get(h))
                else {
                    context.copy(object);
                    continue;
                };

                let mut connection = object.clone();
                connection.set(2, port_list.to_string());
                connection.set_i64(3, PORT_LIST_PORT);
                context.add_refactored(object, connection);
            }
            _ => context.copy(object),
        }
    }

    Ok(())
}

/// New required fields for research special evaporative coolers and the load distribution scheme
/// of zone equipment lists
pub fn update_to_2_6_2(context: &mut UpdateContext) -> Result<()> {
    for object in context.source().objects() {
        match object.type_name() {
            "OS:EvaporativeCooler:Direct:ResearchSpecial" => {
                // Extreme values behave like the old blanks, i.e. no control
                let mut cooler = object.clone();
                for (index, default) in [(14, -99.0), (15, 99.0), (16, 99.0)] {
                    if cooler.get_f64(index).is_none() {
                        cooler.set_f64(index, default);
                    }
                }
                context.add_refactored(object, cooler);
            }
            "OS:ZoneHVAC:EquipmentList" => {
                // Load Distribution Scheme
                context.add_refactored(object, insert_fields(object, 3, &[""]));
            }
            _ => context.copy(object),
        }
    }

    Ok(())
}
