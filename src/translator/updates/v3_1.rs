//! Update to 3.1.0.
use crate::idf::{IdfFile, IdfObject};
use crate::translator::UpdateContext;
use crate::translator::remap::{
    collapse_spaces, insert_fields, output_variable_renames, remap_fields, remove_fields,
};
use anyhow::Result;
use log::trace;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// The shading control field of a sub surface
const SUB_SURFACE_SHADING_CONTROL_FIELD: usize = 7;

/// The new name of a renamed output variable or meter, if it was renamed.
///
/// Runs of spaces are collapsed before the lookup.
fn renamed_variable(name: &str) -> Option<&'static str> {
    output_variable_renames().get(&collapse_spaces(name))
}

/// Patterns for the fuel names which changed in meter names, with their replacements
fn meter_fuel_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)\bFuelOil_1\b", "FuelOilNo1"),
            (r"(?i)\bFuelOil_2\b", "FuelOilNo2"),
            (r"(?i)\bGas\b", "NaturalGas"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("Invalid regex"), replacement))
        .collect()
    })
}

/// Replace the old fuel names in a meter name
fn rename_meter(name: &str) -> String {
    meter_fuel_patterns()
        .iter()
        .fold(name.to_string(), |name, (pattern, replacement)| {
            pattern.replace_all(&name, *replacement).into_owned()
        })
}

/// Rename the output variable at `index`, if it was renamed
fn update_variable_name(context: &mut UpdateContext, object: &IdfObject, index: usize) {
    let Some(new_name) = object.get(index).and_then(renamed_variable) else {
        context.copy(object);
        return;
    };

    trace!(
        "Replacing {} with {new_name} for '{}'",
        object.get(index).unwrap_or_default(),
        object.name().unwrap_or_default()
    );
    let mut new_object = object.clone();
    new_object.set(index, new_name);
    context.add_refactored(object, new_object);
}

/// Rename the output variables in the extensible groups of a custom meter
fn update_custom_meter(context: &mut UpdateContext, object: &IdfObject) {
    let layout = context.source_layout(object.type_name());
    let mut meter = object.clone();
    let mut renamed = false;
    for group in 0..object.num_extensible_groups(&layout) {
        let index = layout.num_fields + group * layout.group_size + 1;
        if let Some(new_name) = object.get(index).and_then(renamed_variable) {
            meter.set(index, new_name);
            renamed = true;
        }
    }

    if renamed {
        context.add_refactored(object, meter);
    } else {
        context.copy(object);
    }
}

/// The handles of the sub surfaces pointing at each shading control, in file order
fn shading_control_sub_surfaces(source: &IdfFile) -> HashMap<&str, Vec<&str>> {
    let mut control_sub_surfaces: HashMap<&str, Vec<&str>> = HashMap::new();
    for sub_surface in source.objects_by_type("OS:SubSurface") {
        if let (Some(control), Some(handle)) = (
            sub_surface.get_non_empty(SUB_SURFACE_SHADING_CONTROL_FIELD),
            sub_surface.get(0),
        ) {
            control_sub_surfaces.entry(control).or_default().push(handle);
        }
    }

    control_sub_surfaces
}

/// New fields for several HVAC objects, output variable renames and shading controls which list
/// their sub surfaces
pub fn update_to_3_1_0(context: &mut UpdateContext) -> Result<()> {
    let control_sub_surfaces = shading_control_sub_surfaces(context.source());
    let shading_control_layout = context.target_layout("OS:ShadingControl");
    for object in context.source().objects() {
        match object.type_name() {
            "OS:AvailabilityManager:HybridVentilation" => {
                // Minimum HVAC Operation Time and Minimum Ventilation Time
                let mut manager = object.clone();
                manager.set_f64(17, 0.0);
                manager.set_f64(18, 0.0);
                context.add_refactored(object, manager);
            }
            "OS:AirLoopHVAC" => {
                // Design Return Air Flow Fraction of Supply Air Flow
                context.add_refactored(object, insert_fields(object, 6, &["1"]));
            }
            "OS:Construction:InternalSource" | "OS:ZoneHVAC:LowTemperatureRadiant:Electric" => {
                context.add_refactored(object, insert_fields(object, 6, &[""]));
            }
            "OS:WaterHeater:HeatPump" => {
                // Minimum Inlet Air Temperature for Compressor Operation
                context.add_refactored(object, insert_fields(object, 16, &["48.89"]));
            }
            "OS:ZoneHVAC:LowTemperatureRadiant:ConstantFlow" => {
                let radiant = remap_fields(object, |i| match i {
                    0..4 => Some(i),
                    4 => Some(5),
                    5 => Some(7),
                    6 => Some(9),
                    _ => Some(i + 4),
                });
                context.add_refactored(object, radiant);
            }
            "OS:ZoneHVAC:LowTemperatureRadiant:VariableFlow" => {
                let radiant = remap_fields(object, |i| match i {
                    0..6 => Some(i),
                    6 => Some(7),
                    7 => Some(9),
                    8 => Some(11),
                    _ => Some(i + 4),
                });
                context.add_refactored(object, radiant);
            }
            "OS:Output:Meter" => {
                let name = object.get(1).unwrap_or_default();
                let new_name = rename_meter(name);
                if new_name == name {
                    context.copy(object);
                } else {
                    let mut meter = object.clone();
                    meter.set_name(new_name);
                    context.add_refactored(object, meter);
                }
            }
            "OS:Output:Variable" | "OS:EnergyManagementSystem:Sensor" => {
                update_variable_name(context, object, 3);
            }
            "OS:EnergyManagementSystem:Actuator" => {
                // Actuated Component Control Type
                update_variable_name(context, object, 4);
            }
            "OS:Meter:Custom" | "OS:Meter:CustomDecrement" => update_custom_meter(context, object),
            "OS:ShadingControl" => {
                let mut control = object.clone();
                // Multiple Surface Control Type
                control.set(13, "Sequential");
                let sub_surfaces = object
                    .get(0)
                    .and_then(|handle| control_sub_surfaces.get(handle));
                for sub_surface in sub_surfaces.into_iter().flatten() {
                    control.push_extensible_group(&shading_control_layout, [*sub_surface]);
                }
                context.add_refactored(object, control);
            }
            "OS:SubSurface" => {
                context.add_refactored(
                    object,
                    remove_fields(object, SUB_SURFACE_SHADING_CONTROL_FIELD, 1),
                );
            }
            _ => context.copy(object),
        }
    }

    Ok(())
}
