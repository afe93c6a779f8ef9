//! Updates to 3.0.0 and 3.0.1.
use crate::idf::IdfObject;
use crate::translator::UpdateContext;
use crate::translator::remap::{RenameMap, insert_fields, remap_fields, remove_fields};
use anyhow::Result;
use float_cmp::approx_eq;
use log::trace;
use std::sync::OnceLock;
use unicase::UniCase;

/// Fields holding a fuel type, for each object type
const FUEL_TYPE_FIELDS: &[(&str, &[usize])] = &[
    ("OS:OtherEquipment", &[6]),
    ("OS:Exterior:FuelEquipment", &[4]),
    ("OS:AirConditioner:VariableRefrigerantFlow", &[67]),
    ("OS:Boiler:Steam", &[2]),
    ("OS:Coil:Cooling:DX:MultiSpeed", &[16]),
    ("OS:Coil:Heating:Gas", &[11]),
    ("OS:Coil:Heating:DX:MultiSpeed", &[16]),
    ("OS:WaterHeater:Mixed", &[11, 15, 18]),
    ("OS:WaterHeater:Stratified", &[17, 20, 24]),
    ("OS:Generator:MicroTurbine", &[13]),
    ("OS:LifeCycleCost:UsePriceEscalation", &[2]),
    ("OS:Meter:Custom", &[2]),
    ("OS:Meter:CustomDecrement", &[2]),
    ("OS:EnergyManagementSystem:MeteredOutputVariable", &[5]),
];

/// The fuel type field of a hot water boiler
const BOILER_FUEL_TYPE_FIELD: usize = 2;

/// The specific heat field of a material
const SPECIFIC_HEAT_FIELD: usize = 6;

/// The fuel type names which changed in 3.0.0
fn fuel_renames() -> &'static RenameMap {
    static RENAMES: OnceLock<RenameMap> = OnceLock::new();
    RENAMES.get_or_init(|| {
        [
            ("FuelOil#1", "FuelOilNo1"),
            ("FuelOil#2", "FuelOilNo2"),
            ("Gas", "NaturalGas"),
            ("PropaneGas", "Propane"),
        ]
        .into_iter()
        .collect()
    })
}

/// Rename the fuel types in `fields` of `object` in place, returning whether any were renamed
fn rename_fuel_types(object: &mut IdfObject, fields: &[usize]) -> bool {
    let mut renamed = false;
    for &index in fields {
        let Some(new_fuel) = object.get(index).and_then(|fuel| fuel_renames().get(fuel)) else {
            continue;
        };

        trace!(
            "Replacing {} with {new_fuel} at field {index} for '{}'",
            object.get(index).unwrap_or_default(),
            object.name().unwrap_or_default()
        );
        object.set(index, new_fuel);
        renamed = true;
    }

    renamed
}

/// Specific heats below the new minimum are raised, and the old default of 0.1 becomes the new
/// default
fn update_material(context: &mut UpdateContext, object: &IdfObject) {
    let mut material = object.clone();
    let name = object.name().unwrap_or_default();
    match object.get_f64(SPECIFIC_HEAT_FIELD) {
        Some(value) if approx_eq!(f64, value, 0.1) => {
            material.set_f64(SPECIFIC_HEAT_FIELD, 1400.0);
            context.warn(format!(
                "Updated Specific Heat for OS:Material named '{name}' from {value} to the new \
                default of 1400.0."
            ));
        }
        Some(value) if value < 100.0 => {
            material.set_f64(SPECIFIC_HEAT_FIELD, 100.0);
            context.warn(format!(
                "Updated Specific Heat for OS:Material named '{name}' from {value} to the new \
                minimum of 100.0."
            ));
        }
        Some(_) => {}
        None => material.set_f64(SPECIFIC_HEAT_FIELD, 1400.0),
    }

    context.add_refactored(object, material);
}

/// Flow rates and capacity fractions which became required
fn update_chiller(object: &IdfObject) -> IdfObject {
    let mut chiller = object.clone();

    // Reference Chilled Water Flow Rate
    if object.get_f64(6).is_none() {
        chiller.set(6, "Autosize");
    }

    // Design Heat Recovery Water Flow Rate: the old default of zero only stays if there is a heat
    // recovery inlet node
    let autosize_heat_recovery = match object.get_f64(24) {
        Some(flow) => flow == 0.0 && object.get_non_empty(25).is_none(),
        None => true,
    };
    if autosize_heat_recovery {
        chiller.set(24, "Autosize");
    }

    // Condenser Heat Recovery Relative Capacity Fraction
    if object.get_f64(31).is_none() {
        chiller.set_f64(31, 1.0);
    }

    chiller
}

/// Shadow calculations were restructured, with the calculation method replaced by an update
/// frequency method
fn update_shadow_calculation(object: &IdfObject) -> IdfObject {
    let mut shadow = IdfObject::new(object.type_name());
    shadow.set_comment(object.comment());
    for (index, value) in object.fields().iter().enumerate() {
        if value.is_empty() {
            continue;
        }

        match index {
            0 => shadow.set(0, value.as_str()),
            1 => shadow.set(3, value.as_str()),
            2 => shadow.set(4, value.as_str()),
            3 => shadow.set(5, value.as_str()),
            4 => shadow.set(7, value.as_str()),
            5 => {
                let method = if UniCase::new(value.as_str()) == UniCase::new("TimestepFrequency") {
                    "Timestep"
                } else {
                    "Periodic"
                };
                shadow.set(2, method);
            }
            _ => {}
        }
    }

    shadow.set(1, "PolygonClipping");
    shadow.set_i64(6, 512);
    for index in 8..=10 {
        shadow.set(index, "No");
    }

    shadow
}

/// Fuel type renames and new required fields for a number of objects
pub fn update_to_3_0_0(context: &mut UpdateContext) -> Result<()> {
    for object in context.source().objects() {
        if let Some((_, fields)) = FUEL_TYPE_FIELDS
            .iter()
            .find(|(type_name, _)| *type_name == object.type_name())
        {
            let mut new_object = object.clone();
            if rename_fuel_types(&mut new_object, fields) {
                context.add_refactored(object, new_object);
            } else {
                context.copy(object);
            }
            continue;
        }

        match object.type_name() {
            "OS:Material" => update_material(context, object),
            "OS:Schedule:Rule" => {
                // Apply Holiday
                context.add_refactored(object, remove_fields(object, 12, 1));
            }
            "OS:ZoneHVAC:UnitHeater" => {
                // Maximum Hot Water Flow Rate
                let mut heater = object.clone();
                if object.get_f64(9).is_none() {
                    heater.set(9, "autosize");
                }
                context.add_refactored(object, heater);
            }
            "OS:ClimateZones" => {
                // Active Institution and Active Year
                context.add_refactored(object, remove_fields(object, 1, 2));
            }
            "OS:Boiler:HotWater" => {
                // Design Water Outlet Temperature
                let mut boiler = remove_fields(object, 7, 1);
                rename_fuel_types(&mut boiler, &[BOILER_FUEL_TYPE_FIELD]);
                context.add_refactored(object, boiler);
            }
            "OS:Chiller:Electric:EIR" => context.add_refactored(object, update_chiller(object)),
            "OS:ShadowCalculation" => {
                context.add_refactored(object, update_shadow_calculation(object));
            }
            "OS:Sizing:Zone" => {
                // The zone air distribution effectiveness fields move to the end
                let sizing = remap_fields(object, |i| match i {
                    0..22 => Some(i),
                    22 | 23 => object.get_non_empty(i).map(|_| i + 4),
                    _ => Some(i - 2),
                });
                context.add_refactored(object, sizing);
            }
            "OS:ZoneHVAC:TerminalUnit:VariableRefrigerantFlow" => {
                // Supplemental heater temperatures
                let mut terminal = object.clone();
                terminal.set(24, "Autosize");
                terminal.set_f64(25, 21.0);
                context.add_refactored(object, terminal);
            }
            _ => context.copy(object),
        }
    }

    Ok(())
}

/// The default minimum outdoor temperature for compressor operation of DX cooling coils
const MINIMUM_OUTDOOR_TEMPERATURE: &str = "-25";

/// DX cooling coils gain a minimum outdoor temperature for compressor operation
pub fn update_to_3_0_1(context: &mut UpdateContext) -> Result<()> {
    for object in context.source().objects() {
        let coil = match object.type_name() {
            "OS:Coil:Cooling:DX:SingleSpeed"
            | "OS:Coil:Cooling:DX:TwoStageWithHumidityControlMode"
            | "OS:Coil:Cooling:DX:VariableSpeed" => {
                insert_fields(object, 15, &[MINIMUM_OUTDOOR_TEMPERATURE])
            }
            "OS:Coil:Cooling:DX:MultiSpeed" => {
                insert_fields(object, 7, &[MINIMUM_OUTDOOR_TEMPERATURE])
            }
            "OS:Coil:Cooling:DX:TwoSpeed" => {
                // Also gains an unloaded stage rated evaporator fan power
                let mut coil = remap_fields(object, |i| match i {
                    0..7 => Some(i),
                    7..22 => Some(i + 1),
                    _ => Some(i + 2),
                });
                coil.set_f64(7, 773.3);
                coil.set(23, MINIMUM_OUTDOOR_TEMPERATURE);
                coil
            }
            _ => {
                context.copy(object);
                continue;
            }
        };

        context.add_refactored(object, coil);
    }

    Ok(())
}
