//! Updates to 2.9.0 and 2.9.1.
use super::v2_7::new_connection;
use crate::handle::Handle;
use crate::idf::{IdfFile, IdfObject};
use crate::translator::UpdateContext;
use crate::translator::remap::{insert_fields, remap_fields};
use anyhow::Result;
use float_cmp::approx_eq;
use std::collections::HashMap;
use unicase::UniCase;

/// The name of the schedule used as the applicability schedule of night cycle managers
const ALWAYS_ON_DISCRETE: &str = "Always On Discrete";

/// The plenum or mixer inlet connection of a VAV changeover bypass unit
const BYPASS_PLENUM_INLET_FIELD: usize = 24;

/// Create a constant schedule
fn new_constant_schedule(handle: Handle, name: &str, limits: &str, value: f64) -> IdfObject {
    let mut schedule =
        IdfObject::with_fields("OS:Schedule:Constant", [handle.to_string(), name.into()]);
    schedule.set(2, limits);
    schedule.set_f64(3, value);
    schedule
}

/// The names of all named objects, keyed by handle
fn names_by_handle(source: &IdfFile) -> HashMap<Handle, &str> {
    source
        .objects()
        .iter()
        .filter_map(|object| Some((object.handle()?, object.name()?)))
        .collect()
}

/// Replace the sequential load fractions of a zone equipment list with constant schedules
fn update_equipment_list(
    context: &mut UpdateContext,
    object: &IdfObject,
    names: &HashMap<Handle, &str>,
) {
    let source_layout = context.source_layout(object.type_name());
    let target_layout = context.target_layout(object.type_name());

    let mut list = IdfObject::with_fields(
        object.type_name(),
        object
            .fields()
            .iter()
            .take(source_layout.num_fields)
            .cloned(),
    );
    list.set_comment(object.comment());

    for group in object.extensible_groups(&source_layout) {
        let mut new_group: Vec<String> = group.iter().take(3).cloned().collect();
        for index in 3..5 {
            let Some(fraction) = group.get(index).and_then(|value| value.trim().parse::<f64>().ok())
            else {
                new_group.push(String::new());
                continue;
            };

            let equipment_name = group
                .first()
                .and_then(|handle| handle.parse::<Handle>().ok())
                .and_then(|handle| names.get(&handle))
                .map_or_else(|| "Name".to_string(), |name| format!("{name} {index}"));
            let handle = context.new_handle();
            context.add_new(new_constant_schedule(handle, &equipment_name, "", fraction));
            new_group.push(handle.to_string());
        }
        list.push_extensible_group(&target_layout, new_group);
    }

    context.add_refactored(object, list);
}

/// Add a plenum or mixer inlet node and connection to a VAV changeover bypass unit
fn update_changeover_bypass(context: &mut UpdateContext, object: &IdfObject) {
    let node_handle = context.new_handle();
    let connection_handle = context.new_handle();

    let mut unit = object.clone();
    let connection = new_connection(
        connection_handle,
        object.get(0).unwrap_or_default(),
        BYPASS_PLENUM_INLET_FIELD as i64,
        &node_handle.to_string(),
        2,
    );

    let mut node = IdfObject::with_fields("OS:Node", [node_handle.to_string()]);
    node.set_name(format!(
        "{} Plenum or Mixer Inlet Node",
        object.name().unwrap_or_default()
    ));
    node.set(2, connection_handle.to_string());

    unit.set(BYPASS_PLENUM_INLET_FIELD, connection_handle.to_string());
    // Minimum Runtime Before Operating Mode Change
    unit.set_f64(25, 0.0);

    context.add_new(node);
    context.add_new(connection);
    context.add_refactored(object, unit);
}

/// New design power fields for headered pumps, starting at `first_new_field`
fn update_headered_pumps(context: &mut UpdateContext, object: &IdfObject, first_new_field: usize) {
    let mut pumps = object.clone();
    pumps.set(first_new_field, "PowerPerFlowPerPressure");
    pumps.set_f64(first_new_field + 1, 348_701.1);
    pumps.set_f64(first_new_field + 2, 1.282_051_282);

    let subcategory = first_new_field + 3;
    if pumps.get_non_empty(subcategory).is_none() {
        pumps.set(subcategory, "General");
    }

    context.add_refactored(object, pumps);
}

/// Field shifts for several objects, sequential load fraction schedules for zone equipment lists
/// and new nodes for VAV changeover bypass units
pub fn update_to_2_9_0(context: &mut UpdateContext) -> Result<()> {
    let names = names_by_handle(context.source());
    for object in context.source().objects() {
        match object.type_name() {
            "OS:Foundation:Kiva" => {
                context.add_refactored(object, insert_fields(object, 2, &[""]));
            }
            "OS:Schedule:FixedInterval" => {
                context.add_refactored(object, insert_fields(object, 3, &[""]));
            }
            "OS:ZoneHVAC:EquipmentList" => update_equipment_list(context, object, &names),
            "OS:ThermalStorage:Ice:Detailed" => {
                let mut storage = remap_fields(object, |i| match i {
                    0..6 => Some(i),
                    6 => Some(7),
                    _ => Some(i + 2),
                });
                storage.set(6, "FractionDischargedLMTD");
                storage.set(8, "FractionChargedLMTD");
                context.add_refactored(object, storage);
            }
            "OS:AirLoopHVAC:UnitaryHeatCool:VAVChangeoverBypass" => {
                update_changeover_bypass(context, object);
            }
            "OS:HeaderedPumps:ConstantSpeed" => update_headered_pumps(context, object, 15),
            "OS:HeaderedPumps:VariableSpeed" => update_headered_pumps(context, object, 20),
            _ => context.copy(object),
        }
    }

    Ok(())
}

/// Find an existing "Always On Discrete" schedule
fn find_always_on_discrete(context: &UpdateContext) -> Option<Handle> {
    context
        .source()
        .objects()
        .iter()
        .filter(|object| object.type_name() == "OS:Schedule:Constant")
        .filter(|object| {
            object
                .get(1)
                .is_some_and(|name| UniCase::new(name) == UniCase::new(ALWAYS_ON_DISCRETE))
        })
        .filter(|object| {
            object
                .get_f64(3)
                .is_some_and(|value| approx_eq!(f64, value, 1.0))
        })
        .find_map(IdfObject::handle)
}

/// Night cycle availability managers gain an applicability schedule
pub fn update_to_2_9_1(context: &mut UpdateContext) -> Result<()> {
    // Components are inserted into an existing model, which provides its own schedule
    let schedule = if context.is_component() {
        None
    } else if let Some(handle) = find_always_on_discrete(context) {
        Some(handle)
    } else {
        let schedule_handle = context.new_handle();
        let limits_handle = context.new_handle();

        let mut limits = IdfObject::with_fields(
            "OS:ScheduleTypeLimits",
            [
                limits_handle.to_string(),
                format!("{ALWAYS_ON_DISCRETE} Limits"),
            ],
        );
        limits.set_f64(2, 0.0);
        limits.set_f64(3, 1.0);
        limits.set(4, "Discrete");
        limits.set(5, "Availability");

        context.add_new(new_constant_schedule(
            schedule_handle,
            ALWAYS_ON_DISCRETE,
            &limits_handle.to_string(),
            1.0,
        ));
        context.add_new(limits);
        Some(schedule_handle)
    };

    for object in context.source().objects() {
        match (object.type_name(), schedule) {
            ("OS:AvailabilityManager:NightCycle", Some(schedule)) => {
                let mut manager = object.clone();
                manager.set(2, schedule.to_string());
                context.add_refactored(object, manager);
            }
            _ => context.copy(object),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fixture::{h, model_text, osm_object};
    use crate::idf::{IdfFile, IdfObject};
    use crate::translator::updates::run_step;
    use rstest::rstest;

    #[test]
    fn test_field_shifts() {
        let body = osm_object("OS:Foundation:Kiva", &[&h(1), "Kiva", "0.5", "x"])
            + &osm_object(
                "OS:Schedule:FixedInterval",
                &[&h(2), "Sch", "", "Yes", "60"],
            );
        let (output, _) = run_step("2.9.0", &model_text("2.8.1", &body), false);
        assert_eq!(output.objects()[0].fields()[1..], ["Kiva", "", "0.5", "x"]);
        assert_eq!(output.objects()[1].fields()[2..], ["", "", "Yes", "60"]);
    }

    #[test]
    fn test_equipment_list_fractions() {
        let body = osm_object("OS:ZoneHVAC:Baseboard:Convective:Electric", &[&h(2), "BB"])
            + &osm_object(
                "OS:ZoneHVAC:EquipmentList",
                &[
                    &h(1),
                    "List",
                    &h(3),
                    "SequentialLoad",
                    &h(2),
                    "1",
                    "1",
                    "0.5",
                    "",
                    &h(4),
                    "2",
                    "2",
                    "",
                    "0.25",
                ],
            );
        let (output, log) = run_step("2.9.0", &model_text("2.8.1", &body), false);

        assert_eq!(output.num_objects(), 4);
        assert_eq!(log.new.len(), 2);
        let schedules: Vec<&IdfObject> = output
            .objects_by_type("OS:Schedule:Constant")
            .collect();
        assert_eq!(schedules[0].name(), Some("BB 3"));
        assert_eq!(schedules[0].get(3), Some("0.5"));
        assert_eq!(schedules[1].name(), Some("Name"));
        assert_eq!(schedules[1].get(3), Some("0.25"));

        let list = output.objects_by_name("List")[0];
        assert_eq!(list.get(7), schedules[0].get(0));
        assert_eq!(list.get(8), Some(""));
        assert_eq!(list.get(12), Some(""));
        assert_eq!(list.get(13), schedules[1].get(0));
    }

    #[test]
    fn test_names_by_handle() {
        let body =
            osm_object("OS:Node", &[&h(1), "Node 1"]) + &osm_object("OS:Connection", &[&h(2)]);
        let source = IdfFile::parse(&model_text("2.8.1", &body)).unwrap();
        let names = super::names_by_handle(&source);
        assert_eq!(names.len(), 1);
        assert_eq!(names.get(&h(1).parse().unwrap()), Some(&"Node 1"));
    }

    #[test]
    fn test_ice_storage_specifications() {
        let mut fields: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        fields[0] = h(1);
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        let body = osm_object("OS:ThermalStorage:Ice:Detailed", &fields);
        let (output, _) = run_step("2.9.0", &model_text("2.8.1", &body), false);
        assert_eq!(
            output.objects()[0].fields()[5..],
            [
                "5",
                "FractionDischargedLMTD",
                "6",
                "FractionChargedLMTD",
                "7",
                "8",
                "9"
            ]
        );
    }

    #[test]
    fn test_changeover_bypass() {
        let body = osm_object(
            "OS:AirLoopHVAC:UnitaryHeatCool:VAVChangeoverBypass",
            &[&h(1), "Bypass"],
        );
        let (output, log) = run_step("2.9.0", &model_text("2.8.1", &body), false);
        assert_eq!(output.num_objects(), 3);
        assert_eq!(log.new.len(), 2);

        let node = output.objects_by_type("OS:Node").next().unwrap();
        assert_eq!(node.name(), Some("Bypass Plenum or Mixer Inlet Node"));
        let connection = output.objects_by_type("OS:Connection").next().unwrap();
        assert_eq!(connection.get(2), Some(h(1).as_str()));
        assert_eq!(connection.get(3), Some("24"));
        assert_eq!(connection.get(4), node.get(0));
        assert_eq!(connection.get(5), Some("2"));
        assert_eq!(node.get(2), connection.get(0));

        let unit = output.objects_by_name("Bypass")[0];
        assert_eq!(unit.get(24), connection.get(0));
        assert_eq!(unit.get(25), Some("0"));
    }

    #[rstest]
    #[case("OS:HeaderedPumps:ConstantSpeed", 15, "", "General")]
    #[case("OS:HeaderedPumps:VariableSpeed", 20, "Pumps", "Pumps")]
    fn test_headered_pumps(
        #[case] type_name: &str,
        #[case] first_new_field: usize,
        #[case] subcategory: &str,
        #[case] expected: &str,
    ) {
        let handle = h(1);
        let mut fields = vec![""; first_new_field + 4];
        fields[0] = handle.as_str();
        fields[first_new_field + 3] = subcategory;
        let body = osm_object(type_name, &fields);
        let (output, _) = run_step("2.9.0", &model_text("2.8.1", &body), false);
        let pumps = &output.objects()[0];
        assert_eq!(pumps.get(first_new_field), Some("PowerPerFlowPerPressure"));
        assert_eq!(pumps.get(first_new_field + 1), Some("348701.1"));
        assert_eq!(pumps.get(first_new_field + 2), Some("1.282051282"));
        assert_eq!(pumps.get(first_new_field + 3), Some(expected));
    }

    #[test]
    fn test_night_cycle_creates_schedule() {
        let body = osm_object("OS:AvailabilityManager:NightCycle", &[&h(1), "NC", ""]);
        let (output, log) = run_step("2.9.1", &model_text("2.9.0", &body), false);
        assert_eq!(output.num_objects(), 3);
        assert_eq!(log.new.len(), 2);

        let schedule = output.objects_by_name("Always On Discrete")[0];
        let limits = output.objects_by_type("OS:ScheduleTypeLimits").next().unwrap();
        assert_eq!(schedule.get(2), limits.get(0));
        assert_eq!(schedule.get(3), Some("1"));
        assert_eq!(
            limits.fields()[1..],
            ["Always On Discrete Limits", "0", "1", "Discrete", "Availability"]
        );

        let manager = output.objects_by_name("NC")[0];
        assert_eq!(manager.get(2), schedule.get(0));
    }

    #[test]
    fn test_night_cycle_existing_schedule() {
        let body = osm_object("OS:Schedule:Constant", &[&h(2), "always on discrete", "", "1.0"])
            + &osm_object("OS:AvailabilityManager:NightCycle", &[&h(1), "NC", ""]);
        let (output, log) = run_step("2.9.1", &model_text("2.9.0", &body), false);
        assert_eq!(output.num_objects(), 2);
        assert!(log.new.is_empty());
        assert_eq!(output.objects_by_name("NC")[0].get(2), Some(h(2).as_str()));
    }

    #[test]
    fn test_night_cycle_component() {
        let body = osm_object("OS:AvailabilityManager:NightCycle", &[&h(1), "NC", ""]);
        let (output, log) = run_step("2.9.1", &model_text("2.9.0", &body), true);
        assert_eq!(output.num_objects(), 1);
        assert!(log.new.is_empty());
        assert!(log.refactored.is_empty());
    }
}
