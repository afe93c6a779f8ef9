//! Update to 3.2.0: multi-variable lookup tables are split into a lookup table and its
//! independent variables.
//!
//! The old table stores its data as flat points `x1, ..., xn, y`, in any order and possibly
//! sparse. The new lookup table holds one output value for every combination of independent
//! variable values (the first variable varying slowest), so every combination must be present in
//! the old data.
use crate::idf::IdfObject;
use crate::translator::UpdateContext;
use anyhow::{Result, bail, ensure};
use itertools::Itertools;
use std::collections::HashMap;
use unicase::UniCase;

const OLD_TYPE: &str = "OS:Table:MultiVariableLookup";
const LOOKUP_TYPE: &str = "OS:Table:Lookup";
const VARIABLE_TYPE: &str = "OS:Table:IndependentVariable";
const LIST_TYPE: &str = "OS:ModelObjectList";

// Fields of the old table
const INTERPOLATION_METHOD_FIELD: usize = 2;
const EXTERNAL_FILE_FIELD: usize = 6;
const NORMALIZATION_REFERENCE_FIELD: usize = 9;
const MINIMUM_OUTPUT_FIELD: usize = 20;
const MAXIMUM_OUTPUT_FIELD: usize = 21;
const OUTPUT_UNIT_TYPE_FIELD: usize = 27;
const NUM_VARIABLES_FIELD: usize = 28;
const FIRST_DATA_FIELD: usize = 29;

/// The most independent variables an old table can have
const MAX_VARIABLES: usize = 5;

/// Interpolation and extrapolation methods of the new independent variables
#[derive(Debug, PartialEq)]
struct Methods {
    interpolation: &'static str,
    extrapolation: &'static str,
    /// Whether the old method has no direct equivalent
    approximated: bool,
}

impl Methods {
    /// The methods equivalent to the old table's interpolation method
    fn from_old_method(method: &str) -> Self {
        let method = UniCase::new(method);
        if method == UniCase::new("LinearInterpolationOfTable") {
            Self {
                interpolation: "Linear",
                extrapolation: "Constant",
                approximated: false,
            }
        } else if method == UniCase::new("EvaluateCurveToLimits") {
            Self {
                interpolation: "Cubic",
                extrapolation: "Constant",
                approximated: true,
            }
        } else {
            // LagrangeInterpolationLinearExtrapolation, the default
            Self {
                interpolation: "Cubic",
                extrapolation: "Linear",
                approximated: false,
            }
        }
    }
}

/// The data of an old table, rearranged for the new objects
#[derive(Debug, PartialEq)]
struct TableData {
    /// The sorted unique values of each independent variable
    variables: Vec<Vec<f64>>,
    /// The output value for each combination of variable values
    outputs: Vec<f64>,
}

/// A hashable key for the independent variable values of a point, treating `-0.0` as `0.0`
fn point_key(values: &[f64]) -> Vec<u64> {
    values.iter().map(|value| (value + 0.0).to_bits()).collect()
}

/// Read the data points of an old table
fn read_table_data(object: &IdfObject) -> Result<TableData> {
    ensure!(
        object.get_non_empty(EXTERNAL_FILE_FIELD).is_none(),
        "Tables with data in an external file are not supported"
    );

    let num_variables = object
        .get_i64(NUM_VARIABLES_FIELD)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| (1..=MAX_VARIABLES).contains(n));
    let Some(num_variables) = num_variables else {
        bail!(
            "Invalid number of independent variables: '{}'",
            object.get(NUM_VARIABLES_FIELD).unwrap_or_default()
        );
    };

    let values = object
        .fields()
        .get(FIRST_DATA_FIELD..)
        .unwrap_or_default()
        .iter()
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("Data value '{value}' is not a number"))
        })
        .collect::<Result<Vec<_>>>()?;
    ensure!(!values.is_empty(), "Table has no data points");
    ensure!(
        values.len() % (num_variables + 1) == 0,
        "Number of data values ({}) does not match the number of independent variables ({})",
        values.len(),
        num_variables
    );

    // Each point is (x1, ..., xn, y)
    let points = values.chunks(num_variables + 1).collect_vec();
    let variables = (0..num_variables)
        .map(|i| {
            let mut values = points.iter().map(|point| point[i]).collect_vec();
            values.sort_by(f64::total_cmp);
            values.dedup();
            values
        })
        .collect_vec();

    // The first of any duplicate points wins
    let mut outputs_by_point = HashMap::new();
    for point in &points {
        outputs_by_point
            .entry(point_key(&point[..num_variables]))
            .or_insert(point[num_variables]);
    }

    let mut outputs = Vec::new();
    for combination in variables
        .iter()
        .map(|values| values.iter().copied())
        .multi_cartesian_product()
    {
        let Some(&output) = outputs_by_point.get(&point_key(&combination)) else {
            bail!(
                "Missing data point for independent variable values ({})",
                combination.iter().join(", ")
            );
        };
        outputs.push(output);
    }

    Ok(TableData { variables, outputs })
}

/// Split an old table into independent variables, a list of them and a new lookup table
fn split_table(context: &mut UpdateContext, object: &IdfObject) {
    let name = object.name().unwrap_or_default();
    let data = match read_table_data(object) {
        Ok(data) => data,
        Err(err) => {
            context.error(format!("Unable to translate {OLD_TYPE} '{name}': {err}"));
            context.add_untranslated(object);
            return;
        }
    };

    let methods =
        Methods::from_old_method(object.get(INTERPOLATION_METHOD_FIELD).unwrap_or_default());
    if methods.approximated {
        context.warn(format!(
            "{OLD_TYPE} '{name}' uses EvaluateCurveToLimits, which has no equivalent. Its \
            independent variables use {} interpolation and {} extrapolation instead.",
            methods.interpolation, methods.extrapolation
        ));
    }

    let variable_layout = context.target_layout(VARIABLE_TYPE);
    let list_layout = context.target_layout(LIST_TYPE);
    let lookup_layout = context.target_layout(LOOKUP_TYPE);

    let list_handle = context.new_handle();
    let mut list = IdfObject::with_fields(
        LIST_TYPE,
        [
            list_handle.to_string(),
            format!("{name}_IndependentVariableList"),
        ],
    );
    for (i, values) in data.variables.iter().enumerate() {
        let handle = context.new_handle();
        let mut variable = IdfObject::with_fields(
            VARIABLE_TYPE,
            [
                handle.to_string(),
                format!("{name}_IndependentVariable{}", i + 1),
            ],
        );
        variable.set(2, methods.interpolation);
        variable.set(3, methods.extrapolation);
        variable.set(4, object.get(10 + 2 * i).unwrap_or_default());
        variable.set(5, object.get(11 + 2 * i).unwrap_or_default());
        variable.set(7, object.get(22 + i).unwrap_or_default());
        for value in values {
            variable.push_extensible_group(&variable_layout, [value.to_string()]);
        }

        list.push_extensible_group(&list_layout, [handle.to_string()]);
        context.add_new(variable);
    }
    context.add_new(list);

    // The lookup table takes over the handle and name, so curve users still find it
    let mut lookup = IdfObject::with_fields(LOOKUP_TYPE, object.fields().iter().take(2).cloned());
    lookup.set_comment(object.comment());
    lookup.set(2, list_handle.to_string());
    match object.get_f64(NORMALIZATION_REFERENCE_FIELD) {
        Some(reference) if reference != 0.0 => {
            lookup.set(3, "DivisorOnly");
            lookup.set_f64(4, reference);
        }
        _ => lookup.set(3, "None"),
    }
    lookup.set(5, object.get(MINIMUM_OUTPUT_FIELD).unwrap_or_default());
    lookup.set(6, object.get(MAXIMUM_OUTPUT_FIELD).unwrap_or_default());
    lookup.set(7, object.get(OUTPUT_UNIT_TYPE_FIELD).unwrap_or_default());
    for output in data.outputs {
        lookup.push_extensible_group(&lookup_layout, [output.to_string()]);
    }

    context.add_refactored(object, lookup);
}

/// Multi-variable lookup tables are replaced by lookup tables with separate independent variables
pub fn update_to_3_2_0(context: &mut UpdateContext) -> Result<()> {
    for object in context.source().objects() {
        if object.type_name() == OLD_TYPE {
            split_table(context, object);
        } else {
            context.copy(object);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, h, model_text, osm_object};
    use crate::translator::updates::run_step;
    use log::Level;
    use rstest::rstest;

    /// An old table with the given interpolation method, number of variables and data values
    fn old_table(method: &str, num_variables: &str, data: &[&str]) -> IdfObject {
        let mut table = IdfObject::with_fields(OLD_TYPE, [h(1), "Table".to_string()]);
        table.set(INTERPOLATION_METHOD_FIELD, method);
        table.set(NORMALIZATION_REFERENCE_FIELD, "2");
        for (field, value) in [(10, "1"), (11, "2"), (12, "10"), (13, "20")] {
            table.set(field, value);
        }
        table.set(MINIMUM_OUTPUT_FIELD, "0");
        table.set(MAXIMUM_OUTPUT_FIELD, "1");
        table.set(22, "Dimensionless");
        table.set(23, "Temperature");
        table.set(OUTPUT_UNIT_TYPE_FIELD, "Capacity");
        table.set(NUM_VARIABLES_FIELD, num_variables);
        for (i, value) in data.iter().enumerate() {
            table.set(FIRST_DATA_FIELD + i, *value);
        }
        table
    }

    /// A full grid of two variables, out of order
    const GRID_DATA: &[&str] = &[
        "2", "10", "0.3", "1", "10", "0.1", "1", "20", "0.2", "2", "20", "0.4",
    ];

    #[test]
    fn test_read_table_data() {
        let table = old_table("", "2", GRID_DATA);
        assert_eq!(
            read_table_data(&table).unwrap(),
            TableData {
                variables: vec![vec![1.0, 2.0], vec![10.0, 20.0]],
                outputs: vec![0.1, 0.2, 0.3, 0.4],
            }
        );
    }

    #[rstest]
    #[case("6", &["1", "2"], "Invalid number of independent variables: '6'")]
    #[case("", &["1", "2"], "Invalid number of independent variables: ''")]
    #[case("1", &[], "Table has no data points")]
    #[case("1", &["1", "x"], "Data value 'x' is not a number")]
    #[case(
        "2",
        &["1", "10"],
        "Number of data values (2) does not match the number of independent variables (2)"
    )]
    fn test_read_table_data_invalid(
        #[case] num_variables: &str,
        #[case] data: &[&str],
        #[case] msg: &str,
    ) {
        let table = old_table("", num_variables, data);
        assert_error!(read_table_data(&table), msg);
    }

    #[test]
    fn test_read_table_data_sparse_grid() {
        let table = old_table("", "2", &["1", "10", "0.1", "2", "20", "0.4"]);
        assert_error!(
            read_table_data(&table),
            "Missing data point for independent variable values (1, 20)"
        );
    }

    #[test]
    fn test_read_table_data_duplicate_points() {
        // The first point wins, and -0 is the same value as 0
        let table = old_table("", "1", &["0", "0.1", "1", "0.2", "-0", "0.5", "1", "0.6"]);
        assert_eq!(
            read_table_data(&table).unwrap(),
            TableData {
                variables: vec![vec![-0.0, 1.0]],
                outputs: vec![0.1, 0.2],
            }
        );
    }

    #[test]
    fn test_read_table_data_external_file() {
        let mut table = old_table("", "1", &["1", "2"]);
        table.set(EXTERNAL_FILE_FIELD, "table.csv");
        assert_error!(
            read_table_data(&table),
            "Tables with data in an external file are not supported"
        );
    }

    #[rstest]
    #[case("", "Cubic", "Linear", false)]
    #[case("LagrangeInterpolationLinearExtrapolation", "Cubic", "Linear", false)]
    #[case("linearinterpolationoftable", "Linear", "Constant", false)]
    #[case("EvaluateCurveToLimits", "Cubic", "Constant", true)]
    fn test_methods(
        #[case] method: &str,
        #[case] interpolation: &str,
        #[case] extrapolation: &str,
        #[case] approximated: bool,
    ) {
        let methods = Methods::from_old_method(method);
        assert_eq!(methods.interpolation, interpolation);
        assert_eq!(methods.extrapolation, extrapolation);
        assert_eq!(methods.approximated, approximated);
    }

    #[test]
    fn test_split_table() {
        let body = format!("{}\n", old_table("LinearInterpolationOfTable", "2", GRID_DATA))
            + &osm_object("OS:Curve:Linear", &[&h(2), "Curve"]);
        let (output, log) = run_step("3.2.0", &model_text("3.1.0", &body), false);

        assert_eq!(output.num_objects(), 5);
        assert_eq!(log.new.len(), 3);
        assert_eq!(log.refactored.len(), 1);
        assert!(log.messages().is_empty());

        let variables = output.objects_by_type(VARIABLE_TYPE).collect_vec();
        assert_eq!(variables.len(), 2);
        let first = variables[0];
        assert_eq!(first.name(), Some("Table_IndependentVariable1"));
        assert_eq!(
            first.fields()[2..],
            ["Linear", "Constant", "1", "2", "", "Dimensionless", "1", "2"]
        );
        assert_eq!(variables[1].fields()[7..], ["Temperature", "10", "20"]);

        let list = output.objects_by_type(LIST_TYPE).next().unwrap();
        assert_eq!(list.name(), Some("Table_IndependentVariableList"));
        assert_eq!(list.get(2), first.get(0));
        assert_eq!(list.get(3), variables[1].get(0));

        let lookup = output.objects_by_type(LOOKUP_TYPE).next().unwrap();
        assert_eq!(lookup.get(0), Some(h(1).as_str()));
        assert_eq!(lookup.name(), Some("Table"));
        assert_eq!(lookup.get(2), list.get(0));
        assert_eq!(
            lookup.fields()[3..],
            ["DivisorOnly", "2", "0", "1", "Capacity", "0.1", "0.2", "0.3", "0.4"]
        );
        assert_eq!(lookup.field_comment(8), Some("Output Value 1"));
    }

    #[test]
    fn test_split_table_approximated_method() {
        let body = format!("{}\n", old_table("EvaluateCurveToLimits", "1", &["1", "0.5"]));
        let (output, log) = run_step("3.2.0", &model_text("3.1.0", &body), false);
        assert_eq!(output.num_objects(), 3);
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].level, Level::Warn);
    }

    #[test]
    fn test_split_table_untranslated() {
        let body = format!("{}\n", old_table("", "2", &["1", "10", "0.1", "2", "20", "0.4"]));
        let (output, log) = run_step("3.2.0", &model_text("3.1.0", &body), false);
        assert_eq!(output.num_objects(), 0);
        assert_eq!(log.untranslated.len(), 1);
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].level, Level::Error);
        assert!(
            log.messages()[0]
                .message
                .starts_with("Unable to translate OS:Table:MultiVariableLookup 'Table'")
        );
    }
}
