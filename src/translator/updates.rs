//! The registered update steps, one per schema version with changes to migrate.
//!
//! Each step reads every object of the source file and writes it to the output, either unchanged
//! or rewritten for the step's target version. Object types are matched exactly, as written by
//! the model library.
use super::UpdateContext;
use crate::version::{CURRENT_VERSION, VersionString};
use anyhow::Result;

mod v2_6;
mod v2_7;
mod v2_9;
mod v3_0;
mod v3_1;
mod v3_2;

/// A function migrating a file to the next version with changes
pub type UpdateFn = fn(&mut UpdateContext) -> Result<()>;

/// A single registered update step
pub struct UpdateStep {
    /// The version of the files written by this step
    pub target: VersionString,
    /// Rewrites the source file into the context's output
    pub apply: UpdateFn,
}

/// Versions which a translation can start from, other than [`CURRENT_VERSION`]
pub const START_VERSIONS: &[VersionString] = &[
    VersionString::new(2, 6, 0),
    VersionString::new(2, 6, 1),
    VersionString::new(2, 6, 2),
    VersionString::new(2, 7, 0),
    VersionString::new(2, 7, 1),
    VersionString::new(2, 7, 2),
    VersionString::new(2, 8, 0),
    VersionString::new(2, 8, 1),
    VersionString::new(2, 9, 0),
    VersionString::new(2, 9, 1),
    VersionString::new(3, 0, 0),
    VersionString::new(3, 0, 1),
    VersionString::new(3, 1, 0),
];

/// All update steps, sorted by target version.
///
/// Versions without schema changes (e.g. 2.8.0 and 2.8.1) have no step of their own: files at
/// those versions are picked up by the next step with a later target.
const UPDATE_STEPS: &[UpdateStep] = &[
    UpdateStep {
        target: VersionString::new(2, 6, 1),
        apply: v2_6::update_to_2_6_1,
    },
    UpdateStep {
        target: VersionString::new(2, 6, 2),
        apply: v2_6::update_to_2_6_2,
    },
    UpdateStep {
        target: VersionString::new(2, 7, 0),
        apply: v2_7::update_to_2_7_0,
    },
    UpdateStep {
        target: VersionString::new(2, 7, 1),
        apply: v2_7::update_to_2_7_1,
    },
    UpdateStep {
        target: VersionString::new(2, 7, 2),
        apply: v2_7::update_to_2_7_2,
    },
    UpdateStep {
        target: VersionString::new(2, 9, 0),
        apply: v2_9::update_to_2_9_0,
    },
    UpdateStep {
        target: VersionString::new(2, 9, 1),
        apply: v2_9::update_to_2_9_1,
    },
    UpdateStep {
        target: VersionString::new(3, 0, 0),
        apply: v3_0::update_to_3_0_0,
    },
    UpdateStep {
        target: VersionString::new(3, 0, 1),
        apply: v3_0::update_to_3_0_1,
    },
    UpdateStep {
        target: VersionString::new(3, 1, 0),
        apply: v3_1::update_to_3_1_0,
    },
    UpdateStep {
        target: VersionString::new(3, 2, 0),
        apply: v3_2::update_to_3_2_0,
    },
];

/// The steps needed to bring a file at `version` up to [`CURRENT_VERSION`], in order
pub fn steps_from(version: &VersionString) -> Vec<&'static UpdateStep> {
    let mut steps = Vec::new();
    let mut version = *version;
    while version < CURRENT_VERSION {
        let Some(step) = UPDATE_STEPS.iter().find(|step| step.target > version) else {
            break;
        };
        steps.push(step);
        version = step.target;
    }

    steps
}

/// Run the step targeting `target` on the model in `text`
#[cfg(test)]
pub(crate) fn run_step(
    target: &str,
    text: &str,
    is_component: bool,
) -> (crate::idf::IdfFile, super::TranslationLog) {
    use crate::idf::IdfFile;
    use crate::schema::Schema;

    let target: VersionString = target.parse().unwrap();
    let step = UPDATE_STEPS
        .iter()
        .find(|step| step.target == target)
        .unwrap();
    let source = IdfFile::parse(text).unwrap();
    let mut log = super::TranslationLog::default();
    let mut context = UpdateContext::new(
        &source,
        source.version().unwrap(),
        target,
        Schema::embedded(),
        is_component,
        &mut log,
    );
    (step.apply)(&mut context).unwrap();
    let output = context.finish();

    (output, log)
}
