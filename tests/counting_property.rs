// tests/counting_property.rs

mod common;
use crate::common::builders::{FlowBuilder, TaskBuilder};
use crate::common::{ScriptedBackend, ScriptedRun, TestRig};

use proptest::prelude::*;

use maaflow::config::FlowDefinition;
use maaflow::flow::expected_units;

#[derive(Debug, Clone)]
enum StepShape {
    Plain,
    SingleFight,
    MultiFight,
    Startup,
    Closedown,
    BrokenCopilot,
}

fn step_strategy() -> impl Strategy<Value = (StepShape, bool)> {
    let shape = prop_oneof![
        Just(StepShape::Plain),
        Just(StepShape::SingleFight),
        Just(StepShape::MultiFight),
        Just(StepShape::Startup),
        Just(StepShape::Closedown),
        Just(StepShape::BrokenCopilot),
    ];
    // Mostly enabled.
    (shape, prop::bool::weighted(0.8))
}

fn run_strategy() -> impl Strategy<Value = ScriptedRun> {
    prop_oneof![
        3 => Just(ScriptedRun::ok(&["done"])),
        1 => Just(ScriptedRun::exit(&["ERROR adb: device offline"], 2)),
        1 => Just(ScriptedRun::SpawnError("no such file".to_string())),
        1 => Just(ScriptedRun::ok(&["Fight 1-7 0 times"])),
    ]
}

fn build_flow(steps: &[(StepShape, bool)]) -> FlowDefinition {
    let mut flow = FlowBuilder::new("random");
    for (i, (shape, enabled)) in steps.iter().enumerate() {
        let id = i.to_string();
        let mut task = match shape {
            StepShape::Plain => TaskBuilder::new(&id, "Mall", &format!("Shop {i}")),
            StepShape::SingleFight => TaskBuilder::fight(&id, "1-7"),
            StepShape::MultiFight => TaskBuilder::fight(&id, "1-7:2,CE-6,LS-6"),
            StepShape::Startup => TaskBuilder::startup(&id),
            StepShape::Closedown => TaskBuilder::closedown(&id),
            StepShape::BrokenCopilot => TaskBuilder::new(&id, "copilot", "Copilot"),
        };
        if !enabled {
            task = task.disabled();
        }
        flow = flow.step(task);
    }
    flow.build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_unit_is_counted_exactly_once(
        steps in proptest::collection::vec(step_strategy(), 0..8),
        runs in proptest::collection::vec(run_strategy(), 0..24),
        screenshots in proptest::collection::vec(any::<bool>(), 0..6),
        weekday in 0u32..7,
    ) {
        let mut backend = ScriptedBackend::new();
        for run in runs {
            backend = backend.then(run);
        }
        for ok in screenshots {
            backend = if ok {
                backend.screenshot_ok()
            } else {
                backend.screenshot_fails("screencap failed")
            };
        }

        let rig = TestRig::new(backend).on_weekday(weekday);
        let flow = build_flow(&steps);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = runtime.block_on(rig.orchestrator.run("random-0", &flow)).unwrap();

        prop_assert_eq!(report.total(), expected_units(&flow));
        prop_assert_eq!(report.errors.len(), report.failed_count);
        prop_assert_eq!(report.skipped.len(), report.skipped_count);

        let sent = rig.notifier.last().unwrap();
        prop_assert_eq!(sent.total_tasks, report.total());
        prop_assert_eq!(rig.backend.max_concurrent().min(1), rig.backend.max_concurrent());
    }
}
