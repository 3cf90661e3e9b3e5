// tests/stage_gate.rs

use maaflow::flow::gate::{closed_reason, gate_for};
use maaflow::flow::{is_stage_open_on, STAGE_GATES};

#[test]
fn ce_opens_sun_tue_thu_sat() {
    for weekday in 0..7 {
        let expected = matches!(weekday, 0 | 2 | 4 | 6);
        assert_eq!(
            is_stage_open_on("CE-6", weekday),
            expected,
            "CE-6 on weekday {weekday}"
        );
    }
}

#[test]
fn chip_stages_follow_their_own_calendar() {
    assert!(is_stage_open_on("PR-A-1", 1));
    assert!(!is_stage_open_on("PR-A-1", 2));
    assert!(is_stage_open_on("PR-D-2", 6));
    assert!(!is_stage_open_on("PR-D-2", 1));
}

#[test]
fn tactical_drill_is_always_open() {
    assert!((0..7).all(|d| is_stage_open_on("LS-6", d)));
}

#[test]
fn unknown_stages_are_always_open() {
    assert!((0..7).all(|d| is_stage_open_on("1-7", d)));
    assert!((0..7).all(|d| is_stage_open_on("OF-7", d)));
}

#[test]
fn every_gate_opens_at_least_once_a_week() {
    for gate in STAGE_GATES {
        assert!(!gate.open_weekdays.is_empty(), "{} never opens", gate.prefix);
        assert!(gate.open_weekdays.iter().all(|d| *d < 7));
    }
}

#[test]
fn closed_reason_names_the_stage_family() {
    assert_eq!(closed_reason("CA-5"), "Aerial Threat is closed today");
    assert_eq!(gate_for("ap-5").map(|g| g.display_name), Some("Tough Siege"));
}
