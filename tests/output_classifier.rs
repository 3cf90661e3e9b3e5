// tests/output_classifier.rs

use std::time::Duration;

use maaflow::classify::{
    classify_error, exhaustion_signal, extract_summary, is_resource_exhausted, is_special_stage,
    ErrorKind, ExhaustionSignal, RuleTable,
};

#[test]
fn error_kinds_follow_rule_order() {
    assert_eq!(
        classify_error("[ERROR] Copilot task failed: operator missing"),
        ErrorKind::CopilotFailure
    );
    assert_eq!(
        classify_error("ERROR Failed to connect to 127.0.0.1:5555"),
        ErrorKind::AdbFailure
    );
    assert_eq!(
        classify_error("adb: device offline"),
        ErrorKind::AdbFailure
    );
    assert_eq!(
        classify_error("ERROR task timed out after 600s"),
        ErrorKind::Timeout
    );
    assert_eq!(
        classify_error("ERROR resource not found: stages.json"),
        ErrorKind::ResourceMissing
    );
    assert_eq!(classify_error("something odd happened"), ErrorKind::Generic);
    assert_eq!(classify_error(""), ErrorKind::Generic);
}

#[test]
fn every_kind_has_a_hint() {
    for kind in [
        ErrorKind::CopilotFailure,
        ErrorKind::AdbFailure,
        ErrorKind::Timeout,
        ErrorKind::ResourceMissing,
        ErrorKind::Generic,
    ] {
        assert!(!kind.hint().is_empty());
        assert_eq!(kind.to_string(), kind.label());
    }
}

#[test]
fn zero_runs_means_exhausted() {
    assert!(is_resource_exhausted("Fight 1-7 0 times", "1-7"));
    assert_eq!(
        exhaustion_signal("Fight 1-7 0 times", "1-7"),
        Some(ExhaustionSignal::ZeroRuns)
    );
}

#[test]
fn completed_runs_are_not_exhausted() {
    let output = "[Fight] 10:00:00 - 10:12:00\nFight 1-7 3 times, drops:\n1. Orirock × 6";
    assert!(!is_resource_exhausted(output, "1-7"));
}

#[test]
fn explicit_phrases() {
    assert!(is_resource_exhausted("WARN Sanity is not enough, stopping", "1-7"));
    assert!(is_resource_exhausted("not enough sanity to start", "1-7"));
    assert!(is_resource_exhausted("理智不足", "1-7"));
}

#[test]
fn summary_without_run_record() {
    let output = "[Fight] 10:00:00 - 10:00:30\nnothing to report";
    assert_eq!(
        exhaustion_signal(output, "1-7"),
        Some(ExhaustionSignal::NoRunRecord)
    );
    // Annihilation: rewards already claimed.
    assert!(!is_resource_exhausted(output, "Annihilation"));
    assert!(!is_resource_exhausted(output, "剿灭"));
}

#[test]
fn plain_output_is_not_exhausted() {
    assert!(!is_resource_exhausted("starting fight\nok", "1-7"));
}

#[test]
fn summary_collects_runs_drops_and_time() {
    let output = "\
[Fight] 10:00:00 - 10:12:30
Fight 1-7 3 times, drops:
1. Orirock × 6, Sugar Substitute × 1
2. Orirock × 5
[Mall] 10:12:30 - 10:13:00
";
    let summary = extract_summary("Farm", output).expect("summary");
    assert_eq!(summary.task_name, "Farm");
    assert_eq!(summary.stage_code.as_deref(), Some("1-7"));
    assert_eq!(summary.run_count, Some(3));
    assert_eq!(summary.drops.get("Orirock"), Some(&11));
    assert_eq!(summary.drops.get("Sugar Substitute"), Some(&1));
    assert_eq!(summary.elapsed, Some(Duration::from_secs(12 * 60 + 30 + 30)));
}

#[test]
fn total_drops_line_is_authoritative() {
    let output = "\
Fight CE-6 2 times, drops:
1. LMD × 7500
2. LMD × 7500
total drops: LMD × 15000
";
    let summary = extract_summary("Money", output).unwrap();
    assert_eq!(summary.drops.get("LMD"), Some(&15000));
    assert_eq!(summary.drops.len(), 1);
}

#[test]
fn elapsed_wraps_midnight() {
    let summary = extract_summary("Night", "[Fight] 23:50:00 - 00:10:00").unwrap();
    assert_eq!(summary.elapsed, Some(Duration::from_secs(20 * 60)));
}

#[test]
fn recruit_and_infrast_digest() {
    let output = "\
[Recruit] 09:00:00 - 09:02:00
Tags: [Senior Operator, Defense] ★5
[Infrast] 09:02:00 - 09:05:00
Trading Post: 3 orders
Factory: Pure Gold
";
    let summary = extract_summary("Base", output).unwrap();
    assert_eq!(summary.recruits.len(), 1);
    assert_eq!(summary.recruits[0].rarity, 5);
    assert_eq!(
        summary.recruits[0].tags,
        vec!["Senior Operator".to_string(), "Defense".to_string()]
    );
    assert_eq!(
        summary.infrast,
        vec!["Trading Post: 3 orders".to_string(), "Factory: Pure Gold".to_string()]
    );
}

#[test]
fn nothing_recognised_is_none() {
    assert!(extract_summary("Mail", "collected mail\nbye").is_none());
}

#[test]
fn special_stage_marker_anywhere_in_code() {
    assert!(is_special_stage("Annihilation"));
    assert!(is_special_stage("  weekly-annihilation-4 "));
    assert!(is_special_stage("剿灭作战"));
    assert!(!is_special_stage("1-7"));
}

#[test]
fn rule_table_first_match_wins_and_bad_patterns_are_dropped() {
    let table = RuleTable::new(&[("(unclosed", 0u8), ("fail", 1), ("fail|error", 2)]);
    assert_eq!(table.first_match("task failed"), Some(1));
    assert_eq!(table.first_match("an error"), Some(2));
    assert_eq!(table.first_match("(unclosed"), None);
}
