// src/classify/exhaustion.rs

//! Detecting that the stamina resource ("sanity") ran out during a fight.

use std::sync::LazyLock;

use regex::Regex;

use crate::classify::rules::RuleTable;

/// Why an output was judged exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionSignal {
    /// The binary said so explicitly.
    Phrase,
    /// A `Fight <stage> 0 times` line.
    ZeroRuns,
    /// A fight summary without any run record.
    NoRunRecord,
}

static EXHAUSTION_PHRASES: LazyLock<RuleTable<ExhaustionSignal>> = LazyLock::new(|| {
    RuleTable::new(&[
        (
            r"(?i)sanity\s+(is\s+)?(not\s+enough|insufficient|exhausted|depleted)",
            ExhaustionSignal::Phrase,
        ),
        (
            r"(?i)(not\s+enough|insufficient|out\s+of|no\s+more)\s+sanity",
            ExhaustionSignal::Phrase,
        ),
        (r"理智不足|理智已耗尽|理智耗尽", ExhaustionSignal::Phrase),
    ])
});

/// `Fight 1-7 3 times` (capture 1: stage, capture 2: count).
pub(crate) static RUN_RECORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\bFight\s+(\S+)\s+(\d+)\s+times?\b").unwrap());

/// Header of a fight section in the completion summary.
pub(crate) static FIGHT_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[Fight\]").unwrap());

/// Stages whose rewards are claimed once per week: a summary without a run
/// record means "already claimed", not "no sanity".
const SPECIAL_STAGE_MARKERS: &[&str] = &["annihilation", "剿灭"];

pub fn is_special_stage(stage_code: &str) -> bool {
    let lower = stage_code.trim().to_lowercase();
    SPECIAL_STAGE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Classify why `output` indicates exhaustion, if it does.
pub fn exhaustion_signal(output: &str, stage_code: &str) -> Option<ExhaustionSignal> {
    if let Some(signal) = EXHAUSTION_PHRASES.first_match(output) {
        return Some(signal);
    }

    let mut has_record = false;
    for caps in RUN_RECORD_RE.captures_iter(output) {
        has_record = true;
        if caps[2].parse::<u64>().is_ok_and(|n| n == 0) {
            return Some(ExhaustionSignal::ZeroRuns);
        }
    }

    if !has_record && FIGHT_SUMMARY_RE.is_match(output) && !is_special_stage(stage_code) {
        return Some(ExhaustionSignal::NoRunRecord);
    }

    None
}

/// True if the fight ran out of sanity.
///
/// Annihilation stages with a summary but no run record are treated as
/// "rewards already claimed" and are not exhausted.
pub fn is_resource_exhausted(output: &str, stage_code: &str) -> bool {
    exhaustion_signal(output, stage_code).is_some()
}
