// src/classify/summary.rs

//! Best-effort extraction of run results from the binary's closing summary.
//!
//! A typical summary looks like:
//!
//! ```text
//! Summary
//! [Fight] 08:00:03 - 08:12:41 Completed
//! Fight 1-7 6 times, drops:
//! 1. Orirock × 2, LMD × 12
//! total drops: Orirock × 12, LMD × 72
//! [Recruit] 08:12:41 - 08:13:30 Completed
//! Tags: [Vanguard, DPS] ★4
//! [Infrast] 08:13:30 - 08:16:02 Completed
//! Mfg: 4 stations, Trade: 2 stations
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveTime;
use regex::Regex;
use serde::Serialize;

use crate::classify::exhaustion::RUN_RECORD_RE;

const MAX_DIGEST_LINES: usize = 20;

/// What a step achieved, as far as its output tells.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub task_name: String,
    pub stage_code: Option<String>,
    pub run_count: Option<u32>,
    /// Quantity per item name.
    pub drops: BTreeMap<String, u64>,
    #[serde(with = "duration_secs")]
    pub elapsed: Option<Duration>,
    pub recruits: Vec<RecruitOutcome>,
    /// Base-building digest lines.
    pub infrast: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruitOutcome {
    pub tags: Vec<String>,
    pub rarity: u8,
}

impl Summary {
    fn is_empty(&self) -> bool {
        self.stage_code.is_none()
            && self.run_count.is_none()
            && self.drops.is_empty()
            && self.elapsed.is_none()
            && self.recruits.is_empty()
            && self.infrast.is_empty()
    }
}

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[(\w+)\]\s+(\d{1,2}:\d{2}:\d{2})\s*-\s*(\d{1,2}:\d{2}:\d{2})").unwrap()
});

static SECTION_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\w+\]").unwrap());

static DROPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)drops:").unwrap());

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^,×*\n]+?)\s*[×*]\s*(\d+)").unwrap());

static LIST_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+\.\s*").unwrap());

static RECRUIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tags?\s*:?\s*\[([^\]]+)\]\s*(?:->|→|=>|:)?\s*(?:(\d)\s*★|★\s*(\d)|rarity\s*:?\s*(\d))")
        .unwrap()
});

/// Extract a [`Summary`] from `output`, or `None` if nothing was recognised.
pub fn extract_summary(task_name: &str, output: &str) -> Option<Summary> {
    let mut summary = Summary {
        task_name: task_name.to_string(),
        ..Summary::default()
    };

    let mut total_runs: Option<u32> = None;
    for caps in RUN_RECORD_RE.captures_iter(output) {
        if summary.stage_code.is_none() {
            summary.stage_code = Some(caps[1].trim_end_matches(',').to_string());
        }
        if let Ok(n) = caps[2].parse::<u32>() {
            total_runs = Some(total_runs.unwrap_or(0) + n);
        }
    }
    summary.run_count = total_runs;

    summary.drops = extract_drops(output);
    summary.elapsed = extract_elapsed(output);
    summary.recruits = extract_recruits(output);
    summary.infrast = extract_section_lines(output, "Infrast");

    (!summary.is_empty()).then_some(summary)
}

/// Aggregate drops. A `total drops:` line, when present, is authoritative;
/// otherwise every listed drop is summed.
fn extract_drops(output: &str) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    let mut per_run = BTreeMap::new();
    let mut in_drops = false;

    for line in output.lines() {
        let trimmed = line.trim();

        if let Some(rest) = strip_prefix_ci(trimmed, "total drops:") {
            add_items(&mut totals, rest);
            in_drops = false;
            continue;
        }

        if let Some(m) = DROPS_RE.find(trimmed) {
            in_drops = true;
            add_items(&mut per_run, &trimmed[m.end()..]);
            continue;
        }

        if in_drops {
            if trimmed.is_empty() || SECTION_HEADER_RE.is_match(trimmed) {
                in_drops = false;
                continue;
            }
            let body = LIST_PREFIX_RE.replace(trimmed, "");
            add_items(&mut per_run, &body);
        }
    }

    if totals.is_empty() { per_run } else { totals }
}

fn add_items(into: &mut BTreeMap<String, u64>, text: &str) {
    for caps in ITEM_RE.captures_iter(text) {
        let name = caps[1].trim().trim_start_matches(',').trim();
        if name.is_empty() {
            continue;
        }
        if let Ok(n) = caps[2].parse::<u64>() {
            *into.entry(name.to_string()).or_insert(0) += n;
        }
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Sum of all section time ranges; ranges crossing midnight wrap around.
fn extract_elapsed(output: &str) -> Option<Duration> {
    let mut total: Option<Duration> = None;

    for line in output.lines() {
        let Some(caps) = SECTION_RE.captures(line) else {
            continue;
        };
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(&caps[2], "%H:%M:%S"),
            NaiveTime::parse_from_str(&caps[3], "%H:%M:%S"),
        ) else {
            continue;
        };

        let mut secs = (end - start).num_seconds();
        if secs < 0 {
            secs += 24 * 60 * 60;
        }
        let span = Duration::from_secs(secs as u64);
        total = Some(total.unwrap_or_default() + span);
    }

    total
}

fn extract_recruits(output: &str) -> Vec<RecruitOutcome> {
    RECRUIT_RE
        .captures_iter(output)
        .filter_map(|caps| {
            let rarity = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))?
                .as_str()
                .parse()
                .ok()?;
            let tags = caps[1]
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            Some(RecruitOutcome { tags, rarity })
        })
        .collect()
}

/// Non-empty lines following a `[<section>]` header, up to the next header.
fn extract_section_lines(output: &str, section: &str) -> Vec<String> {
    let header = format!("[{section}]");
    let mut lines = Vec::new();
    let mut inside = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if SECTION_HEADER_RE.is_match(trimmed) {
            inside = trimmed.starts_with(&header);
            continue;
        }
        if inside && !trimmed.is_empty() && lines.len() < MAX_DIGEST_LINES {
            lines.push(trimmed.to_string());
        }
    }

    lines
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }
}
