// src/classify/mod.rs

//! Heuristic classification of the wrapped binary's free-text output.
//!
//! The binary has no structured result channel, so outcomes are inferred
//! from its log lines:
//! - [`error_kind`]: what kind of failure a failed run was.
//! - [`exhaustion`]: whether a fight stopped because sanity ran out.
//! - [`summary`]: stage, runs, drops, recruitment and base digest.
//!
//! Pattern tables live in [`rules`] and are compiled once.

pub mod error_kind;
pub mod exhaustion;
pub mod rules;
pub mod summary;

pub use error_kind::{classify_error, ErrorKind};
pub use exhaustion::{exhaustion_signal, is_resource_exhausted, is_special_stage, ExhaustionSignal};
pub use rules::RuleTable;
pub use summary::{extract_summary, RecruitOutcome, Summary};
