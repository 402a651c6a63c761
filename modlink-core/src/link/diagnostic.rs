// modlink-core/src/link/diagnostic.rs
// Turns jlink's error text into typed errors.

use lazy_static::lazy_static;
use modlink_common::error::{LinkFailureKind, ModlinkError};
use regex::Regex;

lazy_static! {
    static ref MISSING_MODULE_RE: Regex =
        Regex::new(r"[Mm]odule (\S+) not found(?:, required by (\S+))?").unwrap();
    static ref EXPORT_CONFLICT_RE: Regex =
        Regex::new(r"Modules (\S+) and (\S+) export package (\S+) to module").unwrap();
    static ref CONTAINS_CONFLICT_RE: Regex =
        Regex::new(r"Module (\S+) contains package (\S+), module (\S+) exports package").unwrap();
    static ref SPLIT_PACKAGE_RE: Regex =
        Regex::new(r"[Pp]ackage (\S+) .*in both module (\S+) and module (\S+)").unwrap();
    static ref AUTOMATIC_RE: Regex =
        Regex::new(r"automatic module cannot be used with jlink: (\S+)").unwrap();
    static ref SERVICE_RE: Regex =
        Regex::new(r"(?i)(provider class \S+ not in module|service \S+ .*not found|provider \S+ not found)").unwrap();
}

fn trimmed_modules(modules: &[&str]) -> Vec<String> {
    let mut modules: Vec<String> = modules
        .iter()
        .map(|m| m.trim_end_matches([',', '.', ':']).to_string())
        .collect();
    modules.sort();
    modules.dedup();
    modules
}

/// Classifies the combined stdout/stderr of a failed jlink run. Duplicate
/// package errors name modules only; `LinkPlan::attribute` adds the entries.
pub fn classify_linker_output(output: &str) -> ModlinkError {
    let diagnostic = output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("Error:"))
        .unwrap_or_else(|| output.trim())
        .to_string();

    if let Some(caps) = EXPORT_CONFLICT_RE.captures(output) {
        return ModlinkError::DuplicatePackage {
            package: caps[3].to_string(),
            modules: trimmed_modules(&[&caps[1], &caps[2]]),
            sources: Vec::new(),
        };
    }
    if let Some(caps) = CONTAINS_CONFLICT_RE.captures(output) {
        return ModlinkError::DuplicatePackage {
            package: caps[2].trim_end_matches(',').to_string(),
            modules: trimmed_modules(&[&caps[1], &caps[3]]),
            sources: Vec::new(),
        };
    }
    if let Some(caps) = SPLIT_PACKAGE_RE.captures(output) {
        return ModlinkError::DuplicatePackage {
            package: caps[1].to_string(),
            modules: trimmed_modules(&[&caps[2], &caps[3]]),
            sources: Vec::new(),
        };
    }
    if AUTOMATIC_RE.is_match(output) {
        return ModlinkError::LinkFailure {
            kind: LinkFailureKind::AutomaticModule,
            diagnostic,
        };
    }
    if MISSING_MODULE_RE.is_match(output) {
        return ModlinkError::LinkFailure {
            kind: LinkFailureKind::MissingModule,
            diagnostic,
        };
    }
    if SERVICE_RE.is_match(output) {
        return ModlinkError::LinkFailure {
            kind: LinkFailureKind::UnresolvedService,
            diagnostic,
        };
    }
    ModlinkError::LinkFailure {
        kind: LinkFailureKind::Other,
        diagnostic,
    }
}
